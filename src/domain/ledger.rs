use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerStatus {
    Pending,
    Complete,
    Error,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Pending => "PENDING",
            LedgerStatus::Complete => "COMPLETE",
            LedgerStatus::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "COMPLETE" => LedgerStatus::Complete,
            "ERROR" => LedgerStatus::Error,
            _ => LedgerStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerKind {
    Payment,
    Refund,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Payment => "PAYMENT",
            LedgerKind::Refund => "REFUND",
        }
    }
}

/// The host ERP's accounting record of money movement, distinct from the
/// gateway's own transaction record. Created `Pending` and moved to
/// `Complete` or `Error` exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub kind: LedgerKind,
    pub amount: f64,
    pub currency: String,
    /// Correlation hash, e.g. the order hash or a dedicated refund hash.
    pub hash: String,
    pub global_process_id: String,
    pub status: LedgerStatus,
    pub gateway_transaction_id: Option<String>,
    pub gateway_refund_id: Option<String>,
    pub message: Option<String>,
}

/// Input for ledger transaction creation via the host factory.
#[derive(Debug, Clone)]
pub struct NewLedgerTransaction {
    pub amount: f64,
    pub currency: String,
    pub hash: String,
    pub global_process_id: String,
    pub message: Option<String>,
}

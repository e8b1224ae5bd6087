use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The slice of a host-system invoice the reconciliation needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub global_process_id: String,
    pub currency: String,
    /// Outstanding amount in major units as the ERP reports it.
    pub outstanding: f64,
    pub payment_type: String,
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub paid: bool,
    /// Ledger transactions attached by this service.
    #[serde(default)]
    pub ledger_transaction_ids: Vec<Uuid>,
}

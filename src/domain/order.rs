use crate::domain::interval::Interval;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub lang: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub product_id: i64,
    pub title: String,
    pub is_plan: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDetails {
    pub invoice_interval: Interval,
    pub duration: Interval,
    pub auto_extend: bool,
}

/// Gateway identifiers stashed on an order, replacing the string-keyed
/// payment data bag of the host system with explicit fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentData {
    pub transaction_id: Option<String>,
    pub refund_id: Option<String>,
    pub offer_id: Option<String>,
    pub payment_method_id: Option<String>,
    pub subscription_id: Option<String>,
    pub token: Option<String>,
    pub successful: bool,
}

/// The slice of a host-system order this integration reads and mutates.
///
/// The order itself is created and owned by the ERP; this service only reads
/// price/currency/plan data and writes payment data and history lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub hash: String,
    pub prefixed_id: String,
    pub currency: String,
    pub price_sum: f64,
    pub customer: Customer,
    pub articles: Vec<Article>,
    pub plan: Option<PlanDetails>,
    #[serde(default)]
    pub payment_data: PaymentData,
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub successful: bool,
}

impl Order {
    pub fn add_history(&mut self, line: impl Into<String>) {
        self.history.push(format!("PAYMILL :: {}", line.into()));
    }

    /// Product ids of all articles, sorted ascending. Input to the offer
    /// identification hash.
    pub fn sorted_product_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.articles.iter().map(|a| a.product_id).collect();
        ids.sort_unstable();
        ids
    }

    pub fn plan_article(&self) -> Option<&Article> {
        self.articles.iter().find(|a| a.is_plan)
    }
}

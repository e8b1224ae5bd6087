use crate::error::{Error, Result};
use crate::gateways::{
    CreateSubscriptionRequest, GatewayOffer, GatewayPaymentMethod, GatewayRefund,
    GatewaySubscription, GatewayTransaction, PaymillApi, SubscriptionStatus, TransactionStatus,
};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Scriptable in-memory stand-in for the Paymill API.
///
/// Behavior is controlled through the public fields; every invocation is
/// recorded so tests can assert on call counts and ordering.
pub struct MockPaymillApi {
    /// Status assigned to created transactions.
    pub transaction_status: Mutex<TransactionStatus>,
    /// Status assigned to created refunds.
    pub refund_status: Mutex<TransactionStatus>,
    /// Recurring eligibility of created payment methods.
    pub recurring_eligible: Mutex<bool>,
    /// When set, `cancel_subscription` fails with a gateway error.
    pub fail_cancel: Mutex<bool>,
    /// Transactions returned by `list_transactions`.
    pub transactions: Mutex<Vec<GatewayTransaction>>,
    /// Subscription returned by `get_subscription`.
    pub subscription: Mutex<Option<GatewaySubscription>>,
    calls: Mutex<Vec<String>>,
    seq: AtomicU64,
}

impl Default for MockPaymillApi {
    fn default() -> Self {
        Self {
            transaction_status: Mutex::new(TransactionStatus::Closed),
            refund_status: Mutex::new(TransactionStatus::Refunded),
            recurring_eligible: Mutex::new(true),
            fail_cancel: Mutex::new(false),
            transactions: Mutex::new(Vec::new()),
            subscription: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
        }
    }
}

impl MockPaymillApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}_{n}")
    }
}

#[async_trait::async_trait]
impl PaymillApi for MockPaymillApi {
    async fn create_transaction(
        &self,
        _token: &str,
        amount_minor: i64,
        currency: &str,
        _description: &str,
    ) -> Result<GatewayTransaction> {
        self.record("create_transaction");

        Ok(GatewayTransaction {
            id: self.next_id("tran"),
            status: *self.transaction_status.lock().unwrap(),
            amount_minor,
            currency: currency.to_string(),
            response_code: Some(20000),
            created_at: Utc::now(),
        })
    }

    async fn create_refund(
        &self,
        _transaction_id: &str,
        amount_minor: i64,
        _description: &str,
    ) -> Result<GatewayRefund> {
        self.record("create_refund");

        Ok(GatewayRefund {
            id: self.next_id("refund"),
            status: *self.refund_status.lock().unwrap(),
            amount_minor,
        })
    }

    async fn create_payment_method(&self, _token: &str) -> Result<GatewayPaymentMethod> {
        self.record("create_payment_method");

        Ok(GatewayPaymentMethod {
            id: self.next_id("pay"),
            recurring: *self.recurring_eligible.lock().unwrap(),
        })
    }

    async fn delete_payment_method(&self, _payment_method_id: &str) -> Result<()> {
        self.record("delete_payment_method");
        Ok(())
    }

    async fn create_offer(
        &self,
        name: &str,
        amount_minor: i64,
        currency: &str,
        interval: &str,
    ) -> Result<GatewayOffer> {
        self.record("create_offer");

        Ok(GatewayOffer {
            id: self.next_id("offer"),
            name: name.to_string(),
            amount_minor,
            currency: currency.to_string(),
            interval: interval.to_string(),
            created_at: Utc::now(),
        })
    }

    async fn delete_offer(&self, _offer_id: &str, _remove_with_subscriptions: bool) -> Result<()> {
        self.record("delete_offer");
        Ok(())
    }

    async fn list_offers(&self, _count: i64, _offset: i64) -> Result<Vec<GatewayOffer>> {
        self.record("list_offers");
        Ok(Vec::new())
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<GatewaySubscription> {
        self.record("create_subscription");

        Ok(GatewaySubscription {
            id: self.next_id("sub"),
            status: SubscriptionStatus::Active,
            offer_id: Some(request.offer_id),
            payment_method_id: Some(request.payment_method_id),
            amount_minor: Some(request.amount_minor),
            currency: Some(request.currency),
            next_capture_at: None,
            canceled_at: None,
        })
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<()> {
        self.record("cancel_subscription");

        if *self.fail_cancel.lock().unwrap() {
            return Err(Error::GatewayApi {
                message: format!("subscription {subscription_id} could not be canceled"),
                code: Some("mock".to_string()),
            });
        }

        Ok(())
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<GatewaySubscription> {
        self.record("get_subscription");

        self.subscription
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::NotFound {
                resource: "subscription",
                id: subscription_id.to_string(),
            })
    }

    async fn list_transactions(
        &self,
        _payment_method_id: &str,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<GatewayTransaction>> {
        self.record("list_transactions");
        Ok(self.transactions.lock().unwrap().clone())
    }
}

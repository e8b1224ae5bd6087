use crate::config::AppConfig;
use crate::domain::interval::period_of_validity;
use crate::domain::invoice::Invoice;
use crate::domain::ledger::{LedgerStatus, NewLedgerTransaction};
use crate::domain::money::{format_minor_units, to_minor_units};
use crate::erp::{InvoiceStore, Ledger, OrderStore};
use crate::error::{Error, Result};
use crate::gateways::{
    CreateSubscriptionRequest, GatewaySubscription, PaymillApi, SubscriptionStatus,
    TransactionStatus,
};
use crate::repo::{
    SubscriptionRow, SubscriptionSearch, SubscriptionTransactionRow,
    SubscriptionTransactionsStore, SubscriptionsStore,
};
use crate::service::offer_service::OfferService;
use chrono::{Datelike, Months, TimeZone, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Data shown to the buyer on the subscription confirmation step.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmSubscriptionData {
    pub sum: String,
    pub currency: String,
    pub interval_text: String,
}

/// Index of the oldest cached transaction that can settle the given amount.
///
/// Transactions must arrive oldest first. A transaction qualifies when its
/// currency matches and its amount covers the open balance; overpayment is
/// accepted, partial payments are not.
pub fn find_matching(
    transactions: &[SubscriptionTransactionRow],
    amount_minor: i64,
    currency: &str,
) -> Option<usize> {
    transactions
        .iter()
        .position(|t| t.data.currency == currency && t.data.amount_minor >= amount_minor)
}

/// Recurring billing: subscription lifecycle and the reconciliation of
/// gateway-captured transactions against unpaid invoices.
#[derive(Clone)]
pub struct SubscriptionService {
    pub api: Arc<dyn PaymillApi>,
    pub orders: Arc<dyn OrderStore>,
    pub invoices: Arc<dyn InvoiceStore>,
    pub ledger: Arc<dyn Ledger>,
    pub subscriptions: Arc<dyn SubscriptionsStore>,
    pub transactions: Arc<dyn SubscriptionTransactionsStore>,
    pub offer_service: OfferService,
    pub config: AppConfig,
    /// Invoices reconciled with this payment type are picked up by the
    /// background billing run.
    pub payment_type: String,
    /// Subscriptions already refreshed during the current billing run, so a
    /// run with many invoices per subscription hits the gateway once.
    refreshed: Arc<Mutex<HashSet<String>>>,
}

impl SubscriptionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn PaymillApi>,
        orders: Arc<dyn OrderStore>,
        invoices: Arc<dyn InvoiceStore>,
        ledger: Arc<dyn Ledger>,
        subscriptions: Arc<dyn SubscriptionsStore>,
        transactions: Arc<dyn SubscriptionTransactionsStore>,
        offer_service: OfferService,
        config: AppConfig,
        payment_type: String,
    ) -> Self {
        Self {
            api,
            orders,
            invoices,
            ledger,
            subscriptions,
            transactions,
            offer_service,
            config,
            payment_type,
            refreshed: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Creates a Paymill subscription for a plan order.
    ///
    /// Re-running for an order that already carries a subscription id is a
    /// no-op returning the existing id.
    pub async fn create_subscription(&self, order_hash: &str, token: &str) -> Result<String> {
        if !self.config.api.is_api_set_up() {
            return Err(Error::Setup);
        }

        let mut order = self
            .orders
            .get_by_hash(order_hash)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "order",
                id: order_hash.to_string(),
            })?;

        if let Some(subscription_id) = &order.payment_data.subscription_id {
            return Ok(subscription_id.clone());
        }

        if token.is_empty() {
            return Err(Error::MissingToken);
        }

        let plan = order.plan.clone().ok_or(Error::NoPlanProduct)?;

        let offer_id = self.offer_service.create_offer_from_order(&mut order).await?;
        order.add_history(format!("Using offer {offer_id}"));
        self.orders.save(&order).await?;

        let payment_method = self.api.create_payment_method(token).await?;

        if !payment_method.recurring {
            // A payment method that cannot recur is useless here; remove it
            // from the gateway again before bailing out.
            self.api.delete_payment_method(&payment_method.id).await?;
            return Err(Error::NotRecurring);
        }

        let period = if plan.auto_extend {
            None
        } else {
            Some(period_of_validity(plan.duration).gateway_format())
        };

        let subscription = self
            .api
            .create_subscription(CreateSubscriptionRequest {
                offer_id: offer_id.clone(),
                payment_method_id: payment_method.id.clone(),
                amount_minor: to_minor_units(order.price_sum),
                currency: order.currency.clone(),
                name: order.prefixed_id.clone(),
                period_of_validity: period,
            })
            .await?;

        order.payment_data.payment_method_id = Some(payment_method.id.clone());
        order.payment_data.subscription_id = Some(subscription.id.clone());
        order.payment_data.successful = true;
        order.successful = true;
        order.add_history(format!("Subscription created ({})", subscription.id));
        self.orders.save(&order).await?;

        self.subscriptions
            .insert(&SubscriptionRow {
                paymill_subscription_id: subscription.id.clone(),
                paymill_offer_id: offer_id,
                paymill_payment_id: payment_method.id,
                customer: order.customer.clone(),
                global_process_id: order.hash.clone(),
                active: true,
            })
            .await?;

        tracing::info!(
            order = order_hash,
            subscription = %subscription.id,
            "subscription created"
        );

        Ok(subscription.id)
    }

    /// Settles one unpaid invoice from the subscription's captured
    /// transactions, refreshing the transaction cache from the gateway when
    /// nothing usable is cached.
    pub async fn bill_subscription_balance(&self, invoice_id: &str) -> Result<()> {
        let invoice = self.get_invoice(invoice_id).await?;

        if invoice.paid {
            return Ok(());
        }

        let row = self.resolve_subscription(&invoice).await?;
        let amount_minor = to_minor_units(invoice.outstanding);

        let mut candidates = self
            .transactions
            .unprocessed(&row.paymill_subscription_id, TransactionStatus::Closed)
            .await?;

        if candidates.is_empty() {
            self.refresh_transaction_list(&row).await?;
            candidates = self
                .transactions
                .unprocessed(&row.paymill_subscription_id, TransactionStatus::Closed)
                .await?;
        }

        let Some(index) = find_matching(&candidates, amount_minor, &invoice.currency) else {
            tracing::debug!(
                invoice = invoice_id,
                subscription = %row.paymill_subscription_id,
                "no captured transaction covers the open balance yet"
            );
            return Ok(());
        };

        let matched = &candidates[index];

        let ledger_tx = self
            .ledger
            .create_payment_transaction(NewLedgerTransaction {
                amount: invoice.outstanding,
                currency: invoice.currency.clone(),
                hash: invoice.id.clone(),
                global_process_id: invoice.global_process_id.clone(),
                message: Some(format!(
                    "Billed from subscription {}",
                    row.paymill_subscription_id
                )),
            })
            .await?;

        self.ledger
            .set_gateway_ids(ledger_tx.id, Some(&matched.paymill_transaction_id), None)
            .await?;
        self.ledger
            .set_status(ledger_tx.id, LedgerStatus::Complete)
            .await?;

        self.transactions
            .link_ledger_transaction(
                &matched.paymill_transaction_id,
                matched.transaction_date,
                ledger_tx.id,
            )
            .await?;
        self.invoices
            .attach_transaction(&invoice.id, ledger_tx.id)
            .await?;

        tracing::info!(
            invoice = invoice_id,
            transaction = %matched.paymill_transaction_id,
            "invoice settled from subscription transaction"
        );

        Ok(())
    }

    /// Records the denied capture attempt that matches the invoice as a
    /// failed ledger transaction, so the dunning process can see it. Same
    /// matching policy as billing, applied to `Failed` rows.
    pub async fn process_denied_transactions(&self, invoice_id: &str) -> Result<()> {
        let invoice = self.get_invoice(invoice_id).await?;
        let row = self.resolve_subscription(&invoice).await?;
        let amount_minor = to_minor_units(invoice.outstanding);

        let denied = self
            .transactions
            .unprocessed(&row.paymill_subscription_id, TransactionStatus::Failed)
            .await?;

        let Some(index) = find_matching(&denied, amount_minor, &invoice.currency) else {
            return Ok(());
        };
        let tx = &denied[index];

        let ledger_tx = self
            .ledger
            .create_payment_transaction(NewLedgerTransaction {
                amount: invoice.outstanding,
                currency: invoice.currency.clone(),
                hash: invoice.id.clone(),
                global_process_id: invoice.global_process_id.clone(),
                message: Some(format!(
                    "Capture denied by gateway (response code {:?})",
                    tx.data.response_code
                )),
            })
            .await?;

        self.ledger
            .set_gateway_ids(ledger_tx.id, Some(&tx.paymill_transaction_id), None)
            .await?;
        self.ledger
            .set_status(ledger_tx.id, LedgerStatus::Error)
            .await?;

        self.transactions
            .link_ledger_transaction(&tx.paymill_transaction_id, tx.transaction_date, ledger_tx.id)
            .await?;
        self.invoices
            .attach_transaction(&invoice.id, ledger_tx.id)
            .await?;

        tracing::warn!(
            invoice = invoice_id,
            transaction = %tx.paymill_transaction_id,
            "recorded denied capture"
        );

        Ok(())
    }

    /// Pulls new transactions of the subscription's payment method from the
    /// gateway into the local cache. At most once per subscription per
    /// billing run.
    pub async fn refresh_transaction_list(&self, row: &SubscriptionRow) -> Result<()> {
        {
            let mut refreshed = self.refreshed.lock().await;
            if !refreshed.insert(row.paymill_subscription_id.clone()) {
                return Ok(());
            }
        }

        let now = Utc::now();
        let from = match self
            .transactions
            .latest_transaction_date(&row.paymill_subscription_id)
            .await?
        {
            Some(latest) => latest,
            None => Utc
                .with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
                .single()
                .unwrap_or(now),
        };
        let to = now.checked_add_months(Months::new(1)).unwrap_or(now);

        let fetched = self
            .api
            .list_transactions(&row.paymill_payment_id, from, to)
            .await?;

        let mut cached = 0;
        for tx in fetched {
            // Only final states are worth caching; open and pending ones
            // will come around again with their next state.
            if tx.status != TransactionStatus::Closed && tx.status != TransactionStatus::Failed {
                continue;
            }

            self.transactions
                .insert_if_absent(&SubscriptionTransactionRow {
                    paymill_transaction_id: tx.id.clone(),
                    paymill_subscription_id: row.paymill_subscription_id.clone(),
                    transaction_date: tx.created_at,
                    global_process_id: row.global_process_id.clone(),
                    ledger_transaction_id: None,
                    data: tx,
                })
                .await?;
            cached += 1;
        }

        tracing::debug!(
            subscription = %row.paymill_subscription_id,
            cached,
            "transaction cache refreshed"
        );

        Ok(())
    }

    /// One billing run: reconcile every unpaid invoice of this payment type
    /// that belongs to a known subscription. Invoked from the background
    /// billing task.
    pub async fn process_unpaid_invoices(&self) -> Result<()> {
        self.refreshed.lock().await.clear();

        let unpaid = self
            .invoices
            .list_unpaid_by_payment_types(&[self.payment_type.clone()])
            .await?;

        if unpaid.is_empty() {
            return Ok(());
        }

        let process_ids: Vec<String> = unpaid
            .iter()
            .map(|i| i.global_process_id.clone())
            .collect();
        let known: HashSet<String> = self
            .subscriptions
            .by_global_process_ids(&process_ids)
            .await?
            .into_iter()
            .map(|r| r.global_process_id)
            .collect();

        for invoice in unpaid {
            if !known.contains(&invoice.global_process_id) {
                continue;
            }

            if let Err(e) = self.process_denied_transactions(&invoice.id).await {
                tracing::error!(invoice = %invoice.id, "denied transaction processing failed: {e:#}");
            }
            if let Err(e) = self.bill_subscription_balance(&invoice.id).await {
                tracing::error!(invoice = %invoice.id, "billing failed: {e:#}");
            }
        }

        Ok(())
    }

    /// Cancels the subscription at the gateway, then marks the mirror row
    /// inactive. A gateway failure leaves the row active so the next attempt
    /// retries the cancellation.
    pub async fn cancel_subscription(
        &self,
        subscription_id: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        let Some(row) = self.subscriptions.get(subscription_id).await? else {
            return Ok(());
        };

        if !row.active {
            return Ok(());
        }

        self.api.cancel_subscription(subscription_id).await?;
        self.subscriptions.set_active(subscription_id, false).await?;

        tracing::info!(
            subscription = subscription_id,
            reason = reason.unwrap_or(""),
            "subscription cancelled"
        );

        Ok(())
    }

    /// Live subscription state straight from the gateway.
    pub async fn get_subscription_details(
        &self,
        subscription_id: &str,
    ) -> Result<GatewaySubscription> {
        if !self.config.api.is_api_set_up() {
            return Err(Error::Setup);
        }

        self.api.get_subscription(subscription_id).await
    }

    pub async fn is_subscription_active_at_gateway(&self, subscription_id: &str) -> Result<bool> {
        let details = self.get_subscription_details(subscription_id).await?;
        Ok(details.status == SubscriptionStatus::Active)
    }

    pub async fn set_subscription_as_inactive(&self, subscription_id: &str) -> Result<()> {
        self.subscriptions.set_active(subscription_id, false).await?;
        Ok(())
    }

    pub async fn get_subscription_ids(&self, include_inactive: bool) -> Result<Vec<String>> {
        Ok(self.subscriptions.ids(include_inactive).await?)
    }

    pub async fn get_subscription_global_process_id(
        &self,
        subscription_id: &str,
    ) -> Result<String> {
        let row = self
            .subscriptions
            .get(subscription_id)
            .await?
            .ok_or_else(|| Error::SubscriptionNotFound {
                subscription_id: subscription_id.to_string(),
            })?;

        Ok(row.global_process_id)
    }

    pub async fn get_subscription_list(
        &self,
        search: &SubscriptionSearch,
    ) -> Result<(Vec<SubscriptionRow>, i64)> {
        Ok(self.subscriptions.list(search).await?)
    }

    /// Sum and billing cadence for the confirmation step of a plan order.
    pub async fn get_confirm_subscription_data(
        &self,
        order_hash: &str,
    ) -> Result<ConfirmSubscriptionData> {
        let order = self
            .orders
            .get_by_hash(order_hash)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "order",
                id: order_hash.to_string(),
            })?;

        let plan = order.plan.as_ref().ok_or(Error::NoPlanProduct)?;

        Ok(ConfirmSubscriptionData {
            sum: format_minor_units(to_minor_units(order.price_sum)),
            currency: order.currency.clone(),
            interval_text: plan.invoice_interval.display_text(),
        })
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice> {
        self.invoices
            .get(invoice_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "invoice",
                id: invoice_id.to_string(),
            })
    }

    /// The mirror row for an invoice's subscription. The invoice must carry
    /// the subscription id in its payment data.
    async fn resolve_subscription(&self, invoice: &Invoice) -> Result<SubscriptionRow> {
        let subscription_id = invoice.subscription_id.as_deref().ok_or_else(|| {
            Error::SubscriptionIdNotFound {
                invoice_id: invoice.id.clone(),
            }
        })?;

        self.subscriptions
            .get(subscription_id)
            .await?
            .ok_or_else(|| Error::SubscriptionNotFound {
                subscription_id: subscription_id.to_string(),
            })
    }
}

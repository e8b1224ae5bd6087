use crate::config::AppConfig;
use crate::domain::ledger::{LedgerStatus, LedgerTransaction, NewLedgerTransaction};
use crate::domain::money::to_minor_units;
use crate::erp::{Ledger, OrderStore};
use crate::error::{Error, Result};
use crate::gateways::{PaymillApi, TransactionStatus};
use std::sync::Arc;
use uuid::Uuid;

/// One-shot checkout and refunds.
#[derive(Clone)]
pub struct PaymentService {
    pub api: Arc<dyn PaymillApi>,
    pub orders: Arc<dyn OrderStore>,
    pub ledger: Arc<dyn Ledger>,
    pub config: AppConfig,
}

impl PaymentService {
    /// Charges an order against a browser-issued token and records the
    /// outcome on the order and in the ledger.
    pub async fn checkout(&self, order_hash: &str, token: &str) -> Result<LedgerTransaction> {
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

        order.add_history("Creating payment transaction");
        order.payment_data.token = Some(token.to_string());

        let amount_minor = to_minor_units(order.price_sum);
        let description = self
            .config
            .transaction_description
            .replace("{orderId}", &order.prefixed_id);

        let transaction = self
            .api
            .create_transaction(token, amount_minor, &order.currency, &description)
            .await?;

        order.payment_data.transaction_id = Some(transaction.id.clone());
        order.add_history(format!("Payment transaction created ({})", transaction.id));

        if transaction.status != TransactionStatus::Closed {
            order.add_history(format!(
                "Payment transaction not successful (status \"{}\", response code {:?})",
                transaction.status.as_str(),
                transaction.response_code
            ));
            self.orders.save(&order).await?;

            return Err(Error::TransactionFailed {
                status: transaction.status.as_str().to_string(),
                response_code: transaction.response_code,
            });
        }

        order.payment_data.successful = true;
        order.successful = true;
        order.add_history("Payment transaction successful");
        self.orders.save(&order).await?;

        let ledger_tx = self
            .ledger
            .create_payment_transaction(NewLedgerTransaction {
                amount: order.price_sum,
                currency: order.currency.clone(),
                hash: order.hash.clone(),
                global_process_id: order.hash.clone(),
                message: Some(description),
            })
            .await?;

        self.ledger
            .set_gateway_ids(ledger_tx.id, Some(&transaction.id), None)
            .await?;
        self.ledger
            .set_status(ledger_tx.id, LedgerStatus::Complete)
            .await?;

        tracing::info!(
            order = order_hash,
            transaction = %transaction.id,
            "checkout complete"
        );

        self.ledger.get(ledger_tx.id).await?.ok_or_else(|| {
            Error::NotFound {
                resource: "ledger transaction",
                id: ledger_tx.id.to_string(),
            }
        })
    }

    /// Refunds a captured payment transaction, fully or in part.
    ///
    /// The refund ledger entry is created `Pending` before the gateway call
    /// and moved to `Complete` or `Error` afterwards, so a crash mid-refund
    /// leaves an auditable trail.
    pub async fn execute_refund(
        &self,
        ledger_transaction_id: Uuid,
        refund_hash: &str,
        amount: f64,
        reason: &str,
    ) -> Result<LedgerTransaction> {
        if !self.config.api.is_api_set_up() {
            return Err(Error::Setup);
        }

        let original = self
            .ledger
            .get(ledger_transaction_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "ledger transaction",
                id: ledger_transaction_id.to_string(),
            })?;

        let gateway_transaction_id = original
            .gateway_transaction_id
            .as_deref()
            .ok_or(Error::RefundNotCaptured)?
            .to_string();

        let refund_tx = self
            .ledger
            .create_refund_transaction(NewLedgerTransaction {
                amount,
                currency: original.currency.clone(),
                hash: refund_hash.to_string(),
                global_process_id: original.global_process_id.clone(),
                message: Some(reason.to_string()),
            })
            .await?;

        let refund = match self
            .api
            .create_refund(&gateway_transaction_id, to_minor_units(amount), reason)
            .await
        {
            Ok(refund) => refund,
            Err(e) => {
                self.ledger
                    .set_status(refund_tx.id, LedgerStatus::Error)
                    .await?;
                return Err(e);
            }
        };

        if refund.status != TransactionStatus::Refunded {
            self.ledger
                .set_status(refund_tx.id, LedgerStatus::Error)
                .await?;

            return Err(Error::RefundFailed {
                status: refund.status.as_str().to_string(),
            });
        }

        self.ledger
            .set_gateway_ids(refund_tx.id, None, Some(&refund.id))
            .await?;
        self.ledger
            .set_status(refund_tx.id, LedgerStatus::Complete)
            .await?;

        // For checkout payments the ledger hash is the order hash; carry the
        // refund id back onto the order's payment data when it resolves.
        if let Some(mut order) = self.orders.get_by_hash(&original.hash).await? {
            order.payment_data.refund_id = Some(refund.id.clone());
            order.add_history(format!("Refund created ({})", refund.id));
            self.orders.save(&order).await?;
        }

        tracing::info!(
            transaction = %gateway_transaction_id,
            refund = %refund.id,
            "refund complete"
        );

        self.ledger.get(refund_tx.id).await?.ok_or_else(|| {
            Error::NotFound {
                resource: "ledger transaction",
                id: refund_tx.id.to_string(),
            }
        })
    }
}

use crate::error::{Error, Result};
use crate::gateways::{
    CreateSubscriptionRequest, GatewayOffer, GatewayPaymentMethod, GatewayRefund,
    GatewaySubscription, GatewayTransaction, PaymillApi, SubscriptionStatus, TransactionStatus,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// REST client for the Paymill v2.1 API.
///
/// Authentication is HTTP basic auth with the private key as user name and an
/// empty password. Requests are form-encoded, responses arrive wrapped in a
/// `{"data": ...}` envelope.
pub struct PaymillRestClient {
    pub base_url: String,
    pub private_key: String,
    pub client: reqwest::Client,
}

impl PaymillRestClient {
    pub fn new(base_url: String, private_key: String) -> Self {
        Self {
            base_url,
            private_key,
            client: reqwest::Client::new(),
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .basic_auth(&self.private_key, Some(""))
            .form(params)
            .send()
            .await
            .context("paymill request failed")?;

        Self::decode(resp).await
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .basic_auth(&self.private_key, Some(""))
            .query(query)
            .send()
            .await
            .context("paymill request failed")?;

        Self::decode(resp).await
    }

    async fn delete(&self, path: &str, query: &[(&str, String)]) -> Result<()> {
        let resp = self
            .client
            .delete(format!("{}{}", self.base_url, path))
            .basic_auth(&self.private_key, Some(""))
            .query(query)
            .send()
            .await
            .context("paymill request failed")?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(api_error(status.as_u16(), &body))
    }

    async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        let body = resp.text().await.context("paymill response unreadable")?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .with_context(|| format!("unexpected paymill response shape: {body}"))?;

        Ok(envelope.data)
    }
}

fn api_error(http_status: u16, body: &str) -> Error {
    let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();

    let message = match parsed.get("error") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => format!("HTTP {http_status}"),
    };

    let code = parsed
        .get("data")
        .and_then(|d| d.get("response_code"))
        .and_then(|c| c.as_i64())
        .map(|c| c.to_string())
        .or_else(|| Some(http_status.to_string()));

    Error::GatewayApi { message, code }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Paymill serializes some amounts as strings and some as integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Amount {
    Int(i64),
    Str(String),
}

impl Amount {
    fn minor(&self) -> i64 {
        match self {
            Amount::Int(v) => *v,
            Amount::Str(s) => s.parse().unwrap_or(0),
        }
    }
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

#[derive(Deserialize)]
struct TransactionPayload {
    id: String,
    status: TransactionStatus,
    amount: Amount,
    currency: String,
    response_code: Option<i64>,
    created_at: i64,
}

impl From<TransactionPayload> for GatewayTransaction {
    fn from(p: TransactionPayload) -> Self {
        GatewayTransaction {
            id: p.id,
            status: p.status,
            amount_minor: p.amount.minor(),
            currency: p.currency,
            response_code: p.response_code,
            created_at: from_unix(p.created_at),
        }
    }
}

#[derive(Deserialize)]
struct RefundPayload {
    id: String,
    status: TransactionStatus,
    amount: Amount,
}

#[derive(Deserialize)]
struct PaymentMethodPayload {
    id: String,
    // Not part of the typed SDK response model; present in the raw payload.
    #[serde(default)]
    is_recurring: bool,
}

#[derive(Deserialize)]
struct OfferPayload {
    id: String,
    name: String,
    amount: Amount,
    currency: String,
    interval: String,
    created_at: i64,
}

impl From<OfferPayload> for GatewayOffer {
    fn from(p: OfferPayload) -> Self {
        GatewayOffer {
            id: p.id,
            name: p.name,
            amount_minor: p.amount.minor(),
            currency: p.currency,
            interval: p.interval,
            created_at: from_unix(p.created_at),
        }
    }
}

#[derive(Deserialize)]
struct ResourceRef {
    id: String,
}

#[derive(Deserialize)]
struct SubscriptionPayload {
    id: String,
    #[serde(default)]
    status: Option<SubscriptionStatus>,
    offer: Option<ResourceRef>,
    payment: Option<ResourceRef>,
    amount: Option<Amount>,
    currency: Option<String>,
    next_capture_at: Option<i64>,
    canceled_at: Option<i64>,
    #[serde(default)]
    is_canceled: bool,
}

impl From<SubscriptionPayload> for GatewaySubscription {
    fn from(p: SubscriptionPayload) -> Self {
        let status = match p.status {
            Some(s) => s,
            None if p.is_canceled => SubscriptionStatus::Canceled,
            None => SubscriptionStatus::Unknown,
        };

        GatewaySubscription {
            id: p.id,
            status,
            offer_id: p.offer.map(|o| o.id),
            payment_method_id: p.payment.map(|p| p.id),
            amount_minor: p.amount.as_ref().map(Amount::minor),
            currency: p.currency,
            next_capture_at: p.next_capture_at.map(from_unix),
            canceled_at: p.canceled_at.map(from_unix),
        }
    }
}

#[async_trait::async_trait]
impl PaymillApi for PaymillRestClient {
    async fn create_transaction(
        &self,
        token: &str,
        amount_minor: i64,
        currency: &str,
        description: &str,
    ) -> Result<GatewayTransaction> {
        let payload: TransactionPayload = self
            .post(
                "/transactions",
                &[
                    ("token", token.to_string()),
                    ("amount", amount_minor.to_string()),
                    ("currency", currency.to_string()),
                    ("description", description.to_string()),
                ],
            )
            .await?;

        Ok(payload.into())
    }

    async fn create_refund(
        &self,
        transaction_id: &str,
        amount_minor: i64,
        description: &str,
    ) -> Result<GatewayRefund> {
        let payload: RefundPayload = self
            .post(
                &format!("/refunds/{transaction_id}"),
                &[
                    ("amount", amount_minor.to_string()),
                    ("description", description.to_string()),
                ],
            )
            .await?;

        Ok(GatewayRefund {
            id: payload.id,
            status: payload.status,
            amount_minor: payload.amount.minor(),
        })
    }

    async fn create_payment_method(&self, token: &str) -> Result<GatewayPaymentMethod> {
        let payload: PaymentMethodPayload = self
            .post("/payments", &[("token", token.to_string())])
            .await?;

        Ok(GatewayPaymentMethod {
            id: payload.id,
            recurring: payload.is_recurring,
        })
    }

    async fn delete_payment_method(&self, payment_method_id: &str) -> Result<()> {
        self.delete(&format!("/payments/{payment_method_id}"), &[]).await
    }

    async fn create_offer(
        &self,
        name: &str,
        amount_minor: i64,
        currency: &str,
        interval: &str,
    ) -> Result<GatewayOffer> {
        let payload: OfferPayload = self
            .post(
                "/offers",
                &[
                    ("name", name.to_string()),
                    ("amount", amount_minor.to_string()),
                    ("currency", currency.to_string()),
                    ("interval", interval.to_string()),
                ],
            )
            .await?;

        Ok(payload.into())
    }

    async fn delete_offer(&self, offer_id: &str, remove_with_subscriptions: bool) -> Result<()> {
        self.delete(
            &format!("/offers/{offer_id}"),
            &[(
                "remove_with_subscriptions",
                remove_with_subscriptions.to_string(),
            )],
        )
        .await
    }

    async fn list_offers(&self, count: i64, offset: i64) -> Result<Vec<GatewayOffer>> {
        let payload: Vec<OfferPayload> = self
            .get(
                "/offers",
                &[
                    ("count", count.to_string()),
                    ("offset", offset.to_string()),
                ],
            )
            .await?;

        Ok(payload.into_iter().map(Into::into).collect())
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<GatewaySubscription> {
        let mut params = vec![
            ("offer", request.offer_id),
            ("payment", request.payment_method_id),
            ("amount", request.amount_minor.to_string()),
            ("currency", request.currency),
            ("name", request.name),
        ];

        if let Some(period) = request.period_of_validity {
            params.push(("period_of_validity", period));
        }

        let payload: SubscriptionPayload = self.post("/subscriptions", &params).await?;

        Ok(payload.into())
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<()> {
        self.delete(
            &format!("/subscriptions/{subscription_id}"),
            &[("remove", "false".to_string())],
        )
        .await
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<GatewaySubscription> {
        let payload: SubscriptionPayload = self
            .get(&format!("/subscriptions/{subscription_id}"), &[])
            .await?;

        Ok(payload.into())
    }

    async fn list_transactions(
        &self,
        payment_method_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<GatewayTransaction>> {
        let payload: Vec<TransactionPayload> = self
            .get(
                "/transactions",
                &[
                    ("payment", payment_method_id.to_string()),
                    ("created_at", format!("{}-{}", from.timestamp(), to.timestamp())),
                    ("order", "created_at_asc".to_string()),
                ],
            )
            .await?;

        Ok(payload.into_iter().map(Into::into).collect())
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the Paymill integration.
///
/// Domain-specific variants carry a message that is safe to show to the end
/// user. Anything else ends up in `Generic`, is logged with full detail
/// server-side and surfaced as an opaque message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("the Paymill API credentials are not configured")]
    Setup,

    #[error("the order carries no payment token")]
    MissingToken,

    #[error("the order contains no subscription plan products")]
    NoPlanProduct,

    #[error("Paymill error: {message}")]
    GatewayApi { message: String, code: Option<String> },

    #[error("the transaction was not accepted (status \"{status}\")")]
    TransactionFailed {
        status: String,
        response_code: Option<i64>,
    },

    #[error("the refund was not accepted (status \"{status}\")")]
    RefundFailed { status: String },

    #[error("the transaction has no captured Paymill transaction id")]
    RefundNotCaptured,

    #[error("the payment method is not eligible for recurring payments")]
    NotRecurring,

    #[error("invoice {invoice_id} carries no subscription id")]
    SubscriptionIdNotFound { invoice_id: String },

    #[error("subscription {subscription_id} is unknown")]
    SubscriptionNotFound { subscription_id: String },

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },

    #[error("something went wrong, please try again later")]
    Generic(#[from] anyhow::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::Setup => "API_NOT_CONFIGURED",
            Error::MissingToken => "MISSING_TOKEN",
            Error::NoPlanProduct => "NO_PLAN_PRODUCT",
            Error::GatewayApi { .. } => "GATEWAY_API_ERROR",
            Error::TransactionFailed { .. } => "TRANSACTION_FAILED",
            Error::RefundFailed { .. } => "REFUND_FAILED",
            Error::RefundNotCaptured => "REFUND_NOT_CAPTURED",
            Error::NotRecurring => "PAYMENT_NOT_RECURRING",
            Error::SubscriptionIdNotFound { .. } => "SUBSCRIPTION_ID_NOT_FOUND",
            Error::SubscriptionNotFound { .. } => "SUBSCRIPTION_NOT_FOUND",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::Generic(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Setup => StatusCode::SERVICE_UNAVAILABLE,
            Error::MissingToken | Error::NoPlanProduct => StatusCode::BAD_REQUEST,
            Error::GatewayApi { .. } => StatusCode::BAD_GATEWAY,
            Error::TransactionFailed { .. }
            | Error::RefundFailed { .. }
            | Error::RefundNotCaptured
            | Error::NotRecurring => StatusCode::UNPROCESSABLE_ENTITY,
            Error::SubscriptionIdNotFound { .. }
            | Error::SubscriptionNotFound { .. }
            | Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Generic(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if let Error::Generic(inner) = &self {
            tracing::error!("internal error: {inner:#}");
        }

        let body = ErrorEnvelope {
            error: ErrorPayload {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };

        (self.status_code(), Json(body)).into_response()
    }
}

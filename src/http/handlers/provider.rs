use crate::error::{Error, Result};
use crate::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct PublicKeyResponse {
    pub public_key: String,
}

/// Bootstrap data for the hosted payment widget. Only ever exposes the
/// public key, and only once the credentials are fully configured.
pub async fn public_key(State(state): State<AppState>) -> Result<Json<PublicKeyResponse>> {
    if !state.api_config.is_api_set_up() {
        return Err(Error::Setup);
    }

    Ok(Json(PublicKeyResponse {
        public_key: state.api_config.public_key().to_string(),
    }))
}

pub async fn health() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "ok")
}

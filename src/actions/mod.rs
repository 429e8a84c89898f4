use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use crate::stripe_client::StripeConfig;
use crate::web::AppState;

pub mod auth;
pub mod churches;
pub mod donations;
pub mod status;
pub mod stripe_connect;
pub mod stripe_webhook;

pub use auth::*;
pub use churches::*;
pub use donations::*;
pub use status::*;
pub use stripe_connect::*;
pub use stripe_webhook::*;

/// Envelope for single-object responses
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// Envelope for list responses
#[derive(Debug, Serialize)]
pub struct DataListResponse<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Uniform JSON error response
pub fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}

/// Stripe configuration, or a 503 for routes that cannot run without it
pub fn require_stripe(state: &AppState) -> Result<StripeConfig, Response> {
    match &state.stripe_config {
        Some(config) => Ok(config.clone()),
        None => Err(
            json_error(StatusCode::SERVICE_UNAVAILABLE, "Stripe is not configured")
                .into_response(),
        ),
    }
}

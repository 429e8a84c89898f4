//! Identity-provider (Clerk) webhook: keeps the local users table in sync.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::identity::IdentityWebhookVerifier;
use crate::users::NewUser;
use crate::users_repo::UsersRepository;
use crate::web::AppState;

/// Clerk user payload (the fields we keep)
#[derive(Debug, Deserialize)]
struct IdentityUserData {
    id: String,
    #[serde(default)]
    email_addresses: Vec<IdentityEmailAddress>,
    #[serde(default)]
    primary_email_address_id: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdentityEmailAddress {
    id: String,
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct IdentityEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: IdentityUserData,
}

impl IdentityUserData {
    /// Primary email, falling back to the first address on file
    fn primary_email(&self) -> Option<String> {
        let by_primary_id = self.primary_email_address_id.as_ref().and_then(|primary| {
            self.email_addresses
                .iter()
                .find(|address| &address.id == primary)
        });
        by_primary_id
            .or_else(|| self.email_addresses.first())
            .map(|address| address.email_address.clone())
    }
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// POST /auth/webhook
/// Verified against the svix signature scheme; `user.created` and
/// `user.updated` upsert the local user row, other types are acknowledged.
pub async fn handle_identity_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let secret = match std::env::var("CLERK_WEBHOOK_SECRET") {
        Ok(secret) => secret,
        Err(_) => {
            error!("Identity webhook received but CLERK_WEBHOOK_SECRET is not set");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let verifier = match IdentityWebhookVerifier::new(&secret) {
        Ok(verifier) => verifier,
        Err(e) => {
            error!(error = %e, "Identity webhook secret is malformed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let (Some(msg_id), Some(timestamp), Some(signature)) = (
        header(&headers, "svix-id"),
        header(&headers, "svix-timestamp"),
        header(&headers, "svix-signature"),
    ) else {
        metrics::counter!("identity.webhook.signature_invalid").increment(1);
        return StatusCode::BAD_REQUEST.into_response();
    };

    if let Err(e) = verifier.verify(msg_id, timestamp, signature, &body) {
        warn!(error = %e, "Invalid identity webhook signature");
        metrics::counter!("identity.webhook.signature_invalid").increment(1);
        return StatusCode::BAD_REQUEST.into_response();
    }

    let event: IdentityEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Unparseable identity webhook payload");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match event.event_type.as_str() {
        "user.created" | "user.updated" => {
            let Some(email) = event.data.primary_email() else {
                warn!(external_id = %event.data.id, "Identity event without an email address");
                return StatusCode::BAD_REQUEST.into_response();
            };

            let repo = UsersRepository::new(state.pool.clone());
            let new_user = NewUser {
                external_id: event.data.id.clone(),
                email,
                first_name: event.data.first_name.clone(),
                last_name: event.data.last_name.clone(),
                profile_image_url: event.data.image_url.clone(),
            };

            match repo.upsert(new_user).await {
                Ok(user) => {
                    info!(user_id = %user.id, external_id = %user.external_id, "Synced user from identity provider");
                    metrics::counter!("identity.users_synced").increment(1);
                    StatusCode::OK.into_response()
                }
                Err(e) => {
                    error!(external_id = %event.data.id, error = %e, "Failed to upsert user");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        other => {
            info!(event_type = %other, "Unhandled identity event type");
            StatusCode::OK.into_response()
        }
    }
}

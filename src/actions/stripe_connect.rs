use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect},
};
use serde::{Deserialize, Serialize};
use stripe::{Account, ListAccounts};
use tracing::{error, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::churches_repo::ChurchesRepository;
use crate::stripe_client::StripeConfig;
use crate::web::AppState;

use super::{DataListResponse, DataResponse, json_error, require_stripe};

const STRIPE_OAUTH_AUTHORIZE_URL: &str = "https://connect.stripe.com/oauth/authorize";
const STRIPE_OAUTH_TOKEN_URL: &str = "https://connect.stripe.com/oauth/token";

/// Response for OAuth link creation
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "camelCase")]
pub struct OauthLinkResponse {
    pub url: String,
}

/// Connected account summary from the Stripe API
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "camelCase")]
pub struct ConnectedAccountView {
    pub id: String,
    pub account_type: Option<String>,
    pub email: Option<String>,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub details_submitted: bool,
}

impl From<Account> for ConnectedAccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id.to_string(),
            account_type: account.type_.map(|t| t.to_string()),
            email: account.email,
            charges_enabled: account.charges_enabled.unwrap_or(false),
            payouts_enabled: account.payouts_enabled.unwrap_or(false),
            details_submitted: account.details_submitted.unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OauthLinkQuery {
    pub church_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct OauthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Successful response from the Connect OAuth token endpoint
#[derive(Debug, Deserialize)]
struct OauthTokenResponse {
    stripe_user_id: String,
}

#[derive(Debug, Deserialize)]
struct OauthTokenError {
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /connect/oauth/link?church_id=...
/// Build the Stripe Connect authorization URL for a church. The state token
/// is held server-side with a 15 minute lifetime and consumed on callback.
pub async fn oauth_link(
    State(state): State<AppState>,
    Query(query): Query<OauthLinkQuery>,
) -> impl IntoResponse {
    let stripe_config = match require_stripe(&state) {
        Ok(config) => config,
        Err(response) => return response,
    };

    let repo = ChurchesRepository::new(state.pool.clone());
    let church = match repo.get_by_id(query.church_id).await {
        Ok(Some(church)) => church,
        Ok(None) => {
            return json_error(StatusCode::NOT_FOUND, "Church not found").into_response();
        }
        Err(e) => {
            error!(church_id = %query.church_id, error = %e, "Failed to get church");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get church")
                .into_response();
        }
    };

    if church.is_stripe_connected {
        return json_error(
            StatusCode::CONFLICT,
            "Church already has a connected Stripe account",
        )
        .into_response();
    }

    let oauth_state = state.oauth_states.issue(church.id);
    let redirect_uri = format!("{}/connect/oauth/callback", stripe_config.server_url);
    let url = match authorize_url(
        &stripe_config.connect_client_id,
        &oauth_state,
        &redirect_uri,
    ) {
        Ok(url) => url,
        Err(e) => {
            error!(church_id = %church.id, error = %e, "Failed to build authorization URL");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to build authorization URL",
            )
            .into_response();
        }
    };

    metrics::counter!("stripe.connect.oauth_link_issued").increment(1);

    Json(DataResponse {
        data: OauthLinkResponse { url },
    })
    .into_response()
}

/// GET /connect/oauth/callback
/// Stripe redirects here after the church authorizes (or declines) the
/// application. Redeems the state token, exchanges the code for the
/// connected account id, and records the connection.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<OauthCallbackQuery>,
) -> impl IntoResponse {
    let stripe_config = match require_stripe(&state) {
        Ok(config) => config,
        Err(response) => return response,
    };

    let error_redirect = |reason: &str| {
        Redirect::to(&format!(
            "{}/connect/error?reason={}",
            stripe_config.frontend_url, reason
        ))
        .into_response()
    };

    // User declined the authorization on Stripe's side
    if let Some(ref oauth_error) = query.error {
        warn!(
            error = %oauth_error,
            description = query.error_description.as_deref().unwrap_or(""),
            "Stripe Connect authorization declined"
        );
        return error_redirect("access_denied");
    }

    let (code, oauth_state) = match (query.code.as_deref(), query.state.as_deref()) {
        (Some(code), Some(oauth_state)) => (code, oauth_state),
        _ => {
            return json_error(StatusCode::BAD_REQUEST, "Missing code or state").into_response();
        }
    };

    let church_id = match state.oauth_states.redeem(oauth_state) {
        Some(id) => id,
        None => {
            warn!("Unknown, expired, or reused OAuth state token");
            return error_redirect("invalid_state");
        }
    };

    let stripe_user_id = match exchange_oauth_code(&stripe_config, code).await {
        Ok(id) => id,
        Err(e) => {
            error!(church_id = %church_id, error = %e, "OAuth code exchange failed");
            metrics::counter!("stripe.api.errors").increment(1);
            return error_redirect("exchange_failed");
        }
    };

    let repo = ChurchesRepository::new(state.pool.clone());
    match repo.attach_stripe_account(church_id, &stripe_user_id).await {
        Ok(Some(_)) => {
            info!(church_id = %church_id, account_id = %stripe_user_id, "Connected Stripe account");
            metrics::counter!("stripe.connect.accounts_connected").increment(1);
            Redirect::to(&format!(
                "{}/connect/success?church_id={}",
                stripe_config.frontend_url, church_id
            ))
            .into_response()
        }
        Ok(None) => {
            warn!(church_id = %church_id, "Church vanished during OAuth round trip");
            error_redirect("unknown_church")
        }
        Err(e) => {
            error!(church_id = %church_id, error = %e, "Failed to attach Stripe account");
            error_redirect("persistence_failed")
        }
    }
}

/// Build the Connect authorization URL. Query parameters go through the URL
/// serializer so state tokens and redirect targets survive percent-encoding.
fn authorize_url(client_id: &str, state: &str, redirect_uri: &str) -> anyhow::Result<String> {
    let url = reqwest::Url::parse_with_params(
        STRIPE_OAUTH_AUTHORIZE_URL,
        &[
            ("response_type", "code"),
            ("client_id", client_id),
            ("scope", "read_write"),
            ("state", state),
            ("redirect_uri", redirect_uri),
        ],
    )?;
    Ok(url.to_string())
}

/// Exchange an authorization code for the connected account id
async fn exchange_oauth_code(stripe_config: &StripeConfig, code: &str) -> anyhow::Result<String> {
    let params = [
        ("client_secret", stripe_config.secret_key.as_str()),
        ("grant_type", "authorization_code"),
        ("code", code),
    ];

    let response = reqwest::Client::new()
        .post(STRIPE_OAUTH_TOKEN_URL)
        .form(&params)
        .send()
        .await?;

    if !response.status().is_success() {
        let err: OauthTokenError = response.json().await.unwrap_or(OauthTokenError {
            error: None,
            error_description: None,
        });
        anyhow::bail!(
            "token exchange rejected: {} ({})",
            err.error.unwrap_or_else(|| "unknown".to_string()),
            err.error_description.unwrap_or_default()
        );
    }

    let token: OauthTokenResponse = response.json().await?;
    Ok(token.stripe_user_id)
}

/// GET /connect/accounts
/// List connected accounts from the Stripe API
pub async fn list_connected_accounts(State(state): State<AppState>) -> impl IntoResponse {
    let stripe_config = match require_stripe(&state) {
        Ok(config) => config,
        Err(response) => return response,
    };

    let mut params = ListAccounts::new();
    params.limit = Some(100);

    match Account::list(&stripe_config.client, &params).await {
        Ok(accounts) => {
            let views: Vec<ConnectedAccountView> = accounts
                .data
                .into_iter()
                .map(ConnectedAccountView::from)
                .collect();
            Json(DataListResponse { data: views }).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to list connected accounts");
            metrics::counter!("stripe.api.errors").increment(1);
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to list connected accounts",
            )
            .into_response()
        }
    }
}

/// GET /connect/accounts/{account_id}
pub async fn get_connected_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> impl IntoResponse {
    let stripe_config = match require_stripe(&state) {
        Ok(config) => config,
        Err(response) => return response,
    };

    let account_id: stripe::AccountId = match account_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return json_error(StatusCode::BAD_REQUEST, "Invalid account ID").into_response();
        }
    };

    match Account::retrieve(&stripe_config.client, &account_id, &[]).await {
        Ok(account) => Json(DataResponse {
            data: ConnectedAccountView::from(account),
        })
        .into_response(),
        Err(e) => {
            error!(account_id = %account_id, error = %e, "Failed to retrieve connected account");
            metrics::counter!("stripe.api.errors").increment(1);
            json_error(StatusCode::NOT_FOUND, "Connected account not found").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::authorize_url;

    #[test]
    fn authorize_url_carries_all_parameters() {
        let url = authorize_url(
            "ca_123",
            "f00dcafe",
            "http://localhost:8080/connect/oauth/callback",
        )
        .unwrap();

        assert!(url.starts_with("https://connect.stripe.com/oauth/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=ca_123"));
        assert!(url.contains("scope=read_write"));
        assert!(url.contains("state=f00dcafe"));
    }

    #[test]
    fn redirect_uri_is_percent_encoded() {
        let url = authorize_url(
            "ca_123",
            "f00dcafe",
            "https://api.example.com/connect/oauth/callback",
        )
        .unwrap();

        assert!(url.contains("redirect_uri=https%3A%2F%2Fapi.example.com%2Fconnect%2Foauth%2Fcallback"));
    }

    #[test]
    fn query_significant_characters_survive_encoding() {
        let url = authorize_url("ca_123", "a&b=c", "https://api.example.com/cb?x=1").unwrap();

        assert!(url.contains("state=a%26b%3Dc"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapi.example.com%2Fcb%3Fx%3D1"));
    }
}

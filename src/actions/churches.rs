use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use ts_rs::TS;
use uuid::Uuid;

use crate::churches::{Church, ChurchChangeset, DonationConfiguration, NewChurch};
use crate::churches_repo::ChurchesRepository;
use crate::users_repo::UsersRepository;
use crate::web::AppState;

use super::{DataListResponse, DataResponse, json_error};

/// View model for churches (API response)
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "camelCase")]
pub struct ChurchView {
    pub id: String,
    pub user_id: String,
    pub org_name: String,
    pub org_site: Option<String>,
    pub org_email: Option<String>,
    pub org_phone: Option<String>,
    pub org_address: Option<String>,
    pub org_city: Option<String>,
    pub org_state: Option<String>,
    pub org_zip: Option<String>,
    pub org_country: Option<String>,
    pub org_description: Option<String>,
    pub org_logo: Option<String>,
    pub org_banner: Option<String>,
    pub donation_config: DonationConfiguration,
    pub is_stripe_connected: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Church> for ChurchView {
    fn from(c: Church) -> Self {
        Self {
            id: c.id.to_string(),
            user_id: c.user_id.to_string(),
            org_name: c.org_name,
            org_site: c.org_site,
            org_email: c.org_email,
            org_phone: c.org_phone,
            org_address: c.org_address,
            org_city: c.org_city,
            org_state: c.org_state,
            org_zip: c.org_zip,
            org_country: c.org_country,
            org_description: c.org_description,
            org_logo: c.org_logo,
            org_banner: c.org_banner,
            donation_config: c.donation_config,
            is_stripe_connected: c.is_stripe_connected,
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
        }
    }
}

/// Mirrored connected-account status for a church
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "camelCase")]
pub struct ChurchStripeStatusView {
    pub is_stripe_connected: bool,
    pub stripe_account_id: Option<String>,
    pub stripe_account_status: Option<String>,
    pub stripe_account_type: Option<String>,
    pub stripe_account_capabilities: Option<serde_json::Value>,
    pub stripe_account_requirements: Option<serde_json::Value>,
}

/// Request body for creating a church
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "camelCase")]
pub struct CreateChurchRequest {
    pub user_id: Uuid,
    pub org_name: String,
    pub org_site: Option<String>,
    pub org_email: Option<String>,
    pub org_phone: Option<String>,
    pub org_address: Option<String>,
    pub org_city: Option<String>,
    pub org_state: Option<String>,
    pub org_zip: Option<String>,
    pub org_country: Option<String>,
    pub org_description: Option<String>,
    pub org_logo: Option<String>,
    pub org_banner: Option<String>,
}

/// Request body for updating a church profile
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "camelCase")]
pub struct UpdateChurchRequest {
    pub church_id: Uuid,
    pub org_name: Option<String>,
    pub org_site: Option<String>,
    pub org_email: Option<String>,
    pub org_phone: Option<String>,
    pub org_address: Option<String>,
    pub org_city: Option<String>,
    pub org_state: Option<String>,
    pub org_zip: Option<String>,
    pub org_country: Option<String>,
    pub org_description: Option<String>,
    pub org_logo: Option<String>,
    pub org_banner: Option<String>,
}

#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "camelCase")]
pub struct DeleteChurchRequest {
    pub church_id: Uuid,
}

#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "camelCase")]
pub struct GetChurchRequest {
    pub user_id: Uuid,
    pub church_id: Uuid,
}

#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "camelCase")]
pub struct GetChurchesRequest {
    pub user_id: Uuid,
}

/// POST /church/create
pub async fn create_church(
    State(state): State<AppState>,
    Json(request): Json<CreateChurchRequest>,
) -> impl IntoResponse {
    if request.org_name.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "Organization name is required")
            .into_response();
    }

    // The owning user must already exist (created via the identity webhook)
    let users_repo = UsersRepository::new(state.pool.clone());
    match users_repo.get_by_id(request.user_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return json_error(StatusCode::BAD_REQUEST, "Unknown user").into_response();
        }
        Err(e) => {
            error!(error = %e, "Failed to look up user");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create church")
                .into_response();
        }
    }

    let new_church = NewChurch {
        user_id: request.user_id,
        org_name: request.org_name,
        org_site: request.org_site,
        org_email: request.org_email,
        org_phone: request.org_phone,
        org_address: request.org_address,
        org_city: request.org_city,
        org_state: request.org_state,
        org_zip: request.org_zip,
        org_country: request.org_country,
        org_description: request.org_description,
        org_logo: request.org_logo,
        org_banner: request.org_banner,
        donation_config: serde_json::to_value(DonationConfiguration::default())
            .unwrap_or_default(),
    };

    let repo = ChurchesRepository::new(state.pool.clone());
    match repo.create(new_church).await {
        Ok(church) => (
            StatusCode::CREATED,
            Json(DataResponse {
                data: ChurchView::from(church),
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to create church");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create church")
                .into_response()
        }
    }
}

/// POST /church/update
pub async fn update_church(
    State(state): State<AppState>,
    Json(request): Json<UpdateChurchRequest>,
) -> impl IntoResponse {
    let changes = ChurchChangeset {
        org_name: request.org_name,
        org_site: request.org_site,
        org_email: request.org_email,
        org_phone: request.org_phone,
        org_address: request.org_address,
        org_city: request.org_city,
        org_state: request.org_state,
        org_zip: request.org_zip,
        org_country: request.org_country,
        org_description: request.org_description,
        org_logo: request.org_logo,
        org_banner: request.org_banner,
    };

    let repo = ChurchesRepository::new(state.pool.clone());
    match repo.update(request.church_id, changes).await {
        Ok(Some(church)) => Json(DataResponse {
            data: ChurchView::from(church),
        })
        .into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Church not found").into_response(),
        Err(e) => {
            error!(church_id = %request.church_id, error = %e, "Failed to update church");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update church")
                .into_response()
        }
    }
}

/// POST /church/delete
pub async fn delete_church(
    State(state): State<AppState>,
    Json(request): Json<DeleteChurchRequest>,
) -> impl IntoResponse {
    let repo = ChurchesRepository::new(state.pool.clone());
    match repo.delete(request.church_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => json_error(StatusCode::NOT_FOUND, "Church not found").into_response(),
        Err(e) => {
            error!(church_id = %request.church_id, error = %e, "Failed to delete church");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete church")
                .into_response()
        }
    }
}

/// POST /church/get-church
pub async fn get_church(
    State(state): State<AppState>,
    Json(request): Json<GetChurchRequest>,
) -> impl IntoResponse {
    let repo = ChurchesRepository::new(state.pool.clone());
    match repo.get_for_user(request.church_id, request.user_id).await {
        Ok(Some(church)) => Json(DataResponse {
            data: ChurchView::from(church),
        })
        .into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Church not found").into_response(),
        Err(e) => {
            error!(church_id = %request.church_id, error = %e, "Failed to get church");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get church").into_response()
        }
    }
}

/// POST /church/get-churches
pub async fn get_churches(
    State(state): State<AppState>,
    Json(request): Json<GetChurchesRequest>,
) -> impl IntoResponse {
    let repo = ChurchesRepository::new(state.pool.clone());
    match repo.get_by_user_id(request.user_id).await {
        Ok(churches) => {
            let views: Vec<ChurchView> = churches.into_iter().map(ChurchView::from).collect();
            Json(DataListResponse { data: views }).into_response()
        }
        Err(e) => {
            error!(user_id = %request.user_id, error = %e, "Failed to list churches");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list churches")
                .into_response()
        }
    }
}

/// GET /church/{church_id}/stripe-status
pub async fn get_church_stripe_status(
    State(state): State<AppState>,
    Path(church_id): Path<Uuid>,
) -> impl IntoResponse {
    let repo = ChurchesRepository::new(state.pool.clone());
    match repo.get_by_id(church_id).await {
        Ok(Some(church)) => Json(DataResponse {
            data: ChurchStripeStatusView {
                is_stripe_connected: church.is_stripe_connected,
                stripe_account_id: church.stripe_account_id,
                stripe_account_status: church.stripe_account_status,
                stripe_account_type: church.stripe_account_type,
                stripe_account_capabilities: church.stripe_account_capabilities,
                stripe_account_requirements: church.stripe_account_requirements,
            },
        })
        .into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Church not found").into_response(),
        Err(e) => {
            error!(church_id = %church_id, error = %e, "Failed to get Stripe status");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to get Stripe status",
            )
            .into_response()
        }
    }
}

/// GET /church/{church_id}/donation-config
pub async fn get_donation_config(
    State(state): State<AppState>,
    Path(church_id): Path<Uuid>,
) -> impl IntoResponse {
    let repo = ChurchesRepository::new(state.pool.clone());
    match repo.get_by_id(church_id).await {
        Ok(Some(church)) => Json(DataResponse {
            data: church.donation_config,
        })
        .into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Church not found").into_response(),
        Err(e) => {
            error!(church_id = %church_id, error = %e, "Failed to get donation config");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to get donation configuration",
            )
            .into_response()
        }
    }
}

/// PUT /church/{church_id}/donation-config
pub async fn set_donation_config(
    State(state): State<AppState>,
    Path(church_id): Path<Uuid>,
    Json(config): Json<DonationConfiguration>,
) -> impl IntoResponse {
    if let Err(reason) = config.validate() {
        return json_error(StatusCode::BAD_REQUEST, &reason).into_response();
    }

    let repo = ChurchesRepository::new(state.pool.clone());
    match repo.set_donation_config(church_id, &config).await {
        Ok(Some(church)) => Json(DataResponse {
            data: church.donation_config,
        })
        .into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Church not found").into_response(),
        Err(e) => {
            error!(church_id = %church_id, error = %e, "Failed to set donation config");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update donation configuration",
            )
            .into_response()
        }
    }
}

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use diesel::prelude::*;
use serde::Serialize;
use tracing::error;

use crate::web::AppState;

#[derive(Debug, Serialize)]
pub struct StatusView {
    pub database: bool,
    pub stripe_configured: bool,
}

/// GET /status
/// Liveness/readiness: verifies a database round trip
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let pool = state.pool.clone();
    let database = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok::<(), anyhow::Error>(())
    })
    .await
    .map(|r| r.is_ok())
    .unwrap_or(false);

    if !database {
        error!("Health check failed: database unreachable");
    }

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(StatusView {
            database,
            stripe_configured: state.stripe_config.is_some(),
        }),
    )
}

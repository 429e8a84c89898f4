use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::Request,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
};
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use serde_json::json;
use std::time::Instant;
use uuid::Uuid;

use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::actions;
use crate::oauth_state::OauthStateCache;
use crate::stripe_client::StripeConfig;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

// App state for sharing the database pool and Stripe configuration
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub stripe_config: Option<StripeConfig>,
    pub oauth_states: OauthStateCache,
}

async fn welcome() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "Welcome to the GoshenPay API",
    }))
}

// Middleware for request logging with correlation ID
async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = Uuid::new_v4().to_string()[..8].to_string();
    let start_time = Instant::now();

    info!("Started {} {} [{}]", method, path, request_id);

    let response = next.run(request).await;
    let duration = start_time.elapsed();
    let status = response.status();

    info!(
        "Completed {} {} [{}] {} in {:.2}ms",
        method,
        path,
        request_id,
        status.as_u16(),
        duration.as_secs_f64() * 1000.0
    );

    response
}

// Middleware to capture HTTP errors to Sentry
async fn sentry_error_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    // Capture HTTP 5xx errors to Sentry
    if response.status().is_server_error() {
        let status = response.status();
        error!("HTTP {} error on {} {}", status.as_u16(), method, uri);

        sentry::configure_scope(|scope| {
            scope.set_tag("http.method", method.as_str());
            scope.set_tag("http.url", uri.to_string());
            scope.set_tag("http.status_code", status.as_u16().to_string());
        });

        sentry::capture_message(
            &format!("HTTP {} error on {} {}", status.as_u16(), method, uri),
            sentry::Level::Error,
        );
    }

    response
}

pub fn build_router(app_state: AppState) -> Router {
    // Create CORS layer that allows all origins and methods
    let cors_layer = CorsLayer::permissive();

    Router::new()
        .route("/", get(welcome))
        .route("/status", get(actions::health_check))
        .route("/metrics", get(crate::metrics::render_metrics))
        // Church administration
        .route("/church/create", post(actions::create_church))
        .route("/church/update", post(actions::update_church))
        .route("/church/delete", post(actions::delete_church))
        .route("/church/get-church", post(actions::get_church))
        .route("/church/get-churches", post(actions::get_churches))
        .route(
            "/church/{church_id}/stripe-status",
            get(actions::get_church_stripe_status),
        )
        .route(
            "/church/{church_id}/donation-config",
            get(actions::get_donation_config),
        )
        .route(
            "/church/{church_id}/donation-config",
            put(actions::set_donation_config),
        )
        // Donations
        .route("/payment/config", get(actions::get_payment_config))
        .route("/payment/donate/payment", post(actions::donate_payment))
        .route(
            "/payment/donate/subscription",
            post(actions::donate_subscription),
        )
        // Stripe webhook ingestion core
        .route("/payment/webhook", post(actions::handle_stripe_webhook))
        // Stripe Connect onboarding
        .route("/connect/oauth/link", get(actions::oauth_link))
        .route("/connect/oauth/callback", get(actions::oauth_callback))
        .route("/connect/accounts", get(actions::list_connected_accounts))
        .route(
            "/connect/accounts/{account_id}",
            get(actions::get_connected_account),
        )
        // Identity provider webhook
        .route("/auth/webhook", post(actions::handle_identity_webhook))
        .with_state(app_state)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(middleware::from_fn(sentry_error_middleware))
        .layer(cors_layer)
}

pub async fn start_web_server(interface: String, port: u16, app_state: AppState) -> Result<()> {
    sentry::configure_scope(|scope| {
        scope.set_tag("operation", "web-server");
    });
    info!("Starting web server on {}:{}", interface, port);

    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", interface, port)).await?;
    info!("Web server listening on http://{}:{}", interface, port);

    axum::serve(listener, app).await?;

    Ok(())
}

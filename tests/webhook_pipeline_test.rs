//! End-to-end tests of the webhook ingestion pipeline: signature
//! verification, journaling, duplicate handling, and reconciliation.
//!
//! These run against a real PostgreSQL server and are ignored by default.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestDatabase;
use diesel::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tower::util::ServiceExt;

use goshenpay::churches::{Church, DonationConfiguration, NewChurch};
use goshenpay::churches_repo::ChurchesRepository;
use goshenpay::oauth_state::OauthStateCache;
use goshenpay::stripe_client::StripeConfig;
use goshenpay::users::NewUser;
use goshenpay::users_repo::UsersRepository;
use goshenpay::web::{AppState, PgPool, build_router};

const WEBHOOK_SECRET: &str = "whsec_test";

fn test_app_state(pool: PgPool) -> AppState {
    AppState {
        pool,
        stripe_config: Some(StripeConfig {
            client: stripe::Client::new("sk_test_123"),
            secret_key: "sk_test_123".to_string(),
            webhook_secret: WEBHOOK_SECRET.to_string(),
            public_key: "pk_test_123".to_string(),
            connect_client_id: "ca_test_123".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            server_url: "http://localhost:8080".to_string(),
        }),
        oauth_states: OauthStateCache::new(),
    }
}

fn sign(body: &str, secret: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.{body}").as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}

fn payout_event(event_id: &str, event_type: &str) -> String {
    serde_json::json!({
        "id": event_id,
        "object": "event",
        "account": "acct_1",
        "created": chrono::Utc::now().timestamp(),
        "livemode": false,
        "pending_webhooks": 1,
        "type": event_type,
        "data": {
            "object": {
                "id": "po_1",
                "object": "payout",
                "amount": 5000,
                "arrival_date": 1755648000,
                "automatic": true,
                "balance_transaction": null,
                "created": 1755648000,
                "currency": "usd",
                "description": null,
                "destination": null,
                "livemode": false,
                "metadata": {},
                "method": "standard",
                "reconciliation_status": "not_applicable",
                "source_type": "card",
                "status": "paid",
                "type": "bank_account"
            }
        }
    })
    .to_string()
}

fn account_updated_event(event_id: &str, account_id: &str) -> String {
    serde_json::json!({
        "id": event_id,
        "object": "event",
        "account": account_id,
        "created": chrono::Utc::now().timestamp(),
        "livemode": false,
        "pending_webhooks": 1,
        "type": "account.updated",
        "data": {
            "object": {
                "id": account_id,
                "object": "account",
                "charges_enabled": true,
                "payouts_enabled": true,
                "details_submitted": true
            }
        }
    })
    .to_string()
}

async fn deliver(state: &AppState, body: &str, signature: Option<&str>) -> (StatusCode, String) {
    let app = build_router(state.clone());
    let mut request = Request::builder().method("POST").uri("/payment/webhook");
    if let Some(signature) = signature {
        request = request.header("Stripe-Signature", signature);
    }
    let response = app
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

fn journal_row_count(pool: &PgPool, event_id: &str) -> i64 {
    use goshenpay::schema::stripe_webhook_events::dsl;
    let mut conn = pool.get().unwrap();
    dsl::stripe_webhook_events
        .filter(dsl::stripe_event_id.eq(event_id))
        .count()
        .get_result(&mut conn)
        .unwrap()
}

async fn seed_connected_church(pool: &PgPool, account_id: &str) -> Church {
    let users = UsersRepository::new(pool.clone());
    let user = users
        .upsert(NewUser {
            external_id: "user_ext_1".to_string(),
            email: "pastor@example.com".to_string(),
            first_name: Some("Test".to_string()),
            last_name: Some("Pastor".to_string()),
            profile_image_url: None,
        })
        .await
        .unwrap();

    let churches = ChurchesRepository::new(pool.clone());
    let church = churches
        .create(NewChurch {
            user_id: user.id,
            org_name: "First Test Church".to_string(),
            org_site: None,
            org_email: None,
            org_phone: None,
            org_address: None,
            org_city: None,
            org_state: None,
            org_zip: None,
            org_country: None,
            org_description: None,
            org_logo: None,
            org_banner: None,
            donation_config: serde_json::to_value(DonationConfiguration::default()).unwrap(),
        })
        .await
        .unwrap();

    churches
        .attach_stripe_account(church.id, account_id)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn missing_signature_is_rejected_without_journaling() {
    let db = TestDatabase::new().await.unwrap();
    let state = test_app_state(db.pool());

    let body = payout_event("evt_1", "payout.paid");
    let (status, _) = deliver(&state, &body, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(journal_row_count(&db.pool(), "evt_1"), 0);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn invalid_signature_is_rejected_without_journaling() {
    let db = TestDatabase::new().await.unwrap();
    let state = test_app_state(db.pool());

    let body = payout_event("evt_1", "payout.paid");
    let bad_signature = sign(&body, "whsec_wrong");
    let (status, _) = deliver(&state, &body, Some(&bad_signature)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(journal_row_count(&db.pool(), "evt_1"), 0);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn valid_event_is_journaled_and_acknowledged() {
    let db = TestDatabase::new().await.unwrap();
    let state = test_app_state(db.pool());

    let body = payout_event("evt_1", "payout.paid");
    let signature = sign(&body, WEBHOOK_SECRET);
    let (status, response_body) = deliver(&state, &body, Some(&signature)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response_body, "Received");

    let journal = goshenpay::stripe_webhooks_repo::StripeWebhookEventsRepository::new(db.pool());
    let row = journal.get_by_event_id("evt_1").await.unwrap().unwrap();
    assert_eq!(row.event_type, "payout.paid");
    assert_eq!(row.account_id.as_deref(), Some("acct_1"));
    assert_eq!(row.amount, Some(5000));
    assert!(row.processed_at.is_some());
    assert!(row.error.is_none());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn unrecognized_event_type_is_acknowledged_without_error() {
    let db = TestDatabase::new().await.unwrap();
    let state = test_app_state(db.pool());

    // Valid provider event type that this service has no handler for
    let body = payout_event("evt_1", "payout.updated");
    let signature = sign(&body, WEBHOOK_SECRET);
    let (status, _) = deliver(&state, &body, Some(&signature)).await;

    assert_eq!(status, StatusCode::OK);

    let journal = goshenpay::stripe_webhooks_repo::StripeWebhookEventsRepository::new(db.pool());
    let row = journal.get_by_event_id("evt_1").await.unwrap().unwrap();
    assert!(row.processed_at.is_some());
    assert!(row.error.is_none());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn duplicate_delivery_keeps_a_single_journal_row() {
    let db = TestDatabase::new().await.unwrap();
    let state = test_app_state(db.pool());

    let body = payout_event("evt_1", "payout.paid");
    let signature = sign(&body, WEBHOOK_SECRET);

    let (first, _) = deliver(&state, &body, Some(&signature)).await;
    let (second, second_body) = deliver(&state, &body, Some(&signature)).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(second_body, "Received");
    assert_eq!(journal_row_count(&db.pool(), "evt_1"), 1);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn handler_failure_annotates_the_journal_and_returns_500() {
    let db = TestDatabase::new().await.unwrap();
    let state = test_app_state(db.pool());

    // Sabotage the handler's table; the journal table is untouched
    {
        let mut conn = db.pool().get().unwrap();
        diesel::sql_query("ALTER TABLE churches RENAME TO churches_gone")
            .execute(&mut conn)
            .unwrap();
    }

    let body = account_updated_event("evt_1", "acct_1");
    let signature = sign(&body, WEBHOOK_SECRET);
    let (status, response_body) = deliver(&state, &body, Some(&signature)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response_body, "Webhook handler failed");

    let journal = goshenpay::stripe_webhooks_repo::StripeWebhookEventsRepository::new(db.pool());
    let row = journal.get_by_event_id("evt_1").await.unwrap().unwrap();
    assert!(row.error.is_some());
    // Still eligible for re-drive when Stripe redelivers
    assert!(row.processed_at.is_none());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn account_updated_mirrors_status_onto_the_church() {
    let db = TestDatabase::new().await.unwrap();
    let state = test_app_state(db.pool());

    let church = seed_connected_church(&db.pool(), "acct_1").await;
    assert_eq!(church.stripe_account_status.as_deref(), Some("pending"));

    let body = account_updated_event("evt_1", "acct_1");
    let signature = sign(&body, WEBHOOK_SECRET);
    let (status, _) = deliver(&state, &body, Some(&signature)).await;
    assert_eq!(status, StatusCode::OK);

    let churches = ChurchesRepository::new(db.pool());
    let updated = churches.get_by_id(church.id).await.unwrap().unwrap();
    assert!(updated.is_stripe_connected);
    assert_eq!(updated.stripe_account_status.as_deref(), Some("active"));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn account_updated_is_idempotent_under_redelivery() {
    let db = TestDatabase::new().await.unwrap();
    let state = test_app_state(db.pool());

    let church = seed_connected_church(&db.pool(), "acct_1").await;

    let body = account_updated_event("evt_1", "acct_1");
    let signature = sign(&body, WEBHOOK_SECRET);
    deliver(&state, &body, Some(&signature)).await;
    deliver(&state, &body, Some(&signature)).await;

    let churches = ChurchesRepository::new(db.pool());
    let updated = churches.get_by_id(church.id).await.unwrap().unwrap();
    assert_eq!(updated.stripe_account_status.as_deref(), Some("active"));
    assert_eq!(journal_row_count(&db.pool(), "evt_1"), 1);
}

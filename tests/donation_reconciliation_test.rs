//! Donation reconciliation semantics at the repository level: payment
//! intent outcomes converge under redelivery, checkout completion attaches
//! late identifiers, and outcomes delivered out of order are recoverable
//! from the journal.
//!
//! These run against a real PostgreSQL server and are ignored by default.

mod common;

use common::TestDatabase;
use diesel::prelude::*;
use serde_json::json;

use goshenpay::churches::{Church, DonationConfiguration, NewChurch};
use goshenpay::churches_repo::ChurchesRepository;
use goshenpay::donations::{Donation, DonationKind, DonationStatus, NewDonation};
use goshenpay::donations_repo::DonationsRepository;
use goshenpay::stripe_webhooks::NewStripeWebhookEvent;
use goshenpay::stripe_webhooks_repo::StripeWebhookEventsRepository;
use goshenpay::users::NewUser;
use goshenpay::users_repo::UsersRepository;
use goshenpay::web::PgPool;

async fn seed_church(pool: &PgPool) -> Church {
    let users = UsersRepository::new(pool.clone());
    let user = users
        .upsert(NewUser {
            external_id: "user_ext_1".to_string(),
            email: "pastor@example.com".to_string(),
            first_name: None,
            last_name: None,
            profile_image_url: None,
        })
        .await
        .unwrap();

    let churches = ChurchesRepository::new(pool.clone());
    churches
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
        .unwrap()
}

async fn seed_donation(
    pool: &PgPool,
    church: &Church,
    payment_intent_id: Option<&str>,
    checkout_session_id: Option<&str>,
) -> Donation {
    let repo = DonationsRepository::new(pool.clone());
    repo.create(NewDonation {
        church_id: church.id,
        donor_id: None,
        kind: DonationKind::OneTime,
        amount_cents: 2_500,
        currency: "usd".to_string(),
        stripe_checkout_session_id: checkout_session_id.map(|s| s.to_string()),
        stripe_payment_intent_id: payment_intent_id.map(|s| s.to_string()),
    })
    .await
    .unwrap()
}

/// Outcome reconciliation as the payment_intent handlers run it: look up by
/// intent id, only write when the status actually changes.
async fn reconcile_payment_intent(pool: &PgPool, payment_intent_id: &str, status: DonationStatus) {
    let repo = DonationsRepository::new(pool.clone());
    let donation = repo
        .get_by_payment_intent_id(payment_intent_id)
        .await
        .unwrap()
        .unwrap();
    if donation.status != status {
        repo.update_status(donation.id, status).await.unwrap();
    }
}

fn donation_row_count(pool: &PgPool, payment_intent_id: &str) -> i64 {
    use goshenpay::schema::donations::dsl;
    let mut conn = pool.get().unwrap();
    dsl::donations
        .filter(dsl::stripe_payment_intent_id.eq(payment_intent_id))
        .count()
        .get_result(&mut conn)
        .unwrap()
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn payment_intent_succeeded_twice_converges_on_one_succeeded_donation() {
    let db = TestDatabase::new().await.unwrap();
    let church = seed_church(&db.pool()).await;
    seed_donation(&db.pool(), &church, Some("pi_123"), Some("cs_1")).await;

    reconcile_payment_intent(&db.pool(), "pi_123", DonationStatus::Succeeded).await;
    reconcile_payment_intent(&db.pool(), "pi_123", DonationStatus::Succeeded).await;

    let repo = DonationsRepository::new(db.pool());
    let donation = repo
        .get_by_payment_intent_id("pi_123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(donation.status, DonationStatus::Succeeded);
    assert_eq!(donation_row_count(&db.pool(), "pi_123"), 1);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn failure_after_success_still_lands_on_the_delivered_outcome() {
    let db = TestDatabase::new().await.unwrap();
    let church = seed_church(&db.pool()).await;
    seed_donation(&db.pool(), &church, Some("pi_123"), Some("cs_1")).await;

    reconcile_payment_intent(&db.pool(), "pi_123", DonationStatus::Failed).await;
    reconcile_payment_intent(&db.pool(), "pi_123", DonationStatus::Failed).await;

    let repo = DonationsRepository::new(db.pool());
    let donation = repo
        .get_by_payment_intent_id("pi_123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(donation.status, DonationStatus::Failed);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn checkout_completion_attaches_the_payment_intent() {
    let db = TestDatabase::new().await.unwrap();
    let church = seed_church(&db.pool()).await;
    let donation = seed_donation(&db.pool(), &church, None, Some("cs_1")).await;
    assert_eq!(donation.status, DonationStatus::Pending);

    let repo = DonationsRepository::new(db.pool());
    let found = repo
        .get_by_checkout_session_id("cs_1")
        .await
        .unwrap()
        .unwrap();
    assert!(found.stripe_payment_intent_id.is_none());

    repo.update_stripe_ids(found.id, Some("pi_123".to_string()), None)
        .await
        .unwrap();
    repo.update_status(found.id, DonationStatus::Processing)
        .await
        .unwrap();

    let updated = repo
        .get_by_payment_intent_id("pi_123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.id, donation.id);
    assert_eq!(updated.status, DonationStatus::Processing);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn charge_id_is_attached_once() {
    let db = TestDatabase::new().await.unwrap();
    let church = seed_church(&db.pool()).await;
    let donation = seed_donation(&db.pool(), &church, Some("pi_123"), Some("cs_1")).await;

    let repo = DonationsRepository::new(db.pool());

    // First charge event attaches; the handler skips the write when an id
    // is already present
    for _ in 0..2 {
        let current = repo
            .get_by_payment_intent_id("pi_123")
            .await
            .unwrap()
            .unwrap();
        if current.stripe_charge_id.is_none() {
            repo.update_stripe_ids(current.id, None, Some("ch_1".to_string()))
                .await
                .unwrap();
        }
    }

    let updated = repo
        .get_by_payment_intent_id("pi_123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.id, donation.id);
    assert_eq!(updated.stripe_charge_id.as_deref(), Some("ch_1"));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn out_of_order_outcome_is_recoverable_from_the_journal() {
    let db = TestDatabase::new().await.unwrap();
    let church = seed_church(&db.pool()).await;
    seed_donation(&db.pool(), &church, None, Some("cs_1")).await;

    // The outcome arrived before the session reported its payment intent;
    // the lookup by intent id missed, but the journal kept the row
    let journal = StripeWebhookEventsRepository::new(db.pool());
    journal
        .record(NewStripeWebhookEvent::from_payload(
            "evt_1",
            "payment_intent.succeeded",
            json!({
                "id": "evt_1",
                "type": "payment_intent.succeeded",
                "data": {
                    "object": {
                        "id": "pi_123",
                        "object": "payment_intent",
                        "status": "succeeded",
                        "amount": 2500,
                        "currency": "usd"
                    }
                }
            }),
        ))
        .await
        .unwrap();

    let prior = journal
        .latest_for_object(
            "pi_123",
            &["payment_intent.succeeded", "payment_intent.payment_failed"],
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(prior.event_type, "payment_intent.succeeded");

    // Completion then attaches the intent and backfills the outcome
    let repo = DonationsRepository::new(db.pool());
    let donation = repo
        .get_by_checkout_session_id("cs_1")
        .await
        .unwrap()
        .unwrap();
    repo.update_stripe_ids(donation.id, Some("pi_123".to_string()), None)
        .await
        .unwrap();
    repo.update_status(donation.id, DonationStatus::Succeeded)
        .await
        .unwrap();

    let updated = repo
        .get_by_payment_intent_id("pi_123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, DonationStatus::Succeeded);

    // Unrelated objects never match
    assert!(
        journal
            .latest_for_object("pi_999", &["payment_intent.succeeded"])
            .await
            .unwrap()
            .is_none()
    );
}

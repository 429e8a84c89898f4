//! Stripe webhook ingestion: signature verification, idempotent journaling,
//! typed dispatch, and journal error annotation.
//!
//! Every inbound delivery is verified against the raw body before anything
//! else runs. Verified events are journaled once per Stripe event id; a
//! redelivery of an event that already completed without error is
//! acknowledged without re-running its handler, while anything else is
//! re-driven (handlers are idempotent).

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use stripe::{Event, EventObject, Webhook};
use tracing::{error, info, warn};

use crate::churches_repo::ChurchesRepository;
use crate::donations::DonationStatus;
use crate::donations_repo::DonationsRepository;
use crate::stripe_events::{HandlerError, WebhookEventKind};
use crate::stripe_webhooks::NewStripeWebhookEvent;
use crate::stripe_webhooks_repo::{JournalOutcome, StripeWebhookEventsRepository};
use crate::subscriptions::NewSubscription;
use crate::subscriptions_repo::SubscriptionsRepository;
use crate::web::AppState;

/// Terminal outcomes of the ingestion pipeline
#[derive(Debug)]
enum WebhookError {
    /// Stripe is not configured; the provider should retry later
    Configuration,
    /// Missing, unreadable, or non-matching signature
    InvalidSignature,
    /// A handler failed; the provider should redeliver
    HandlerFailed,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self {
            WebhookError::Configuration => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Webhook configuration error").into_response()
            }
            WebhookError::InvalidSignature => {
                (StatusCode::BAD_REQUEST, "Invalid signature").into_response()
            }
            WebhookError::HandlerFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Webhook handler failed").into_response()
            }
        }
    }
}

/// POST /payment/webhook
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let stripe_config = match &state.stripe_config {
        Some(config) => config.clone(),
        None => {
            error!("Webhook received but Stripe is not configured");
            return WebhookError::Configuration.into_response();
        }
    };

    metrics::counter!("stripe.webhook.received").increment(1);
    let start = std::time::Instant::now();

    let signature = match headers.get("Stripe-Signature").and_then(|s| s.to_str().ok()) {
        Some(s) => s.to_string(),
        None => {
            metrics::counter!("stripe.webhook.signature_invalid").increment(1);
            return WebhookError::InvalidSignature.into_response();
        }
    };

    // Verification runs over the exact raw bytes
    let payload = match std::str::from_utf8(&body) {
        Ok(s) => s,
        Err(_) => {
            metrics::counter!("stripe.webhook.signature_invalid").increment(1);
            return WebhookError::InvalidSignature.into_response();
        }
    };

    let event = match Webhook::construct_event(payload, &signature, &stripe_config.webhook_secret)
    {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Invalid webhook signature");
            metrics::counter!("stripe.webhook.signature_invalid").increment(1);
            return WebhookError::InvalidSignature.into_response();
        }
    };

    let event_id = event.id.to_string();
    let event_type = event.type_.to_string();
    let payload_value = serde_json::to_value(&event).unwrap_or_default();

    // Journal the delivery. Persistence trouble here is logged but does not
    // block dispatch; the journal is best effort, the handlers are the truth.
    let journal = StripeWebhookEventsRepository::new(state.pool.clone());
    let entry = NewStripeWebhookEvent::from_payload(&event_id, &event_type, payload_value.clone());
    match journal.record(entry).await {
        Ok(JournalOutcome::Recorded(_)) => {}
        Ok(JournalOutcome::Duplicate(existing)) => {
            if existing.processed_at.is_some() && existing.error.is_none() {
                info!(event_id = %event_id, event_type = %event_type, "Duplicate delivery, already processed");
                metrics::counter!("stripe.webhook.duplicate").increment(1);
                return (StatusCode::OK, "Received").into_response();
            }
            // Unknown or failed prior outcome: re-drive the handler
            info!(event_id = %event_id, event_type = %event_type, "Redelivery of unresolved event");
        }
        Err(e) => {
            error!(event_id = %event_id, error = %e, "Failed to journal webhook event");
        }
    }

    let result = process_webhook_event(&state, &event, &payload_value).await;
    let duration_ms = start.elapsed().as_millis() as f64;
    metrics::histogram!("stripe.webhook.processing_ms").record(duration_ms);

    match result {
        Ok(()) => {
            if let Err(e) = journal.mark_processed(&event_id).await {
                error!(event_id = %event_id, error = %e, "Failed to mark webhook as processed");
            }
            metrics::counter!("stripe.webhook.handled").increment(1);
            (StatusCode::OK, "Received").into_response()
        }
        Err(e) => {
            error!(event_id = %event_id, event_type = %event_type, error = %e, "Webhook handler failed");
            if let Err(e2) = journal.mark_failed(&event_id, &e.to_string()).await {
                error!(event_id = %event_id, error = %e2, "Failed to annotate webhook failure");
            }
            metrics::counter!("stripe.webhook.failed").increment(1);
            WebhookError::HandlerFailed.into_response()
        }
    }
}

/// Route a verified event to its handler. `payload` is the serialized event,
/// used where the typed object model does not carry what we need (the
/// top-level connected-account reference, deauthorization payloads).
async fn process_webhook_event(
    state: &AppState,
    event: &Event,
    payload: &serde_json::Value,
) -> Result<(), HandlerError> {
    let event_type = event.type_.to_string();

    match WebhookEventKind::from_type_str(&event_type) {
        WebhookEventKind::AccountUpdated => handle_account_updated(state, event).await,
        WebhookEventKind::AccountApplicationDeauthorized => {
            handle_account_deauthorized(state, payload).await
        }
        WebhookEventKind::ExternalAccountCreated
        | WebhookEventKind::ExternalAccountUpdated
        | WebhookEventKind::ExternalAccountDeleted => {
            // The journal row carries the bank account facts; nothing to
            // reconcile locally
            info!(
                account_id = connected_account_id(payload).unwrap_or_default(),
                event_type = %event_type,
                "External account change acknowledged"
            );
            Ok(())
        }
        WebhookEventKind::CheckoutSessionCompleted => {
            handle_checkout_completed(state, event).await
        }
        WebhookEventKind::PaymentIntentSucceeded => {
            handle_payment_intent(state, event, DonationStatus::Succeeded).await
        }
        WebhookEventKind::PaymentIntentFailed => {
            handle_payment_intent(state, event, DonationStatus::Failed).await
        }
        WebhookEventKind::ChargeSucceeded => handle_charge(state, event, None).await,
        WebhookEventKind::ChargeFailed => {
            handle_charge(state, event, Some(DonationStatus::Failed)).await
        }
        WebhookEventKind::PayoutCreated
        | WebhookEventKind::PayoutPaid
        | WebhookEventKind::PayoutFailed => {
            info!(
                account_id = connected_account_id(payload).unwrap_or_default(),
                event_type = %event_type,
                "Payout event observed"
            );
            metrics::counter!("stripe.payouts.observed").increment(1);
            Ok(())
        }
        WebhookEventKind::SubscriptionCreated | WebhookEventKind::SubscriptionUpdated => {
            handle_subscription_upsert(state, event, payload).await
        }
        WebhookEventKind::SubscriptionDeleted => handle_subscription_deleted(state, event).await,
        WebhookEventKind::Unrecognized => {
            info!(event_type = %event_type, "Unhandled webhook event type");
            metrics::counter!("stripe.webhook.unrecognized").increment(1);
            Ok(())
        }
    }
}

/// Connected-account reference sent at the top level of Connect events
fn connected_account_id(payload: &serde_json::Value) -> Option<String> {
    payload
        .get("account")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

async fn handle_account_updated(state: &AppState, event: &Event) -> Result<(), HandlerError> {
    let EventObject::Account(account) = &event.data.object else {
        return Err(HandlerError::MalformedPayload(
            "account.updated without an account object".to_string(),
        ));
    };

    let account_id = account.id.to_string();
    let charges_enabled = account.charges_enabled.unwrap_or(false);
    let payouts_enabled = account.payouts_enabled.unwrap_or(false);
    let details_submitted = account.details_submitted.unwrap_or(false);

    let status = if charges_enabled {
        "active"
    } else if details_submitted {
        "restricted"
    } else {
        "pending"
    };

    let repo = ChurchesRepository::new(state.pool.clone());
    let updated = repo
        .update_stripe_status(
            &account_id,
            status,
            account.type_.as_ref().map(|t| t.to_string()),
            account
                .capabilities
                .as_ref()
                .and_then(|c| serde_json::to_value(c).ok()),
            account
                .requirements
                .as_ref()
                .and_then(|r| serde_json::to_value(r).ok()),
        )
        .await?;

    match updated {
        Some(church) => {
            if charges_enabled && details_submitted {
                metrics::counter!("stripe.connect.onboarding_completed").increment(1);
            }
            info!(
                church_id = %church.id,
                account_id = %account_id,
                status,
                charges_enabled,
                payouts_enabled,
                "Updated mirrored connected-account status"
            );
        }
        None => {
            // Not one of ours; acknowledged so Stripe stops redelivering
            warn!(account_id = %account_id, "account.updated for an unknown account");
        }
    }
    Ok(())
}

async fn handle_account_deauthorized(
    state: &AppState,
    payload: &serde_json::Value,
) -> Result<(), HandlerError> {
    let account_id = connected_account_id(payload).ok_or_else(|| {
        HandlerError::MalformedPayload(
            "account.application.deauthorized without an account reference".to_string(),
        )
    })?;

    let repo = ChurchesRepository::new(state.pool.clone());
    match repo.disconnect_stripe_account(&account_id).await? {
        Some(church) => {
            info!(church_id = %church.id, account_id = %account_id, "Church deauthorized the application");
            metrics::counter!("stripe.connect.accounts_deauthorized").increment(1);
        }
        None => {
            warn!(account_id = %account_id, "Deauthorization for an unknown account");
        }
    }
    Ok(())
}

async fn handle_checkout_completed(state: &AppState, event: &Event) -> Result<(), HandlerError> {
    let EventObject::CheckoutSession(session) = &event.data.object else {
        return Err(HandlerError::MalformedPayload(
            "checkout.session.completed without a session object".to_string(),
        ));
    };

    let session_id = session.id.to_string();
    let repo = DonationsRepository::new(state.pool.clone());

    let donation = match repo.get_by_checkout_session_id(&session_id).await? {
        Some(donation) => donation,
        None => {
            // Subscription checkouts have no donation row; the subscription
            // events carry the state
            info!(session_id = %session_id, "Completed session without a donation row");
            return Ok(());
        }
    };

    // The payment intent is often only assigned at completion time
    if donation.stripe_payment_intent_id.is_none()
        && let Some(ref pi) = session.payment_intent
    {
        let pi_id = pi.id().to_string();
        repo.update_stripe_ids(donation.id, Some(pi_id.clone()), None)
            .await?;

        // Stripe does not order deliveries: the payment intent outcome can
        // arrive before the session told us which intent to watch. That
        // earlier delivery missed the donation lookup, but the journal kept
        // the row, so recover the terminal status from it.
        let journal = StripeWebhookEventsRepository::new(state.pool.clone());
        let prior = journal
            .latest_for_object(
                &pi_id,
                &["payment_intent.succeeded", "payment_intent.payment_failed"],
            )
            .await?;
        if let Some(prior) = prior {
            let status = if prior.event_type == "payment_intent.succeeded" {
                DonationStatus::Succeeded
            } else {
                DonationStatus::Failed
            };
            repo.update_status(donation.id, status).await?;
            info!(
                donation_id = %donation.id,
                payment_intent_id = %pi_id,
                "Backfilled donation outcome from an earlier delivery"
            );
            return Ok(());
        }
    }

    if donation.status == DonationStatus::Pending {
        repo.update_status(donation.id, DonationStatus::Processing)
            .await?;
        info!(donation_id = %donation.id, "Donation moved to processing");
    }
    Ok(())
}

async fn handle_payment_intent(
    state: &AppState,
    event: &Event,
    status: DonationStatus,
) -> Result<(), HandlerError> {
    let EventObject::PaymentIntent(pi) = &event.data.object else {
        return Err(HandlerError::MalformedPayload(
            "payment_intent event without a payment intent object".to_string(),
        ));
    };

    let pi_id = pi.id.to_string();
    let repo = DonationsRepository::new(state.pool.clone());

    match repo.get_by_payment_intent_id(&pi_id).await? {
        Some(donation) => {
            // Converges under redelivery: the same event always lands on the
            // same terminal status
            if donation.status != status {
                repo.update_status(donation.id, status).await?;
            }
            match status {
                DonationStatus::Succeeded => {
                    metrics::counter!("donations.succeeded").increment(1);
                    info!(donation_id = %donation.id, "Donation succeeded");
                }
                DonationStatus::Failed => {
                    metrics::counter!("donations.failed").increment(1);
                    warn!(donation_id = %donation.id, "Donation failed");
                }
                _ => {}
            }
        }
        None => {
            // Recurring invoices create payment intents we never journaled
            info!(payment_intent_id = %pi_id, "Payment intent without a donation row");
        }
    }
    Ok(())
}

async fn handle_charge(
    state: &AppState,
    event: &Event,
    status: Option<DonationStatus>,
) -> Result<(), HandlerError> {
    let EventObject::Charge(charge) = &event.data.object else {
        return Err(HandlerError::MalformedPayload(
            "charge event without a charge object".to_string(),
        ));
    };

    let Some(pi_id) = charge
        .payment_intent
        .as_ref()
        .map(|pi| pi.id().to_string())
    else {
        info!(charge_id = %charge.id, "Charge without a payment intent reference");
        return Ok(());
    };

    let repo = DonationsRepository::new(state.pool.clone());
    let Some(donation) = repo.get_by_payment_intent_id(&pi_id).await? else {
        info!(charge_id = %charge.id, "Charge for an untracked payment intent");
        return Ok(());
    };

    if donation.stripe_charge_id.is_none() {
        repo.update_stripe_ids(donation.id, None, Some(charge.id.to_string()))
            .await?;
    }
    if let Some(status) = status
        && donation.status != status
    {
        repo.update_status(donation.id, status).await?;
    }
    Ok(())
}

async fn handle_subscription_upsert(
    state: &AppState,
    event: &Event,
    payload: &serde_json::Value,
) -> Result<(), HandlerError> {
    let EventObject::Subscription(subscription) = &event.data.object else {
        return Err(HandlerError::MalformedPayload(
            "subscription event without a subscription object".to_string(),
        ));
    };

    // Tie the subscription to a church through the connected account the
    // event was delivered for
    let church_id = match connected_account_id(payload) {
        Some(account_id) => {
            let churches = ChurchesRepository::new(state.pool.clone());
            churches
                .get_by_stripe_account_id(&account_id)
                .await?
                .map(|church| church.id)
        }
        None => None,
    };

    let item_price = subscription
        .items
        .data
        .first()
        .and_then(|item| item.price.as_ref());

    let new_subscription = NewSubscription {
        church_id,
        donor_id: None,
        stripe_subscription_id: subscription.id.to_string(),
        stripe_customer_id: Some(subscription.customer.id().to_string()),
        status: subscription.status.to_string(),
        amount_cents: item_price
            .and_then(|price| price.unit_amount)
            .and_then(price_amount_cents),
        currency: item_price
            .and_then(|price| price.currency)
            .map(|currency| currency.to_string()),
        billing_interval: item_price
            .and_then(|price| price.recurring.as_ref())
            .map(|recurring| recurring.interval.to_string()),
    };

    let repo = SubscriptionsRepository::new(state.pool.clone());
    let stored = repo.upsert(new_subscription).await?;
    info!(
        subscription_id = %stored.stripe_subscription_id,
        status = %stored.status,
        "Reconciled subscription"
    );
    Ok(())
}

/// Price unit amounts are i64 on the wire; anything outside i32 is stored as
/// unknown rather than wrapped
fn price_amount_cents(amount: i64) -> Option<i32> {
    i32::try_from(amount).ok()
}

async fn handle_subscription_deleted(state: &AppState, event: &Event) -> Result<(), HandlerError> {
    let EventObject::Subscription(subscription) = &event.data.object else {
        return Err(HandlerError::MalformedPayload(
            "subscription event without a subscription object".to_string(),
        ));
    };

    let canceled_at = subscription
        .canceled_at
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(chrono::Utc::now);

    let repo = SubscriptionsRepository::new(state.pool.clone());
    repo.mark_canceled(&subscription.id.to_string(), canceled_at)
        .await?;
    info!(subscription_id = %subscription.id, "Subscription canceled");
    metrics::counter!("donations.subscriptions_canceled").increment(1);
    Ok(())
}

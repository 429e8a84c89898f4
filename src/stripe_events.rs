//! The closed set of Stripe webhook event types this service acts on.
//!
//! Dispatch is modeled as an enum rather than raw string matching so that
//! new provider event types fail closed: anything not listed here parses to
//! `Unrecognized`, which is logged and acknowledged without side effects.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventKind {
    AccountUpdated,
    AccountApplicationDeauthorized,
    ExternalAccountCreated,
    ExternalAccountUpdated,
    ExternalAccountDeleted,
    CheckoutSessionCompleted,
    PaymentIntentSucceeded,
    PaymentIntentFailed,
    ChargeSucceeded,
    ChargeFailed,
    PayoutCreated,
    PayoutPaid,
    PayoutFailed,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    /// Any event type not in the closed set above
    Unrecognized,
}

impl WebhookEventKind {
    pub fn from_type_str(event_type: &str) -> Self {
        match event_type {
            "account.updated" => WebhookEventKind::AccountUpdated,
            "account.application.deauthorized" => WebhookEventKind::AccountApplicationDeauthorized,
            "account.external_account.created" => WebhookEventKind::ExternalAccountCreated,
            "account.external_account.updated" => WebhookEventKind::ExternalAccountUpdated,
            "account.external_account.deleted" => WebhookEventKind::ExternalAccountDeleted,
            "checkout.session.completed" => WebhookEventKind::CheckoutSessionCompleted,
            "payment_intent.succeeded" => WebhookEventKind::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => WebhookEventKind::PaymentIntentFailed,
            "charge.succeeded" => WebhookEventKind::ChargeSucceeded,
            "charge.failed" => WebhookEventKind::ChargeFailed,
            "payout.created" => WebhookEventKind::PayoutCreated,
            "payout.paid" => WebhookEventKind::PayoutPaid,
            "payout.failed" => WebhookEventKind::PayoutFailed,
            "customer.subscription.created" => WebhookEventKind::SubscriptionCreated,
            "customer.subscription.updated" => WebhookEventKind::SubscriptionUpdated,
            "customer.subscription.deleted" => WebhookEventKind::SubscriptionDeleted,
            _ => WebhookEventKind::Unrecognized,
        }
    }
}

/// Failure raised by a type-specific webhook handler.
///
/// Carries a human-readable cause which is written onto the journal entry;
/// the HTTP layer maps any handler failure to a 500 so Stripe redelivers.
#[derive(Debug)]
pub enum HandlerError {
    /// The event payload was missing or had the wrong shape for a field the
    /// handler requires
    MalformedPayload(String),
    /// A database operation failed while reconciling state
    Persistence(anyhow::Error),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::MalformedPayload(detail) => {
                write!(f, "malformed event payload: {detail}")
            }
            HandlerError::Persistence(err) => write!(f, "persistence failure: {err}"),
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        HandlerError::Persistence(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_types_parse_to_their_variant() {
        assert_eq!(
            WebhookEventKind::from_type_str("account.updated"),
            WebhookEventKind::AccountUpdated
        );
        assert_eq!(
            WebhookEventKind::from_type_str("payment_intent.payment_failed"),
            WebhookEventKind::PaymentIntentFailed
        );
        assert_eq!(
            WebhookEventKind::from_type_str("customer.subscription.deleted"),
            WebhookEventKind::SubscriptionDeleted
        );
        assert_eq!(
            WebhookEventKind::from_type_str("payout.paid"),
            WebhookEventKind::PayoutPaid
        );
    }

    #[test]
    fn unknown_types_fail_closed() {
        assert_eq!(
            WebhookEventKind::from_type_str("invoice.finalized"),
            WebhookEventKind::Unrecognized
        );
        assert_eq!(
            WebhookEventKind::from_type_str(""),
            WebhookEventKind::Unrecognized
        );
        // Close misses must not fuzzy-match
        assert_eq!(
            WebhookEventKind::from_type_str("account.updated.extra"),
            WebhookEventKind::Unrecognized
        );
    }

    #[test]
    fn handler_error_carries_cause_text() {
        let err = HandlerError::MalformedPayload("missing data.object.id".to_string());
        assert_eq!(
            err.to_string(),
            "malformed event payload: missing data.object.id"
        );

        let err: HandlerError = anyhow::anyhow!("connection refused").into();
        assert!(err.to_string().contains("connection refused"));
    }
}

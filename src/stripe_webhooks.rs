use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Diesel model for the stripe_webhook_events journal table.
///
/// One row per unique Stripe event. `processed_at` stays NULL until dispatch
/// completes; `error` is only set when a handler fails. A row with neither is
/// an unknown outcome (crash between journal write and dispatch) and is safe
/// to re-drive on redelivery.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::stripe_webhook_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StripeWebhookEventModel {
    pub id: Uuid,
    pub stripe_event_id: String,
    pub event_type: String,
    pub account_id: Option<String>,
    pub object_id: Option<String>,
    pub object_type: Option<String>,
    pub status: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Insert model for new journal entries
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::stripe_webhook_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewStripeWebhookEvent {
    pub stripe_event_id: String,
    pub event_type: String,
    pub account_id: Option<String>,
    pub object_id: Option<String>,
    pub object_type: Option<String>,
    pub status: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub payload: serde_json::Value,
}

impl NewStripeWebhookEvent {
    /// Build a journal entry from the serialized event payload.
    ///
    /// Annotation columns (account, object id/type/status/amount/currency)
    /// are pulled from the raw JSON rather than typed Stripe structs because
    /// `data.object` is polymorphic across event types.
    pub fn from_payload(stripe_event_id: &str, event_type: &str, payload: serde_json::Value) -> Self {
        let object = payload.pointer("/data/object");
        let str_field = |name: &str| -> Option<String> {
            object
                .and_then(|o| o.get(name))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        };

        Self {
            stripe_event_id: stripe_event_id.to_string(),
            event_type: event_type.to_string(),
            account_id: payload
                .get("account")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .or_else(|| str_field("account")),
            object_id: str_field("id"),
            object_type: str_field("object"),
            status: str_field("status"),
            amount: object.and_then(|o| o.get("amount")).and_then(|v| v.as_i64()),
            currency: str_field("currency"),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn annotates_payment_intent_fields() {
        let payload = json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": {
                "object": {
                    "id": "pi_123",
                    "object": "payment_intent",
                    "status": "succeeded",
                    "amount": 2500,
                    "currency": "cad"
                }
            }
        });

        let entry =
            NewStripeWebhookEvent::from_payload("evt_1", "payment_intent.succeeded", payload);
        assert_eq!(entry.stripe_event_id, "evt_1");
        assert_eq!(entry.object_id.as_deref(), Some("pi_123"));
        assert_eq!(entry.object_type.as_deref(), Some("payment_intent"));
        assert_eq!(entry.status.as_deref(), Some("succeeded"));
        assert_eq!(entry.amount, Some(2500));
        assert_eq!(entry.currency.as_deref(), Some("cad"));
        assert_eq!(entry.account_id, None);
    }

    #[test]
    fn annotates_connect_account_from_top_level_field() {
        let payload = json!({
            "id": "evt_2",
            "type": "account.updated",
            "account": "acct_1",
            "data": {
                "object": { "id": "acct_1", "object": "account" }
            }
        });

        let entry = NewStripeWebhookEvent::from_payload("evt_2", "account.updated", payload);
        assert_eq!(entry.account_id.as_deref(), Some("acct_1"));
        assert_eq!(entry.object_type.as_deref(), Some("account"));
        assert_eq!(entry.amount, None);
    }

    #[test]
    fn falls_back_to_object_account_for_external_accounts() {
        let payload = json!({
            "id": "evt_3",
            "type": "account.external_account.created",
            "data": {
                "object": {
                    "id": "ba_1",
                    "object": "bank_account",
                    "account": "acct_9",
                    "status": "new"
                }
            }
        });

        let entry = NewStripeWebhookEvent::from_payload(
            "evt_3",
            "account.external_account.created",
            payload,
        );
        assert_eq!(entry.account_id.as_deref(), Some("acct_9"));
        assert_eq!(entry.object_id.as_deref(), Some("ba_1"));
    }

    #[test]
    fn tolerates_missing_object() {
        let payload = json!({ "id": "evt_4", "type": "weird.event" });
        let entry = NewStripeWebhookEvent::from_payload("evt_4", "weird.event", payload);
        assert_eq!(entry.object_id, None);
        assert_eq!(entry.status, None);
    }
}

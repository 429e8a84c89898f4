use anyhow::Result;
use diesel::prelude::*;

use crate::stripe_webhooks::{NewStripeWebhookEvent, StripeWebhookEventModel};
use crate::web::PgPool;

/// Outcome of attempting to journal an inbound event
#[derive(Debug)]
pub enum JournalOutcome {
    /// First delivery; a new row was written
    Recorded(StripeWebhookEventModel),
    /// Redelivery; the existing row is returned so the caller can decide
    /// whether to re-drive the handler
    Duplicate(StripeWebhookEventModel),
}

#[derive(Clone)]
pub struct StripeWebhookEventsRepository {
    pool: PgPool,
}

impl StripeWebhookEventsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an inbound event, keyed by its Stripe event id.
    ///
    /// Duplicate deliveries hit the unique constraint and are returned as
    /// `Duplicate` with the existing row instead of raising.
    pub async fn record(&self, new_event: NewStripeWebhookEvent) -> Result<JournalOutcome> {
        use crate::schema::stripe_webhook_events::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: Option<StripeWebhookEventModel> =
                diesel::insert_into(dsl::stripe_webhook_events)
                    .values(&new_event)
                    .on_conflict(dsl::stripe_event_id)
                    .do_nothing()
                    .get_result(&mut conn)
                    .optional()?;

            let outcome = match inserted {
                Some(row) => JournalOutcome::Recorded(row),
                None => {
                    let existing: StripeWebhookEventModel = dsl::stripe_webhook_events
                        .filter(dsl::stripe_event_id.eq(&new_event.stripe_event_id))
                        .first(&mut conn)?;
                    JournalOutcome::Duplicate(existing)
                }
            };

            Ok::<JournalOutcome, anyhow::Error>(outcome)
        })
        .await??;

        Ok(result)
    }

    pub async fn get_by_event_id(
        &self,
        stripe_event_id: &str,
    ) -> Result<Option<StripeWebhookEventModel>> {
        use crate::schema::stripe_webhook_events::dsl;

        let pool = self.pool.clone();
        let stripe_event_id = stripe_event_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let row: Option<StripeWebhookEventModel> = dsl::stripe_webhook_events
                .filter(dsl::stripe_event_id.eq(&stripe_event_id))
                .first(&mut pool.get()?)
                .optional()?;

            Ok::<Option<StripeWebhookEventModel>, anyhow::Error>(row)
        })
        .await??;

        Ok(result)
    }

    /// Latest journal row for a Stripe object, limited to the given event
    /// types. Lets handlers recover an outcome that was delivered before the
    /// row linking it to local state existed.
    pub async fn latest_for_object(
        &self,
        object_id: &str,
        event_types: &[&str],
    ) -> Result<Option<StripeWebhookEventModel>> {
        use crate::schema::stripe_webhook_events::dsl;

        let pool = self.pool.clone();
        let object_id = object_id.to_string();
        let event_types: Vec<String> = event_types.iter().map(|s| s.to_string()).collect();
        let result = tokio::task::spawn_blocking(move || {
            let row: Option<StripeWebhookEventModel> = dsl::stripe_webhook_events
                .filter(dsl::object_id.eq(&object_id))
                .filter(dsl::event_type.eq_any(&event_types))
                .order(dsl::created_at.desc())
                .first(&mut pool.get()?)
                .optional()?;

            Ok::<Option<StripeWebhookEventModel>, anyhow::Error>(row)
        })
        .await??;

        Ok(result)
    }

    /// Mark an event as processed, clearing any error from a prior attempt
    pub async fn mark_processed(&self, stripe_event_id: &str) -> Result<()> {
        use crate::schema::stripe_webhook_events;

        let pool = self.pool.clone();
        let stripe_event_id = stripe_event_id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            diesel::update(stripe_webhook_events::table)
                .filter(stripe_webhook_events::stripe_event_id.eq(&stripe_event_id))
                .set((
                    stripe_webhook_events::processed_at.eq(diesel::dsl::now),
                    stripe_webhook_events::error.eq(None::<String>),
                ))
                .execute(&mut conn)?;

            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }

    /// Annotate an event with a handler failure. The row keeps a NULL
    /// processed_at so redelivery re-drives the handler.
    pub async fn mark_failed(&self, stripe_event_id: &str, error: &str) -> Result<()> {
        use crate::schema::stripe_webhook_events;

        let pool = self.pool.clone();
        let stripe_event_id = stripe_event_id.to_string();
        let error = error.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            diesel::update(stripe_webhook_events::table)
                .filter(stripe_webhook_events::stripe_event_id.eq(&stripe_event_id))
                .set(stripe_webhook_events::error.eq(Some(&error)))
                .execute(&mut conn)?;

            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}

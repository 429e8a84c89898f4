use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::subscriptions::{NewSubscription, Subscription, SubscriptionModel};
use crate::web::PgPool;

#[derive(Clone)]
pub struct SubscriptionsRepository {
    pool: PgPool,
}

impl SubscriptionsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create or refresh a subscription keyed by its Stripe id. Webhook
    /// handlers call this for created and updated events alike, so repeated
    /// delivery of the same event converges on the same row.
    pub async fn upsert(&self, new_subscription: NewSubscription) -> Result<Subscription> {
        use crate::schema::subscriptions::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let upserted: SubscriptionModel = diesel::insert_into(dsl::subscriptions)
                .values(&new_subscription)
                .on_conflict(dsl::stripe_subscription_id)
                .do_update()
                .set((
                    dsl::status.eq(&new_subscription.status),
                    dsl::amount_cents.eq(new_subscription.amount_cents),
                    dsl::currency.eq(&new_subscription.currency),
                    dsl::billing_interval.eq(&new_subscription.billing_interval),
                    dsl::stripe_customer_id.eq(&new_subscription.stripe_customer_id),
                    dsl::updated_at.eq(diesel::dsl::now),
                ))
                .get_result(&mut conn)?;

            Ok::<SubscriptionModel, anyhow::Error>(upserted)
        })
        .await??;

        Ok(result.into())
    }

    pub async fn get_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>> {
        use crate::schema::subscriptions::dsl;

        let pool = self.pool.clone();
        let stripe_subscription_id = stripe_subscription_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let subscription: Option<SubscriptionModel> = dsl::subscriptions
                .filter(dsl::stripe_subscription_id.eq(&stripe_subscription_id))
                .first(&mut pool.get()?)
                .optional()?;

            Ok::<Option<SubscriptionModel>, anyhow::Error>(subscription)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    pub async fn mark_canceled(
        &self,
        stripe_subscription_id: &str,
        canceled_at: DateTime<Utc>,
    ) -> Result<()> {
        use crate::schema::subscriptions;

        let pool = self.pool.clone();
        let stripe_subscription_id = stripe_subscription_id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            diesel::update(subscriptions::table)
                .filter(subscriptions::stripe_subscription_id.eq(&stripe_subscription_id))
                .set((
                    subscriptions::status.eq("canceled"),
                    subscriptions::canceled_at.eq(Some(canceled_at)),
                ))
                .execute(&mut conn)?;

            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// API model for recurring donation subscriptions.
///
/// `status` mirrors Stripe's subscription status strings (active, past_due,
/// canceled, ...) rather than a local enum, since Stripe owns that lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub church_id: Option<Uuid>,
    pub donor_id: Option<Uuid>,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: Option<String>,
    pub status: String,
    pub amount_cents: Option<i32>,
    pub currency: Option<String>,
    pub billing_interval: Option<String>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Diesel model for the subscriptions table
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SubscriptionModel {
    pub id: Uuid,
    pub church_id: Option<Uuid>,
    pub donor_id: Option<Uuid>,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: Option<String>,
    pub status: String,
    pub amount_cents: Option<i32>,
    pub currency: Option<String>,
    pub billing_interval: Option<String>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert model for subscriptions observed via webhooks
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewSubscription {
    pub church_id: Option<Uuid>,
    pub donor_id: Option<Uuid>,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: Option<String>,
    pub status: String,
    pub amount_cents: Option<i32>,
    pub currency: Option<String>,
    pub billing_interval: Option<String>,
}

impl From<SubscriptionModel> for Subscription {
    fn from(model: SubscriptionModel) -> Self {
        Self {
            id: model.id,
            church_id: model.church_id,
            donor_id: model.donor_id,
            stripe_subscription_id: model.stripe_subscription_id,
            stripe_customer_id: model.stripe_customer_id,
            status: model.status,
            amount_cents: model.amount_cents,
            currency: model.currency,
            billing_interval: model.billing_interval,
            canceled_at: model.canceled_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

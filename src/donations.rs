use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, TS)]
#[db_enum(existing_type_path = "crate::schema::sql_types::DonationKind")]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "snake_case")]
pub enum DonationKind {
    #[db_enum(rename = "one_time")]
    OneTime,
    #[db_enum(rename = "recurring")]
    Recurring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, TS)]
#[db_enum(existing_type_path = "crate::schema::sql_types::DonationStatus")]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    #[db_enum(rename = "pending")]
    Pending,
    #[db_enum(rename = "processing")]
    Processing,
    #[db_enum(rename = "succeeded")]
    Succeeded,
    #[db_enum(rename = "failed")]
    Failed,
    #[db_enum(rename = "refunded")]
    Refunded,
    #[db_enum(rename = "canceled")]
    Canceled,
}

/// API model for donations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    pub id: Uuid,
    pub church_id: Uuid,
    pub donor_id: Option<Uuid>,
    pub kind: DonationKind,
    pub status: DonationStatus,
    pub amount_cents: i32,
    pub currency: String,
    pub stripe_checkout_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_charge_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Diesel model for the donations table
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::donations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DonationModel {
    pub id: Uuid,
    pub church_id: Uuid,
    pub donor_id: Option<Uuid>,
    pub kind: DonationKind,
    pub status: DonationStatus,
    pub amount_cents: i32,
    pub currency: String,
    pub stripe_checkout_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_charge_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert model for new donations
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::donations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewDonation {
    pub church_id: Uuid,
    pub donor_id: Option<Uuid>,
    pub kind: DonationKind,
    pub amount_cents: i32,
    pub currency: String,
    pub stripe_checkout_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
}

impl From<DonationModel> for Donation {
    fn from(model: DonationModel) -> Self {
        Self {
            id: model.id,
            church_id: model.church_id,
            donor_id: model.donor_id,
            kind: model.kind,
            status: model.status,
            amount_cents: model.amount_cents,
            currency: model.currency,
            stripe_checkout_session_id: model.stripe_checkout_session_id,
            stripe_payment_intent_id: model.stripe_payment_intent_id,
            stripe_charge_id: model.stripe_charge_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

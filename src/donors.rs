use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// API model for donors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donor {
    pub id: Uuid,
    pub church_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Diesel model for the donors table
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::donors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DonorModel {
    pub id: Uuid,
    pub church_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert model for new donors; unique per (church, email)
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::donors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewDonor {
    pub church_id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

impl From<DonorModel> for Donor {
    fn from(model: DonorModel) -> Self {
        Self {
            id: model.id,
            church_id: model.church_id,
            email: model.email,
            name: model.name,
            stripe_customer_id: model.stripe_customer_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

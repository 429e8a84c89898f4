use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::donations::{Donation, DonationModel, DonationStatus, NewDonation};
use crate::web::PgPool;

#[derive(Clone)]
pub struct DonationsRepository {
    pool: PgPool,
}

impl DonationsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_donation: NewDonation) -> Result<Donation> {
        use crate::schema::donations::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: DonationModel = diesel::insert_into(dsl::donations)
                .values(&new_donation)
                .get_result(&mut conn)?;

            Ok::<DonationModel, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result.into())
    }

    pub async fn get_by_payment_intent_id(
        &self,
        stripe_payment_intent_id: &str,
    ) -> Result<Option<Donation>> {
        use crate::schema::donations::dsl;

        let pool = self.pool.clone();
        let stripe_payment_intent_id = stripe_payment_intent_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let donation: Option<DonationModel> = dsl::donations
                .filter(dsl::stripe_payment_intent_id.eq(&stripe_payment_intent_id))
                .first(&mut pool.get()?)
                .optional()?;

            Ok::<Option<DonationModel>, anyhow::Error>(donation)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    pub async fn get_by_checkout_session_id(
        &self,
        stripe_checkout_session_id: &str,
    ) -> Result<Option<Donation>> {
        use crate::schema::donations::dsl;

        let pool = self.pool.clone();
        let stripe_checkout_session_id = stripe_checkout_session_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let donation: Option<DonationModel> = dsl::donations
                .filter(dsl::stripe_checkout_session_id.eq(&stripe_checkout_session_id))
                .first(&mut pool.get()?)
                .optional()?;

            Ok::<Option<DonationModel>, anyhow::Error>(donation)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    pub async fn update_status(&self, donation_id: Uuid, status: DonationStatus) -> Result<()> {
        use crate::schema::donations;

        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            diesel::update(donations::table)
                .filter(donations::id.eq(donation_id))
                .set(donations::status.eq(status))
                .execute(&mut conn)?;

            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }

    /// Attach Stripe identifiers learned after creation (payment intent from
    /// the checkout session, charge from the charge event)
    pub async fn update_stripe_ids(
        &self,
        donation_id: Uuid,
        stripe_payment_intent_id: Option<String>,
        stripe_charge_id: Option<String>,
    ) -> Result<()> {
        use crate::schema::donations;

        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            if let Some(ref pi_id) = stripe_payment_intent_id {
                diesel::update(donations::table)
                    .filter(donations::id.eq(donation_id))
                    .set(donations::stripe_payment_intent_id.eq(Some(pi_id)))
                    .execute(&mut conn)?;
            }
            if let Some(ref charge_id) = stripe_charge_id {
                diesel::update(donations::table)
                    .filter(donations::id.eq(donation_id))
                    .set(donations::stripe_charge_id.eq(Some(charge_id)))
                    .execute(&mut conn)?;
            }

            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}

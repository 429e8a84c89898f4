use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::churches::{Church, ChurchChangeset, ChurchModel, DonationConfiguration, NewChurch};
use crate::web::PgPool;

#[derive(Clone)]
pub struct ChurchesRepository {
    pool: PgPool,
}

impl ChurchesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_church: NewChurch) -> Result<Church> {
        use crate::schema::churches::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: ChurchModel = diesel::insert_into(dsl::churches)
                .values(&new_church)
                .get_result(&mut conn)?;

            Ok::<ChurchModel, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result.into())
    }

    pub async fn update(&self, church_id: Uuid, changes: ChurchChangeset) -> Result<Option<Church>> {
        use crate::schema::churches::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let updated: Option<ChurchModel> = diesel::update(dsl::churches)
                .filter(dsl::id.eq(church_id))
                .set(&changes)
                .get_result(&mut conn)
                .optional()?;

            Ok::<Option<ChurchModel>, anyhow::Error>(updated)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    pub async fn delete(&self, church_id: Uuid) -> Result<bool> {
        use crate::schema::churches::dsl;

        let pool = self.pool.clone();
        let deleted = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let count = diesel::delete(dsl::churches)
                .filter(dsl::id.eq(church_id))
                .execute(&mut conn)?;

            Ok::<usize, anyhow::Error>(count)
        })
        .await??;

        Ok(deleted > 0)
    }

    pub async fn get_by_id(&self, church_id: Uuid) -> Result<Option<Church>> {
        use crate::schema::churches::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let church: Option<ChurchModel> = dsl::churches
                .filter(dsl::id.eq(church_id))
                .first(&mut pool.get()?)
                .optional()?;

            Ok::<Option<ChurchModel>, anyhow::Error>(church)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    /// Fetch a church by id, scoped to its owning user
    pub async fn get_for_user(&self, church_id: Uuid, user_id: Uuid) -> Result<Option<Church>> {
        use crate::schema::churches::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let church: Option<ChurchModel> = dsl::churches
                .filter(dsl::id.eq(church_id))
                .filter(dsl::user_id.eq(user_id))
                .first(&mut pool.get()?)
                .optional()?;

            Ok::<Option<ChurchModel>, anyhow::Error>(church)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    pub async fn get_by_user_id(&self, user_id: Uuid) -> Result<Vec<Church>> {
        use crate::schema::churches::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let churches: Vec<ChurchModel> = dsl::churches
                .filter(dsl::user_id.eq(user_id))
                .order(dsl::created_at.asc())
                .load(&mut pool.get()?)?;

            Ok::<Vec<ChurchModel>, anyhow::Error>(churches)
        })
        .await??;

        Ok(result.into_iter().map(|model| model.into()).collect())
    }

    /// Get by Stripe account id (for webhook reconciliation)
    pub async fn get_by_stripe_account_id(
        &self,
        stripe_account_id: &str,
    ) -> Result<Option<Church>> {
        use crate::schema::churches::dsl;

        let pool = self.pool.clone();
        let stripe_account_id = stripe_account_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let church: Option<ChurchModel> = dsl::churches
                .filter(dsl::stripe_account_id.eq(&stripe_account_id))
                .first(&mut pool.get()?)
                .optional()?;

            Ok::<Option<ChurchModel>, anyhow::Error>(church)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    /// Attach a freshly connected Stripe account to a church
    pub async fn attach_stripe_account(
        &self,
        church_id: Uuid,
        stripe_account_id: &str,
    ) -> Result<Option<Church>> {
        use crate::schema::churches;

        let pool = self.pool.clone();
        let stripe_account_id = stripe_account_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let updated: Option<ChurchModel> = diesel::update(churches::table)
                .filter(churches::id.eq(church_id))
                .set((
                    churches::stripe_account_id.eq(Some(&stripe_account_id)),
                    churches::is_stripe_connected.eq(true),
                    churches::stripe_account_status.eq(Some("pending")),
                ))
                .get_result(&mut conn)
                .optional()?;

            Ok::<Option<ChurchModel>, anyhow::Error>(updated)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    /// Refresh the mirrored connected-account status (from webhook data).
    /// Idempotent: repeated application of the same event is a no-op.
    pub async fn update_stripe_status(
        &self,
        stripe_account_id: &str,
        status: &str,
        account_type: Option<String>,
        capabilities: Option<serde_json::Value>,
        requirements: Option<serde_json::Value>,
    ) -> Result<Option<Church>> {
        use crate::schema::churches;

        let pool = self.pool.clone();
        let stripe_account_id = stripe_account_id.to_string();
        let status = status.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let updated: Option<ChurchModel> = diesel::update(churches::table)
                .filter(churches::stripe_account_id.eq(&stripe_account_id))
                .set((
                    churches::is_stripe_connected.eq(true),
                    churches::stripe_account_status.eq(Some(&status)),
                    churches::stripe_account_type.eq(account_type),
                    churches::stripe_account_capabilities.eq(capabilities),
                    churches::stripe_account_requirements.eq(requirements),
                    churches::updated_at.eq(diesel::dsl::now),
                ))
                .get_result(&mut conn)
                .optional()?;

            Ok::<Option<ChurchModel>, anyhow::Error>(updated)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    /// Mark a church's connected account as deauthorized
    pub async fn disconnect_stripe_account(&self, stripe_account_id: &str) -> Result<Option<Church>> {
        use crate::schema::churches;

        let pool = self.pool.clone();
        let stripe_account_id = stripe_account_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let updated: Option<ChurchModel> = diesel::update(churches::table)
                .filter(churches::stripe_account_id.eq(&stripe_account_id))
                .set((
                    churches::is_stripe_connected.eq(false),
                    churches::stripe_account_status.eq(Some("deauthorized")),
                    churches::updated_at.eq(diesel::dsl::now),
                ))
                .get_result(&mut conn)
                .optional()?;

            Ok::<Option<ChurchModel>, anyhow::Error>(updated)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    pub async fn set_donation_config(
        &self,
        church_id: Uuid,
        config: &DonationConfiguration,
    ) -> Result<Option<Church>> {
        use crate::schema::churches;

        let pool = self.pool.clone();
        let config = serde_json::to_value(config)?;
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let updated: Option<ChurchModel> = diesel::update(churches::table)
                .filter(churches::id.eq(church_id))
                .set(churches::donation_config.eq(config))
                .get_result(&mut conn)
                .optional()?;

            Ok::<Option<ChurchModel>, anyhow::Error>(updated)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }
}

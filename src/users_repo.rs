use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::users::{NewUser, User, UserModel};
use crate::web::PgPool;

#[derive(Clone)]
pub struct UsersRepository {
    pool: PgPool,
}

impl UsersRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        use crate::schema::users::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let user: Option<UserModel> = dsl::users
                .filter(dsl::id.eq(user_id))
                .first(&mut pool.get()?)
                .optional()?;

            Ok::<Option<UserModel>, anyhow::Error>(user)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    /// Create or update a user from an identity-provider event, keyed by the
    /// provider's user id. Safe to run twice for the same event.
    pub async fn upsert(&self, new_user: NewUser) -> Result<User> {
        use crate::schema::users::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let upserted: UserModel = diesel::insert_into(dsl::users)
                .values(&new_user)
                .on_conflict(dsl::external_id)
                .do_update()
                .set(&new_user)
                .get_result(&mut conn)?;

            Ok::<UserModel, anyhow::Error>(upserted)
        })
        .await??;

        Ok(result.into())
    }
}

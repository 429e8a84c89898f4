use anyhow::Result;
use diesel::prelude::*;

use crate::donors::{Donor, DonorModel, NewDonor};
use crate::web::PgPool;

#[derive(Clone)]
pub struct DonorsRepository {
    pool: PgPool,
}

impl DonorsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find or create a donor for a church, keyed by email
    pub async fn upsert(&self, new_donor: NewDonor) -> Result<Donor> {
        use crate::schema::donors::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let existing: Option<DonorModel> = dsl::donors
                .filter(dsl::church_id.eq(new_donor.church_id))
                .filter(dsl::email.eq(&new_donor.email))
                .first(&mut conn)
                .optional()?;

            if let Some(donor) = existing {
                return Ok::<DonorModel, anyhow::Error>(donor);
            }

            let inserted: DonorModel = diesel::insert_into(dsl::donors)
                .values(&new_donor)
                .on_conflict((dsl::church_id, dsl::email))
                .do_nothing()
                .get_result(&mut conn)
                .optional()?
                .map(Ok::<DonorModel, anyhow::Error>)
                .unwrap_or_else(|| {
                    // Lost a race with a concurrent insert; read the winner
                    Ok(dsl::donors
                        .filter(dsl::church_id.eq(new_donor.church_id))
                        .filter(dsl::email.eq(&new_donor.email))
                        .first(&mut conn)?)
                })?;

            Ok::<DonorModel, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result.into())
    }

}

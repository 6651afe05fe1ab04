use async_trait::async_trait;
use tokio_postgres::Row;
use tracing::instrument;

use super::{PgPool, util::TimedClientExt};
use crate::{
    Profile, ProfileId,
    store::{ProfileStore, StoreError},
};

const PROFILE_COLUMNS: &str = "id, school, program, gpa, province, citizenship, ethnicity, \
     interests, demographics, embedding";

pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn profile_from_row(row: &Row) -> Result<Profile, StoreError> {
    Ok(Profile {
        id: row.try_get("id")?,
        school: row.try_get("school")?,
        program: row.try_get("program")?,
        gpa: row.try_get("gpa")?,
        province: row.try_get("province")?,
        citizenship: row.try_get("citizenship")?,
        ethnicity: row.try_get("ethnicity")?,
        interests: row.try_get("interests")?,
        demographics: row.try_get("demographics")?,
        embedding: row.try_get("embedding")?,
    })
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    #[instrument(skip(self))]
    async fn get(&self, id: ProfileId) -> Result<Option<Profile>, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM scholar.profiles WHERE id = $1");
        client
            .timed_query_opt(&sql, &[&id], "profiles.get")
            .await?
            .as_ref()
            .map(profile_from_row)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn list_ids(&self) -> Result<Vec<ProfileId>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .timed_query(
                "SELECT id FROM scholar.profiles ORDER BY id",
                &[],
                "profiles.list_ids",
            )
            .await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    #[instrument(skip(self, profile), fields(profile_id = profile.id))]
    async fn upsert(&self, profile: &Profile) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .timed_execute(
                "INSERT INTO scholar.profiles (
                    id, school, program, gpa, province, citizenship, ethnicity,
                    interests, demographics, embedding, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
                ON CONFLICT (id) DO UPDATE SET
                    school = EXCLUDED.school,
                    program = EXCLUDED.program,
                    gpa = EXCLUDED.gpa,
                    province = EXCLUDED.province,
                    citizenship = EXCLUDED.citizenship,
                    ethnicity = EXCLUDED.ethnicity,
                    interests = EXCLUDED.interests,
                    demographics = EXCLUDED.demographics,
                    embedding = EXCLUDED.embedding,
                    updated_at = NOW()",
                &[
                    &profile.id,
                    &profile.school,
                    &profile.program,
                    &profile.gpa,
                    &profile.province,
                    &profile.citizenship,
                    &profile.ethnicity,
                    &profile.interests,
                    &profile.demographics,
                    &profile.embedding,
                ],
                "profiles.upsert",
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, embedding), fields(dimension = embedding.len()))]
    async fn set_embedding(&self, id: ProfileId, embedding: &[f32]) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let updated = client
            .timed_execute(
                "UPDATE scholar.profiles SET embedding = $2, updated_at = NOW() WHERE id = $1",
                &[&id, &embedding],
                "profiles.set_embedding",
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("profile {id}")));
        }
        Ok(())
    }
}

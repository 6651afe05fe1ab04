use async_trait::async_trait;
use tokio_postgres::Row;
use tracing::{info, instrument};

use super::{
    PgPool,
    util::{TimedClientExt, parse_status},
};
use crate::{
    ApplicationStatus, ListingId, MatchRecord, ProfileId,
    store::{MatchStore, MatchWrite, RepointSummary, StoreError, UpsertOutcome},
};

const MATCH_COLUMNS: &str =
    "profile_id, listing_id, score, reason, forced, status, created_at, updated_at";

// Only engine-owned columns appear in the update clauses; status is left to
// the student workflow.
const UPSERT_SQL: &str = "INSERT INTO scholar.matches (profile_id, listing_id, score, reason, forced)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (profile_id, listing_id) DO UPDATE SET
        score = EXCLUDED.score,
        reason = EXCLUDED.reason,
        forced = EXCLUDED.forced,
        updated_at = NOW()
    RETURNING (xmax = 0) AS created";

const REFRESH_SQL: &str = "UPDATE scholar.matches
    SET score = $3, reason = $4, forced = $5, updated_at = NOW()
    WHERE profile_id = $1 AND listing_id = $2";

const CLEAR_FORCED_SQL: &str = "UPDATE scholar.matches
    SET forced = FALSE, updated_at = NOW()
    WHERE profile_id = $1
      AND forced
      AND ($2::BIGINT IS NULL OR listing_id <> $2)";

// Conflicts with the ROW EXCLUSIVE lock taken by upserts, so a concurrent
// rematch cannot recreate a (profile, survivor) pair between the collision
// delete and the move.
const REPOINT_LOCK_SQL: &str = "LOCK TABLE scholar.matches IN SHARE ROW EXCLUSIVE MODE";

const CARRY_STATUS_SQL: &str = "UPDATE scholar.matches AS survivor
    SET status = merged.status, updated_at = NOW()
    FROM scholar.matches AS merged
    WHERE survivor.listing_id = $2
      AND merged.listing_id = $1
      AND survivor.profile_id = merged.profile_id
      AND survivor.status = 'Not Started'
      AND merged.status <> 'Not Started'";

const DROP_COLLISIONS_SQL: &str = "DELETE FROM scholar.matches AS merged
    WHERE merged.listing_id = $1
      AND EXISTS (
        SELECT 1 FROM scholar.matches AS survivor
        WHERE survivor.profile_id = merged.profile_id AND survivor.listing_id = $2
      )";

const MOVE_SQL: &str =
    "UPDATE scholar.matches SET listing_id = $2, updated_at = NOW() WHERE listing_id = $1";

pub struct PgMatchStore {
    pool: PgPool,
}

impl PgMatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn match_from_row(row: &Row) -> Result<MatchRecord, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(MatchRecord {
        profile_id: row.try_get("profile_id")?,
        listing_id: row.try_get("listing_id")?,
        score: row.try_get("score")?,
        reason: row.try_get("reason")?,
        forced: row.try_get("forced")?,
        status: parse_status(&status)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl MatchStore for PgMatchStore {
    #[instrument(skip(self, write), fields(score = write.score, forced = write.forced))]
    async fn upsert(
        &self,
        profile_id: ProfileId,
        listing_id: ListingId,
        write: &MatchWrite,
    ) -> Result<UpsertOutcome, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .timed_query_opt(
                UPSERT_SQL,
                &[
                    &profile_id,
                    &listing_id,
                    &write.score,
                    &write.reason,
                    &write.forced,
                ],
                "matches.upsert",
            )
            .await?
            .ok_or_else(|| StoreError::Backend("upsert returned no row".to_string()))?;
        Ok(UpsertOutcome {
            created: row.try_get("created")?,
        })
    }

    #[instrument(skip(self, write), fields(score = write.score))]
    async fn refresh(
        &self,
        profile_id: ProfileId,
        listing_id: ListingId,
        write: &MatchWrite,
    ) -> Result<bool, StoreError> {
        let client = self.pool.get().await?;
        let updated = client
            .timed_execute(
                REFRESH_SQL,
                &[
                    &profile_id,
                    &listing_id,
                    &write.score,
                    &write.reason,
                    &write.forced,
                ],
                "matches.refresh",
            )
            .await?;
        Ok(updated > 0)
    }

    #[instrument(skip(self))]
    async fn get(
        &self,
        profile_id: ProfileId,
        listing_id: ListingId,
    ) -> Result<Option<MatchRecord>, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM scholar.matches WHERE profile_id = $1 AND listing_id = $2"
        );
        client
            .timed_query_opt(&sql, &[&profile_id, &listing_id], "matches.get")
            .await?
            .as_ref()
            .map(match_from_row)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_profile(
        &self,
        profile_id: ProfileId,
        min_score: Option<f64>,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM scholar.matches
             WHERE profile_id = $1
               AND ($2::DOUBLE PRECISION IS NULL OR score >= $2 OR forced)
             ORDER BY score DESC, listing_id"
        );
        let rows = client
            .timed_query(&sql, &[&profile_id, &min_score], "matches.find_by_profile")
            .await?;
        rows.iter().map(match_from_row).collect()
    }

    #[instrument(skip(self), fields(status = status.as_ref()))]
    async fn set_status(
        &self,
        profile_id: ProfileId,
        listing_id: ListingId,
        status: ApplicationStatus,
    ) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let updated = client
            .timed_execute(
                "UPDATE scholar.matches SET status = $3, updated_at = NOW()
                 WHERE profile_id = $1 AND listing_id = $2",
                &[&profile_id, &listing_id, &status.as_ref()],
                "matches.set_status",
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!(
                "match ({profile_id}, {listing_id})"
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_forced(
        &self,
        profile_id: ProfileId,
        keep: Option<ListingId>,
    ) -> Result<u64, StoreError> {
        let client = self.pool.get().await?;
        let cleared = client
            .timed_execute(CLEAR_FORCED_SQL, &[&profile_id, &keep], "matches.clear_forced")
            .await?;
        Ok(cleared)
    }

    #[instrument(skip(self))]
    async fn repoint_listing(
        &self,
        from: ListingId,
        to: ListingId,
    ) -> Result<RepointSummary, StoreError> {
        if from == to {
            return Ok(RepointSummary::default());
        }

        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        tx.batch_execute(REPOINT_LOCK_SQL).await?;
        tx.timed_execute(CARRY_STATUS_SQL, &[&from, &to], "matches.repoint.carry_status")
            .await?;
        let merged = tx
            .timed_execute(DROP_COLLISIONS_SQL, &[&from, &to], "matches.repoint.drop")
            .await?;
        let moved = tx
            .timed_execute(MOVE_SQL, &[&from, &to], "matches.repoint.move")
            .await?;
        tx.commit().await?;

        info!(from, to, moved, merged, "match records repointed");
        Ok(RepointSummary { moved, merged })
    }
}

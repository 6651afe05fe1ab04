use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::{info, instrument};

use crate::db::{DbPoolError, PgPool};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("failed to run migration: {0}")]
    Postgres(#[from] PgError),
    #[error("failed to build pool: {0}")]
    PoolBuild(#[from] DbPoolError),
}

struct Migration {
    id: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        description: "profiles, listings and matches",
        sql: r#"
CREATE TABLE IF NOT EXISTS scholar.profiles (
    id BIGINT PRIMARY KEY,
    school TEXT,
    program TEXT,
    gpa DOUBLE PRECISION,
    province TEXT,
    citizenship TEXT,
    ethnicity TEXT,
    interests TEXT[] NOT NULL DEFAULT '{}',
    demographics TEXT,
    embedding REAL[],
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS scholar.listings (
    id BIGSERIAL PRIMARY KEY,
    title TEXT NOT NULL,
    title_key TEXT NOT NULL,
    amount DOUBLE PRECISION CHECK (amount IS NULL OR amount >= 0),
    deadline DATE,
    description TEXT NOT NULL DEFAULT '',
    eligibility TEXT[] NOT NULL DEFAULT '{}',
    source TEXT NOT NULL DEFAULT '',
    embedding REAL[],
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (title_key, source)
);

CREATE TABLE IF NOT EXISTS scholar.matches (
    profile_id BIGINT NOT NULL REFERENCES scholar.profiles(id),
    listing_id BIGINT NOT NULL REFERENCES scholar.listings(id),
    score DOUBLE PRECISION NOT NULL CHECK (score >= 0 AND score <= 1),
    reason TEXT NOT NULL,
    forced BOOLEAN NOT NULL DEFAULT FALSE,
    status TEXT NOT NULL DEFAULT 'Not Started',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (profile_id, listing_id)
);
"#,
    },
    Migration {
        id: 2,
        description: "status values + read-path indexes",
        sql: r#"
DO $$
BEGIN
    IF NOT EXISTS (
        SELECT 1 FROM pg_constraint WHERE conname = 'chk_match_status'
    ) THEN
        ALTER TABLE scholar.matches
            ADD CONSTRAINT chk_match_status
            CHECK (status IN ('Not Started', 'In Progress', 'Submitted', 'Awarded', 'Rejected'));
    END IF;
END $$;

CREATE INDEX IF NOT EXISTS idx_matches_profile_score
    ON scholar.matches(profile_id, score DESC);
CREATE INDEX IF NOT EXISTS idx_matches_listing
    ON scholar.matches(listing_id);
"#,
    },
];

#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrationError> {
    let mut client = pool.get().await?;
    client
        .batch_execute(
            "CREATE SCHEMA IF NOT EXISTS scholar;
             CREATE TABLE IF NOT EXISTS scholar.schema_migrations (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
             );",
        )
        .await?;

    for migration in MIGRATIONS {
        let applied: bool = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM scholar.schema_migrations WHERE id = $1)",
                &[&migration.id],
            )
            .await?
            .get(0);
        if applied {
            continue;
        }

        let tx = client.transaction().await?;
        tx.batch_execute(migration.sql).await?;
        tx.execute(
            "INSERT INTO scholar.schema_migrations (id, description) VALUES ($1, $2)",
            &[&migration.id, &migration.description],
        )
        .await?;
        tx.commit().await?;

        info!(
            id = migration.id,
            description = migration.description,
            "applied migration"
        );
    }

    Ok(())
}

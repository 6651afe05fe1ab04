use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sm_common::{
    ListingId, ProfileId,
    db::{
        PgListingStore, PgMatchStore, PgProfileStore, PoolSettings, create_pool, run_migrations,
    },
    embedding::{EmbeddingConfig, GuardedEmbedder, create_provider},
    logging,
    matching::{MatchingEngine, MatchingEngineConfig},
    rematch::{
        ListingSelection, RematchConfig, RematchJobStatus, RematchScope, RematchTrigger, Rematcher,
    },
    run_id,
    store::MatchStore,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "sm-rematch",
    about = "Re-run scholarship matching against the listing corpus"
)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Apply pending schema migrations before running the command
    #[arg(long, default_value_t = false)]
    migrate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Apply schema migrations and exit
    Migrate,
    /// Rematch one profile, or every profile against some or all listings
    Rematch {
        /// Only this profile (against every listing)
        #[arg(long, conflicts_with = "listing_ids")]
        profile_id: Option<ProfileId>,

        /// Only these listings (comma separated), for every profile
        #[arg(long, value_delimiter = ',')]
        listing_ids: Vec<ListingId>,
    },
    /// Move match records of a merged listing onto the surviving one
    Repoint {
        #[arg(long)]
        from: ListingId,
        #[arg(long)]
        to: ListingId,
    },
}

fn scope_for(profile_id: Option<ProfileId>, listing_ids: Vec<ListingId>) -> RematchScope {
    match profile_id {
        Some(id) => RematchScope::SingleProfile(id),
        None if listing_ids.is_empty() => RematchScope::AllProfiles(ListingSelection::All),
        None => RematchScope::AllProfiles(ListingSelection::Only(listing_ids)),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_tracing_subscriber("sm-rematch");
    logging::install_tracing_panic_hook("sm-rematch");

    let cli = Cli::parse();
    let pool = create_pool(&cli.database_url, &PoolSettings::from_env("sm-rematch"))?;

    if cli.migrate || cli.command == Command::Migrate {
        run_migrations(&pool).await?;
        if cli.command == Command::Migrate {
            return Ok(());
        }
    }

    let matches = Arc::new(PgMatchStore::new(pool.clone()));

    match cli.command {
        Command::Migrate => Ok(()),
        Command::Repoint { from, to } => {
            let summary = matches.repoint_listing(from, to).await?;
            info!(from, to, moved = summary.moved, merged = summary.merged, "repoint finished");
            Ok(())
        }
        Command::Rematch {
            profile_id,
            listing_ids,
        } => {
            let embedding_config = EmbeddingConfig::from_env();
            let provider = create_provider(&embedding_config)?;
            let embedder = Arc::new(GuardedEmbedder::from_config(provider, &embedding_config));
            let engine_config = MatchingEngineConfig::from_env();
            info!(
                process_run_id = run_id::process(),
                provider = embedder.provider_name(),
                threshold = engine_config.publication_threshold,
                fallback = engine_config.fallback_enabled,
                "starting rematch"
            );

            let rematcher = Arc::new(Rematcher::new(
                Arc::new(PgProfileStore::new(pool.clone())),
                Arc::new(PgListingStore::new(pool.clone())),
                matches,
                embedder,
                MatchingEngine::new(engine_config),
                RematchConfig::from_env(),
            ));

            let handle = rematcher.spawn(scope_for(profile_id, listing_ids), RematchTrigger::Manual);
            let run_id = handle.run_id().to_string();
            match handle.wait().await {
                RematchJobStatus::Completed(summary) => {
                    if summary.has_failures() {
                        warn!(run_id = %run_id, "rematch completed with partial failures");
                    }
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                    Ok(())
                }
                RematchJobStatus::Failed(message) => {
                    Err(format!("rematch {run_id} failed: {message}").into())
                }
                RematchJobStatus::Running => {
                    Err(format!("rematch {run_id} did not finish").into())
                }
            }
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!(error = %err, "sm-rematch failed");
        eprintln!("sm-rematch failed: {err}");
        std::process::exit(1);
    }
}

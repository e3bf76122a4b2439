use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use followgraph_common::{Config, RunMode};
use followgraph_graph::{
    migrate::migrate, prune_low_influence, run_exclusive, GraphClient, GraphWriter,
    InfluenceScorer, RunLock, ScoreConfig,
};
use followgraph_ingest::{
    collect_status, watch_stop_signals, CheckpointStore, Coordinator, IngestSettings,
    PgCollectionOracle, RunStatus,
};
use x_client::XClient;

#[derive(Parser)]
#[command(name = "followgraph", about = "Follows-graph ingestion, influence scoring and pruning")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sync influencers' following lists into the graph, resuming from the checkpoint
    Ingest {
        /// Stop after this many influencers (overrides MAX_INFLUENCERS_PER_RUN)
        #[arg(long)]
        max_influencers: Option<usize>,
    },
    /// Recompute influence scores for accounts and collections
    Score {
        /// Number of propagation rounds (overrides SCORE_ITERATIONS)
        #[arg(long)]
        iterations: Option<u32>,
    },
    /// Delete accounts whose influence falls below the graph-wide mean
    Cleanup,
    /// Show the checkpoint and graph totals
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("followgraph=info".parse()?)
                .add_directive("x_client=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = match cli.command {
        Command::Ingest { .. } => Config::ingest_from_env()?,
        _ => Config::graph_from_env()?,
    };
    config.log_redacted();

    let client =
        GraphClient::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
            .await
            .context("Failed to connect to Neo4j")?;
    migrate(&client).await.context("Graph migration failed")?;
    let store = GraphWriter::new(client);

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        tokio::spawn(async move {
            match watch_stop_signals(cancelled, tokio::signal::ctrl_c).await {
                Ok(()) => std::process::exit(130),
                Err(e) => error!("Failed to listen for Ctrl-C: {e}"),
            }
        });
    }

    let stale_after = chrono::Duration::minutes(config.run_lock_stale_minutes);

    match cli.command {
        Command::Ingest { max_influencers } => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(20)
                .connect(&config.database_url)
                .await
                .context("Failed to connect to Postgres")?;
            info!("Connected to database");

            let oracle = PgCollectionOracle::new(pool, config.network_site_id);
            let source = XClient::new(&config.x_bearer_token)
                .with_base_url(&config.x_api_base_url)
                .with_page_size(config.x_page_size)
                .with_max_transport_retries(config.x_max_transport_retries);
            let checkpoints = CheckpointStore::new(config.checkpoint_path.clone());
            let settings = IngestSettings::builder()
                .follower_ceiling(config.follower_ceiling)
                .max_influencers_per_run(max_influencers.or(config.max_influencers_per_run))
                .influencer_delay(config.influencer_delay)
                .build();

            let coordinator = Coordinator::new(&store, &source, &oracle, &checkpoints, settings)
                .with_cancellation(cancelled);

            let lock = RunLock::new(RunMode::Ingest, stale_after);
            let outcome =
                run_exclusive(&store, lock, async { Ok(coordinator.run().await?) }).await?;

            match outcome.status {
                RunStatus::Done => info!("Ingestion done"),
                RunStatus::Aborted => warn!("Ingestion aborted by the API, rerun to resume"),
                RunStatus::Cancelled => warn!("Ingestion cancelled, rerun to resume"),
            }
        }
        Command::Score { iterations } => {
            let score_config = ScoreConfig {
                max_iterations: iterations.unwrap_or(config.score_iterations),
                settle_delay: config.score_settle_delay,
            };
            let scorer = InfluenceScorer::new(&store, score_config).with_cancellation(cancelled);

            let lock = RunLock::new(RunMode::Score, stale_after);
            let stats = run_exclusive(&store, lock, scorer.run()).await?;
            info!("{stats}");
        }
        Command::Cleanup => {
            let lock = RunLock::new(RunMode::Cleanup, stale_after);
            let stats = run_exclusive(&store, lock, prune_low_influence(&store)).await?;
            info!("{stats}");
        }
        Command::Status => {
            let checkpoints = CheckpointStore::new(config.checkpoint_path.clone());
            let report = collect_status(&store, &checkpoints).await?;
            info!("{report}");
        }
    }

    Ok(())
}

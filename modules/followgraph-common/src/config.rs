use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::FollowGraphError;
use crate::types::DEFAULT_FOLLOWER_CEILING;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Neo4j
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    // Postgres (collection lookups)
    pub database_url: String,
    pub network_site_id: i32,

    // X API
    pub x_bearer_token: String,
    pub x_api_base_url: String,
    pub x_page_size: u32,
    pub x_max_transport_retries: u32,

    // Ingestion
    pub follower_ceiling: u64,
    pub max_influencers_per_run: Option<usize>,
    pub influencer_delay: Duration,
    pub checkpoint_path: PathBuf,

    // Scoring
    pub score_iterations: u32,
    pub score_settle_delay: Duration,

    pub run_lock_stale_minutes: i64,
}

impl Config {
    /// Full configuration for an ingestion run.
    pub fn ingest_from_env() -> Result<Self, FollowGraphError> {
        dotenvy::dotenv().ok();
        let mut config = Self::graph_from_env()?;
        config.database_url = required_env("DATABASE_URL")?;
        config.x_bearer_token = required_env("X_BEARER_TOKEN")?;
        Ok(config)
    }

    /// Minimal configuration for the graph-only passes (score, cleanup, status).
    pub fn graph_from_env() -> Result<Self, FollowGraphError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            neo4j_uri: required_env("NEO4J_URI")?,
            neo4j_user: required_env("NEO4J_USER")?,
            neo4j_password: required_env("NEO4J_PASSWORD")?,
            database_url: String::new(),
            network_site_id: parsed_env("NETWORK_SITE_ID", 1)?,
            x_bearer_token: String::new(),
            x_api_base_url: env::var("X_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.twitter.com/2".to_string()),
            x_page_size: parsed_env("X_PAGE_SIZE", 1000)?,
            x_max_transport_retries: parsed_env("X_MAX_TRANSPORT_RETRIES", 5)?,
            follower_ceiling: parsed_env("FOLLOWER_CEILING", DEFAULT_FOLLOWER_CEILING)?,
            max_influencers_per_run: optional_env("MAX_INFLUENCERS_PER_RUN")?,
            influencer_delay: Duration::from_secs(parsed_env("INFLUENCER_DELAY_SECS", 3)?),
            checkpoint_path: env::var("CHECKPOINT_PATH")
                .unwrap_or_else(|_| "progress.txt".to_string())
                .into(),
            score_iterations: parsed_env("SCORE_ITERATIONS", 1)?,
            score_settle_delay: Duration::from_secs(parsed_env("SCORE_SETTLE_SECS", 3)?),
            run_lock_stale_minutes: parsed_env("RUN_LOCK_STALE_MINUTES", 360)?,
        })
    }

    /// Log the loaded configuration with secrets truncated.
    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            if val.is_empty() {
                return "<not set>".to_string();
            }
            let head: String = val.chars().take(5).collect();
            format!("{}...({} chars)", head, val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  NEO4J_URI: {}", self.neo4j_uri);
        tracing::info!("  NEO4J_PASSWORD: {}", preview(&self.neo4j_password));
        tracing::info!("  DATABASE_URL: {}", preview(&self.database_url));
        tracing::info!("  X_BEARER_TOKEN: {}", preview(&self.x_bearer_token));
        tracing::info!(
            follower_ceiling = self.follower_ceiling,
            max_influencers_per_run = ?self.max_influencers_per_run,
            score_iterations = self.score_iterations,
            checkpoint = %self.checkpoint_path.display(),
            "  Tunables"
        );
    }
}

fn required_env(key: &str) -> Result<String, FollowGraphError> {
    env::var(key).map_err(|_| FollowGraphError::Config(format!("{key} environment variable is required")))
}

fn optional_env<T: FromStr>(key: &str) -> Result<Option<T>, FollowGraphError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| FollowGraphError::Config(format!("{key} must be a number, got {raw:?}"))),
        _ => Ok(None),
    }
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> Result<T, FollowGraphError> {
    Ok(optional_env(key)?.unwrap_or(default))
}

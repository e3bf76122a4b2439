use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use followgraph_common::{
    EdgeLabel, UpsertOutcome, VertexFilter, VertexType, VertexUpsert, DEFAULT_FOLLOWER_CEILING,
};
use followgraph_graph::GraphStore;
use x_client::UserProfile;

use crate::checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
use crate::stats::IngestStats;
use crate::traits::{CollectionOracle, FollowingSource};

#[derive(Debug, Clone, TypedBuilder)]
pub struct IngestSettings {
    /// Profiles with more followers than this are discarded outright.
    #[builder(default = DEFAULT_FOLLOWER_CEILING)]
    pub follower_ceiling: u64,
    /// `None` sweeps every remaining influencer.
    #[builder(default)]
    pub max_influencers_per_run: Option<usize>,
    /// Pause between influencers to let the graph store catch up.
    #[builder(default = Duration::from_secs(3))]
    pub influencer_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every remaining influencer was synced, or the per-run limit was reached.
    Done,
    /// The API stopped answering; the checkpoint points at the unfinished page.
    Aborted,
    /// Stop signal observed at an influencer boundary.
    Cancelled,
}

#[derive(Debug)]
pub struct IngestOutcome {
    pub status: RunStatus,
    pub stats: IngestStats,
}

/// Run-ending failures. Everything else is logged and counted.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Failed to list influencers: {0}")]
    ListInfluencers(anyhow::Error),
}

/// Syncs each influencer's following list into the graph, one influencer at a
/// time, in id order, persisting a checkpoint after each.
pub struct Coordinator<'a> {
    store: &'a dyn GraphStore,
    source: &'a dyn FollowingSource,
    oracle: &'a dyn CollectionOracle,
    checkpoints: &'a CheckpointStore,
    settings: IngestSettings,
    cancelled: Arc<AtomicBool>,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        store: &'a dyn GraphStore,
        source: &'a dyn FollowingSource,
        oracle: &'a dyn CollectionOracle,
        checkpoints: &'a CheckpointStore,
        settings: IngestSettings,
    ) -> Self {
        Self {
            store,
            source,
            oracle,
            checkpoints,
            settings,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_cancellation(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub async fn run(&self) -> Result<IngestOutcome, IngestError> {
        let mut stats = IngestStats::default();

        let checkpoint = self.checkpoints.load()?;
        let influencers: Vec<String> = self
            .store
            .list_vertices(VertexFilter::of_type(VertexType::Influencer))
            .await
            .map_err(IngestError::ListInfluencers)?
            .into_iter()
            .map(|v| v.id)
            .collect();

        let (start, mut resume_token) = resume_point(&influencers, checkpoint.as_ref());
        info!(
            influencers = influencers.len(),
            start,
            resume_token = ?resume_token,
            "Starting ingestion"
        );

        if start >= influencers.len() && checkpoint.is_some() {
            info!("Checkpoint is past the last influencer, sweep complete");
            self.checkpoints.clear()?;
        }

        let mut status = RunStatus::Done;
        for (index, influencer_id) in influencers.iter().enumerate().skip(start) {
            if self.limit_reached(&stats) {
                info!(processed = stats.influencers_processed, "Per-run influencer limit reached");
                break;
            }
            if self.cancelled.load(Ordering::Relaxed) {
                info!(influencer_id = %influencer_id, "Ingestion cancelled");
                status = RunStatus::Cancelled;
                break;
            }

            let page_token = resume_token.take();
            info!(influencer_id = %influencer_id, page_token = ?page_token, "Processing influencer");
            let fetch = self
                .source
                .fetch_following(influencer_id, page_token.as_deref())
                .await;

            stats.pages_fetched += fetch.pages;
            stats.profiles_fetched += fetch.profiles.len() as u32;
            for profile in &fetch.profiles {
                self.classify_and_upsert(influencer_id, profile, &mut stats)
                    .await;
            }

            if fetch.exhausted {
                let checkpoint = Checkpoint::mid_list(influencer_id, fetch.resume_token);
                self.checkpoints.save(&checkpoint)?;
                warn!(
                    influencer_id = %influencer_id,
                    page_token = ?checkpoint.page_token,
                    "API exhausted, checkpoint saved; run aborted"
                );
                status = RunStatus::Aborted;
                break;
            }

            stats.influencers_processed += 1;
            let next = influencers.get(index + 1);
            match next {
                Some(next_id) => self.checkpoints.save(&Checkpoint::start_of(next_id))?,
                None => self.checkpoints.clear()?,
            }

            let stopping = next.is_none()
                || self.limit_reached(&stats)
                || self.cancelled.load(Ordering::Relaxed);
            if !stopping && !self.settings.influencer_delay.is_zero() {
                tokio::time::sleep(self.settings.influencer_delay).await;
            }
        }

        stats.total_collections = match self
            .store
            .count(VertexFilter::of_type(VertexType::Collection))
            .await
        {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, "Failed to count collections");
                None
            }
        };

        info!(?status, "Ingestion finished. {stats}");
        Ok(IngestOutcome { status, stats })
    }

    fn limit_reached(&self, stats: &IngestStats) -> bool {
        self.settings
            .max_influencers_per_run
            .is_some_and(|max| stats.influencers_processed as usize >= max)
    }

    /// Filter, classify and merge one profile, then link it to the influencer.
    /// Store failures are logged and counted, never propagated.
    async fn classify_and_upsert(
        &self,
        influencer_id: &str,
        profile: &UserProfile,
        stats: &mut IngestStats,
    ) {
        let followers = profile.public_metrics.followers_count;
        if followers > self.settings.follower_ceiling {
            debug!(id = %profile.id, followers, "Skipping outlier profile");
            stats.outliers_skipped += 1;
            return;
        }

        let vertex_type = if self.oracle.is_tracked_collection(&profile.id).await {
            VertexType::Collection
        } else {
            VertexType::Account
        };

        let upsert = VertexUpsert {
            id: profile.id.clone(),
            vertex_type,
            username: profile.username.clone(),
            name: profile.name.clone(),
            followers,
            following: profile.public_metrics.following_count,
        };

        match self.store.upsert_vertex(&upsert).await {
            Ok(UpsertOutcome::Inserted) => {
                stats.vertices_inserted += 1;
                if vertex_type == VertexType::Collection {
                    stats.new_collections += 1;
                }
            }
            Ok(UpsertOutcome::Updated) => stats.vertices_updated += 1,
            Err(e) => {
                warn!(id = %profile.id, error = %e, "Failed to upsert profile");
                stats.vertex_failures += 1;
                return;
            }
        }

        let exists = match self
            .store
            .edge_exists(influencer_id, &profile.id, EdgeLabel::Follows)
            .await
        {
            Ok(exists) => exists,
            Err(e) => {
                warn!(from = %influencer_id, to = %profile.id, error = %e, "Edge lookup failed");
                false
            }
        };
        if exists {
            return;
        }

        match self
            .store
            .add_edge(influencer_id, &profile.id, EdgeLabel::Follows)
            .await
        {
            Ok(()) => stats.edges_added += 1,
            Err(e) => {
                warn!(from = %influencer_id, to = %profile.id, error = %e, "Failed to add follows edge");
                stats.edge_failures += 1;
            }
        }
    }
}

/// Index of the first influencer to process and the page token to start it at.
///
/// Influencers sorting before the checkpointed id are skipped. The token only
/// applies when the checkpointed influencer is still in the list.
fn resume_point(influencers: &[String], checkpoint: Option<&Checkpoint>) -> (usize, Option<String>) {
    let Some(checkpoint) = checkpoint else {
        return (0, None);
    };

    let start = influencers
        .iter()
        .position(|id| id.as_str() >= checkpoint.influencer_id.as_str())
        .unwrap_or(influencers.len());

    if influencers.get(start) == Some(&checkpoint.influencer_id) {
        (start, checkpoint.page_token.clone())
    } else {
        if checkpoint.page_token.is_some() {
            warn!(
                influencer_id = %checkpoint.influencer_id,
                "Checkpointed influencer is gone, dropping its page token"
            );
        }
        (start, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_checkpoint_starts_at_first_influencer() {
        assert_eq!(resume_point(&ids(&["1", "2"]), None), (0, None));
    }

    #[test]
    fn resumes_exactly_at_checkpointed_influencer_with_token() {
        let cp = Checkpoint::mid_list("2", Some("tok".to_string()));
        assert_eq!(
            resume_point(&ids(&["1", "2", "3"]), Some(&cp)),
            (1, Some("tok".to_string()))
        );
    }

    #[test]
    fn missing_influencer_resumes_at_next_id_without_token() {
        let cp = Checkpoint::mid_list("25", Some("tok".to_string()));
        assert_eq!(resume_point(&ids(&["1", "2", "3"]), Some(&cp)), (2, None));
    }

    #[test]
    fn checkpoint_past_the_end_processes_nothing() {
        let cp = Checkpoint::start_of("9");
        assert_eq!(resume_point(&ids(&["1", "2"]), Some(&cp)), (2, None));
    }
}

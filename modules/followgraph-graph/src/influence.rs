use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use followgraph_common::{EdgeLabel, NeighborRank, VertexFilter, VertexType};

use crate::store::GraphStore;

#[derive(Debug, Clone)]
pub struct ScoreConfig {
    pub max_iterations: u32,
    /// Pause between rounds so the store's writes are visible to the next round's reads.
    pub settle_delay: Duration,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1,
            settle_delay: Duration::from_secs(3),
        }
    }
}

/// Stats from a scoring pass.
#[derive(Debug, Default)]
pub struct ScoreStats {
    pub rounds: u32,
    pub vertices_scored: u32,
    pub read_failures: u32,
    pub write_failures: u32,
    pub zero_degree_skips: u32,
    pub cancelled: bool,
}

impl fmt::Display for ScoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Influence Scoring Complete ===")?;
        writeln!(f, "Rounds:            {}", self.rounds)?;
        writeln!(f, "Vertices scored:   {}", self.vertices_scored)?;
        writeln!(f, "Read failures:     {}", self.read_failures)?;
        writeln!(f, "Write failures:    {}", self.write_failures)?;
        writeln!(f, "Zero-degree skips: {}", self.zero_degree_skips)?;
        if self.cancelled {
            writeln!(f, "Stopped early on cancellation.")?;
        }
        Ok(())
    }
}

/// Sum of `rank(u) / outdegree(u)` over inbound neighbors.
///
/// A neighbor reporting outdegree 0 cannot be pointing at anything, so it is
/// left out of the sum and returned for logging.
pub fn propagated_rank(neighbors: &[NeighborRank]) -> (f64, Vec<&str>) {
    let mut rank = 0.0;
    let mut skipped = Vec::new();
    for n in neighbors {
        if n.out_degree == 0 {
            skipped.push(n.id.as_str());
            continue;
        }
        rank += n.influence_score / n.out_degree as f64;
    }
    (rank, skipped)
}

/// Iterative rank propagation over every non-influencer vertex.
///
/// Each round reads every inbound contribution first and only then writes the
/// new scores, so no round ever sees a value it wrote itself.
pub struct InfluenceScorer<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    config: ScoreConfig,
    cancelled: Arc<AtomicBool>,
}

impl<'a, S: GraphStore + ?Sized> InfluenceScorer<'a, S> {
    pub fn new(store: &'a S, config: ScoreConfig) -> Self {
        Self {
            store,
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Checked between rounds; the round in flight always completes.
    pub fn with_cancellation(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub async fn run(&self) -> Result<ScoreStats> {
        let mut stats = ScoreStats::default();
        info!(
            iterations = self.config.max_iterations,
            "Computing influence scores..."
        );

        for round in 0..self.config.max_iterations {
            if self.cancelled.load(Ordering::Relaxed) {
                info!(round, "Influence scoring cancelled");
                stats.cancelled = true;
                break;
            }

            self.run_round(round, &mut stats).await?;
            stats.rounds += 1;

            if round + 1 < self.config.max_iterations && !self.config.settle_delay.is_zero() {
                tokio::time::sleep(self.config.settle_delay).await;
            }
        }

        info!(
            rounds = stats.rounds,
            scored = stats.vertices_scored,
            failures = stats.read_failures + stats.write_failures,
            "Influence scoring complete"
        );
        Ok(stats)
    }

    async fn run_round(&self, round: u32, stats: &mut ScoreStats) -> Result<()> {
        let targets = self
            .store
            .list_vertices(VertexFilter::excluding(VertexType::Influencer))
            .await?;

        // Read phase: nothing below writes until every contribution is in.
        let mut pending: Vec<(String, f64)> = Vec::with_capacity(targets.len());
        for vertex in &targets {
            match self
                .store
                .inbound_neighbors(&vertex.id, EdgeLabel::Follows)
                .await
            {
                Ok(neighbors) => {
                    let (rank, skipped) = propagated_rank(&neighbors);
                    if !skipped.is_empty() {
                        warn!(
                            vertex = %vertex.id,
                            ?skipped,
                            "Inbound neighbor reported zero outdegree, contribution skipped"
                        );
                        stats.zero_degree_skips += skipped.len() as u32;
                    }
                    pending.push((vertex.id.clone(), rank));
                }
                Err(e) => {
                    warn!(vertex = %vertex.id, round, error = %e, "Failed to read inbound neighbors, score left unchanged");
                    stats.read_failures += 1;
                }
            }
        }

        // Commit phase.
        for (id, rank) in &pending {
            match self.store.set_influence_score(id, *rank).await {
                Ok(()) => stats.vertices_scored += 1,
                Err(e) => {
                    warn!(vertex = %id, round, error = %e, "Failed to write influence score");
                    stats.write_failures += 1;
                }
            }
        }

        info!(round, targets = targets.len(), committed = pending.len(), "Scoring round committed");
        Ok(())
    }
}

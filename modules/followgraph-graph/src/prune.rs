use std::fmt;

use anyhow::Result;
use tracing::{info, warn};

use followgraph_common::{Vertex, VertexFilter, VertexType};

use crate::store::GraphStore;

/// Stats from a pruning pass.
#[derive(Debug, Default)]
pub struct PruneStats {
    pub vertices_seen: u32,
    pub accounts_seen: u32,
    pub deleted: u32,
    pub failures: u32,
    pub mean_score: Option<f64>,
}

impl fmt::Display for PruneStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Cleanup Complete ===")?;
        writeln!(f, "Vertices seen:  {}", self.vertices_seen)?;
        writeln!(f, "Accounts seen:  {}", self.accounts_seen)?;
        match self.mean_score {
            Some(mean) => writeln!(f, "Mean score:     {mean:.6}")?,
            None => writeln!(f, "Mean score:     n/a (empty graph)")?,
        }
        writeln!(f, "Deleted:        {}", self.deleted)?;
        writeln!(f, "Failures:       {}", self.failures)?;
        Ok(())
    }
}

/// Arithmetic mean of `influence_score` over every vertex, influencers included.
pub fn mean_score(vertices: &[Vertex]) -> Option<f64> {
    if vertices.is_empty() {
        return None;
    }
    Some(vertices.iter().map(|v| v.influence_score).sum::<f64>() / vertices.len() as f64)
}

/// Accounts scoring strictly below `threshold`. Collections and influencers are never candidates.
pub fn prune_candidates(vertices: &[Vertex], threshold: f64) -> Vec<&Vertex> {
    vertices
        .iter()
        .filter(|v| v.vertex_type == VertexType::Account && v.influence_score < threshold)
        .collect()
}

/// Delete every account scoring below the graph-wide mean.
///
/// The threshold and the candidate list come from one snapshot read; the mean
/// is never recomputed while deleting.
pub async fn prune_low_influence<S: GraphStore + ?Sized>(store: &S) -> Result<PruneStats> {
    let snapshot = store.list_vertices(VertexFilter::all()).await?;

    let mut stats = PruneStats {
        vertices_seen: snapshot.len() as u32,
        accounts_seen: snapshot
            .iter()
            .filter(|v| v.vertex_type == VertexType::Account)
            .count() as u32,
        mean_score: mean_score(&snapshot),
        ..Default::default()
    };

    let Some(threshold) = stats.mean_score else {
        info!("Graph is empty, nothing to prune");
        return Ok(stats);
    };

    let candidates = prune_candidates(&snapshot, threshold);
    info!(
        vertices = stats.vertices_seen,
        candidates = candidates.len(),
        threshold,
        "Pruning accounts below mean influence"
    );

    for vertex in candidates {
        match store.delete_vertex(&vertex.id).await {
            Ok(()) => stats.deleted += 1,
            Err(e) => {
                warn!(id = %vertex.id, error = %e, "Failed to delete account");
                stats.failures += 1;
            }
        }
    }

    info!(deleted = stats.deleted, failures = stats.failures, "Pruning complete");
    Ok(stats)
}

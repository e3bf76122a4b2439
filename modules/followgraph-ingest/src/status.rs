use anyhow::Result;

use followgraph_common::{VertexFilter, VertexProperty, VertexType};
use followgraph_graph::GraphStore;

use crate::checkpoint::{Checkpoint, CheckpointStore};

/// Snapshot of where ingestion will resume and what the graph holds.
#[derive(Debug, Default)]
pub struct StatusReport {
    pub checkpoint: Option<Checkpoint>,
    pub influencers: u64,
    pub accounts: u64,
    pub collections: u64,
    /// Means are over every vertex; `None` when the graph is empty.
    pub mean_influence: Option<f64>,
    pub mean_followers: Option<f64>,
    pub mean_following: Option<f64>,
}

pub async fn collect_status(
    store: &dyn GraphStore,
    checkpoints: &CheckpointStore,
) -> Result<StatusReport> {
    let all = VertexFilter::all;
    Ok(StatusReport {
        checkpoint: checkpoints.load()?,
        influencers: store.count(VertexFilter::of_type(VertexType::Influencer)).await?,
        accounts: store.count(VertexFilter::of_type(VertexType::Account)).await?,
        collections: store.count(VertexFilter::of_type(VertexType::Collection)).await?,
        mean_influence: store.mean_of(VertexProperty::InfluenceScore, all()).await?,
        mean_followers: store.mean_of(VertexProperty::Followers, all()).await?,
        mean_following: store.mean_of(VertexProperty::Following, all()).await?,
    })
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Follow Graph Status ===")?;
        match &self.checkpoint {
            Some(cp) => match &cp.page_token {
                Some(token) => writeln!(f, "Next influencer:    {} (page {token})", cp.influencer_id)?,
                None => writeln!(f, "Next influencer:    {}", cp.influencer_id)?,
            },
            None => writeln!(f, "Next influencer:    first in graph order")?,
        }
        writeln!(f, "Influencers:        {}", self.influencers)?;
        writeln!(f, "Accounts:           {}", self.accounts)?;
        writeln!(f, "Collections:        {}", self.collections)?;
        for (label, mean) in [
            ("Mean influence:", self.mean_influence),
            ("Mean followers:", self.mean_followers),
            ("Mean following:", self.mean_following),
        ] {
            match mean {
                Some(mean) => writeln!(f, "{label:<20}{mean:.2}")?,
                None => writeln!(f, "{label:<20}n/a")?,
            }
        }
        Ok(())
    }
}

// Typed adapter over the persistent follows graph.
//
// Ingestion, scoring and pruning only ever talk to the graph through this
// trait. GraphWriter backs it with Neo4j; testing::MemoryGraphStore backs it
// with a BTreeMap for tests that must not need Docker.

use anyhow::Result;
use async_trait::async_trait;

use followgraph_common::{
    EdgeLabel, NeighborRank, UpsertOutcome, Vertex, VertexFilter, VertexProperty, VertexUpsert,
};

use crate::lock::RunLock;

#[async_trait]
pub trait GraphStore: Send + Sync {
    // --- Vertices ---

    /// Vertices matching `filter`, ordered by id.
    async fn list_vertices(&self, filter: VertexFilter) -> Result<Vec<Vertex>>;

    async fn get_vertex(&self, id: &str) -> Result<Option<Vertex>>;

    /// Create the vertex with a zero score, or replace the mutable attributes
    /// of an existing one. An existing influencer keeps its type.
    async fn upsert_vertex(&self, vertex: &VertexUpsert) -> Result<UpsertOutcome>;

    /// Replace the score of a non-influencer vertex. No-op for influencers.
    async fn set_influence_score(&self, id: &str, score: f64) -> Result<()>;

    /// Delete the vertex and every incident edge.
    async fn delete_vertex(&self, id: &str) -> Result<()>;

    // --- Edges ---

    /// Ensure exactly one `label` edge from `from` to `to`.
    async fn add_edge(&self, from: &str, to: &str, label: EdgeLabel) -> Result<()>;

    async fn edge_exists(&self, from: &str, to: &str, label: EdgeLabel) -> Result<bool>;

    /// Every vertex with a `label` edge into `id`, with its score and out-degree.
    async fn inbound_neighbors(&self, id: &str, label: EdgeLabel) -> Result<Vec<NeighborRank>>;

    // --- Aggregates ---

    /// Arithmetic mean of `property` over matching vertices; `None` when nothing matches.
    async fn mean_of(&self, property: VertexProperty, filter: VertexFilter) -> Result<Option<f64>>;

    async fn count(&self, filter: VertexFilter) -> Result<u64>;

    // --- Run lock ---

    /// Atomically take the graph-wide run lock. Returns false if another live
    /// pass holds it. Locks older than `lock.stale_after` are reclaimed first.
    async fn try_acquire_run_lock(&self, lock: &RunLock) -> Result<bool>;

    /// Release the lock if `lock` still owns it.
    async fn release_run_lock(&self, lock: &RunLock) -> Result<()>;
}

// In-memory GraphStore for engine and coordinator tests.
//
// Vertices live in a BTreeMap so listings come back ordered by id, matching
// the Neo4j store. Per-vertex read/write failures can be injected to check
// that one bad vertex never aborts a pass.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use followgraph_common::{
    Edge, EdgeLabel, NeighborRank, UpsertOutcome, Vertex, VertexFilter, VertexProperty,
    VertexType, VertexUpsert,
};

use crate::lock::RunLock;
use crate::store::GraphStore;

#[derive(Default)]
struct MemoryGraph {
    vertices: BTreeMap<String, Vertex>,
    edges: BTreeSet<Edge>,
    lock: Option<(Uuid, DateTime<Utc>)>,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryGraphStore {
    inner: Mutex<MemoryGraph>,
}

/// Build a vertex with empty profile fields.
pub fn vertex(id: &str, vertex_type: VertexType, influence_score: f64) -> Vertex {
    Vertex {
        id: id.to_string(),
        vertex_type,
        username: format!("user_{id}"),
        name: String::new(),
        followers: 0,
        following: 0,
        influence_score,
    }
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vertex(self, vertex: Vertex) -> Self {
        self.insert(vertex);
        self
    }

    pub fn with_edge(self, from: &str, to: &str) -> Self {
        self.link(from, to);
        self
    }

    pub fn insert(&self, vertex: Vertex) {
        self.inner
            .lock()
            .unwrap()
            .vertices
            .insert(vertex.id.clone(), vertex);
    }

    pub fn link(&self, from: &str, to: &str) {
        self.inner.lock().unwrap().edges.insert(Edge {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    /// Make every read that targets `id` fail.
    pub fn fail_reads_for(&self, id: &str) {
        self.inner.lock().unwrap().failing_reads.insert(id.to_string());
    }

    /// Make every write that targets `id` fail.
    pub fn fail_writes_for(&self, id: &str) {
        self.inner.lock().unwrap().failing_writes.insert(id.to_string());
    }

    pub fn vertices(&self) -> Vec<Vertex> {
        self.inner.lock().unwrap().vertices.values().cloned().collect()
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.inner.lock().unwrap().edges.iter().cloned().collect()
    }

    pub fn score_of(&self, id: &str) -> Option<f64> {
        self.inner
            .lock()
            .unwrap()
            .vertices
            .get(id)
            .map(|v| v.influence_score)
    }

    pub fn type_of(&self, id: &str) -> Option<VertexType> {
        self.inner.lock().unwrap().vertices.get(id).map(|v| v.vertex_type)
    }
}

impl MemoryGraph {
    fn check_read(&self, id: &str) -> Result<()> {
        if self.failing_reads.contains(id) {
            bail!("injected read failure for {id}");
        }
        Ok(())
    }

    fn check_write(&self, id: &str) -> Result<()> {
        if self.failing_writes.contains(id) {
            bail!("injected write failure for {id}");
        }
        Ok(())
    }

    fn out_degree(&self, id: &str) -> u64 {
        self.edges.iter().filter(|e| e.from == id).count() as u64
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn list_vertices(&self, filter: VertexFilter) -> Result<Vec<Vertex>> {
        let g = self.inner.lock().unwrap();
        Ok(g.vertices
            .values()
            .filter(|v| filter.matches(v.vertex_type))
            .cloned()
            .collect())
    }

    async fn get_vertex(&self, id: &str) -> Result<Option<Vertex>> {
        let g = self.inner.lock().unwrap();
        g.check_read(id)?;
        Ok(g.vertices.get(id).cloned())
    }

    async fn upsert_vertex(&self, v: &VertexUpsert) -> Result<UpsertOutcome> {
        let mut g = self.inner.lock().unwrap();
        g.check_write(&v.id)?;
        match g.vertices.get_mut(&v.id) {
            Some(existing) => {
                existing.username = v.username.clone();
                existing.name = v.name.clone();
                existing.followers = v.followers;
                existing.following = v.following;
                if existing.vertex_type != VertexType::Influencer {
                    existing.vertex_type = v.vertex_type;
                }
                Ok(UpsertOutcome::Updated)
            }
            None => {
                g.vertices.insert(
                    v.id.clone(),
                    Vertex {
                        id: v.id.clone(),
                        vertex_type: v.vertex_type,
                        username: v.username.clone(),
                        name: v.name.clone(),
                        followers: v.followers,
                        following: v.following,
                        influence_score: 0.0,
                    },
                );
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn set_influence_score(&self, id: &str, score: f64) -> Result<()> {
        let mut g = self.inner.lock().unwrap();
        g.check_write(id)?;
        if let Some(v) = g.vertices.get_mut(id) {
            if v.vertex_type != VertexType::Influencer {
                v.influence_score = score;
            }
        }
        Ok(())
    }

    async fn delete_vertex(&self, id: &str) -> Result<()> {
        let mut g = self.inner.lock().unwrap();
        g.check_write(id)?;
        g.vertices.remove(id);
        g.edges.retain(|e| e.from != id && e.to != id);
        Ok(())
    }

    async fn add_edge(&self, from: &str, to: &str, _label: EdgeLabel) -> Result<()> {
        let mut g = self.inner.lock().unwrap();
        g.check_write(to)?;
        if g.vertices.contains_key(from) && g.vertices.contains_key(to) {
            g.edges.insert(Edge {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    async fn edge_exists(&self, from: &str, to: &str, _label: EdgeLabel) -> Result<bool> {
        let g = self.inner.lock().unwrap();
        Ok(g.edges.contains(&Edge {
            from: from.to_string(),
            to: to.to_string(),
        }))
    }

    async fn inbound_neighbors(&self, id: &str, _label: EdgeLabel) -> Result<Vec<NeighborRank>> {
        let g = self.inner.lock().unwrap();
        g.check_read(id)?;
        Ok(g.edges
            .iter()
            .filter(|e| e.to == id)
            .filter_map(|e| g.vertices.get(&e.from))
            .map(|u| NeighborRank {
                id: u.id.clone(),
                influence_score: u.influence_score,
                out_degree: g.out_degree(&u.id),
            })
            .collect())
    }

    async fn mean_of(&self, property: VertexProperty, filter: VertexFilter) -> Result<Option<f64>> {
        let g = self.inner.lock().unwrap();
        let values: Vec<f64> = g
            .vertices
            .values()
            .filter(|v| filter.matches(v.vertex_type))
            .map(|v| property.of(v))
            .collect();
        if values.is_empty() {
            return Ok(None);
        }
        Ok(Some(values.iter().sum::<f64>() / values.len() as f64))
    }

    async fn count(&self, filter: VertexFilter) -> Result<u64> {
        let g = self.inner.lock().unwrap();
        Ok(g.vertices
            .values()
            .filter(|v| filter.matches(v.vertex_type))
            .count() as u64)
    }

    async fn try_acquire_run_lock(&self, lock: &RunLock) -> Result<bool> {
        let mut g = self.inner.lock().unwrap();
        let now = Utc::now();
        if let Some((_, started_at)) = g.lock {
            if now - started_at < lock.stale_after {
                return Ok(false);
            }
        }
        g.lock = Some((lock.owner, now));
        Ok(true)
    }

    async fn release_run_lock(&self, lock: &RunLock) -> Result<()> {
        let mut g = self.inner.lock().unwrap();
        if matches!(g.lock, Some((owner, _)) if owner == lock.owner) {
            g.lock = None;
        }
        Ok(())
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use neo4rs::{query, Row};
use tracing::{debug, warn};

use followgraph_common::{
    EdgeLabel, NeighborRank, UpsertOutcome, Vertex, VertexFilter, VertexProperty, VertexType,
    VertexUpsert,
};

use crate::lock::RunLock;
use crate::store::GraphStore;
use crate::GraphClient;

const VERTEX_RETURN: &str = "p.id AS id, p.type AS type, coalesce(p.username, '') AS username,
     coalesce(p.name, '') AS name, coalesce(p.followers, 0) AS followers,
     coalesce(p.following, 0) AS following, coalesce(p.influence_score, 0.0) AS influence_score";

/// Neo4j-backed graph store. Profiles are `(:Profile {id, type, ...})` nodes
/// joined by `[:FOLLOWS]` relationships.
pub struct GraphWriter {
    client: GraphClient,
}

impl GraphWriter {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }
}

/// Render a filter as a Cypher predicate on `p`. Types are a closed enum, so
/// inlining them is safe.
fn where_clause(filter: &VertexFilter) -> String {
    let mut predicates = Vec::new();
    if let Some(t) = filter.only {
        predicates.push(format!("p.type = '{}'", t.as_str()));
    }
    if let Some(t) = filter.except {
        predicates.push(format!("p.type <> '{}'", t.as_str()));
    }
    if predicates.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", predicates.join(" AND "))
    }
}

fn vertex_from_row(row: &Row) -> Option<Vertex> {
    let id: String = row.get("id").ok()?;
    let raw_type: String = row.get("type").unwrap_or_default();
    let vertex_type = match raw_type.parse::<VertexType>() {
        Ok(t) => t,
        Err(e) => {
            warn!(%id, "Skipping profile with bad type: {e}");
            return None;
        }
    };
    Some(Vertex {
        id,
        vertex_type,
        username: row.get("username").unwrap_or_default(),
        name: row.get("name").unwrap_or_default(),
        followers: row.get::<i64>("followers").unwrap_or(0).max(0) as u64,
        following: row.get::<i64>("following").unwrap_or(0).max(0) as u64,
        influence_score: row.get("influence_score").unwrap_or(0.0),
    })
}

#[async_trait]
impl GraphStore for GraphWriter {
    async fn list_vertices(&self, filter: VertexFilter) -> Result<Vec<Vertex>> {
        let q = query(&format!(
            "MATCH (p:Profile) {} RETURN {VERTEX_RETURN} ORDER BY p.id",
            where_clause(&filter)
        ));

        let mut stream = self.client.graph.execute(q).await?;
        let mut vertices = Vec::new();
        while let Some(row) = stream.next().await? {
            if let Some(v) = vertex_from_row(&row) {
                vertices.push(v);
            }
        }
        Ok(vertices)
    }

    async fn get_vertex(&self, id: &str) -> Result<Option<Vertex>> {
        let q = query(&format!("MATCH (p:Profile {{id: $id}}) RETURN {VERTEX_RETURN}"))
            .param("id", id);

        let mut stream = self.client.graph.execute(q).await?;
        Ok(match stream.next().await? {
            Some(row) => vertex_from_row(&row),
            None => None,
        })
    }

    async fn upsert_vertex(&self, v: &VertexUpsert) -> Result<UpsertOutcome> {
        // Properties are overwritten wholesale; influencers keep their type.
        let q = query(
            "OPTIONAL MATCH (existing:Profile {id: $id})
             WITH existing IS NOT NULL AS existed
             MERGE (p:Profile {id: $id})
             ON CREATE SET p.influence_score = 0.0, p.type = $type
             SET p.username = $username,
                 p.name = $name,
                 p.followers = $followers,
                 p.following = $following,
                 p.type = CASE WHEN p.type = 'influencer' THEN p.type ELSE $type END
             RETURN existed",
        )
        .param("id", v.id.as_str())
        .param("type", v.vertex_type.as_str())
        .param("username", v.username.as_str())
        .param("name", v.name.as_str())
        .param("followers", v.followers as i64)
        .param("following", v.following as i64);

        let mut stream = self.client.graph.execute(q).await?;
        let row = stream
            .next()
            .await?
            .with_context(|| format!("upsert of profile {} returned no row", v.id))?;
        let existed: bool = row.get("existed").unwrap_or(false);
        debug!(id = %v.id, existed, "Upserted profile");

        Ok(if existed {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    async fn set_influence_score(&self, id: &str, score: f64) -> Result<()> {
        self.client
            .graph
            .run(
                query(
                    "MATCH (p:Profile {id: $id})
                     WHERE p.type <> 'influencer'
                     SET p.influence_score = $score",
                )
                .param("id", id)
                .param("score", score),
            )
            .await?;
        Ok(())
    }

    async fn delete_vertex(&self, id: &str) -> Result<()> {
        self.client
            .graph
            .run(query("MATCH (p:Profile {id: $id}) DETACH DELETE p").param("id", id))
            .await?;
        Ok(())
    }

    async fn add_edge(&self, from: &str, to: &str, label: EdgeLabel) -> Result<()> {
        let q = query(&format!(
            "MATCH (a:Profile {{id: $from}}), (b:Profile {{id: $to}})
             MERGE (a)-[:{}]->(b)",
            label.as_str()
        ))
        .param("from", from)
        .param("to", to);

        self.client.graph.run(q).await?;
        Ok(())
    }

    async fn edge_exists(&self, from: &str, to: &str, label: EdgeLabel) -> Result<bool> {
        let q = query(&format!(
            "OPTIONAL MATCH (:Profile {{id: $from}})-[r:{}]->(:Profile {{id: $to}})
             RETURN count(r) > 0 AS present",
            label.as_str()
        ))
        .param("from", from)
        .param("to", to);

        let mut stream = self.client.graph.execute(q).await?;
        Ok(match stream.next().await? {
            Some(row) => row.get("present").unwrap_or(false),
            None => false,
        })
    }

    async fn inbound_neighbors(&self, id: &str, label: EdgeLabel) -> Result<Vec<NeighborRank>> {
        let rel = label.as_str();
        let q = query(&format!(
            "MATCH (u:Profile)-[:{rel}]->(:Profile {{id: $id}})
             MATCH (u)-[out:{rel}]->(:Profile)
             RETURN u.id AS id,
                    coalesce(u.influence_score, 0.0) AS influence_score,
                    count(out) AS out_degree"
        ))
        .param("id", id);

        let mut stream = self.client.graph.execute(q).await?;
        let mut neighbors = Vec::new();
        while let Some(row) = stream.next().await? {
            neighbors.push(NeighborRank {
                id: row.get("id").unwrap_or_default(),
                influence_score: row.get("influence_score").unwrap_or(0.0),
                out_degree: row.get::<i64>("out_degree").unwrap_or(0).max(0) as u64,
            });
        }
        Ok(neighbors)
    }

    async fn mean_of(&self, property: VertexProperty, filter: VertexFilter) -> Result<Option<f64>> {
        let q = query(&format!(
            "MATCH (p:Profile) {} RETURN avg(p.{}) AS mean",
            where_clause(&filter),
            property.as_str()
        ));

        let mut stream = self.client.graph.execute(q).await?;
        Ok(match stream.next().await? {
            Some(row) => row.get::<Option<f64>>("mean").unwrap_or(None),
            None => None,
        })
    }

    async fn count(&self, filter: VertexFilter) -> Result<u64> {
        let q = query(&format!(
            "MATCH (p:Profile) {} RETURN count(p) AS n",
            where_clause(&filter)
        ));

        let mut stream = self.client.graph.execute(q).await?;
        Ok(match stream.next().await? {
            Some(row) => row.get::<i64>("n").unwrap_or(0).max(0) as u64,
            None => 0,
        })
    }

    /// Atomic check-and-create, so two passes starting together cannot both win.
    async fn try_acquire_run_lock(&self, lock: &RunLock) -> Result<bool> {
        self.client
            .graph
            .run(
                query(
                    "MATCH (lock:RunLock)
                     WHERE lock.started_at <= datetime() - duration({minutes: $stale})
                     DELETE lock",
                )
                .param("stale", lock.stale_after.num_minutes()),
            )
            .await?;

        let q = query(
            "OPTIONAL MATCH (existing:RunLock)
             WITH existing WHERE existing IS NULL
             CREATE (lock:RunLock {owner: $owner, mode: $mode, started_at: datetime()})
             RETURN lock IS NOT NULL AS acquired",
        )
        .param("owner", lock.owner.to_string())
        .param("mode", lock.mode.as_str());

        let mut result = self.client.graph.execute(q).await?;
        if let Some(row) = result.next().await? {
            return Ok(row.get("acquired").unwrap_or(false));
        }

        // No row means the WHERE filtered it out: someone else holds the lock.
        Ok(false)
    }

    async fn release_run_lock(&self, lock: &RunLock) -> Result<()> {
        self.client
            .graph
            .run(
                query("MATCH (lock:RunLock {owner: $owner}) DELETE lock")
                    .param("owner", lock.owner.to_string()),
            )
            .await?;
        Ok(())
    }
}

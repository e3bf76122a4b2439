use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Profiles with more followers than this are dropped at ingestion.
pub const DEFAULT_FOLLOWER_CEILING: u64 = 5_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VertexType {
    /// Fixed score source; never re-ranked and never downgraded.
    Influencer,
    /// Ordinary profile, eligible for pruning.
    Account,
    /// Profile tracked as a collection in the relational store.
    Collection,
}

impl VertexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VertexType::Influencer => "influencer",
            VertexType::Account => "account",
            VertexType::Collection => "collection",
        }
    }
}

impl fmt::Display for VertexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VertexType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "influencer" => Ok(VertexType::Influencer),
            "account" => Ok(VertexType::Account),
            "collection" => Ok(VertexType::Collection),
            other => Err(format!("unknown vertex type: {other}")),
        }
    }
}

/// A profile in the follows graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: String,
    pub vertex_type: VertexType,
    pub username: String,
    pub name: String,
    pub followers: u64,
    pub following: u64,
    pub influence_score: f64,
}

/// Mutable attributes written on every ingestion pass.
///
/// `influence_score` is absent on purpose: new vertices start at 0 and
/// existing ones keep theirs.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexUpsert {
    pub id: String,
    pub vertex_type: VertexType,
    pub username: String,
    pub name: String,
    pub followers: u64,
    pub following: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Type filter for vertex listings and aggregates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VertexFilter {
    pub only: Option<VertexType>,
    pub except: Option<VertexType>,
}

impl VertexFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_type(vertex_type: VertexType) -> Self {
        Self {
            only: Some(vertex_type),
            except: None,
        }
    }

    pub fn excluding(vertex_type: VertexType) -> Self {
        Self {
            only: None,
            except: Some(vertex_type),
        }
    }

    pub fn matches(&self, vertex_type: VertexType) -> bool {
        self.only.map_or(true, |t| t == vertex_type) && self.except != Some(vertex_type)
    }
}

/// Numeric vertex properties that can be aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexProperty {
    InfluenceScore,
    Followers,
    Following,
}

impl VertexProperty {
    pub fn as_str(&self) -> &'static str {
        match self {
            VertexProperty::InfluenceScore => "influence_score",
            VertexProperty::Followers => "followers",
            VertexProperty::Following => "following",
        }
    }

    pub fn of(&self, vertex: &Vertex) -> f64 {
        match self {
            VertexProperty::InfluenceScore => vertex.influence_score,
            VertexProperty::Followers => vertex.followers as f64,
            VertexProperty::Following => vertex.following as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeLabel {
    Follows,
}

impl EdgeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeLabel::Follows => "FOLLOWS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// An inbound neighbor of a ranked vertex, as read for one scoring round.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborRank {
    pub id: String,
    pub influence_score: f64,
    pub out_degree: u64,
}

/// The three passes that must never overlap on the same graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Ingest,
    Score,
    Cleanup,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Ingest => "ingest",
            RunMode::Score => "score",
            RunMode::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_type_round_trips_through_str() {
        for t in [VertexType::Influencer, VertexType::Account, VertexType::Collection] {
            assert_eq!(t.as_str().parse::<VertexType>().unwrap(), t);
        }
        assert!("twitter_account".parse::<VertexType>().is_err());
    }

    #[test]
    fn filter_matches() {
        assert!(VertexFilter::all().matches(VertexType::Influencer));
        assert!(VertexFilter::of_type(VertexType::Account).matches(VertexType::Account));
        assert!(!VertexFilter::of_type(VertexType::Account).matches(VertexType::Collection));
        assert!(!VertexFilter::excluding(VertexType::Influencer).matches(VertexType::Influencer));
        assert!(VertexFilter::excluding(VertexType::Influencer).matches(VertexType::Collection));
    }
}

pub mod client;
pub mod influence;
pub mod lock;
pub mod migrate;
pub mod prune;
pub mod store;
pub mod writer;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use influence::{InfluenceScorer, ScoreConfig, ScoreStats};
pub use lock::{run_exclusive, RunLock};
pub use prune::{prune_low_influence, PruneStats};
pub use store::GraphStore;
pub use writer::GraphWriter;

pub mod checkpoint;
pub mod coordinator;
pub mod oracle;
pub mod shutdown;
pub mod stats;
pub mod status;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
pub use coordinator::{Coordinator, IngestError, IngestOutcome, IngestSettings, RunStatus};
pub use oracle::PgCollectionOracle;
pub use shutdown::watch_stop_signals;
pub use stats::IngestStats;
pub use status::{collect_status, StatusReport};
pub use traits::{CollectionOracle, FollowingSource};

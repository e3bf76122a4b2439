use thiserror::Error;

use crate::types::RunMode;

#[derive(Error, Debug)]
pub enum FollowGraphError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run lock conflict: cannot start {0} pass while another pass holds the graph")]
    RunLockConflict(RunMode),
}

/// Error types for GridSync

use crate::engine::EngineError;

pub type Result<T, E = ViewSyncError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ViewSyncError {
    #[error("failed to compile view: {0}")]
    Compile(#[source] EngineError),

    #[error("failed to fetch rows [{offset}, {}): {source}", .offset + .limit)]
    Fetch {
        offset: usize,
        limit: usize,
        source: EngineError,
    },

    #[error("row {index} of the fetched window has no integer `_depth` column")]
    MissingDepth { index: usize },

    #[error("row {index} of the fetched window has `_depth` {depth}, deeper than the leaf level {max}")]
    InvalidDepth { index: usize, depth: usize, max: usize },

    #[error("snapshot version {found} is older than the current version {current}")]
    StaleSnapshot { found: u64, current: u64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },
}

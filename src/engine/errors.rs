use std::io;
use thiserror::Error;
use tracing::{debug, error};

/// Errors surfaced while reading or writing a segment's meta/data files.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("meta file deserialization failed: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("invalid segment file name: {0}")]
    InvalidName(String),

    #[error("meta header magic/version mismatch")]
    BadHeader,

    #[error("trie path has no leaf for the requested iid")]
    NoLeaf,
}

/// Errors surfaced by the merge planner / scan cursor while answering a query.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("segment error: {0}")]
    Segment(#[from] SegmentError),

    #[error("row predicate evaluation failed: {0}")]
    PredicateEval(String),

    #[error("projection failed: {0}")]
    Projection(String),

    #[error("query aborted due to internal limit or planning error")]
    Aborted,
}

/// Errors surfaced by the compactor.
#[derive(Debug, Error)]
pub enum CompactionError {
    #[error("segment error: {0}")]
    Segment(#[from] SegmentError),

    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("another compaction is already running for this table")]
    AlreadyRunning,

    #[error("fewer than fan-in segments available at level {0}")]
    NothingToCompact(u32),

    #[error("other error: {0}")]
    Other(String),
}

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config source error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("invalid time zone: {0}")]
    InvalidTimeZone(String),
}

/// Top-level taxonomy (spec §7): the public error type every core operation returns.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("transaction system-time would go backwards")]
    Conflict,

    #[error("await-tx timed out waiting for the requested transaction")]
    Timeout,

    #[error("storage error: {0}")]
    Storage(#[from] SegmentError),

    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("compaction error: {0}")]
    Compaction(#[from] CompactionError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl CoreError {
    pub fn log_error(&self) {
        match self {
            CoreError::InvalidArgument(e) => {
                error!("invalid argument: {}", e);
            }
            CoreError::Runtime(e) => {
                error!("runtime error: {}", e);
            }
            CoreError::Conflict => {
                error!("transaction conflict: system-time would go backwards");
            }
            CoreError::Timeout => {
                error!("await-tx timed out");
            }
            CoreError::Storage(e) => {
                error!("storage error: {}", e);
                debug!("storage error details: {:?}", e);
            }
            CoreError::Merge(e) => {
                error!("merge error: {}", e);
                debug!("merge error details: {:?}", e);
            }
            CoreError::Compaction(e) => {
                error!("compaction error: {}", e);
                debug!("compaction error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("config error: {}", e);
            }
        }
    }
}

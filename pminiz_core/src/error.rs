//! Error type shared by every stage of the pipeline.
//!
//! Each file's processing is an isolated failure domain (see the job
//! dispatcher in `job.rs`): a `BlzError` returned for one file never aborts
//! the rest of the job, it just flips that file's success flag to `false`.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, BlzError>;

#[derive(Debug, thiserror::Error)]
pub enum BlzError {
    #[error("I/O failure on {path}: {source}")]
    IoFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed container header: {reason}")]
    MalformedHeader { reason: String },

    #[error("codec failure on block {block_index}: {reason}")]
    CodecFailed { block_index: usize, reason: String },

    #[error("transport failure: {reason}")]
    TransportFailed { reason: String },

    #[error("invalid configuration: {reason}")]
    ConfigInvalid { reason: String },
}

impl BlzError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BlzError::IoFailed {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        BlzError::MalformedHeader {
            reason: reason.into(),
        }
    }

    pub fn codec(block_index: usize, reason: impl Into<String>) -> Self {
        BlzError::CodecFailed {
            block_index,
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        BlzError::TransportFailed {
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        BlzError::ConfigInvalid {
            reason: reason.into(),
        }
    }
}

//src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading inputs or writing reports.
///
/// The profiling stages themselves never fail; anything that goes wrong
/// per read or per reference is excluded from the pass instead.
#[derive(Debug, Error)]
pub enum SlimmError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line in an input file could not be parsed.
    #[error("{path}:{line}: {msg}")]
    Parse {
        path: PathBuf,
        line: usize,
        msg: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SlimmError {
    pub(crate) fn parse(path: &std::path::Path, line: usize, msg: impl Into<String>) -> Self {
        SlimmError::Parse {
            path: path.to_path_buf(),
            line,
            msg: msg.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SlimmError>;

//! Domain error types for the Local Intercept module.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of one announcement scan pass.
///
/// Never surfaced to callers: the pass is skipped and retried on the next tick.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The announcement directory could not be listed.
    #[error("failed to list announcement directory {}: {source}", .dir.display())]
    ListDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An announcement file could not be read.
    #[error("failed to read announcement file {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scan task was started with a zero scan interval.
    #[error("announcement scan interval must be greater than zero")]
    ZeroInterval,

    /// The scan task was started outside a Tokio runtime.
    #[error("announcement scan requires a running Tokio runtime")]
    NoRuntime,
}

impl StoreError {
    #[must_use]
    pub fn list_dir(dir: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ListDir {
            dir: dir.into(),
            source,
        }
    }

    #[must_use]
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }
}

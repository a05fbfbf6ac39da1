//! Error types for buffer manager construction.
//!
//! Ordinary operating conditions (pool exhaustion, a directory miss) are not
//! errors in this design — see `BufferManager::get_page` and friends, which
//! return `Option`/`bool` the way the spec's handle surface does. Only
//! construction-time misconfiguration is a `Result`.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for fallible buffer manager construction.
pub type Result<T> = std::result::Result<T, BufferManagerError>;

#[derive(Debug, Error)]
pub enum BufferManagerError {
    #[error("page size must be greater than zero")]
    ZeroPageSize,

    #[error("buffer manager must manage at least one frame")]
    ZeroFrames,

    #[error("failed to open temp file {path}: {source}")]
    TempFileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

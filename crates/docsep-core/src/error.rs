//! Error types for the windowed sampling engine.
//!
//! Construction and configuration errors are fatal and surface at build
//! time; parse errors surface to whoever asked the cache to resolve a
//! coordinate. Absent images are intentionally NOT errors (see
//! [`crate::provider::ImagePayload`]) and out-of-bounds navigation
//! returns `None`/empty rather than an error.

use std::path::PathBuf;
use thiserror::Error;

/// Error types produced while building hierarchies, validating sampler
/// configuration, or resolving per-scan assets.
#[derive(Error, Debug)]
pub enum DocsepError {
    /// Malformed hierarchy detected at index build time (e.g. an empty
    /// document). Fatal, never retried.
    #[error("Hierarchy construction error: {0}")]
    Construction(String),

    /// Invalid sampler or dataset parameters. Fatal at construction.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed transcription source. Surfaced to the caller of
    /// `AssetCache::resolve`; whether to skip or abort is the caller's
    /// decision, but a failed parse is never cached as a success.
    #[error("Parse error in {path}: {message}")]
    Parse {
        /// The transcription file that failed to parse.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for [`Result<T, DocsepError>`].
pub type Result<T> = std::result::Result<T, DocsepError>;

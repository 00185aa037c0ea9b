//! Domain-specific error types for the vizor capture pipeline.
//!
//! All fallible operations return `Result<T, VizorError>`.
//! Per-cycle capture problems are *not* errors in this taxonomy — they are
//! absorbed by the worker loop (skip the cycle, retry next cycle). The only
//! error that stops the pipeline is a setup failure before the loop starts.

use thiserror::Error;

/// The canonical error type for the vizor pipeline.
#[derive(Debug, Error)]
pub enum VizorError {
    // ── Setup Errors ─────────────────────────────────────────────
    /// The configured video encoding is not available in this build.
    ///
    /// This is the single fatal startup condition: the update worker is
    /// never spawned when encoder construction fails.
    #[error("unsupported video encoding: {0}")]
    UnsupportedEncoding(String),

    /// An OS capture resource could not be allocated.
    #[error("capture resource creation failed: {0}")]
    ResourceCreation(&'static str),

    // ── Encoding Errors ──────────────────────────────────────────
    /// Compression or serialization of a payload failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    // ── Channel Errors ───────────────────────────────────────────
    /// The update channel to the consumer was closed.
    #[error("update channel closed")]
    ChannelClosed,

    // ── Application Errors ───────────────────────────────────────
    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for VizorError {
    fn from(s: String) -> Self {
        VizorError::Other(s)
    }
}

impl From<&str> for VizorError {
    fn from(s: &str) -> Self {
        VizorError::Other(s.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for VizorError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        VizorError::Encoding(e.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for VizorError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        VizorError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = VizorError::UnsupportedEncoding("vp8".into());
        assert!(e.to_string().contains("vp8"));

        let e = VizorError::ResourceCreation("CreateCompatibleDC");
        assert!(e.to_string().contains("CreateCompatibleDC"));
    }

    #[test]
    fn from_string() {
        let e: VizorError = "something broke".into();
        assert!(matches!(e, VizorError::Other(_)));
    }
}

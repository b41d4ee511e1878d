//! Unified error type for keycut.
//!
//! Every failure in the trimming pipeline funnels into [`Error`]. Apart from
//! best-effort removal of temporary files, nothing is swallowed: each variant
//! aborts the remaining pipeline once it reaches the orchestrator.

use crate::timecode::Timecode;

/// Unified error type covering all failure modes in keycut.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A timecode string did not match `[[HH:]MM:]SS[.ffffff]`.
    #[error("Invalid timecode '{0}': expected [[HH:]MM:]SS[.ffffff]")]
    Parse(String),

    /// A numeric timecode was negative, not finite, or beyond `99:59:59.999999`.
    #[error("Timecode out of range: {0}")]
    Range(String),

    /// The requested trim interval is empty or inverted.
    #[error("Invalid range: start {start} must be before end {end}")]
    InvalidRange {
        /// Requested start.
        start: Timecode,
        /// Requested end.
        end: Timecode,
    },

    /// The source is missing or the engine reported no usable container.
    #[error("Probe error: {0}")]
    Probe(String),

    /// No keyframe at or after the requested start was reported.
    #[error("Unable to find a split point at or after {from}")]
    NoSplitPoint {
        /// The requested start time.
        from: Timecode,
    },

    /// An engine process (ffmpeg, ffprobe) could not be run or exited non-zero.
    #[error("Engine error [{tool}]: {message}")]
    Engine {
        /// Name of the tool that failed.
        tool: String,
        /// Full command line of the failing invocation.
        command: String,
        /// Human-readable description, including captured stderr.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The temporary workspace could not be created or finalized.
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// Configuration failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation was cancelled or ran past its deadline.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl Error {
    /// Convenience constructor for [`Error::Engine`].
    pub fn engine(
        tool: impl Into<String>,
        command: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Engine {
            tool: tool.into(),
            command: command.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Probe`].
    pub fn probe(message: impl Into<String>) -> Self {
        Error::Probe(message.into())
    }

    /// Convenience constructor for [`Error::Workspace`].
    pub fn workspace(message: impl Into<String>) -> Self {
        Error::Workspace(message.into())
    }

    /// Whether this error was raised by an engine invocation.
    pub fn is_engine(&self) -> bool {
        matches!(self, Error::Engine { .. })
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

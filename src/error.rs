//! The crate's error taxonomy.
//!
//! Every fallible public operation returns [`Result<T>`], an alias over
//! [`Error`]. Errors from the underlying byte source (I/O, HTTP) are wrapped
//! rather than stringified, so callers can match on the cause via
//! [`std::error::Error::source`].

use thiserror::Error;

/// A `Result` type alias over [`Error`] to minimise repetition.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned by every fallible operation in this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The byte source could not be opened or does not support the reads this
    /// crate needs (e.g. a remote server without Range support).
    #[error("source unavailable: {message}")]
    SourceUnavailable {
        /// Human-readable description of why the source is unavailable.
        message: String,
    },

    /// The archive's on-disk structure is inconsistent with the ZIP format.
    #[error("malformed archive: {message}")]
    MalformedArchive {
        /// Human-readable description, naming the offending offset/signature
        /// where applicable.
        message: String,
    },

    /// A central-directory entry declares a compression method this crate
    /// does not implement.
    #[error("unsupported compression method: {method}")]
    UnsupportedCompression {
        /// The raw 16-bit compression method identifier from the entry.
        method: u16,
    },

    /// The caller invoked an operation that is not valid in the current
    /// state (extracting a directory, reading an archive before `open`,
    /// reading enriched metadata before `extract_metadata`, reading a crate
    /// that was never found).
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Human-readable description of the violated precondition.
        message: String,
    },

    /// The requested entry or metadata key does not exist in the archive.
    #[error("not found: {path}")]
    NotFound {
        /// The path that was looked up.
        path: String,
    },

    /// An in-flight operation was cancelled by the caller (e.g. a
    /// `tokio::time::timeout` wrapping an `open`/`extract` call elapsed).
    #[error("operation cancelled")]
    Cancelled,

    /// A local filesystem operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An HTTP transport operation failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The RO-Crate metadata document is not valid JSON.
    #[error("invalid RO-Crate metadata: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn source_unavailable(message: impl Into<String>) -> Self {
        Error::SourceUnavailable {
            message: message.into(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedArchive {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(path: impl Into<String>) -> Self {
        Error::NotFound { path: path.into() }
    }
}

//! Error types for tarpack
//!
//! Three kinds of failure flow through the pipeline:
//! - Fatal configuration / enumeration errors, which abort the run
//! - Per-member failures, which are logged and counted but do not stop the run
//! - Transient operational failures, which are retried with backoff and
//!   demoted to per-member failures on exhaustion
//!
//! The variants here carry enough context to classify an error into one of
//! those kinds; the classification itself lives in [`crate::retry`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tarpack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tarpack
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max-tarfile-size")
        key: Option<String>,
    },

    /// Source enumeration error (fatal — a partial listing would silently
    /// truncate the archival set)
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Archive assembly error
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Manifest format violation
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Object storage operation failed
    #[error("storage error: {0}")]
    Storage(#[from] opendal::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown in progress - downstream stages are gone
    #[error("shutdown in progress: pipeline is draining")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Source enumeration errors
///
/// All of these are fatal: the Source Reader does not retry, because a run
/// that archives a silently truncated file set is worse than one that fails.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Source root directory missing or unreadable
    #[error("source root {path} is not an accessible directory: {reason}", path = .path.display())]
    RootInaccessible {
        /// The configured source root
        path: PathBuf,
        /// Why it could not be opened
        reason: String,
    },

    /// Object listing failed mid-pagination
    #[error("listing s3://{bucket}/{prefix} failed: {reason}")]
    ListingFailed {
        /// Source bucket
        bucket: String,
        /// Source prefix being listed
        prefix: String,
        /// Provider-reported reason
        reason: String,
    },

    /// Input list file could not be read
    #[error("input list {path} could not be read: {reason}", path = .path.display())]
    InputListUnreadable {
        /// Path to the input list file
        path: PathBuf,
        /// Why it could not be read
        reason: String,
    },

    /// HEAD against a listed object failed for a reason other than absence
    #[error("HEAD s3://{bucket}/{key} failed: {reason}")]
    HeadFailed {
        /// Source bucket
        bucket: String,
        /// Object key being probed
        key: String,
        /// Provider-reported reason
        reason: String,
    },
}

/// Archive assembly errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Writing a member record into the TAR stream failed
    #[error("failed to append {member} to {archive}: {reason}")]
    AppendFailed {
        /// Member name being appended
        member: String,
        /// Archive being assembled
        archive: String,
        /// Underlying I/O reason
        reason: String,
    },

    /// Finalizing the TAR stream (end-of-archive blocks, gzip trailer) failed
    #[error("failed to finalize {archive}: {reason}")]
    FinalizeFailed {
        /// Archive being assembled
        archive: String,
        /// Underlying I/O reason
        reason: String,
    },
}

/// Manifest format violations
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A name contains the column delimiter and cannot be represented
    #[error("name {name:?} contains the manifest delimiter '|'")]
    DelimiterInName {
        /// The offending member or source name
        name: String,
    },

    /// A manifest row could not be parsed
    #[error("malformed manifest row {line}: {reason}")]
    MalformedRow {
        /// 1-based line number within the manifest
        line: usize,
        /// What was wrong with the row
        reason: String,
    },

    /// The manifest header row is missing or wrong
    #[error("manifest header mismatch: expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        /// The required header row
        expected: String,
        /// The header row actually present
        found: String,
    },
}

impl Error {
    /// Shorthand for a configuration error without a specific key
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: None,
        }
    }

    /// Shorthand for a configuration error tied to a specific key
    pub fn config_key(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

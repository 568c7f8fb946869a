//! Core types for tarpack

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Where a discovered input item lives
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceLocator {
    /// Absolute path on the local filesystem
    Path(PathBuf),
    /// An object in a bucket
    Object {
        /// Bucket holding the object
        bucket: String,
        /// Full object key
        key: String,
    },
}

impl std::fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceLocator::Path(path) => write!(f, "{}", path.display()),
            SourceLocator::Object { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
        }
    }
}

/// A discovered input item, produced by the Source Reader and consumed by
/// exactly one [`Batch`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Where to read the content from
    pub source: SourceLocator,
    /// The name the file will carry inside the TAR
    pub member_name: String,
    /// Content size in bytes, known before tar assembly
    pub size_bytes: u64,
}

/// An ordered group of input files destined for a single TAR
#[derive(Clone, Debug)]
pub struct Batch {
    /// Dense, monotonically increasing archive ordinal within the run
    pub ordinal: u32,
    /// Member files in archival order
    pub files: Vec<FileRef>,
    /// Sum of member content sizes
    pub total_bytes: u64,
}

/// A finished TAR plus its companion manifest, ready for the sink
///
/// The TAR bytes are the stream exactly as it will be persisted; when gzip is
/// enabled they are the compressed object, while all manifest offsets refer to
/// the uncompressed stream.
#[derive(Clone, Debug)]
pub struct ArchiveArtifact {
    /// `archive_<timestamp>_<ordinal:04>.tar[.gz]`
    pub archive_name: String,
    /// `manifest_<timestamp>_<ordinal:04>.csv`
    pub manifest_name: String,
    /// The archive payload
    pub tar_bytes: Bytes,
    /// The rendered manifest, header row included
    pub manifest_text: String,
    /// Number of members that made it into the archive (= manifest rows)
    pub members_ok: u64,
    /// Number of members of the batch that had to be skipped
    pub members_failed: u64,
    /// Source content bytes successfully archived
    pub payload_bytes: u64,
}

/// Format an archive filename from run timestamp, ordinal and compression flag
pub fn archive_file_name(timestamp: &str, ordinal: u32, compress: bool) -> String {
    let ext = if compress { ".tar.gz" } else { ".tar" };
    format!("archive_{timestamp}_{ordinal:04}{ext}")
}

/// Format a manifest filename from run timestamp and ordinal
pub fn manifest_file_name(timestamp: &str, ordinal: u32) -> String {
    format!("manifest_{timestamp}_{ordinal:04}.csv")
}

/// Run-scoped archive ordinal source
///
/// Guarantees unique, dense ordinals starting at 1. Drawn under the mutex by
/// the Batcher as it emits, so ordinals follow batch emission order even when
/// workers complete out of order.
#[derive(Debug)]
pub struct ArchiveSequence {
    next: Mutex<u32>,
}

impl ArchiveSequence {
    /// Create a sequence whose first ordinal is 1
    pub fn new() -> Self {
        Self { next: Mutex::new(1) }
    }

    /// Draw the next ordinal
    pub async fn next(&self) -> u32 {
        let mut guard = self.next.lock().await;
        let ordinal = *guard;
        *guard += 1;
        ordinal
    }
}

impl Default for ArchiveSequence {
    fn default() -> Self {
        Self::new()
    }
}

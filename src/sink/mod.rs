//! Sink: persist finished artifacts to the destination
//!
//! Workers hand a finished [`ArchiveArtifact`] to the sink synchronously; the
//! sink owns durability (temp-file renames on filesystems, multipart with
//! retry and abort on object stores). Once `store` returns Ok the artifact is
//! durable and the worker may update the run counters.

mod fs;
mod object_store;

pub use fs::FsSink;
pub use object_store::ObjectStoreSink;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ArchiveArtifact;

/// Destination seam between workers and storage
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// The destination-side location of an archive with this name, as it
    /// should appear in the `tarfile_name` manifest column
    fn archive_location(&self, archive_name: &str) -> String;

    /// Persist the TAR and its manifest; Ok means both are durable
    async fn store(&self, artifact: &ArchiveArtifact) -> Result<()>;
}

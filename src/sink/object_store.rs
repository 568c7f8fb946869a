//! Object-store destination

use async_trait::async_trait;
use opendal::Operator;

use super::ArtifactSink;
use crate::config::{RetryConfig, TransferConfig};
use crate::error::{Error, Result};
use crate::retry::retry_with_backoff;
use crate::types::ArchiveArtifact;

/// Uploads artifacts under `<prefix>/archives/` and `<prefix>/manifests/`
///
/// The TAR goes up as a multipart upload with bounded part concurrency; the
/// manifest is small and goes up in a single PUT. Both are wrapped in the
/// retry policy, and a failed multipart upload is aborted so no orphaned
/// parts are left behind.
///
/// Two operators because archives may carry a storage class (Snowball /
/// cold tiers) while manifests stay on the provider default.
pub struct ObjectStoreSink {
    archive_op: Operator,
    manifest_op: Operator,
    prefix: String,
    transfer: TransferConfig,
    retry: RetryConfig,
}

impl ObjectStoreSink {
    /// Build a sink over pre-configured operators; `prefix` may be empty
    pub fn new(
        archive_op: Operator,
        manifest_op: Operator,
        prefix: &str,
        transfer: TransferConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            archive_op,
            manifest_op,
            prefix: crate::source::normalize_prefix(prefix),
            transfer,
            retry,
        }
    }

    fn key_for(&self, kind: &str, name: &str) -> String {
        format!("{}{}/{}", self.prefix, kind, name)
    }

    async fn upload_tar(&self, key: &str, artifact: &ArchiveArtifact) -> Result<()> {
        let mut writer = self
            .archive_op
            .writer_with(key)
            .chunk(self.transfer.part_size)
            .concurrent(self.transfer.max_in_flight_parts)
            .await?;

        if let Err(e) = writer.write(artifact.tar_bytes.clone()).await {
            writer.abort().await.ok();
            return Err(e.into());
        }
        if let Err(e) = writer.close().await {
            writer.abort().await.ok();
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactSink for ObjectStoreSink {
    fn archive_location(&self, archive_name: &str) -> String {
        self.key_for("archives", archive_name)
    }

    async fn store(&self, artifact: &ArchiveArtifact) -> Result<()> {
        let tar_key = self.key_for("archives", &artifact.archive_name);
        let manifest_key = self.key_for("manifests", &artifact.manifest_name);

        retry_with_backoff(&self.retry, || self.upload_tar(&tar_key, artifact)).await?;

        retry_with_backoff(&self.retry, || async {
            self.manifest_op
                .write(&manifest_key, artifact.manifest_text.clone().into_bytes())
                .await
                .map_err(Error::from)
        })
        .await?;

        tracing::debug!(
            archive = tar_key.as_str(),
            manifest = manifest_key.as_str(),
            bytes = artifact.tar_bytes.len(),
            "Artifact uploaded"
        );
        Ok(())
    }
}

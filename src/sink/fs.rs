//! Filesystem destination

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::ArtifactSink;
use crate::error::Result;
use crate::types::ArchiveArtifact;

/// Writes artifacts under `<root>/archives/` and `<root>/manifests/`
///
/// Each file goes to a dot-prefixed `.partial` temp path in its final
/// directory and is renamed into place, so readers never observe a partial
/// file. The rename is per-file; the TAR lands before its manifest.
pub struct FsSink {
    archives_dir: PathBuf,
    manifests_dir: PathBuf,
}

impl FsSink {
    /// Create the destination directories (idempotent) and the sink
    pub async fn create(root: &Path) -> Result<Self> {
        let archives_dir = root.join("archives");
        let manifests_dir = root.join("manifests");
        tokio::fs::create_dir_all(&archives_dir).await?;
        tokio::fs::create_dir_all(&manifests_dir).await?;
        Ok(Self {
            archives_dir,
            manifests_dir,
        })
    }

    async fn write_atomically(dir: &Path, name: &str, content: &[u8]) -> Result<()> {
        let tmp = dir.join(format!(".{name}.partial"));
        let target = dir.join(name);
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &target).await?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactSink for FsSink {
    fn archive_location(&self, archive_name: &str) -> String {
        self.archives_dir.join(archive_name).display().to_string()
    }

    async fn store(&self, artifact: &ArchiveArtifact) -> Result<()> {
        Self::write_atomically(&self.archives_dir, &artifact.archive_name, &artifact.tar_bytes)
            .await?;
        Self::write_atomically(
            &self.manifests_dir,
            &artifact.manifest_name,
            artifact.manifest_text.as_bytes(),
        )
        .await?;
        tracing::debug!(
            archive = artifact.archive_name.as_str(),
            manifest = artifact.manifest_name.as_str(),
            "Artifact written to filesystem"
        );
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn artifact() -> ArchiveArtifact {
        ArchiveArtifact {
            archive_name: "archive_20250110_120000_0001.tar".to_string(),
            manifest_name: "manifest_20250110_120000_0001.csv".to_string(),
            tar_bytes: Bytes::from_static(&[0u8; 1024]),
            manifest_text: format!("{}\n", crate::manifest::HEADER),
            members_ok: 0,
            members_failed: 0,
            payload_bytes: 0,
        }
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        FsSink::create(dir.path()).await.unwrap();
        FsSink::create(dir.path()).await.unwrap();
        assert!(dir.path().join("archives").is_dir());
        assert!(dir.path().join("manifests").is_dir());
    }

    #[tokio::test]
    async fn store_places_both_files_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::create(dir.path()).await.unwrap();
        sink.store(&artifact()).await.unwrap();

        let tar = dir
            .path()
            .join("archives")
            .join("archive_20250110_120000_0001.tar");
        let manifest = dir
            .path()
            .join("manifests")
            .join("manifest_20250110_120000_0001.csv");
        assert_eq!(std::fs::read(&tar).unwrap().len(), 1024);
        assert!(manifest.is_file());

        // no .partial leftovers
        for sub in ["archives", "manifests"] {
            for entry in std::fs::read_dir(dir.path().join(sub)).unwrap() {
                let name = entry.unwrap().file_name().to_string_lossy().into_owned();
                assert!(!name.ends_with(".partial"), "leftover temp file {name}");
            }
        }
    }

    #[tokio::test]
    async fn archive_location_points_into_the_archives_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::create(dir.path()).await.unwrap();
        let location = sink.archive_location("a.tar");
        assert!(location.ends_with("archives/a.tar") || location.ends_with("archives\\a.tar"));
    }
}

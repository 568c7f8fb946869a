//! Filesystem walk source

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::error::{Error, Result, SourceError};
use crate::stats::RunStats;
use crate::types::{FileRef, SourceLocator};

/// Depth-first traversal rooted at `root`, following symlinks (walkdir
/// detects and skips link cycles). Regular files become [`FileRef`]s with
/// member names relative to the root; unreadable entries are skipped with a
/// warning and counted failed.
pub(super) async fn walk(
    root: PathBuf,
    tx: mpsc::Sender<FileRef>,
    cancel: CancellationToken,
    stats: Arc<RunStats>,
) -> Result<()> {
    // The walk is blocking I/O; run it off the async workers and feed the
    // channel through blocking_send so back-pressure still applies.
    tokio::task::spawn_blocking(move || walk_blocking(&root, &tx, &cancel, &stats))
        .await
        .map_err(|e| Error::Other(format!("filesystem walk task panicked: {e}")))?
}

fn walk_blocking(
    root: &Path,
    tx: &mpsc::Sender<FileRef>,
    cancel: &CancellationToken,
    stats: &RunStats,
) -> Result<()> {
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(SourceError::RootInaccessible {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            }
            .into());
        }
        Err(e) => {
            return Err(SourceError::RootInaccessible {
                path: root.to_path_buf(),
                reason: e.to_string(),
            }
            .into());
        }
    }

    for entry in WalkDir::new(root).follow_links(true) {
        if cancel.is_cancelled() {
            tracing::info!("Enumeration cancelled, stopping filesystem walk");
            break;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(
                    path = %e.path().unwrap_or(root).display(),
                    error = %e,
                    "Skipping unreadable entry"
                );
                stats.add_files_failed(1);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let size_bytes = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::warn!(
                    path = %entry.path().display(),
                    error = %e,
                    "Skipping file that cannot be stat'ed"
                );
                stats.add_files_failed(1);
                continue;
            }
        };

        let file = FileRef {
            source: SourceLocator::Path(entry.path().to_path_buf()),
            member_name: member_name_for(root, entry.path()),
            size_bytes,
        };
        if !super::representable(&file, stats) {
            continue;
        }

        // send fails only when the pipeline is winding down
        if tx.blocking_send(file).is_err() {
            break;
        }
    }

    Ok(())
}

/// Member name: path relative to the walk root, '/'-separated
fn member_name_for(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn collect_walk(root: &Path) -> Vec<FileRef> {
        let (tx, mut rx) = mpsc::channel(64);
        let stats = RunStats::new();
        walk_blocking(root, &tx, &CancellationToken::new(), &stats).unwrap();
        drop(tx);
        let mut files = Vec::new();
        while let Ok(file) = rx.try_recv() {
            files.push(file);
        }
        files
    }

    #[test]
    fn walk_discovers_nested_files_with_relative_member_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub/deep")).unwrap();
        std::fs::write(dir.path().join("top.txt"), b"top").unwrap();
        std::fs::write(dir.path().join("sub/deep/leaf.txt"), b"leaf!").unwrap();

        let mut files = collect_walk(dir.path());
        files.sort_by(|a, b| a.member_name.cmp(&b.member_name));

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].member_name, "sub/deep/leaf.txt");
        assert_eq!(files[0].size_bytes, 5);
        assert_eq!(files[1].member_name, "top.txt");
        assert_eq!(files[1].size_bytes, 3);
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        let (tx, _rx) = mpsc::channel(4);
        let result = walk_blocking(&gone, &tx, &CancellationToken::new(), &RunStats::new());
        assert!(matches!(
            result,
            Err(Error::Source(SourceError::RootInaccessible { .. }))
        ));
    }

    #[test]
    fn file_as_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();
        let (tx, _rx) = mpsc::channel(4);
        let result = walk_blocking(&file, &tx, &CancellationToken::new(), &RunStats::new());
        assert!(result.is_err());
    }

    #[test]
    fn cancellation_stops_the_walk_early() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..20 {
            std::fs::write(dir.path().join(format!("f{i}.txt")), b"x").unwrap();
        }
        let (tx, mut rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        cancel.cancel();
        walk_blocking(dir.path(), &tx, &cancel, &RunStats::new()).unwrap();
        drop(tx);
        assert!(rx.try_recv().is_err(), "no files should pass a cancelled walk");
    }
}

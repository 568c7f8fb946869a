//! Explicit input-list source
//!
//! One entry per line, `path` or `path,member_name`; blank lines and `#`
//! comments are ignored. Filesystem mode stats each path; object mode issues
//! a HEAD per key to learn its size. A missing entry is a per-member
//! failure, not a fatal one.

use opendal::Operator;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SourceError};
use crate::stats::RunStats;
use crate::types::{FileRef, SourceLocator};

/// How listed entries are resolved to sizes
pub(super) enum ListMode<'a> {
    /// Entries are local paths; size via stat
    Fs,
    /// Entries are object keys; size via HEAD
    Object {
        /// Operator over the source bucket
        op: &'a Operator,
        /// The source bucket
        bucket: &'a str,
    },
}

pub(super) async fn read_list(
    input_file: &Path,
    mode: ListMode<'_>,
    tx: mpsc::Sender<FileRef>,
    cancel: CancellationToken,
    stats: &RunStats,
) -> Result<()> {
    let text = tokio::fs::read_to_string(input_file).await.map_err(|e| {
        SourceError::InputListUnreadable {
            path: input_file.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    for line in text.lines() {
        if cancel.is_cancelled() {
            tracing::info!("Enumeration cancelled, stopping input list");
            break;
        }

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (target, member_override) = match line.split_once(',') {
            Some((target, member)) => (target.trim(), Some(member.trim())),
            None => (line, None),
        };

        let file = match &mode {
            ListMode::Fs => resolve_fs_entry(target, member_override, stats).await,
            ListMode::Object { op, bucket } => {
                resolve_object_entry(op, bucket, target, member_override, stats).await?
            }
        };

        let Some(file) = file else { continue };
        if !super::representable(&file, stats) {
            continue;
        }
        if tx.send(file).await.is_err() {
            break;
        }
    }

    Ok(())
}

async fn resolve_fs_entry(
    target: &str,
    member_override: Option<&str>,
    stats: &RunStats,
) -> Option<FileRef> {
    let path = PathBuf::from(target);
    let meta = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => {
            tracing::warn!(path = target, "Skipping listed entry: not a regular file");
            stats.add_files_failed(1);
            return None;
        }
        Err(e) => {
            tracing::warn!(path = target, error = %e, "Skipping listed file: not found");
            stats.add_files_failed(1);
            return None;
        }
    };

    Some(FileRef {
        member_name: member_name_or_basename(member_override, target),
        source: SourceLocator::Path(path),
        size_bytes: meta.len(),
    })
}

/// HEAD the key for its size. Absent keys are skipped with a warning; any
/// other HEAD failure is treated as an enumeration failure and aborts.
async fn resolve_object_entry(
    op: &Operator,
    bucket: &str,
    target: &str,
    member_override: Option<&str>,
    stats: &RunStats,
) -> Result<Option<FileRef>> {
    let key = target.trim_start_matches('/').to_string();
    let meta = match op.stat(&key).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == opendal::ErrorKind::NotFound => {
            tracing::warn!(bucket = bucket, key = %key, "Skipping listed object: not found");
            stats.add_files_failed(1);
            return Ok(None);
        }
        Err(e) => {
            return Err(SourceError::HeadFailed {
                bucket: bucket.to_string(),
                key,
                reason: e.to_string(),
            }
            .into());
        }
    };

    Ok(Some(FileRef {
        member_name: member_name_or_basename(member_override, &key),
        source: SourceLocator::Object {
            bucket: bucket.to_string(),
            key,
        },
        size_bytes: meta.content_length(),
    }))
}

/// Explicit override, or the basename of the listed path/key
fn member_name_or_basename(member_override: Option<&str>, target: &str) -> String {
    if let Some(name) = member_override {
        if !name.is_empty() {
            return name.to_string();
        }
    }
    Path::new(target)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| target.to_string())
}

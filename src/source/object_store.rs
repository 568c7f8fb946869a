//! Object-store listing source

use futures::TryStreamExt;
use opendal::Operator;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SourceError};
use crate::stats::RunStats;
use crate::types::{FileRef, SourceLocator};

/// Paginated listing under `bucket/prefix`. Sizes come from the listing
/// entries, so no extra HEAD per object. Any listing failure is fatal.
pub(super) async fn list_objects(
    op: &Operator,
    bucket: &str,
    prefix: &str,
    tx: mpsc::Sender<FileRef>,
    cancel: CancellationToken,
    stats: &RunStats,
) -> Result<()> {
    let list_path = normalize_prefix(prefix);
    let listing_failed = |e: opendal::Error| SourceError::ListingFailed {
        bucket: bucket.to_string(),
        prefix: prefix.to_string(),
        reason: e.to_string(),
    };

    let mut lister = op
        .lister_with(&list_path)
        .recursive(true)
        .await
        .map_err(listing_failed)?;

    while let Some(entry) = lister.try_next().await.map_err(listing_failed)? {
        if cancel.is_cancelled() {
            tracing::info!("Enumeration cancelled, stopping object listing");
            break;
        }

        let meta = entry.metadata();
        if meta.mode().is_dir() {
            continue;
        }
        let key = entry.path().to_string();
        let member_name = key
            .strip_prefix(&list_path)
            .unwrap_or(&key)
            .trim_start_matches('/')
            .to_string();
        if member_name.is_empty() {
            // the prefix placeholder object itself
            continue;
        }

        let file = FileRef {
            source: SourceLocator::Object {
                bucket: bucket.to_string(),
                key,
            },
            member_name,
            size_bytes: meta.content_length(),
        };
        if !super::representable(&file, stats) {
            continue;
        }

        if tx.send(file).await.is_err() {
            break;
        }
    }

    Ok(())
}

/// Normalize a user-supplied prefix into an opendal directory path:
/// no leading slash, one trailing slash, empty for the bucket root.
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

//! Ranged restore: extract one member from an archive without fetching it all
//!
//! Given `(archive, start_bytes, stop_bytes)` from a manifest row, a ranged
//! read of exactly those bytes yields one member's TAR record — header,
//! content and block padding. Terminated with two zero blocks it becomes a
//! valid single-member archive that any stock TAR reader can unpack.
//!
//! The contract only holds for uncompressed archives: manifests record
//! offsets against the uncompressed stream, so members of a `.tar.gz` can
//! only be recovered by fetching and decompressing the whole object.

use opendal::Operator;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{Error, Result};

/// Where the archive lives
#[derive(Clone, Debug)]
pub enum ArchiveLocation {
    /// Local archive file
    Path(PathBuf),
    /// Archive object in a bucket
    Object {
        /// Bucket holding the archive
        bucket: String,
        /// Full object key of the archive
        key: String,
    },
}

impl ArchiveLocation {
    fn name(&self) -> &str {
        match self {
            ArchiveLocation::Path(path) => path.to_str().unwrap_or_default(),
            ArchiveLocation::Object { key, .. } => key,
        }
    }
}

/// One member recovered from a record
#[derive(Clone, Debug)]
pub struct RestoredMember {
    /// Member name as stored in the TAR header
    pub name: String,
    /// Raw member content
    pub content: Vec<u8>,
}

/// Fetch the inclusive byte range `[start, stop]` of an archive
pub async fn fetch_range(
    location: &ArchiveLocation,
    start: u64,
    stop: u64,
    operator: Option<&Operator>,
) -> Result<Vec<u8>> {
    if stop < start {
        return Err(Error::config(format!(
            "invalid range: stop_bytes {stop} precedes start_bytes {start}"
        )));
    }
    if location.name().ends_with(".gz") {
        return Err(Error::config(
            "offsets refer to the uncompressed stream; fetch the whole .tar.gz and decompress it instead",
        ));
    }
    let len = stop - start + 1;
    if len % 512 != 0 {
        tracing::warn!(
            start = start,
            stop = stop,
            "Range length is not a multiple of 512; offsets may not come from a manifest"
        );
    }

    match location {
        ArchiveLocation::Path(path) => {
            let mut file = tokio::fs::File::open(path).await?;
            let size = file.metadata().await?.len();
            if stop >= size {
                return Err(Error::config(format!(
                    "range [{start}, {stop}] exceeds archive size {size}"
                )));
            }
            file.seek(std::io::SeekFrom::Start(start)).await?;
            let mut buf = vec![0u8; len as usize];
            file.read_exact(&mut buf).await?;
            Ok(buf)
        }
        ArchiveLocation::Object { key, .. } => {
            let op = operator
                .ok_or_else(|| Error::config("object-store restore requires an operator"))?;
            let buffer = op.read_with(key).range(start..stop + 1).await?;
            Ok(buffer.to_bytes().to_vec())
        }
    }
}

/// Parse a fetched record into its members with a stock TAR reader
pub fn read_members(record: &[u8]) -> Result<Vec<RestoredMember>> {
    let mut terminated = Vec::with_capacity(record.len() + 1024);
    terminated.extend_from_slice(record);
    // end-of-archive marker so the reader sees a complete stream
    terminated.extend_from_slice(&[0u8; 1024]);

    let mut archive = tar::Archive::new(std::io::Cursor::new(terminated));
    let mut members = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.display().to_string();
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;
        members.push(RestoredMember { name, content });
    }
    Ok(members)
}

/// Fetch a range and unpack its members under `output_dir`, returning the
/// member names. Path traversal in member names is rejected by the TAR
/// reader's sandboxed unpack.
pub async fn restore_to_dir(
    location: &ArchiveLocation,
    start: u64,
    stop: u64,
    output_dir: &Path,
    operator: Option<&Operator>,
) -> Result<Vec<String>> {
    let record = fetch_range(location, start, stop, operator).await?;
    tokio::fs::create_dir_all(output_dir).await?;

    let output_dir = output_dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut terminated = record;
        terminated.extend_from_slice(&[0u8; 1024]);
        let mut archive = tar::Archive::new(std::io::Cursor::new(terminated));
        let mut names = Vec::new();
        for entry in archive.entries()? {
            let mut entry = entry?;
            let name = entry.path()?.display().to_string();
            entry.unpack_in(&output_dir)?;
            names.push(name);
        }
        Ok::<_, Error>(names)
    })
    .await
    .map_err(|e| Error::Other(format!("restore task panicked: {e}")))?
}

//! Manifest rows: the byte-range sidecar for each archive
//!
//! One row per archived member, `|`-separated, `\n`-terminated, no quoting:
//!
//! ```text
//! tarfile_name|original_file_name|current_date|filesize|start_bytes|stop_bytes|md5
//! out/archives/archive_20250110_120000_0001.tar|/data/a.txt|2025-01-10|11|0|1023|5eb63bbbe01eeed093cb22bb8f5acdc3
//! ```
//!
//! `start_bytes` is where the member's TAR record begins (header first);
//! `stop_bytes` is the record's last byte including block padding, so
//! `stop - start + 1` is always a multiple of 512 and a ranged read of
//! `[start, stop]` yields a valid single-member TAR substream.

use chrono::NaiveDate;

use crate::error::ManifestError;

/// The column delimiter; member and source names must not contain it
pub const DELIMITER: char = '|';

/// The required header row (line 1 of every manifest)
pub const HEADER: &str = "tarfile_name|original_file_name|current_date|filesize|start_bytes|stop_bytes|md5";

/// One row of a manifest
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Location of the archive the member lives in (path or object key)
    pub tar_location: String,
    /// The member's original source (path or object URL)
    pub original_name: String,
    /// Date the member was archived
    pub date: NaiveDate,
    /// Content size in bytes (not the TAR record size)
    pub size_bytes: u64,
    /// First byte of the member's TAR record within the archive
    pub start_bytes: u64,
    /// Last byte of the member's TAR record, padding included
    pub stop_bytes: u64,
    /// MD5 of the raw content
    pub md5_hex: String,
}

impl ManifestEntry {
    /// Render the row, without the line terminator
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.tar_location,
            self.original_name,
            self.date.format("%Y-%m-%d"),
            self.size_bytes,
            self.start_bytes,
            self.stop_bytes,
            self.md5_hex,
        )
    }

    /// Parse one data row
    pub fn parse(line: &str, line_no: usize) -> Result<Self, ManifestError> {
        let fields: Vec<&str> = line.split(DELIMITER).collect();
        if fields.len() != 7 {
            return Err(ManifestError::MalformedRow {
                line: line_no,
                reason: format!("expected 7 fields, found {}", fields.len()),
            });
        }

        let date = NaiveDate::parse_from_str(fields[2], "%Y-%m-%d").map_err(|e| {
            ManifestError::MalformedRow {
                line: line_no,
                reason: format!("bad date {:?}: {e}", fields[2]),
            }
        })?;

        let parse_u64 = |field: &str, what: &str| {
            field.parse::<u64>().map_err(|e| ManifestError::MalformedRow {
                line: line_no,
                reason: format!("bad {what} {field:?}: {e}"),
            })
        };

        Ok(Self {
            tar_location: fields[0].to_string(),
            original_name: fields[1].to_string(),
            date,
            size_bytes: parse_u64(fields[3], "filesize")?,
            start_bytes: parse_u64(fields[4], "start_bytes")?,
            stop_bytes: parse_u64(fields[5], "stop_bytes")?,
            md5_hex: fields[6].to_string(),
        })
    }
}

/// Reject names that cannot be represented in a row
pub fn validate_name(name: &str) -> Result<(), ManifestError> {
    if name.contains(DELIMITER) {
        return Err(ManifestError::DelimiterInName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Render a complete manifest: header row plus one line per entry
pub fn render(entries: &[ManifestEntry]) -> String {
    let mut out = String::with_capacity((entries.len() + 1) * 96);
    out.push_str(HEADER);
    out.push('\n');
    for entry in entries {
        out.push_str(&entry.to_line());
        out.push('\n');
    }
    out
}

/// Parse a complete manifest back into entries, verifying the header row
pub fn parse(text: &str) -> Result<Vec<ManifestEntry>, ManifestError> {
    let mut lines = text.lines();
    let header = lines.next().unwrap_or_default();
    if header != HEADER {
        return Err(ManifestError::HeaderMismatch {
            expected: HEADER.to_string(),
            found: header.to_string(),
        });
    }

    let mut entries = Vec::new();
    for (idx, line) in lines.enumerate() {
        if line.is_empty() {
            continue;
        }
        entries.push(ManifestEntry::parse(line, idx + 2)?);
    }
    Ok(entries)
}

//! Utility functions shared by the pipeline and the CLI front ends

use humansize::{FileSize, file_size_opts as options};
use std::time::Duration;

/// Parse a human-readable size string into bytes
///
/// Accepts bare byte counts (`1048576`) and binary-unit suffixes with an
/// optional fractional part (`100MB`, `2.5G`, `1TB`). Unit letters are
/// case-insensitive; `K`/`KB`, `M`/`MB`, `G`/`GB` and `T`/`TB` are synonyms.
pub fn parse_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim().to_uppercase();
    if trimmed.is_empty() {
        return Err("size is empty".to_string());
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed
            .parse::<u64>()
            .map_err(|e| format!("invalid size number {trimmed:?}: {e}"));
    }

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .ok_or_else(|| format!("invalid size format {input:?}"))?;
    let (number, unit) = trimmed.split_at(split);
    let number: f64 = number
        .parse()
        .map_err(|e| format!("invalid size number {number:?}: {e}"))?;

    let multiplier: u64 = match unit.trim() {
        "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        "T" | "TB" => 1024u64.pow(4),
        other => {
            return Err(format!(
                "invalid size unit {other:?}: expected one of B, KB, MB, GB, TB"
            ));
        }
    };

    Ok((number * multiplier as f64) as u64)
}

/// Format a byte count for humans (binary units)
pub fn format_size(bytes: u64) -> String {
    bytes
        .file_size(options::BINARY)
        .unwrap_or_else(|_| format!("{bytes} B"))
}

/// Format a duration as `1h 2m 3s`, omitting leading zero components
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 || hours > 0 {
        parts.push(format!("{minutes}m"));
    }
    parts.push(format!("{seconds}s"));
    parts.join(" ")
}

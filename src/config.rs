//! Configuration types for tarpack

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Where the run reads its inputs from (exactly one mode per run)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSpec {
    /// Depth-first walk of a local directory tree
    FsWalk {
        /// Root of the traversal; member names are relative to it
        root: PathBuf,
    },
    /// Paginated object listing under a bucket/prefix
    ObjectListing {
        /// Source bucket
        bucket: String,
        /// Key prefix; stripped from member names, empty lists the whole bucket
        prefix: String,
    },
    /// Explicit list of local paths, one `path[,member_name]` per line
    FsList {
        /// The list file
        input_file: PathBuf,
    },
    /// Explicit list of object keys, one `key[,member_name]` per line
    ObjectList {
        /// The list file
        input_file: PathBuf,
        /// Bucket the listed keys live in
        bucket: String,
    },
}

impl SourceSpec {
    /// Bucket this source reads from, if it is an object-store source
    pub fn bucket(&self) -> Option<&str> {
        match self {
            SourceSpec::ObjectListing { bucket, .. } | SourceSpec::ObjectList { bucket, .. } => {
                Some(bucket)
            }
            _ => None,
        }
    }

    /// Human-readable description for logs and the run report
    pub fn describe(&self) -> String {
        match self {
            SourceSpec::FsWalk { root } => format!("fs:{}", root.display()),
            SourceSpec::ObjectListing { bucket, prefix } => format!("s3://{bucket}/{prefix}"),
            SourceSpec::FsList { input_file } => format!("list:{}", input_file.display()),
            SourceSpec::ObjectList { input_file, bucket } => {
                format!("list:{} (s3://{bucket})", input_file.display())
            }
        }
    }
}

/// Where archives and manifests are written
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationSpec {
    /// Local directory; `archives/` and `manifests/` are created beneath it
    Fs {
        /// Destination root directory
        root: PathBuf,
    },
    /// Object store; keys are `<prefix>/archives/...` and `<prefix>/manifests/...`
    ObjectStore {
        /// Destination bucket
        bucket: String,
        /// Key prefix, may be empty
        prefix: String,
    },
}

impl DestinationSpec {
    /// Human-readable description for logs and the run report
    pub fn describe(&self) -> String {
        match self {
            DestinationSpec::Fs { root } => format!("fs:{}", root.display()),
            DestinationSpec::ObjectStore { bucket, prefix } => format!("s3://{bucket}/{prefix}"),
        }
    }
}

/// Batching policy — exactly one threshold is active per run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Close the open batch when it holds `max_files` members
    Count {
        /// Maximum members per archive
        max_files: u64,
    },
    /// Close the open batch when adding a member would push it past `max_bytes`
    Size {
        /// Maximum payload bytes per archive
        max_bytes: u64,
    },
}

impl BatchPolicy {
    /// Would appending a member of `incoming_bytes` to an open batch of
    /// `count` members totalling `batch_bytes` cross the active threshold?
    pub fn would_exceed(&self, count: usize, batch_bytes: u64, incoming_bytes: u64) -> bool {
        match self {
            BatchPolicy::Count { max_files } => count as u64 + 1 > *max_files,
            BatchPolicy::Size { max_bytes } => batch_bytes + incoming_bytes > *max_bytes,
        }
    }

    /// Human-readable description for logs and the run report
    pub fn describe(&self) -> String {
        match self {
            BatchPolicy::Count { max_files } => {
                format!("count (max {max_files} files per archive)")
            }
            BatchPolicy::Size { max_bytes } => {
                format!(
                    "size (max {} per archive)",
                    crate::utils::format_size(*max_bytes)
                )
            }
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Object-store transfer tuning (multipart sizing, HTTP timeouts)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Multipart part size in bytes (default: 16 MiB)
    #[serde(default = "default_part_size")]
    pub part_size: usize,

    /// Parts in flight per upload (default: 10)
    #[serde(default = "default_max_in_flight_parts")]
    pub max_in_flight_parts: usize,

    /// TCP connect timeout for every network call (default: 5 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Per-operation read timeout (default: 60 seconds)
    #[serde(default = "default_read_timeout", with = "duration_serde")]
    pub read_timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            part_size: default_part_size(),
            max_in_flight_parts: default_max_in_flight_parts(),
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
        }
    }
}

/// Credentials and addressing for object-store endpoints
///
/// Credentials themselves come from the provider's default chain (environment,
/// profile files, instance metadata); `--profile-name` selects a profile from
/// that chain via `AWS_PROFILE`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct S3Options {
    /// Region for bucket access
    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint URL (Snowball appliances, S3-compatible stores)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Storage class applied to archive uploads (manifests always use the
    /// provider default so they stay cheap to read)
    #[serde(default)]
    pub storage_class: Option<String>,
}

/// Main configuration for an archival run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Input enumeration mode
    pub source: SourceSpec,

    /// Output destination
    pub destination: DestinationSpec,

    /// Batching policy and its threshold
    pub policy: BatchPolicy,

    /// Number of concurrent archiver workers (default: 4)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Gzip-compress archives (default: false)
    ///
    /// Offsets in manifests always refer to the uncompressed TAR stream, so
    /// ranged restore of a compressed archive requires fetching the whole
    /// object.
    #[serde(default)]
    pub compress: bool,

    /// Retry behavior for transient storage failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Multipart sizing and network timeouts
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Object-store addressing options
    #[serde(default)]
    pub s3: S3Options,
}

impl Config {
    /// Validate the configuration, returning the first fatal problem found
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::config_key(
                "worker count must be at least 1",
                "max-process",
            ));
        }
        match &self.policy {
            BatchPolicy::Count { max_files } if *max_files == 0 => {
                return Err(Error::config_key(
                    "file-count threshold must be at least 1",
                    "max-file-number",
                ));
            }
            BatchPolicy::Size { max_bytes } if *max_bytes == 0 => {
                return Err(Error::config_key(
                    "size threshold must be at least 1 byte",
                    "max-tarfile-size",
                ));
            }
            _ => {}
        }
        if let Some(bucket) = self.source.bucket() {
            if bucket.is_empty() {
                return Err(Error::config_key("source bucket is empty", "src-bucket"));
            }
        }
        if let DestinationSpec::ObjectStore { bucket, .. } = &self.destination {
            if bucket.is_empty() {
                return Err(Error::config_key(
                    "destination bucket is empty",
                    "dst-bucket",
                ));
            }
        }
        if self.transfer.part_size < 5 * 1024 * 1024 {
            return Err(Error::config_key(
                "multipart part size must be at least 5 MiB",
                "part-size",
            ));
        }
        if self.transfer.max_in_flight_parts == 0 {
            return Err(Error::config_key(
                "at least one part must be in flight",
                "max-in-flight-parts",
            ));
        }
        Ok(())
    }

    /// Does any stage of this run talk to an object store?
    pub fn uses_object_store(&self) -> bool {
        self.source.bucket().is_some()
            || matches!(self.destination, DestinationSpec::ObjectStore { .. })
    }
}

fn default_workers() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_part_size() -> usize {
    16 * 1024 * 1024
}

fn default_max_in_flight_parts() -> usize {
    10
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Serialize durations as integer seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

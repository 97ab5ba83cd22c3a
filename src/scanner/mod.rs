//! Scanner module for file discovery, physical identity and content digests.
//!
//! This module provides functionality for:
//! - Directory walking with suffix-based ignore rules
//! - Collapsing pre-existing hardlinks to one record per storage object
//! - Streaming content digests (CRC-32, MD5, SHA-256, SHA-512)
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hardlink`]: Physical identity and the hardlink canonicalizer
//! - [`hasher`]: Digest algorithms and hex validation
//!
//! # Example
//!
//! ```no_run
//! use dupelink::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     recursive: true,
//!     ..Default::default()
//! };
//!
//! let discovery = Walker::new(Path::new("."), config).walk().unwrap();
//! for file in &discovery.files {
//!     println!("{}: {} bytes", file.relative_path, file.size);
//! }
//! ```

pub mod hardlink;
pub mod hasher;
pub mod walker;

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

pub use hardlink::{canonicalize, PhysicalId};
pub use hasher::{Algorithm, Hasher};
pub use walker::{Discovery, Walker};

/// File name of the persistent hash cache artifact.
pub const CACHE_FILE_NAME: &str = "duplicates.hashes.csv";

/// File name of the run log artifact.
pub const LOG_FILE_NAME: &str = "duplicates.log";

/// Ignore-list token that excludes symbolic links and other reparse points.
pub const SYMLINK_TOKEN: &str = "symlink";

/// One discovered regular file under the scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path used for all I/O
    pub full_path: PathBuf,
    /// Root-relative path with `/` separators, used as the cache key component
    pub relative_path: String,
    /// File size in bytes
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch
    pub modified: u64,
    /// Underlying storage object, if the platform exposes one
    pub physical_id: Option<PhysicalId>,
}

impl FileRecord {
    /// Create a record without physical identity.
    #[must_use]
    pub fn new(full_path: PathBuf, relative_path: impl Into<String>, size: u64, modified: u64) -> Self {
        Self {
            full_path,
            relative_path: relative_path.into(),
            size,
            modified,
            physical_id: None,
        }
    }

    /// Build a record from the metadata of a file below `root`.
    #[must_use]
    pub fn from_metadata(root: &Path, full_path: PathBuf, metadata: &Metadata) -> Self {
        let relative_path = relative_key(root, &full_path);
        Self {
            relative_path,
            size: metadata.len(),
            modified: modified_nanos(metadata),
            physical_id: PhysicalId::of(&full_path, metadata),
            full_path,
        }
    }

    /// Final path component, lossily converted.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Modification time of `metadata` in nanoseconds since the epoch.
///
/// Times before the epoch, or platforms without mtime, map to 0.
#[must_use]
pub fn modified_nanos(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

/// Root-relative cache key for `path`, always `/`-separated.
#[must_use]
pub fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let key = relative.to_string_lossy();
    if cfg!(windows) {
        key.replace('\\', "/")
    } else {
        key.into_owned()
    }
}

/// Ignore rules applied during discovery.
///
/// Entries are file-name suffixes (`.lnk`, `.tmp`, `duplicates.log`), not globs.
/// The special entry `symlink` excludes symbolic links and reparse points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRules {
    suffixes: Vec<String>,
    skip_symlinks: bool,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::parse("symlink,.lnk,.url")
    }
}

impl IgnoreRules {
    /// Parse a comma-separated ignore list.
    ///
    /// The cache and log artifact names are always added so that a run never
    /// picks up its own output.
    ///
    /// # Example
    ///
    /// ```
    /// use dupelink::scanner::IgnoreRules;
    ///
    /// let rules = IgnoreRules::parse(".tmp, symlink");
    /// assert!(rules.skips_symlinks());
    /// assert!(rules.is_ignored_name("scratch.tmp"));
    /// assert!(rules.is_ignored_name("duplicates.log"));
    /// assert!(!rules.is_ignored_name("photo.jpg"));
    /// ```
    #[must_use]
    pub fn parse(list: &str) -> Self {
        let mut suffixes = Vec::new();
        let mut skip_symlinks = false;

        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if item.eq_ignore_ascii_case(SYMLINK_TOKEN) {
                skip_symlinks = true;
            } else {
                suffixes.push(item.to_string());
            }
        }

        for artifact in [CACHE_FILE_NAME, LOG_FILE_NAME] {
            if !suffixes.iter().any(|s| s == artifact) {
                suffixes.push(artifact.to_string());
            }
        }

        Self {
            suffixes,
            skip_symlinks,
        }
    }

    /// Whether symbolic links are excluded.
    #[must_use]
    pub fn skips_symlinks(&self) -> bool {
        self.skip_symlinks
    }

    /// Whether a file name ends with one of the ignored suffixes.
    #[must_use]
    pub fn is_ignored_name(&self, name: &str) -> bool {
        self.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }

    /// Configured suffixes, artifact names included.
    #[must_use]
    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Descend into subdirectories; otherwise only the root's direct children.
    pub recursive: bool,

    /// Suffix and symlink exclusion rules.
    pub ignore: IgnoreRules,
}

impl WalkerConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(recursive: bool, ignore: IgnoreRules) -> Self {
        Self { recursive, ignore }
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A hashing error surfaced during the scan.
    #[error(transparent)]
    HashError(#[from] HashError),
}

impl ScanError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: Arc::new(error),
            },
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug, Clone)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The algorithm does not read file content.
    #[error("{0} does not produce a content digest")]
    NotADigest(Algorithm),

    /// Hashing stopped because shutdown was requested.
    #[error("Hashing interrupted: {0}")]
    Interrupted(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl HashError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: Arc::new(error),
            },
        }
    }
}

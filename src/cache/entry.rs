//! Cache entry definitions and row validation.

use std::path::{Component, Path};

use crate::scanner::{Algorithm, FileRecord};

/// Field separator of the cache file.
pub const FIELD_SEPARATOR: u8 = b';';

/// Header row of the cache file.
pub const HEADER: [&str; 5] = ["path", "size", "time", "type", "hash"];

/// Content identity of a file: a hash is reusable only on an exact match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Root-relative path, `/`-separated
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Modification time in nanoseconds since the epoch
    pub modified: u64,
    /// Algorithm that produced the hash
    pub algorithm: Algorithm,
}

impl CacheKey {
    /// Build the key for a discovered file.
    #[must_use]
    pub fn for_record(record: &FileRecord, algorithm: Algorithm) -> Self {
        Self {
            path: record.relative_path.clone(),
            size: record.size,
            modified: record.modified,
            algorithm,
        }
    }
}

/// Persisted fact "this key had this hash".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Lookup key
    pub key: CacheKey,
    /// Hex digest, lowercase
    pub hash: String,
}

/// Why a persisted row was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRejection {
    /// Wrong number of fields (truncated or separator inside a field)
    FieldCount,
    /// Empty, absolute or escaping path
    BadPath,
    /// Size is not a non-negative integer
    BadSize,
    /// Time is not a non-negative integer
    BadTime,
    /// Unknown algorithm tag
    BadAlgorithm,
    /// Hash is not hex of the algorithm's length
    BadHash,
    /// The referenced file no longer exists under the root
    Missing,
}

impl CacheEntry {
    /// Create an entry; the hash is normalized to lowercase.
    #[must_use]
    pub fn new(key: CacheKey, hash: impl Into<String>) -> Self {
        Self {
            key,
            hash: hash.into().to_ascii_lowercase(),
        }
    }

    /// Fields in file order: path, size, time, type, hash.
    #[must_use]
    pub fn fields(&self) -> [String; 5] {
        [
            self.key.path.clone(),
            self.key.size.to_string(),
            self.key.modified.to_string(),
            self.key.algorithm.tag().to_string(),
            self.hash.clone(),
        ]
    }

    /// Parse one row without touching the filesystem.
    ///
    /// `prefix` rebases the stored path, for rows adopted from a cache file
    /// written by a run rooted in a subdirectory.
    ///
    /// # Errors
    ///
    /// Returns the first syntactic problem found.
    pub fn parse(fields: &[&str], prefix: &str) -> Result<Self, RowRejection> {
        let [path, size, time, tag, hash] = fields else {
            return Err(RowRejection::FieldCount);
        };

        if !is_safe_relative(path) {
            return Err(RowRejection::BadPath);
        }
        let size: u64 = size.trim().parse().map_err(|_| RowRejection::BadSize)?;
        let modified: u64 = time.trim().parse().map_err(|_| RowRejection::BadTime)?;
        let algorithm: Algorithm = tag.trim().parse().map_err(|_| RowRejection::BadAlgorithm)?;
        let hash = hash.trim();
        if !algorithm.is_valid_hash(hash) {
            return Err(RowRejection::BadHash);
        }

        let path = if prefix.is_empty() {
            (*path).to_string()
        } else {
            format!("{prefix}/{path}")
        };

        Ok(Self::new(
            CacheKey {
                path,
                size,
                modified,
                algorithm,
            },
            hash,
        ))
    }

    /// Parse a row and check that the referenced file exists under `root`.
    ///
    /// # Errors
    ///
    /// See [`CacheEntry::parse`]; additionally [`RowRejection::Missing`].
    pub fn validate(fields: &[&str], prefix: &str, root: &Path) -> Result<Self, RowRejection> {
        let entry = Self::parse(fields, prefix)?;
        if root.join(&entry.key.path).is_file() {
            Ok(entry)
        } else {
            Err(RowRejection::Missing)
        }
    }
}

/// Relative, non-empty, and free of `..`/root components.
fn is_safe_relative(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

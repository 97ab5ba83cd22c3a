//! Content keys, size pre-grouping and duplicate groups.
//!
//! # Overview
//!
//! Size grouping runs before any hashing: a file whose size is unique in the
//! candidate set cannot share content with another file, so it is dropped
//! without being read. Files that survive are keyed ([`ContentKey`]) and
//! partitioned by [`group_by_key`].
//!
//! Both functions keep the enumeration order of their input. Groups come out
//! in order of their first member, and members keep their relative order,
//! which the `first`/`last` keep policies rely on.
//!
//! # Example
//!
//! ```
//! use dupelink::duplicates::{group_by_key, group_by_size, ContentKey};
//! use dupelink::scanner::FileRecord;
//! use std::path::PathBuf;
//!
//! let files = vec![
//!     FileRecord::new(PathBuf::from("/r/a.txt"), "a.txt", 100, 1),
//!     FileRecord::new(PathBuf::from("/r/b.txt"), "b.txt", 100, 2),
//!     FileRecord::new(PathBuf::from("/r/c.txt"), "c.txt", 200, 3),
//! ];
//!
//! let (candidates, stats) = group_by_size(files);
//! assert_eq!(candidates.len(), 2);
//! assert_eq!(stats.eliminated_unique, 1);
//!
//! let groups = group_by_key(candidates.into_iter().map(|f| {
//!     let key = ContentKey::Size(f.size);
//!     (f, key)
//! }));
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].len(), 2);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::scanner::{Algorithm, FileRecord};

/// Grouping value of a file under the active algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentKey {
    /// File name (`name` algorithm)
    Name(String),
    /// Size in bytes (`size` algorithm)
    Size(u64),
    /// Lowercase hex digest
    Digest(String),
}

impl ContentKey {
    /// Key that needs no file content, `None` for digest algorithms.
    #[must_use]
    pub fn from_metadata(record: &FileRecord, algorithm: Algorithm) -> Option<Self> {
        match algorithm {
            Algorithm::Name => Some(Self::Name(record.file_name())),
            Algorithm::Size => Some(Self::Size(record.size)),
            _ => None,
        }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Size(size) => write!(f, "{size} bytes"),
            Self::Digest(hex) => f.write_str(hex),
        }
    }
}

/// Files sharing one content key; always two or more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// Shared key
    pub key: ContentKey,
    /// Members in enumeration order
    pub files: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Create a group.
    #[must_use]
    pub fn new(key: ContentKey, files: Vec<FileRecord>) -> Self {
        Self { key, files }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Bytes held by all members but one.
    ///
    /// Under `name` grouping members may differ in size; the smallest member
    /// is assumed to survive.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        let total: u64 = self.files.iter().map(|f| f.size).sum();
        let smallest = self.files.iter().map(|f| f.size).min().unwrap_or(0);
        total - smallest
    }

    /// Absolute paths of all members.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.full_path.clone()).collect()
    }
}

/// Statistics from size pre-grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Files examined
    pub total_files: usize,
    /// Distinct sizes seen
    pub unique_sizes: usize,
    /// Files dropped because nobody shares their size
    pub eliminated_unique: usize,
    /// Files kept as hashing candidates
    pub potential_duplicates: usize,
}

impl GroupingStats {
    /// Percentage of files eliminated without hashing.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            self.eliminated_unique as f64 / self.total_files as f64 * 100.0
        }
    }
}

/// Drop every file whose size occurs only once.
///
/// Survivors are returned in input order.
#[must_use]
pub fn group_by_size(
    files: impl IntoIterator<Item = FileRecord>,
) -> (Vec<FileRecord>, GroupingStats) {
    let files: Vec<FileRecord> = files.into_iter().collect();
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for file in &files {
        *counts.entry(file.size).or_default() += 1;
    }

    let mut stats = GroupingStats {
        total_files: files.len(),
        unique_sizes: counts.len(),
        ..GroupingStats::default()
    };

    let candidates: Vec<FileRecord> = files
        .into_iter()
        .filter(|file| {
            if counts.get(&file.size).copied().unwrap_or(0) > 1 {
                true
            } else {
                log::trace!("Unique size {}: {}", file.size, file.relative_path);
                false
            }
        })
        .collect();

    stats.potential_duplicates = candidates.len();
    stats.eliminated_unique = stats.total_files - candidates.len();

    log::debug!(
        "Size pre-grouping: {} files -> {} candidates ({:.1}% eliminated)",
        stats.total_files,
        stats.potential_duplicates,
        stats.elimination_rate()
    );

    (candidates, stats)
}

/// Partition keyed files into groups of two or more.
///
/// Groups are ordered by their first member; members keep input order.
#[must_use]
pub fn group_by_key(
    keyed: impl IntoIterator<Item = (FileRecord, ContentKey)>,
) -> Vec<DuplicateGroup> {
    let mut index: HashMap<ContentKey, usize> = HashMap::new();
    let mut groups: Vec<DuplicateGroup> = Vec::new();

    for (file, key) in keyed {
        match index.get(&key) {
            Some(&slot) => groups[slot].files.push(file),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(DuplicateGroup::new(key, vec![file]));
            }
        }
    }

    groups.retain(|group| group.len() > 1);
    groups
}

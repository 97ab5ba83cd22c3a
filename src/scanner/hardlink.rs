//! Hardlink canonicalization.
//!
//! # Overview
//!
//! Hardlinks are multiple directory entries pointing to the same storage
//! object. They share content but are NOT duplicates: relinking them would
//! destroy an existing link relationship and double-count reclaimable space.
//! [`canonicalize`] keeps the first path seen for each [`PhysicalId`] and drops
//! the rest.
//!
//! # Platform Support
//!
//! - **Unix**: (device id, inode) pairs from file metadata
//! - **Windows**: (volume serial number, file index) from an open handle
//! - **Other**: no physical identity; every file is retained
//!
//! # Example
//!
//! ```
//! use dupelink::scanner::{canonicalize, FileRecord};
//! use std::path::PathBuf;
//!
//! let files = vec![
//!     FileRecord::new(PathBuf::from("/r/a"), "a", 10, 1),
//!     FileRecord::new(PathBuf::from("/r/b"), "b", 10, 1),
//! ];
//! let (kept, dropped) = canonicalize(files);
//! assert_eq!(kept.len(), 2); // no identity known, nothing collapsed
//! assert_eq!(dropped, 0);
//! ```

use std::collections::HashSet;
use std::fs::Metadata;
use std::path::Path;

use super::FileRecord;

/// Identifier of the storage object behind a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicalId {
    /// Device (volume) the object lives on
    pub device: u64,
    /// Object index on that device
    pub index: u64,
}

impl PhysicalId {
    /// Create an identifier from raw parts.
    #[must_use]
    pub const fn new(device: u64, index: u64) -> Self {
        Self { device, index }
    }

    /// Physical identity of the file at `path`.
    ///
    /// Returns `None` where the platform does not expose it, where the
    /// reported index is zero (some network and FUSE filesystems), or where
    /// the file cannot be opened to ask.
    #[cfg(unix)]
    #[must_use]
    pub fn of(_path: &Path, metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        match metadata.ino() {
            0 => None,
            ino => Some(Self::new(metadata.dev(), ino)),
        }
    }

    /// Volume serial number and file index from an open handle.
    #[cfg(windows)]
    #[must_use]
    pub fn of(path: &Path, _metadata: &Metadata) -> Option<Self> {
        let file = std::fs::File::open(path).ok()?;
        let info = winapi_util::file::information(&file).ok()?;
        match info.file_index() {
            0 => None,
            index => Some(Self::new(info.volume_serial_number(), index)),
        }
    }

    #[cfg(not(any(unix, windows)))]
    #[must_use]
    pub fn of(_path: &Path, _metadata: &Metadata) -> Option<Self> {
        None
    }

    /// Whether this platform can report physical identity at all.
    #[must_use]
    pub const fn is_supported() -> bool {
        cfg!(any(unix, windows))
    }
}

/// Tracks seen physical ids during canonicalization.
#[derive(Debug, Default)]
pub struct HardlinkTracker {
    seen: HashSet<PhysicalId>,
}

impl HardlinkTracker {
    /// Create a new tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Returns `true` if `id` was seen before; records it otherwise.
    ///
    /// Unknown identities are never reported as links.
    pub fn is_hardlink(&mut self, id: Option<PhysicalId>) -> bool {
        match id {
            Some(id) => !self.seen.insert(id),
            None => false,
        }
    }

    /// Number of distinct physical ids recorded.
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

/// Collapse paths sharing a physical id to the first one encountered.
///
/// Records without a physical id are always retained. Returns the surviving
/// records in their original order and the number dropped.
#[must_use]
pub fn canonicalize(files: Vec<FileRecord>) -> (Vec<FileRecord>, usize) {
    let mut tracker = HardlinkTracker::with_capacity(files.len());
    let before = files.len();

    let kept: Vec<FileRecord> = files
        .into_iter()
        .filter(|file| {
            if tracker.is_hardlink(file.physical_id) {
                log::debug!("Skipping hardlink: {}", file.full_path.display());
                false
            } else {
                true
            }
        })
        .collect();

    let dropped = before - kept.len();
    (kept, dropped)
}

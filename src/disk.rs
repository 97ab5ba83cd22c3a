//! Free-space snapshots of the disk holding the scan root.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use bytesize::ByteSize;
use sysinfo::Disks;

const GIB: f64 = 1_073_741_824.0;

/// Free and total bytes of one disk at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSnapshot {
    /// Bytes available to the current user
    pub available: u64,
    /// Capacity in bytes
    pub total: u64,
}

impl DiskSnapshot {
    /// Take a snapshot of the disk whose mount point is the longest prefix
    /// of `path`. Returns `None` when no disk matches.
    #[must_use]
    pub fn probe(path: &Path) -> Option<Self> {
        let disks = Disks::new_with_refreshed_list();
        let path = strip_verbatim(path);
        disks
            .list()
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().components().count())
            .map(|disk| Self {
                available: disk.available_space(),
                total: disk.total_space(),
            })
    }

    /// Available space as a percentage of capacity.
    #[must_use]
    pub fn available_percent(&self) -> f64 {
        percent(self.available, self.total)
    }
}

impl fmt::Display for DiskSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} free of {} ({:.1}%)",
            ByteSize::b(self.available),
            ByteSize::b(self.total),
            self.available_percent()
        )
    }
}

/// Render an optional snapshot, `Unknown` when unavailable.
#[must_use]
pub fn describe(snapshot: Option<DiskSnapshot>) -> String {
    snapshot.map_or_else(|| "Unknown".to_string(), |s| s.to_string())
}

/// Space released between two snapshots of the same disk.
///
/// Returns `None` if either snapshot is missing. A decrease in free space
/// (other writers on the disk) counts as zero.
#[must_use]
pub fn space_freed(before: Option<DiskSnapshot>, after: Option<DiskSnapshot>) -> Option<String> {
    let (before, after) = (before?, after?);
    let freed = after.available.saturating_sub(before.available);
    Some(format!(
        "{:.2} GB ({:.2}%)",
        freed as f64 / GIB,
        percent(freed, before.total)
    ))
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Drop a Windows `\\?\` prefix so the path compares against mount points.
fn strip_verbatim(path: &Path) -> PathBuf {
    match path.components().next() {
        Some(Component::Prefix(prefix)) if prefix.kind().is_verbatim() => {
            let text = path.to_string_lossy();
            PathBuf::from(text.trim_start_matches(r"\\?\"))
        }
        _ => path.to_path_buf(),
    }
}

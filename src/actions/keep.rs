//! Survivor selection.
//!
//! [`order_group`] sorts a group so that its first member is the one to
//! keep. The sort is stable: members that compare equal under the policy
//! stay in enumeration order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scanner::FileRecord;

/// Which member of a duplicate group survives.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum KeepPolicy {
    /// Newest modification time
    Latest,
    /// Oldest modification time
    Oldest,
    /// Shortest absolute path (closest to the root)
    Highest,
    /// Longest absolute path
    Deepest,
    /// First in enumeration order
    First,
    /// Last in enumeration order
    Last,
}

impl fmt::Display for KeepPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Latest => "latest",
            Self::Oldest => "oldest",
            Self::Highest => "highest",
            Self::Deepest => "deepest",
            Self::First => "first",
            Self::Last => "last",
        })
    }
}

fn path_len(file: &FileRecord) -> usize {
    file.full_path.as_os_str().len()
}

/// Order `files` so that `files[0]` is the survivor under `policy`.
///
/// # Example
///
/// ```
/// use dupelink::actions::{order_group, KeepPolicy};
/// use dupelink::scanner::FileRecord;
/// use std::path::PathBuf;
///
/// let mut files = vec![
///     FileRecord::new(PathBuf::from("/r/old.txt"), "old.txt", 1, 100),
///     FileRecord::new(PathBuf::from("/r/new.txt"), "new.txt", 1, 200),
/// ];
/// order_group(&mut files, KeepPolicy::Latest);
/// assert_eq!(files[0].relative_path, "new.txt");
/// ```
pub fn order_group(files: &mut [FileRecord], policy: KeepPolicy) {
    match policy {
        KeepPolicy::Latest => files.sort_by(|a, b| b.modified.cmp(&a.modified)),
        KeepPolicy::Oldest => files.sort_by_key(|f| f.modified),
        KeepPolicy::Highest => files.sort_by_key(path_len),
        KeepPolicy::Deepest => files.sort_by(|a, b| path_len(b).cmp(&path_len(a))),
        KeepPolicy::First => {}
        KeepPolicy::Last => files.reverse(),
    }
}

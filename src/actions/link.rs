//! Filesystem operations applied to redundant group members.
//!
//! Links are built under a temporary sibling name and renamed over the
//! member, so a failed link creation leaves the member in place. Before any
//! operation the member is checked against its scan snapshot
//! ([`FileSnapshot`]) and the survivor must still exist.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::scanner::{modified_nanos, FileRecord};

/// What happens to every non-kept member of a group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LinkAction {
    /// Remove the file
    Delete,
    /// Replace the file by a symbolic link to the survivor
    Symlink,
    /// Replace the file by a hardlink to the survivor
    Hardlink,
    /// Replace the file by a shortcut file pointing at the survivor
    #[value(name = "lnk")]
    #[serde(rename = "lnk")]
    Shortcut,
}

impl LinkAction {
    /// Past tense used in log lines.
    #[must_use]
    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Delete => "Deleted",
            Self::Symlink => "Symlinked",
            Self::Hardlink => "Hardlinked",
            Self::Shortcut => "Shortcut",
        }
    }
}

impl fmt::Display for LinkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Delete => "delete",
            Self::Symlink => "symlink",
            Self::Hardlink => "hardlink",
            Self::Shortcut => "lnk",
        })
    }
}

/// Per-file resolution failure.
#[derive(thiserror::Error, Debug)]
pub enum ActionError {
    /// The member vanished since discovery.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied on the member or its directory.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Size or modification time differ from the scan.
    #[error("file modified since scan: {0}")]
    Modified(PathBuf),

    /// The file chosen to keep is gone; nothing may be replaced by a link to it.
    #[error("kept file no longer exists: {0}")]
    SurvivorMissing(PathBuf),

    /// The host cannot perform this action.
    #[error("action '{0}' is not supported on this platform")]
    Unsupported(LinkAction),

    /// Any other I/O failure.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path being acted on
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl ActionError {
    /// Classify an I/O error on `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Size and modification time of a member as seen during the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    /// Member path
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Modification time in nanoseconds since the epoch
    pub modified: u64,
}

impl FileSnapshot {
    /// Snapshot taken from a scanned record.
    #[must_use]
    pub fn of(record: &FileRecord) -> Self {
        Self {
            path: record.full_path.clone(),
            size: record.size,
            modified: record.modified,
        }
    }

    /// Check that the file still matches the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Modified`] on a mismatch, or the classified
    /// I/O error if the file cannot be inspected.
    pub fn verify(&self) -> Result<(), ActionError> {
        let metadata = fs::metadata(&self.path).map_err(|e| ActionError::from_io(&self.path, e))?;
        let modified = modified_nanos(&metadata);
        if metadata.len() != self.size || modified != self.modified {
            log::debug!(
                "Changed since scan: {} (size {} -> {}, mtime {} -> {})",
                self.path.display(),
                self.size,
                metadata.len(),
                self.modified,
                modified
            );
            return Err(ActionError::Modified(self.path.clone()));
        }
        Ok(())
    }
}

/// Creates platform shortcut files for `lnk` mode.
pub trait ShortcutCreator: Send + Sync {
    /// Whether shortcuts can be created on this host.
    fn is_supported(&self) -> bool;

    /// Where the shortcut for `member` is written.
    fn shortcut_path(&self, member: &Path) -> PathBuf;

    /// Write a shortcut at [`shortcut_path`](Self::shortcut_path) pointing
    /// at `target`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of the write.
    fn create(&self, target: &Path, member: &Path) -> io::Result<PathBuf>;
}

/// Windows Internet Shortcut (`<name>.url`) with a `file://` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlShortcut;

impl UrlShortcut {
    fn file_url(target: &Path) -> String {
        let text = target.to_string_lossy().replace('\\', "/");
        let text = text.trim_start_matches("//?/");
        if text.starts_with('/') {
            format!("file://{text}")
        } else {
            format!("file:///{text}")
        }
    }
}

impl ShortcutCreator for UrlShortcut {
    fn is_supported(&self) -> bool {
        cfg!(windows)
    }

    fn shortcut_path(&self, member: &Path) -> PathBuf {
        let mut name = member.as_os_str().to_owned();
        name.push(".url");
        PathBuf::from(name)
    }

    fn create(&self, target: &Path, member: &Path) -> io::Result<PathBuf> {
        let path = self.shortcut_path(member);
        let mut file = fs::File::create(&path)?;
        write!(
            file,
            "[InternetShortcut]\r\nURL={}\r\n",
            Self::file_url(target)
        )?;
        file.sync_all()?;
        Ok(path)
    }
}

/// Attempts at finding a free temporary name before giving up.
const TEMP_ATTEMPTS: u32 = 16;

/// Hidden sibling used while building a replacement link.
///
/// Attempt 0 is `.<name>.dupelink-tmp`; later attempts append `-<n>`.
#[must_use]
pub fn temp_sibling(member: &Path, attempt: u32) -> PathBuf {
    let name = member
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if attempt == 0 {
        member.with_file_name(format!(".{name}.dupelink-tmp"))
    } else {
        member.with_file_name(format!(".{name}.dupelink-tmp-{attempt}"))
    }
}

/// Remove `member`.
///
/// # Errors
///
/// Returns the classified I/O error.
pub fn remove_member(member: &Path) -> Result<(), ActionError> {
    fs::remove_file(member).map_err(|e| ActionError::from_io(member, e))
}

/// Replace `member` by a symbolic link to `survivor` (absolute path).
///
/// # Errors
///
/// Returns the classified I/O error; the member is untouched unless the
/// final rename succeeded.
pub fn replace_with_symlink(survivor: &Path, member: &Path) -> Result<(), ActionError> {
    replace_via_temp(member, |temp| create_symlink(survivor, temp))
}

/// Replace `member` by a hardlink to the file `survivor` resolves to.
///
/// A survivor reached through a symbolic link is resolved first, so the
/// member shares the target's storage object rather than becoming a copy of
/// the link.
///
/// # Errors
///
/// Returns [`ActionError::SurvivorMissing`] if the survivor cannot be
/// resolved, otherwise the classified I/O error, for example when both paths
/// are on different filesystems.
pub fn replace_with_hardlink(survivor: &Path, member: &Path) -> Result<(), ActionError> {
    let target = fs::canonicalize(survivor)
        .map_err(|_| ActionError::SurvivorMissing(survivor.to_path_buf()))?;
    replace_via_temp(member, |temp| fs::hard_link(&target, temp))
}

/// Write a shortcut next to `member`, then remove `member`.
///
/// # Errors
///
/// Returns [`ActionError::Unsupported`] if the creator is not supported,
/// otherwise the classified I/O error.
pub fn replace_with_shortcut(
    creator: &dyn ShortcutCreator,
    survivor: &Path,
    member: &Path,
) -> Result<PathBuf, ActionError> {
    if !creator.is_supported() {
        return Err(ActionError::Unsupported(LinkAction::Shortcut));
    }
    let shortcut = creator
        .create(survivor, member)
        .map_err(|e| ActionError::from_io(&creator.shortcut_path(member), e))?;
    remove_member(member)?;
    Ok(shortcut)
}

fn replace_via_temp<F>(member: &Path, build: F) -> Result<(), ActionError>
where
    F: Fn(&Path) -> io::Result<()>,
{
    // Existing siblings may belong to the user; skip to the next free name.
    for attempt in 0..TEMP_ATTEMPTS {
        let temp = temp_sibling(member, attempt);
        match build(&temp) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(ActionError::from_io(member, e)),
        }
        if let Err(e) = fs::rename(&temp, member) {
            let _ = fs::remove_file(&temp);
            return Err(ActionError::from_io(member, e));
        }
        return Ok(());
    }
    Err(ActionError::from_io(
        member,
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free temporary name next to the file",
        ),
    ))
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

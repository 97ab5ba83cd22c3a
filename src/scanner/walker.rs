//! Directory walker implementation using walkdir.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for enumerating the candidate
//! files under a scan root. Discovery is single-threaded and sorted by file
//! name, so the enumeration order (which breaks ties during hardlink
//! collapsing and survivor selection) is stable between runs.
//!
//! # Features
//!
//! - One level or full recursion
//! - Suffix-based ignore list, with an implicit entry for each run artifact
//! - Optional exclusion of symbolic links and reparse points
//! - Collection of hash cache artifacts left in subdirectories by earlier runs
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use dupelink::scanner::{IgnoreRules, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig::new(true, IgnoreRules::parse("symlink,.tmp"));
//! let discovery = Walker::new(Path::new("/home/user/Photos"), config)
//!     .walk()
//!     .expect("root must be readable");
//! println!("{} files, {} errors", discovery.files.len(), discovery.errors.len());
//! ```

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::WalkDir;

use super::{FileRecord, ScanError, WalkerConfig, CACHE_FILE_NAME};
use crate::progress::{ProgressCallback, PHASE_DISCOVERY};

/// Result of walking a scan root.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Regular files in enumeration order
    pub files: Vec<FileRecord>,
    /// Hash cache artifacts found anywhere under the root
    pub cache_files: Vec<PathBuf>,
    /// Directories visited, root included
    pub folders: usize,
    /// Entries that could not be read (contained, never fatal)
    pub errors: Vec<ScanError>,
    /// Whether the walk stopped early on a shutdown request
    pub interrupted: bool,
}

/// Directory walker for file discovery.
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Walker {
    /// Create a new walker for the given root.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the root and collect every candidate file.
    ///
    /// Unreadable entries below the root are recorded in
    /// [`Discovery::errors`] and skipped.
    ///
    /// # Errors
    ///
    /// Fails only when the root itself is missing, is not a directory, or
    /// cannot be enumerated.
    pub fn walk(&self) -> Result<Discovery, ScanError> {
        let root_meta =
            std::fs::metadata(&self.root).map_err(|e| ScanError::from_io(&self.root, e))?;
        if !root_meta.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }
        // Fail fast if the root cannot be listed at all.
        std::fs::read_dir(&self.root).map_err(|e| ScanError::from_io(&self.root, e))?;

        let max_depth = if self.config.recursive { usize::MAX } else { 1 };
        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .max_depth(max_depth)
            .sort_by_file_name();

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(PHASE_DISCOVERY, 0);
        }

        let mut discovery = Discovery::default();

        for entry in walk_dir {
            if self.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping iteration");
                discovery.interrupted = true;
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map_or_else(|| self.root.clone(), Path::to_path_buf);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                    discovery.errors.push(ScanError::from_io(&path, source));
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                discovery.folders += 1;
                continue;
            }

            let path = entry.into_path();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if name == CACHE_FILE_NAME && file_type.is_file() {
                discovery.cache_files.push(path);
                continue;
            }

            if self.config.ignore.is_ignored_name(&name) {
                log::trace!("Ignoring file: {}", path.display());
                continue;
            }

            let is_symlink = file_type.is_symlink();
            if is_symlink && self.config.ignore.skips_symlinks() {
                log::trace!("Skipping symlink: {}", path.display());
                continue;
            }

            // Links that are kept are resolved to their target so the
            // canonicalizer folds them into the file they point at.
            let metadata = if is_symlink {
                std::fs::metadata(&path)
            } else {
                entry_metadata(&path)
            };
            let metadata = match metadata {
                Ok(m) => m,
                Err(e) => {
                    log::warn!("Cannot stat {}: {}", path.display(), e);
                    discovery.errors.push(ScanError::from_io(&path, e));
                    continue;
                }
            };

            if !metadata.is_file() {
                continue;
            }
            if self.config.ignore.skips_symlinks() && is_reparse_point(&metadata) {
                log::trace!("Skipping reparse point: {}", path.display());
                continue;
            }

            let record = FileRecord::from_metadata(&self.root, path, &metadata);
            if let Some(ref callback) = self.progress_callback {
                callback.on_progress(discovery.files.len() + 1, &record.relative_path);
            }
            discovery.files.push(record);
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(PHASE_DISCOVERY);
        }

        log::debug!(
            "Walker: {} files, {} folders, {} cache artifacts, {} errors under {}",
            discovery.files.len(),
            discovery.folders,
            discovery.cache_files.len(),
            discovery.errors.len(),
            self.root.display()
        );

        Ok(discovery)
    }
}

fn entry_metadata(path: &Path) -> std::io::Result<Metadata> {
    std::fs::symlink_metadata(path)
}

#[cfg(windows)]
fn is_reparse_point(metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;
    metadata.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0
}

#[cfg(not(windows))]
fn is_reparse_point(_metadata: &Metadata) -> bool {
    false
}

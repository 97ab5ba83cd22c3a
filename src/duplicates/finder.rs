//! Duplicate finder: discovery through grouping.
//!
//! # Pipeline
//!
//! 1. **Walk** the root ([`Walker`]) and collect nested cache artifacts
//! 2. **Adopt** those artifacts into the [`HashCache`]
//! 3. **Canonicalize** pre-existing hardlinks (one record per physical file)
//! 4. **Filter** by the configured size window
//! 5. **Key** every file: name and size need no I/O; digest algorithms first
//!    drop unique sizes, then reuse cached hashes and hash the rest in a
//!    bounded rayon pool, appending each fresh hash to the cache
//! 6. **Group** by key, keeping groups of two or more
//!
//! Only step 5 runs in parallel. Hashing results are re-associated with the
//! enumeration order before grouping, so the outcome does not depend on
//! worker scheduling.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::groups::{group_by_key, group_by_size, ContentKey, DuplicateGroup};
use crate::cache::{CacheEntry, CacheKey, HashCache};
use crate::progress::{ProgressCallback, PHASE_HASHING};
use crate::scanner::{
    canonicalize, Algorithm, FileRecord, HashError, Hasher, ScanError, Walker, WalkerConfig,
};

/// Files above this size get a debug line when hashing starts.
const LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Configuration for the duplicate finder.
#[derive(Clone)]
pub struct FinderConfig {
    /// Width of the hashing pool.
    pub io_threads: usize,
    /// Equality criterion.
    pub algorithm: Algorithm,
    /// Discovery settings.
    pub walker_config: WalkerConfig,
    /// Smallest size considered, inclusive.
    pub min_size: Option<u64>,
    /// Largest size considered, inclusive.
    pub max_size: Option<u64>,
    /// Shutdown flag polled between files.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("io_threads", &self.io_threads)
            .field("algorithm", &self.algorithm)
            .field("walker_config", &self.walker_config)
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            io_threads: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1),
            algorithm: Algorithm::Md5,
            walker_config: WalkerConfig::default(),
            min_size: None,
            max_size: None,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the hashing pool width (at least 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the equality criterion.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the discovery settings.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Restrict candidates to `[min, max]` bytes; `None` leaves a side open.
    #[must_use]
    pub fn with_size_window(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.min_size = min;
        self.max_size = max;
        self
    }

    /// Set the shutdown flag.
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

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn in_size_window(&self, size: u64) -> bool {
        self.min_size.is_none_or(|min| size >= min) && self.max_size.is_none_or(|max| size <= max)
    }
}

/// Counters and contained errors from one finder run.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Regular files discovered
    pub total_files: usize,
    /// Directories visited
    pub folders: usize,
    /// Nested cache artifacts adopted
    pub cache_files_adopted: usize,
    /// Paths dropped as pre-existing hardlinks
    pub hardlinks_dropped: usize,
    /// Files outside the size window
    pub filtered_by_size: usize,
    /// Files dropped by size pre-grouping
    pub eliminated_by_size: usize,
    /// Hashes reused from the cache
    pub cache_hits: usize,
    /// Hashes computed in this run
    pub cache_misses: usize,
    /// Bytes read while hashing
    pub bytes_hashed: u64,
    /// Files that could not be hashed
    pub failed_files: usize,
    /// Groups found
    pub duplicate_groups: usize,
    /// Members beyond the first in each group
    pub duplicate_files: usize,
    /// Bytes held by those members
    pub reclaimable_space: u64,
    /// Wall time of the run
    pub scan_duration: Duration,
    /// Per-entry discovery and hashing errors
    pub errors: Vec<ScanError>,
}

impl ScanSummary {
    fn record_groups(&mut self, groups: &[DuplicateGroup]) {
        self.duplicate_groups = groups.len();
        self.duplicate_files = groups.iter().map(|g| g.len() - 1).sum();
        self.reclaimable_space = groups.iter().map(DuplicateGroup::wasted_space).sum();
    }
}

/// Errors that abort a finder run.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The root could not be enumerated.
    #[error(transparent)]
    Root(#[from] ScanError),
}

/// Duplicate finder that runs the detection pipeline.
///
/// # Example
///
/// ```no_run
/// use dupelink::cache::HashCache;
/// use dupelink::duplicates::{DuplicateFinder, FinderConfig};
/// use dupelink::scanner::Algorithm;
/// use std::path::Path;
///
/// let root = Path::new("/data");
/// let mut cache = HashCache::open(root).unwrap();
/// let finder = DuplicateFinder::new(FinderConfig::default().with_algorithm(Algorithm::Sha256));
/// let (groups, summary) = finder.find_duplicates(root, &mut cache).unwrap();
/// println!("{} groups, {} cache hits", groups.len(), summary.cache_hits);
/// ```
#[derive(Debug)]
pub struct DuplicateFinder {
    config: FinderConfig,
    hasher: Hasher,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let mut hasher = Hasher::new();
        if let Some(ref flag) = config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(Arc::clone(flag));
        }
        Self { config, hasher }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// Walk `root` and return its duplicate groups.
    ///
    /// Nested cache artifacts found during the walk are adopted into
    /// `cache`; fresh hashes are appended to it.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::Root`] if the root cannot be enumerated and
    /// [`FinderError::Interrupted`] if shutdown was requested.
    pub fn find_duplicates(
        &self,
        root: &Path,
        cache: &mut HashCache,
    ) -> Result<(Vec<DuplicateGroup>, ScanSummary), FinderError> {
        let start_time = Instant::now();

        let mut walker = Walker::new(root, self.config.walker_config.clone());
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(ref callback) = self.config.progress_callback {
            walker = walker.with_progress_callback(Arc::clone(callback));
        }

        let discovery = walker.walk()?;
        if discovery.interrupted {
            return Err(FinderError::Interrupted);
        }
        log::info!(
            "Found {} files in {} folders",
            discovery.files.len(),
            discovery.folders
        );

        let mut adopted = 0;
        for file in &discovery.cache_files {
            match cache.adopt(file) {
                Ok(report) if report.accepted + report.rejected > 0 => adopted += 1,
                Ok(_) => {}
                Err(e) => log::warn!("Skipping hash cache {}: {}", file.display(), e),
            }
        }
        let report = cache.report();
        log::info!(
            "Hash cache: {} entries loaded, {} rows rejected",
            report.accepted,
            report.rejected
        );

        let (unique, dropped) = canonicalize(discovery.files);
        if dropped > 0 {
            log::info!("Ignored {dropped} additional hardlink path(s)");
        }

        let (groups, mut summary) = self.find_duplicates_from_files(unique, cache)?;
        summary.total_files += dropped;
        summary.folders = discovery.folders;
        summary.cache_files_adopted = adopted;
        summary.hardlinks_dropped = dropped;
        let mut errors = discovery.errors;
        errors.append(&mut summary.errors);
        summary.errors = errors;
        summary.scan_duration = start_time.elapsed();

        Ok((groups, summary))
    }

    /// Key and group an already canonical file list.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::Interrupted`] if shutdown was requested while
    /// hashing.
    pub fn find_duplicates_from_files(
        &self,
        files: Vec<FileRecord>,
        cache: &HashCache,
    ) -> Result<(Vec<DuplicateGroup>, ScanSummary), FinderError> {
        let start_time = Instant::now();
        let mut summary = ScanSummary {
            total_files: files.len(),
            ..ScanSummary::default()
        };

        let before = files.len();
        let files: Vec<FileRecord> = files
            .into_iter()
            .filter(|f| self.config.in_size_window(f.size))
            .collect();
        summary.filtered_by_size = before - files.len();
        if summary.filtered_by_size > 0 {
            log::info!(
                "Filtered {} file(s) outside the size window",
                summary.filtered_by_size
            );
        }

        let algorithm = self.config.algorithm;
        let keyed: Vec<(FileRecord, ContentKey)> = if algorithm.is_digest() {
            let (candidates, stats) = group_by_size(files);
            summary.eliminated_by_size = stats.eliminated_unique;
            self.key_by_digest(candidates, cache, &mut summary)?
        } else {
            files
                .into_iter()
                .filter_map(|f| ContentKey::from_metadata(&f, algorithm).map(|k| (f, k)))
                .collect()
        };

        let groups = group_by_key(keyed);
        summary.record_groups(&groups);
        summary.scan_duration = start_time.elapsed();

        log::info!(
            "Found {} duplicate group(s) with {} redundant file(s)",
            summary.duplicate_groups,
            summary.duplicate_files
        );
        Ok((groups, summary))
    }

    /// Resolve digests for `candidates`, from the cache or by hashing.
    ///
    /// Files that fail to hash are left out of the result and recorded in
    /// `summary`.
    fn key_by_digest(
        &self,
        candidates: Vec<FileRecord>,
        cache: &HashCache,
        summary: &mut ScanSummary,
    ) -> Result<Vec<(FileRecord, ContentKey)>, FinderError> {
        let algorithm = self.config.algorithm;
        let mut digests: Vec<Option<String>> = vec![None; candidates.len()];
        let mut misses: Vec<usize> = Vec::new();

        for (idx, file) in candidates.iter().enumerate() {
            match cache.get(&CacheKey::for_record(file, algorithm)) {
                Some(hash) => {
                    log::trace!("Cache hit: {}", file.relative_path);
                    digests[idx] = Some(hash.to_string());
                }
                None => misses.push(idx),
            }
        }
        summary.cache_hits = candidates.len() - misses.len();

        // Smallest first so the byte bar moves early on large trees.
        misses.sort_by_key(|&idx| candidates[idx].size);
        let total_bytes: u64 = misses.iter().map(|&idx| candidates[idx].size).sum();
        log::info!(
            "Cache: {} hits, {} files ({:.2} GB) need hashing",
            summary.cache_hits,
            misses.len(),
            total_bytes as f64 / 1_073_741_824.0
        );

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(PHASE_HASHING, total_bytes);
        }

        let hash_one = |idx: usize| -> (usize, Result<String, HashError>) {
            let file = &candidates[idx];
            if self.config.is_shutdown_requested() {
                return (idx, Err(HashError::Interrupted(file.full_path.clone())));
            }
            if file.size > LARGE_FILE_THRESHOLD {
                log::debug!(
                    "Hashing large file ({} MB): {}",
                    file.size / (1024 * 1024),
                    file.relative_path
                );
            }

            let result = self.hasher.hash_file(&file.full_path, algorithm);
            if let Ok(ref hash) = result {
                let entry = CacheEntry::new(CacheKey::for_record(file, algorithm), hash.clone());
                if let Err(e) = cache.record(&entry) {
                    log::warn!("Failed to record hash of {}: {}", file.relative_path, e);
                }
            }
            if let Some(ref callback) = self.config.progress_callback {
                callback.on_item_completed(file.size);
            }
            (idx, result)
        };

        let results: Vec<(usize, Result<String, HashError>)> =
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.io_threads)
                .build()
            {
                Ok(pool) => pool.install(|| misses.par_iter().map(|&idx| hash_one(idx)).collect()),
                Err(e) => {
                    log::warn!(
                        "Failed to create hashing pool ({e}), using global pool with {} threads",
                        rayon::current_num_threads()
                    );
                    misses.par_iter().map(|&idx| hash_one(idx)).collect()
                }
            };

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(PHASE_HASHING);
        }

        if self.config.is_shutdown_requested() {
            log::info!("Hashing interrupted by shutdown signal");
            return Err(FinderError::Interrupted);
        }

        for (idx, result) in results {
            match result {
                Ok(hash) => {
                    summary.cache_misses += 1;
                    summary.bytes_hashed += candidates[idx].size;
                    digests[idx] = Some(hash);
                }
                Err(e) => {
                    log::warn!("Failed to hash {}: {}", candidates[idx].full_path.display(), e);
                    summary.failed_files += 1;
                    summary.errors.push(ScanError::from(e));
                }
            }
        }

        Ok(candidates
            .into_iter()
            .zip(digests)
            .filter_map(|(file, digest)| digest.map(|hex| (file, ContentKey::Digest(hex))))
            .collect())
    }
}

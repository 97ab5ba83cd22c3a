//! Append-only hash cache backed by a semicolon separated text file.
//!
//! The file starts with the header `path;size;time;type;hash` followed by one
//! row per computed hash. Rows are never rewritten or deleted: a file that
//! changed simply produces a new key, and its old row stops matching.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::entry::{CacheEntry, CacheKey, FIELD_SEPARATOR, HEADER};
use crate::scanner::{relative_key, CACHE_FILE_NAME};

/// Errors raised by the hash cache.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// The cache file could not be read.
    #[error("failed to read hash cache {path}: {source}")]
    Read {
        /// Cache file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// A row could not be appended.
    #[error("failed to append to hash cache {path}: {source}")]
    Append {
        /// Cache file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The row could not be encoded.
    #[error("failed to encode cache row: {0}")]
    Encode(#[from] csv::Error),

    /// The appender lock was poisoned by a panicking worker.
    #[error("hash cache lock poisoned")]
    Poisoned,
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Outcome of loading one cache file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Rows accepted into the lookup map
    pub accepted: usize,
    /// Rows rejected as malformed, stale or dangling
    pub rejected: usize,
}

impl LoadReport {
    fn absorb(&mut self, other: LoadReport) {
        self.accepted += other.accepted;
        self.rejected += other.rejected;
    }
}

/// Persistent content-identity → hash mapping.
///
/// The lookup map is filled once at startup and only read afterwards, so
/// workers share it through `&HashCache`. [`HashCache::record`] serializes
/// appends through a mutex, one complete row per write.
pub struct HashCache {
    root: PathBuf,
    path: PathBuf,
    entries: HashMap<CacheKey, String>,
    writer: Mutex<Option<File>>,
    report: LoadReport,
}

impl std::fmt::Debug for HashCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashCache")
            .field("root", &self.root)
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .field("report", &self.report)
            .finish()
    }
}

impl HashCache {
    /// Open the cache artifact of `root` and load it.
    ///
    /// A missing file is an empty cache; it is created on the first append.
    /// A read failure partway through keeps the rows loaded before it.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Read`] if an existing file cannot be opened.
    pub fn open(root: &Path) -> CacheResult<Self> {
        Self::open_at(root, root.join(CACHE_FILE_NAME))
    }

    /// Open a cache stored at an explicit path.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Read`] if an existing file cannot be opened.
    pub fn open_at(root: &Path, path: PathBuf) -> CacheResult<Self> {
        let mut cache = Self::empty(root, path);
        let own = cache.path.clone();
        let report = cache.load_file(&own, "")?;
        cache.report.absorb(report);
        Ok(cache)
    }

    /// An empty cache that appends to `path` without loading it.
    #[must_use]
    pub fn empty(root: &Path, path: PathBuf) -> Self {
        Self {
            root: root.to_path_buf(),
            path,
            entries: HashMap::new(),
            writer: Mutex::new(None),
            report: LoadReport::default(),
        }
    }

    /// Load rows from a cache file left in a subdirectory by an earlier run.
    ///
    /// Paths are rebased onto this cache's root. The cache's own file is
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Read`] if the file cannot be opened.
    pub fn adopt(&mut self, file: &Path) -> CacheResult<LoadReport> {
        if file == self.path {
            return Ok(LoadReport::default());
        }
        let prefix = file
            .parent()
            .map(|dir| relative_key(&self.root, dir))
            .unwrap_or_default();
        let report = self.load_file(file, &prefix)?;
        self.report.absorb(report);
        Ok(report)
    }

    fn load_file(&mut self, file: &Path, prefix: &str) -> CacheResult<LoadReport> {
        let handle = match File::open(file) {
            Ok(handle) => handle,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LoadReport::default()),
            Err(source) => {
                return Err(CacheError::Read {
                    path: file.to_path_buf(),
                    source,
                })
            }
        };

        Ok(self.load_rows(handle, file, prefix))
    }

    /// Read rows until end of input or the first read failure.
    ///
    /// Rows accepted before a failure stay in the lookup map.
    fn load_rows<R: Read>(&mut self, input: R, file: &Path, prefix: &str) -> LoadReport {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(FIELD_SEPARATOR)
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(input);

        let mut report = LoadReport::default();
        for (index, row) in reader.records().enumerate() {
            let record = match row {
                Ok(record) => record,
                Err(e) => {
                    if let csv::ErrorKind::Io(_) = e.kind() {
                        log::warn!(
                            "Stopped reading hash cache {} after {} rows: {}",
                            file.display(),
                            report.accepted + report.rejected,
                            e
                        );
                        break;
                    }
                    // Invalid UTF-8 and similar row-level damage.
                    report.rejected += 1;
                    continue;
                }
            };
            let fields: Vec<&str> = record.iter().collect();
            if index == 0 && fields == HEADER {
                continue;
            }
            match CacheEntry::validate(&fields, prefix, &self.root) {
                Ok(entry) => {
                    self.entries.insert(entry.key, entry.hash);
                    report.accepted += 1;
                }
                Err(_) => report.rejected += 1,
            }
        }

        log::debug!(
            "Loaded {} cached hashes from {} ({} rows rejected)",
            report.accepted,
            file.display(),
            report.rejected
        );
        report
    }

    /// Look up a hash by exact key.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Append one entry to the backing file.
    ///
    /// The file (and its header) is created on first use. Each row reaches
    /// the file in a single write while holding the appender lock.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Append`] if the file cannot be opened or written.
    pub fn record(&self, entry: &CacheEntry) -> CacheResult<()> {
        let row = encode_row(&entry.fields())?;

        let mut guard = self.writer.lock().map_err(|_| CacheError::Poisoned)?;
        if guard.is_none() {
            *guard = Some(self.open_appender().map_err(|source| CacheError::Append {
                path: self.path.clone(),
                source,
            })?);
        }
        if let Some(file) = guard.as_mut() {
            file.write_all(&row).map_err(|source| CacheError::Append {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Open the file for appending, writing the header to a new file and
    /// terminating a row left incomplete by an interrupted run.
    fn open_appender(&self) -> io::Result<File> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;

        let len = file.metadata()?.len();
        if len == 0 {
            let header = encode_row(&HEADER).map_err(|e| io::Error::other(e.to_string()))?;
            file.write_all(&header)?;
        } else {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::Start(len - 1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                file.write_all(b"\n")?;
            }
        }
        Ok(file)
    }

    /// Number of accepted entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Aggregate load statistics across all adopted files.
    #[must_use]
    pub fn report(&self) -> LoadReport {
        self.report
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Root that relative paths resolve against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn encode_row<S: AsRef<[u8]>>(fields: &[S]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(FIELD_SEPARATOR)
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(io::Error::other(e.to_string())))
}

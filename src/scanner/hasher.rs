//! Streaming content digests.
//!
//! # Overview
//!
//! [`Algorithm`] names the equality criterion for a run. `name` and `size`
//! never read file content; the remaining variants stream the file through a
//! digest and render it as lowercase hex:
//!
//! | Algorithm | Digest | Hex length |
//! |-----------|--------|-----------:|
//! | `crc32`   | CRC-32 (reflected 0xEDB88320) | 8 |
//! | `md5`     | MD5     | 32 |
//! | `sha256`  | SHA-256 | 64 |
//! | `sha512`  | SHA-512 | 128 |
//!
//! # Example
//!
//! ```no_run
//! use dupelink::scanner::{Algorithm, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let hex = hasher.hash_file(Path::new("photo.jpg"), Algorithm::Sha256).unwrap();
//! assert_eq!(hex.len(), 64);
//! ```

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use super::HashError;

/// Read buffer size for streaming digests.
const BUFFER_SIZE: usize = 64 * 1024;

/// Equality criterion used to group files.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Same file name
    Name,
    /// Same size in bytes
    Size,
    /// 32-bit cyclic redundancy check
    Crc32,
    /// 128-bit MD5 digest
    Md5,
    /// 256-bit SHA-2 digest
    Sha256,
    /// 512-bit SHA-2 digest
    Sha512,
}

impl Algorithm {
    /// Every recognized algorithm, in cache tag order.
    pub const ALL: [Algorithm; 6] = [
        Algorithm::Name,
        Algorithm::Size,
        Algorithm::Crc32,
        Algorithm::Md5,
        Algorithm::Sha256,
        Algorithm::Sha512,
    ];

    /// Tag written to the `type` column of the cache file.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Size => "size",
            Self::Crc32 => "crc32",
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Whether this algorithm reads file content.
    #[must_use]
    pub const fn is_digest(self) -> bool {
        !matches!(self, Self::Name | Self::Size)
    }

    /// Hex length of a digest, `None` for `name` and `size`.
    #[must_use]
    pub const fn hex_len(self) -> Option<usize> {
        match self {
            Self::Name | Self::Size => None,
            Self::Crc32 => Some(8),
            Self::Md5 => Some(32),
            Self::Sha256 => Some(64),
            Self::Sha512 => Some(128),
        }
    }

    /// Check that `hash` is well-formed for this algorithm.
    ///
    /// Digests must be hex of the exact length (either case); `name` and
    /// `size` accept any value.
    ///
    /// ```
    /// use dupelink::scanner::Algorithm;
    ///
    /// assert!(Algorithm::Crc32.is_valid_hash("CBF43926"));
    /// assert!(!Algorithm::Md5.is_valid_hash("cbf43926"));
    /// assert!(!Algorithm::Crc32.is_valid_hash("xyz43926"));
    /// ```
    #[must_use]
    pub fn is_valid_hash(self, hash: &str) -> bool {
        match self.hex_len() {
            None => true,
            Some(len) => hash.len() == len && hash.bytes().all(|b| b.is_ascii_hexdigit()),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.tag().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown algorithm: '{s}'"))
    }
}

/// Streaming file hasher.
#[derive(Debug, Clone, Default)]
pub struct Hasher {
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Hasher {
    /// Create a new hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop long reads early when the flag is raised.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Digest the whole file and return lowercase hex.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read, if
    /// `algorithm` is `name` or `size`, or if shutdown was requested mid-read.
    pub fn hash_file(&self, path: &Path, algorithm: Algorithm) -> Result<String, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        self.hash_reader(path, file, algorithm)
    }

    /// Digest an arbitrary reader; `path` is only used for error reporting.
    ///
    /// # Errors
    ///
    /// See [`Hasher::hash_file`].
    pub fn hash_reader<R: Read>(
        &self,
        path: &Path,
        reader: R,
        algorithm: Algorithm,
    ) -> Result<String, HashError> {
        match algorithm {
            Algorithm::Name | Algorithm::Size => Err(HashError::NotADigest(algorithm)),
            Algorithm::Crc32 => {
                let mut state = crc32fast::Hasher::new();
                self.stream(path, reader, |chunk| state.update(chunk))?;
                Ok(format!("{:08x}", state.finalize()))
            }
            Algorithm::Md5 => self.digest::<Md5, R>(path, reader),
            Algorithm::Sha256 => self.digest::<Sha256, R>(path, reader),
            Algorithm::Sha512 => self.digest::<Sha512, R>(path, reader),
        }
    }

    fn digest<D: Digest, R: Read>(&self, path: &Path, reader: R) -> Result<String, HashError> {
        let mut state = D::new();
        self.stream(path, reader, |chunk| state.update(chunk))?;
        Ok(hex::encode(state.finalize()))
    }

    fn stream<R: Read, F: FnMut(&[u8])>(
        &self,
        path: &Path,
        mut reader: R,
        mut update: F,
    ) -> Result<(), HashError> {
        let mut buffer = vec![0u8; BUFFER_SIZE];
        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            let count = match reader.read(&mut buffer) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            update(&buffer[..count]);
        }
    }
}

//! Command-line interface definitions.
//!
//! A single command: scan one root, group duplicates, resolve each group.
//! Every option that also exists in the configuration file is optional here
//! so that an absent flag leaves the file or environment value in place.
//!
//! # Example
//!
//! ```bash
//! # Preview: keep the newest copy, replace the rest with symlinks
//! dupelink -r -d --keep latest ~/Pictures
//!
//! # Replace duplicates by hardlinks, comparing SHA-256 digests
//! dupelink -r --keep oldest --mode hardlink --algorithm sha256 ~/Pictures
//!
//! # Only consider files between 1 MB and 4 GiB
//! dupelink -r -k first -m delete --min-size 1MB --max-size 4GiB /data
//! ```

use clap::Parser;
use std::path::{Path, PathBuf};

use crate::actions::{KeepPolicy, LinkAction};
use crate::scanner::Algorithm;

/// Find duplicate files and replace them with links.
///
/// Files in the scan root are grouped by an equality criterion (name, size,
/// or a content digest). In every group one survivor is kept according to
/// the keep policy; the others are deleted or replaced by links to it.
#[derive(Debug, Parser)]
#[command(name = "dupelink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to scan
    #[arg(value_name = "PATH", conflicts_with = "path_flag")]
    pub path: Option<PathBuf>,

    /// Directory to scan (alternative to the positional argument)
    #[arg(short = 'p', long = "path", value_name = "PATH", id = "path_flag")]
    pub path_flag: Option<PathBuf>,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Log what would be done without touching any file
    #[arg(short, long)]
    pub dry_run: bool,

    /// Which member of each group survives
    #[arg(short, long, value_enum, value_name = "POLICY")]
    pub keep: Option<KeepPolicy>,

    /// What happens to the other members [default: symlink]
    #[arg(short, long, value_enum, value_name = "MODE")]
    pub mode: Option<LinkAction>,

    /// Equality criterion [default: md5]
    #[arg(short, long, value_enum, value_name = "ALGORITHM")]
    pub algorithm: Option<Algorithm>,

    /// Comma-separated file name suffixes to skip; `symlink` skips links
    /// [default: symlink,.lnk,.url]
    #[arg(short, long, value_name = "LIST")]
    pub ignore: Option<String>,

    /// Number of hashing threads [default: available parallelism]
    #[arg(short, long, value_name = "N")]
    pub threads: Option<usize>,

    /// Minimum file size to consider (e.g., 1KB, 1MB, 1GiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size to consider (e.g., 1KB, 1MB, 1GiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Configuration file (TOML) instead of the platform default
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print fatal errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,
}

impl Cli {
    /// Scan root from either spelling, defaulting to the current directory.
    #[must_use]
    pub fn scan_root(&self) -> &Path {
        self.path
            .as_deref()
            .or(self.path_flag.as_deref())
            .unwrap_or_else(|| Path::new("."))
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, K/KB, KiB, M/MB, MiB, G/GB, GiB, T/TB, TiB.
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use dupelink::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1.5MB").unwrap(), 1_500_000);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid or negative
/// number, an unknown suffix, or does not fit in 64 bits.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (digits, suffix) = s.split_at(split);
    let suffix = suffix.trim().to_ascii_uppercase();

    let num: f64 = digits
        .parse()
        .map_err(|_| format!("Invalid number: '{digits}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "K" | "KB" => 1_000,
        "KIB" => 1 << 10,
        "M" | "MB" => 1_000_000,
        "MIB" => 1 << 20,
        "G" | "GB" => 1_000_000_000,
        "GIB" => 1 << 30,
        "T" | "TB" => 1_000_000_000_000,
        "TIB" => 1 << 40,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    let bytes = num * multiplier as f64;
    if bytes >= u64::MAX as f64 {
        return Err(format!("Size too large: '{s}'"));
    }
    Ok(bytes as u64)
}

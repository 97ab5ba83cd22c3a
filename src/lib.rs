//! dupelink - duplicate file finder and linker
//!
//! Finds files with equal content (or equal name or size) under one root and
//! replaces every redundant copy with a link to a single survivor, or
//! deletes it. Content hashes are kept in an append-only cache file in the
//! root so that later runs over a mostly unchanged tree read only what
//! changed.
//!
//! The pipeline is: [`scanner`] (discovery, hardlink collapsing, digests) →
//! [`duplicates`] (size pre-grouping, cache-assisted concurrent hashing,
//! grouping) → [`actions`] (keep policy and link/delete execution).
//! [`run_app`] wires the stages together for the binary.

pub mod actions;
pub mod cache;
pub mod cli;
pub mod config;
pub mod disk;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::sync::Arc;

use anyhow::Context;

use crate::actions::{ResolveConfig, Resolver};
use crate::cache::HashCache;
use crate::cli::Cli;
use crate::config::Config;
use crate::disk::DiskSnapshot;
use crate::duplicates::{DuplicateFinder, FinderConfig, FinderError};
use crate::error::ExitCode;
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::{CACHE_FILE_NAME, LOG_FILE_NAME};

/// Run one scan-and-resolve pass for the parsed command line.
///
/// # Errors
///
/// Fails on configuration errors, when the root cannot be enumerated, and
/// with [`FinderError::Interrupted`] when the scan was stopped by Ctrl+C
/// (nothing is resolved in that case). Per-file failures do not produce an
/// error; they turn the result into [`ExitCode::PartialSuccess`].
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::load(&cli).context("Failed to load configuration")?;
    config.validate()?;
    let policy = config.keep_policy()?;

    let requested = cli.scan_root();
    let root = std::fs::canonicalize(requested)
        .with_context(|| format!("Cannot access scan root {}", requested.display()))?;
    if !root.is_dir() {
        anyhow::bail!("Scan root is not a directory: {}", root.display());
    }

    let log_path = root.join(LOG_FILE_NAME);
    if let Err(e) = logging::init_logging(cli.verbose, cli.quiet, Some(&log_path)) {
        logging::init_logging(cli.verbose, cli.quiet, None)?;
        log::warn!("Cannot write log file {}: {}", log_path.display(), e);
    }

    log::info!(
        "Settings: Path={} | Keep={} | Mode={} | Algorithm={} | Recursive={} | DryRun={} | Threads={}",
        root.display(),
        policy,
        config.mode,
        config.algorithm,
        config.recursive,
        config.dry_run,
        config.effective_threads()
    );

    let disk_before = DiskSnapshot::probe(&root);
    log::info!("Free space before: {}", disk::describe(disk_before));

    let handler = signal::install_handler()?;
    let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(cli.quiet));

    let mut cache = match HashCache::open(&root) {
        Ok(cache) => cache,
        Err(e) => {
            log::warn!("Hash cache unavailable, starting empty: {e}");
            HashCache::empty(&root, root.join(CACHE_FILE_NAME))
        }
    };

    let finder = DuplicateFinder::new(
        FinderConfig::default()
            .with_io_threads(config.effective_threads())
            .with_algorithm(config.algorithm)
            .with_walker_config(config.walker_config())
            .with_size_window(config.min_size, config.max_size)
            .with_shutdown_flag(handler.get_flag())
            .with_progress_callback(progress),
    );

    let (groups, summary) = match finder.find_duplicates(&root, &mut cache) {
        Ok(found) => found,
        Err(FinderError::Interrupted) => {
            log::warn!("Scan interrupted; no files were changed");
            return Err(FinderError::Interrupted.into());
        }
        Err(e) => {
            return Err(anyhow::Error::new(e).context(format!("Cannot scan {}", root.display())))
        }
    };

    log::info!(
        "Scan: {} files, {} hardlink paths ignored, {} cache hits, {} hashed, {} failed, {:.2?}",
        summary.total_files,
        summary.hardlinks_dropped,
        summary.cache_hits,
        summary.cache_misses,
        summary.failed_files,
        summary.scan_duration
    );
    if groups.is_empty() {
        log::info!("No duplicates found");
    }

    let resolver =
        Resolver::new(ResolveConfig::new(policy, config.mode).with_dry_run(config.dry_run));
    let report = resolver.resolve(groups);

    let disk_after = DiskSnapshot::probe(&root);
    log::info!("Free space after: {}", disk::describe(disk_after));
    if let Some(freed) = disk::space_freed(disk_before, disk_after) {
        log::info!("Total space freed: {freed}");
    }
    log::info!("Done.");

    if summary.errors.is_empty() && !report.has_failures() {
        Ok(ExitCode::Success)
    } else {
        log::warn!(
            "Completed with {} scan error(s) and {} failed action(s)",
            summary.errors.len(),
            report.failed
        );
        Ok(ExitCode::PartialSuccess)
    }
}

//! Logging infrastructure.
//!
//! Structured logging through the `log` facade with an `env_logger` backend.
//! Log levels are determined by (in priority order):
//!
//! 1. `RUST_LOG` environment variable (if set)
//! 2. CLI flags: `--quiet` (error only) or `--verbose` (debug/trace)
//! 3. Default: info level
//!
//! Every formatted line is written to stderr and, once a run root is known,
//! appended to the log artifact in that root. The artifact is opened in
//! append mode and never truncated.
//!
//! # Example
//!
//! ```rust,no_run
//! use dupelink::logging::init_logging;
//! use std::path::Path;
//!
//! init_logging(1, false, Some(Path::new("/data/duplicates.log"))).unwrap();
//! log::info!("Scanning /data");
//! ```

use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use env_logger::{Builder, Target};
use log::LevelFilter;

/// Timestamp layout of every log line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// File currently receiving a copy of the log stream.
static ARTIFACT: OnceLock<Mutex<Option<File>>> = OnceLock::new();

fn artifact_slot() -> &'static Mutex<Option<File>> {
    ARTIFACT.get_or_init(|| Mutex::new(None))
}

/// Writer handed to `env_logger`: stderr plus the current artifact.
struct TeeWriter;

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Ok(mut slot) = artifact_slot().lock() {
            if let Some(file) = slot.as_mut() {
                // A broken artifact must not silence stderr.
                if let Err(e) = file.write_all(buf) {
                    let _ = writeln!(io::stderr(), "log file write failed: {e}");
                    *slot = None;
                }
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Ok(mut slot) = artifact_slot().lock() {
            if let Some(file) = slot.as_mut() {
                file.flush()?;
            }
        }
        io::stderr().flush()
    }
}

/// Initialize the logging subsystem.
///
/// The global logger can only be installed once per process; later calls
/// keep the existing logger and only redirect the artifact copy to
/// `artifact`.
///
/// # Arguments
///
/// * `verbose` - Verbosity count from CLI (0=normal, 1=debug, 2+=trace)
/// * `quiet` - If true, only show errors (overridden by `RUST_LOG`)
/// * `artifact` - Log file to append to, if any
///
/// # Errors
///
/// Returns an error if the artifact cannot be opened for appending.
pub fn init_logging(verbose: u8, quiet: bool, artifact: Option<&Path>) -> io::Result<()> {
    let use_env = env::var("RUST_LOG").is_ok();

    let mut builder = Builder::new();
    if use_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }
    configure_format(&mut builder, verbose);
    builder.target(Target::Pipe(Box::new(TeeWriter)));

    let installed = builder.try_init().is_ok();

    match artifact {
        Some(path) => attach_artifact(path)?,
        None => detach_artifact(),
    }

    if installed {
        log::debug!(
            "Logging initialized at level: {}",
            if use_env {
                "RUST_LOG".to_string()
            } else {
                format!("{:?}", determine_level(verbose, quiet))
            }
        );
    }
    Ok(())
}

/// Start appending log lines to `path`, creating it if needed.
///
/// # Errors
///
/// Returns an error if the file cannot be opened.
pub fn attach_artifact(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    if let Ok(mut slot) = artifact_slot().lock() {
        *slot = Some(file);
    }
    Ok(())
}

/// Stop copying log lines to a file.
pub fn detach_artifact() {
    if let Ok(mut slot) = artifact_slot().lock() {
        *slot = None;
    }
}

/// Determine the log level from CLI flags.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Format lines as `<timestamp> <LEVEL> [module] message`.
///
/// The module path is only shown with `-v` and above.
fn configure_format(builder: &mut Builder, verbose: u8) {
    builder.format(move |buf, record| {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
        if verbose >= 1 {
            writeln!(
                buf,
                "{} {:<5} [{}] {}",
                timestamp,
                record.level(),
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(buf, "{} {:<5} {}", timestamp, record.level(), record.args())
        }
    });
}

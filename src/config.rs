//! Layered run configuration.
//!
//! Settings are merged with `figment`, later layers winning:
//!
//! 1. built-in defaults ([`Config::default`])
//! 2. a TOML file (`--config FILE`, else `<config dir>/dupelink/config.toml` if present)
//! 3. `DUPELINK_*` environment variables (`DUPELINK_KEEP=latest`)
//! 4. flags given on the command line
//!
//! ```toml
//! keep = "latest"
//! mode = "hardlink"
//! algorithm = "sha256"
//! ignore = "symlink,.lnk,.url,.tmp"
//! recursive = true
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::actions::{KeepPolicy, LinkAction, ShortcutCreator, UrlShortcut};
use crate::cli::Cli;
use crate::scanner::{Algorithm, IgnoreRules, WalkerConfig};

/// Prefix of environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "DUPELINK_";

/// Default ignore list: symbolic links and shortcut files.
pub const DEFAULT_IGNORE: &str = "symlink,.lnk,.url";

/// Configuration errors. All of them are detected before any file is touched.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No keep policy in any layer.
    #[error("No keep policy given (use --keep latest|oldest|highest|deepest|first|last)")]
    MissingKeep,

    /// `lnk` mode requested on a host without shortcut support.
    #[error("Shortcut mode 'lnk' is not supported on this platform")]
    ShortcutUnsupported,

    /// Size window is empty.
    #[error("Minimum size {min} is larger than maximum size {max}")]
    SizeWindow {
        /// Lower bound
        min: u64,
        /// Upper bound
        max: u64,
    },

    /// `threads = 0`.
    #[error("Thread count must be at least 1")]
    ZeroThreads,

    /// `--config` points at a file that does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// A layer could not be parsed or has a value of the wrong type.
    #[error("Invalid configuration: {0}")]
    Extract(#[from] figment::Error),
}

/// Effective run settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Survivor selection; no default
    pub keep: Option<KeepPolicy>,
    /// Action applied to non-kept members
    pub mode: LinkAction,
    /// Equality criterion
    pub algorithm: Algorithm,
    /// Comma-separated ignore list
    pub ignore: String,
    /// Hashing threads; `None` means available parallelism
    pub threads: Option<usize>,
    /// Smallest size considered, inclusive
    pub min_size: Option<u64>,
    /// Largest size considered, inclusive
    pub max_size: Option<u64>,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Plan only
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keep: None,
            mode: LinkAction::Symlink,
            algorithm: Algorithm::Md5,
            ignore: DEFAULT_IGNORE.to_string(),
            threads: None,
            min_size: None,
            max_size: None,
            recursive: false,
            dry_run: false,
        }
    }
}

/// Values given explicitly on the command line. Absent flags are not
/// serialized, so they do not mask lower layers.
#[derive(Debug, Default, Serialize)]
struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    keep: Option<KeepPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<LinkAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    algorithm: Option<Algorithm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ignore: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_size: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    recursive: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    dry_run: bool,
}

impl From<&Cli> for CliOverrides {
    fn from(cli: &Cli) -> Self {
        Self {
            keep: cli.keep,
            mode: cli.mode,
            algorithm: cli.algorithm,
            ignore: cli.ignore.clone(),
            threads: cli.threads,
            min_size: cli.min_size,
            max_size: cli.max_size,
            recursive: cli.recursive,
            dry_run: cli.dry_run,
        }
    }
}

impl Config {
    /// Merge all layers for this invocation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] if `--config` names a missing
    /// file, or [`ConfigError::Extract`] if any layer is malformed.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) if !path.is_file() => return Err(ConfigError::FileNotFound(path.clone())),
            Some(path) => Some(path.clone()),
            None => Self::default_path().filter(|p| p.is_file()),
        };
        if let Some(ref path) = file {
            log::debug!("Reading configuration from {}", path.display());
        }

        let config = Self::figment(file.as_deref())
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(CliOverrides::from(cli)))
            .extract()?;
        Ok(config)
    }

    /// Defaults merged with an optional TOML file.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Self::default()));
        match file {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment,
        }
    }

    /// Platform configuration file path, if a home directory is known.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dupelink").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Reject settings that cannot produce a meaningful run.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.keep_policy()?;
        if self.mode == LinkAction::Shortcut && !UrlShortcut.is_supported() {
            return Err(ConfigError::ShortcutUnsupported);
        }
        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            if min > max {
                return Err(ConfigError::SizeWindow { min, max });
            }
        }
        if self.threads == Some(0) {
            return Err(ConfigError::ZeroThreads);
        }
        Ok(())
    }

    /// The keep policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKeep`] if no layer set one.
    pub fn keep_policy(&self) -> Result<KeepPolicy, ConfigError> {
        self.keep.ok_or(ConfigError::MissingKeep)
    }

    /// Hashing threads, resolving "auto" to the available parallelism.
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        })
    }

    /// Discovery settings derived from this configuration.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig::new(self.recursive, IgnoreRules::parse(&self.ignore))
    }
}

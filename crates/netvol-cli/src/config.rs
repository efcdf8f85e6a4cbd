//! Configuration file support for the netvol CLI.
//!
//! Configuration is read from `$NETVOL_CONFIG_DIR/config.toml` when the
//! variable is set, else `~/.config/netvol/config.toml` (platform config
//! dir on macOS and Windows), unless `--config` names a file.
//!
//! # Example configuration
//!
//! ```toml
//! [defaults]
//! mode = "smbfs"
//! timeout = 1
//!
//! [volumes.shared]
//! address = "files.example.org/Share"
//! mount_point = "~/Volumes/Share"
//! drive = "J"
//! user = "alice"
//! subdir = "reports"
//!
//! [files.form]
//! url = "https://example.org/form.xlsx"
//! path = "~/cache/form.xlsx"
//! ```
//!
//! # Usage
//!
//! ```bash
//! netvol mount @shared
//! netvol ls shared
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use netvol_mount::{VolumeSpec, DEFAULT_MODE, DEFAULT_TIMEOUT_SECS};

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "NETVOL_CONFIG_DIR";

/// Main configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Settings applied to every volume unless overridden
    #[serde(default)]
    pub defaults: Defaults,

    /// Named volumes
    #[serde(default)]
    pub volumes: BTreeMap<String, VolumeConfig>,

    /// Named remote files for `netvol fetch`
    #[serde(default)]
    pub files: BTreeMap<String, FileConfig>,

    /// File this configuration was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Default settings
#[derive(Debug, Default, Deserialize)]
pub struct Defaults {
    /// Filesystem mode tag passed to `mount -t`
    pub mode: Option<String>,

    /// Readiness timeout in seconds
    pub timeout: Option<u64>,
}

/// Configuration for a named volume
#[derive(Debug, Clone, Deserialize)]
pub struct VolumeConfig {
    /// Remote address, e.g. `files.example.org/Share`
    pub address: String,

    /// Local directory the share is mounted on (POSIX)
    pub mount_point: PathBuf,

    /// Drive letter the share is mapped to (Windows)
    pub drive: Option<String>,

    /// Account name
    pub user: Option<String>,

    /// Per-volume mode override
    pub mode: Option<String>,

    /// Per-volume timeout override, in seconds
    pub timeout: Option<u64>,

    /// Default sub-path for `ls` and `exec`
    pub subdir: Option<String>,
}

/// Configuration for a named remote file
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    /// Remote URL
    pub url: String,

    /// Local cache path
    pub path: PathBuf,
}

impl Config {
    /// Load from `explicit` if given, else the default location. A missing
    /// default file yields an empty configuration.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = config_path()?;
                if !path.exists() {
                    tracing::debug!("No config file at {}", path.display());
                    return Ok(Self {
                        source: Some(path),
                        ..Self::default()
                    });
                }
                Self::load_from(&path)
            }
        }
    }

    /// Load from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());

        Ok(config)
    }

    /// Look up a volume by name; `@name` and `name` are equivalent.
    pub fn volume(&self, name: &str) -> Result<&VolumeConfig> {
        let name = strip_alias(name);
        self.volumes
            .get(name)
            .ok_or_else(|| self.unknown_entry("volume", "volumes", name, self.volumes.keys()))
    }

    /// Look up a remote file by name.
    pub fn file(&self, name: &str) -> Result<&FileConfig> {
        let name = strip_alias(name);
        self.files
            .get(name)
            .ok_or_else(|| self.unknown_entry("file", "files", name, self.files.keys()))
    }

    /// Build the [`VolumeSpec`] for `name` with the given secret.
    pub fn volume_spec(&self, name: &str, secret: &str) -> Result<VolumeSpec> {
        let volume = self.volume(name)?;

        let mode = volume
            .mode
            .as_deref()
            .or(self.defaults.mode.as_deref())
            .unwrap_or(DEFAULT_MODE);
        let timeout = volume
            .timeout
            .or(self.defaults.timeout)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let mut builder = VolumeSpec::builder(&volume.address, expand_path(&volume.mount_point)?)
            .principal(volume.user.as_deref().unwrap_or_default())
            .secret(secret)
            .mode(mode)
            .timeout_secs(timeout);
        if let Some(drive) = &volume.drive {
            builder = builder.drive(drive);
        }

        builder
            .build()
            .with_context(|| format!("Invalid configuration for volume '{}'", strip_alias(name)))
    }

    fn unknown_entry<'a>(
        &self,
        what: &str,
        section: &str,
        name: &str,
        known: impl Iterator<Item = &'a String>,
    ) -> anyhow::Error {
        let known: Vec<_> = known.map(|k| format!("@{k}")).collect();
        let location = self
            .source
            .as_ref()
            .map_or_else(|| "the config file".to_string(), |p| p.display().to_string());

        if known.is_empty() {
            anyhow::anyhow!(
                "Unknown {what} '@{name}': not configured.\n\
                 No {section} are configured in {location}.\n\n\
                 Add a [{section}.{name}] section."
            )
        } else {
            anyhow::anyhow!(
                "Unknown {what} '@{name}': not configured.\n\n\
                 Available {section}: {}\n\n\
                 Add a [{section}.{name}] section to {location}.",
                known.join(", ")
            )
        }
    }
}

fn strip_alias(name: &str) -> &str {
    name.strip_prefix('@').unwrap_or(name)
}

/// Path of the configuration file.
pub fn config_path() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir).join("config.toml"));
    }

    let base_dirs = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(base_dirs.config_dir().join("netvol").join("config.toml"))
}

/// Expand a leading `~` and make the path absolute.
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => {
            let base_dirs = directories::BaseDirs::new()
                .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
            base_dirs.home_dir().join(rest)
        }
        Err(_) => path.to_path_buf(),
    };

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        Ok(cwd.join(expanded))
    }
}

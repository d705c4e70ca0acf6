//! User configuration.
//!
//! Sources, lowest precedence first: built-in defaults, the user config file,
//! an explicitly given config file, then environment overrides. Tables are
//! merged key by key, so a file only needs the settings it changes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use toml::{Table, Value};
use tracing::debug;

use crate::consts::BUILD_ROOT_ENV;
use crate::driver::DriverConfig;
use crate::platform::paths;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file '{}': {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid config file '{}': {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid configuration: {0}")]
  Invalid(#[source] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Parent directory of build sandboxes.
  pub build_root: PathBuf,
  pub dry_run: bool,
  pub distro: String,
  pub distro_version: String,
  pub driver: DriverConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      build_root: paths::builds_dir(),
      dry_run: false,
      distro: "debian".to_string(),
      distro_version: "trixie".to_string(),
      driver: DriverConfig::default(),
    }
  }
}

impl Config {
  /// Load the configuration, layering `explicit` over the user config file.
  ///
  /// A missing user config file is not an error, a missing explicit one is.
  pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
    let mut merged = Table::new();

    let user_file = paths::config_file();
    if user_file.is_file() {
      merge(&mut merged, read_table(&user_file)?);
    }
    if let Some(path) = explicit {
      merge(&mut merged, read_table(path)?);
    }

    let mut config: Config = Value::Table(merged).try_into().map_err(ConfigError::Invalid)?;
    config.apply_env();
    Ok(config)
  }

  fn apply_env(&mut self) {
    if let Some(root) = std::env::var_os(BUILD_ROOT_ENV).filter(|root| !root.is_empty()) {
      debug!(root = ?root, "build root overridden from environment");
      self.build_root = PathBuf::from(root);
    }
  }
}

fn read_table(path: &Path) -> Result<Table, ConfigError> {
  let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  debug!(path = %path.display(), "loaded config file");
  content.parse::<Table>().map_err(|source| ConfigError::Parse {
    path: path.to_path_buf(),
    source,
  })
}

/// Merge `overlay` into `base`. Nested tables merge recursively, anything else is replaced.
fn merge(base: &mut Table, overlay: Table) {
  for (key, value) in overlay {
    match (base.get_mut(&key), value) {
      (Some(Value::Table(existing)), Value::Table(incoming)) => merge(existing, incoming),
      (_, value) => {
        base.insert(key, value);
      }
    }
  }
}

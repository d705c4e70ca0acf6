use crate::consts::APP_NAME;
use nix::unistd::{User, geteuid};
use std::path::PathBuf;

/// Returns the user's home directory
///
/// Uses `HOME`, falling back to the password database entry of the
/// effective user.
pub fn home_dir() -> PathBuf {
  if let Ok(home) = std::env::var("HOME") {
    return PathBuf::from(home);
  }
  User::from_uid(geteuid())
    .ok()
    .flatten()
    .map(|user| user.dir)
    .unwrap_or_else(|| PathBuf::from("/"))
}

/// Returns the directory for configuration files for the application
pub fn config_dir() -> PathBuf {
  let config_home = std::env::var("XDG_CONFIG_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".config"));
  config_home.join(APP_NAME)
}

/// Path of the user configuration file
pub fn config_file() -> PathBuf {
  config_dir().join("config.toml")
}

/// Returns the directory for cache files for the application
pub fn cache_dir() -> PathBuf {
  let cache_home = std::env::var("XDG_CACHE_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".cache"));
  cache_home.join(APP_NAME)
}

/// Default parent directory of build sandboxes
pub fn builds_dir() -> PathBuf {
  cache_dir().join("builds")
}

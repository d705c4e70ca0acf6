use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::process::CommandError;

/// Which sandbox a build runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
  /// Directly on the host.
  Bare,
  Docker,
  Podman,
}

impl DriverKind {
  pub const ALL: [DriverKind; 3] = [DriverKind::Bare, DriverKind::Docker, DriverKind::Podman];

  pub const fn as_str(self) -> &'static str {
    match self {
      DriverKind::Bare => "bare",
      DriverKind::Docker => "docker",
      DriverKind::Podman => "podman",
    }
  }

  pub const fn is_container(self) -> bool {
    matches!(self, DriverKind::Docker | DriverKind::Podman)
  }
}

impl fmt::Display for DriverKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error)]
#[error("unknown build driver '{0}', expected one of: bare, docker, podman")]
pub struct ParseDriverKindError(String);

impl FromStr for DriverKind {
  type Err = ParseDriverKindError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    DriverKind::ALL
      .into_iter()
      .find(|kind| kind.as_str() == s)
      .ok_or_else(|| ParseDriverKindError(s.to_string()))
  }
}

/// Driver-specific state needed to reattach to a sandbox.
pub type DriverMetadata = HashMap<String, String>;

/// Contents of `build.json` in the sandbox root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetadata {
  pub driver: DriverKind,
  pub build_root: PathBuf,
  /// Copy of the source tree inside the sandbox root.
  pub source_dir: PathBuf,
  pub driver_metadata: DriverMetadata,
}

/// One sandboxed build attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
  /// `<name>-<version>` of the source package.
  pub package_identifier: String,
  /// Source tree on the host.
  pub source_dir: PathBuf,
  pub output_dir: PathBuf,
  /// Sandbox root.
  pub build_root: PathBuf,
  pub distro: String,
  pub distro_version: String,
  pub dry_run: bool,
  pub sign: bool,
}

impl BuildConfig {
  /// Identifier of the build environment, unique per package and distribution release.
  pub fn build_identifier(&self) -> String {
    format!("{}-{}-{}", self.package_identifier, self.distro, self.distro_version)
  }

  pub fn build_work_dir(&self) -> PathBuf {
    self.build_root.join("work")
  }

  pub fn build_temp_dir(&self) -> PathBuf {
    self.build_root.join("temp")
  }

  /// Where the source tree is copied to and built in.
  pub fn build_source_dir(&self) -> PathBuf {
    self.build_work_dir().join(&self.package_identifier)
  }

  pub fn create_dirs(&self) -> io::Result<()> {
    fs::create_dir_all(&self.output_dir)?;
    fs::create_dir_all(self.build_work_dir())?;
    fs::create_dir_all(self.build_temp_dir())?;
    fs::create_dir_all(self.build_source_dir())?;
    Ok(())
  }
}

/// `[driver]` section of the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
  /// Keep containers between builds: stop instead of remove, restart on the next build.
  pub persistent: bool,
  pub container: ContainerDriverConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerDriverConfig {
  /// Image to build the sandbox image from instead of `docker.io/<distro>:<version>`.
  pub base_image: Option<String>,
}

/// Errors from sandbox drivers.
#[derive(Debug, Error)]
pub enum DriverError {
  /// A command inside the sandbox exited unsuccessfully.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CommandFailed { cmd: String, code: Option<i32> },

  #[error("failed to spawn '{cmd}': {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: io::Error,
  },

  /// Creating the sandbox failed (image build, container start).
  #[error("failed to {step}: {source}")]
  Provision {
    step: &'static str,
    #[source]
    source: CommandError,
  },

  #[error("path '{}' is outside of the sandbox root '{}'", path.display(), root.display())]
  PathOutsideSandbox { path: PathBuf, root: PathBuf },

  #[error("no build metadata at '{}', was the build started?", .0.display())]
  MissingMetadata(PathBuf),

  #[error("invalid build metadata in '{}': {source}", path.display())]
  InvalidMetadata {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("build metadata has no '{0}' entry")]
  MissingMetadataKey(&'static str),

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

impl DriverError {
  /// True for commands that ran and failed, as opposed to sandbox or setup problems.
  pub fn is_command_failure(&self) -> bool {
    matches!(self, DriverError::CommandFailed { .. })
  }
}

impl From<CommandError> for DriverError {
  fn from(err: CommandError) -> Self {
    match err {
      CommandError::Failed { cmd, code } => DriverError::CommandFailed { cmd, code },
      CommandError::Spawn { cmd, source } => DriverError::Spawn { cmd, source },
      CommandError::Utf8 { cmd } => DriverError::Io(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("non-UTF-8 output from '{cmd}'"),
      )),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn config(root: PathBuf) -> BuildConfig {
    BuildConfig {
      package_identifier: "htop-3.4.1-1".to_string(),
      source_dir: PathBuf::from("/home/user/htop"),
      output_dir: root.join("out"),
      build_root: root.join("sandbox"),
      distro: "debian".to_string(),
      distro_version: "trixie".to_string(),
      dry_run: false,
      sign: false,
    }
  }

  #[test]
  fn derived_dirs() {
    let config = config(PathBuf::from("/b"));
    assert_eq!(config.build_identifier(), "htop-3.4.1-1-debian-trixie");
    assert_eq!(config.build_work_dir(), PathBuf::from("/b/sandbox/work"));
    assert_eq!(config.build_temp_dir(), PathBuf::from("/b/sandbox/temp"));
    assert_eq!(config.build_source_dir(), PathBuf::from("/b/sandbox/work/htop-3.4.1-1"));
  }

  #[test]
  fn create_dirs_creates_layout() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path().to_path_buf());
    config.create_dirs().unwrap();
    assert!(config.output_dir.is_dir());
    assert!(config.build_temp_dir().is_dir());
    assert!(config.build_source_dir().is_dir());
  }

  #[test]
  fn driver_kind_round_trips_through_strings() {
    for kind in DriverKind::ALL {
      assert_eq!(kind.to_string().parse::<DriverKind>().unwrap(), kind);
    }
    assert!("lxd".parse::<DriverKind>().is_err());
    assert!(DriverKind::Podman.is_container());
    assert!(!DriverKind::Bare.is_container());
  }

  #[test]
  fn command_failures_are_distinguished() {
    let failed: DriverError = CommandError::Failed {
      cmd: "make".to_string(),
      code: Some(2),
    }
    .into();
    assert!(failed.is_command_failure());

    let spawn: DriverError = CommandError::Spawn {
      cmd: "docker".to_string(),
      source: io::Error::from(io::ErrorKind::NotFound),
    }
    .into();
    assert!(!spawn.is_command_failure());
  }
}

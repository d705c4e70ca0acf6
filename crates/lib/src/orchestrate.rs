//! Sandboxed package builds.
//!
//! [`build`] prepares a fresh sandbox, provisions a driver for it and runs
//! `dpkg-buildpackage` inside. When a build command fails on an interactive
//! terminal, a debug shell is opened in the same sandbox before the error is
//! propagated. The driver is cleaned up on every exit path; `build.json` is
//! left behind so [`attach_shell`] can reach a sandbox that is still alive.

use std::fs;
use std::io;
use std::ops::{Deref, DerefMut};
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::driver::{self, BuildConfig, BuildDriver, DriverConfig, DriverError, DriverKind, metadata};
use crate::platform::terminal;

/// Extensions of build results copied to the output directory.
pub const ARTIFACT_EXTENSIONS: [&str; 4] = ["deb", "changes", "buildinfo", "dsc"];

#[derive(Debug, Error)]
pub enum OrchestrateError {
  #[error(transparent)]
  Driver(#[from] DriverError),

  #[error("failed to prepare sandbox '{}': {source}", path.display())]
  Prepare {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to copy source tree: {0}")]
  Walk(#[from] walkdir::Error),

  #[error("failed to copy build artifact '{}': {source}", path.display())]
  Artifact {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl OrchestrateError {
  /// True when a command inside the sandbox failed.
  pub fn is_command_failure(&self) -> bool {
    matches!(self, OrchestrateError::Driver(err) if err.is_command_failure())
  }
}

/// Sandbox root of the package `identifier` under `builds_dir`.
pub fn sandbox_root(builds_dir: &Path, identifier: &str) -> PathBuf {
  builds_dir.join(identifier)
}

/// Recreate the sandbox root from scratch and copy the source tree into it.
pub fn prepare_sandbox(config: &BuildConfig) -> Result<(), OrchestrateError> {
  let prepare_err = |path: &Path| {
    let path = path.to_path_buf();
    move |source: io::Error| OrchestrateError::Prepare { path, source }
  };

  if config.build_root.exists() {
    info!(root = %config.build_root.display(), "removing previous sandbox");
    fs::remove_dir_all(&config.build_root).map_err(prepare_err(&config.build_root))?;
  }
  config.create_dirs().map_err(prepare_err(&config.build_root))?;
  copy_tree(&config.source_dir, &config.build_source_dir())
}

/// Copy `src` into `dst`, skipping `.git` directories.
///
/// Symlinks are recreated with their original target, not followed. Other
/// special files (sockets, fifos, devices) are not copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<(), OrchestrateError> {
  let walker = WalkDir::new(src)
    .min_depth(1)
    .into_iter()
    .filter_entry(|entry| !(entry.file_type().is_dir() && entry.file_name() == ".git"));

  for entry in walker {
    let entry = entry?;
    // Entries always live below `src`.
    let Ok(relative) = entry.path().strip_prefix(src) else {
      continue;
    };
    let target = dst.join(relative);
    let copy_err = |source: io::Error| OrchestrateError::Prepare {
      path: entry.path().to_path_buf(),
      source,
    };

    if entry.file_type().is_dir() {
      fs::create_dir_all(&target).map_err(copy_err)?;
    } else if entry.file_type().is_symlink() {
      let link = fs::read_link(entry.path()).map_err(copy_err)?;
      symlink(&link, &target).map_err(copy_err)?;
    } else if entry.file_type().is_file() {
      fs::copy(entry.path(), &target).map_err(copy_err)?;
    }
  }
  Ok(())
}

/// Owns a driver and cleans it up when dropped.
struct DriverGuard(Box<dyn BuildDriver>);

impl Deref for DriverGuard {
  type Target = dyn BuildDriver;

  fn deref(&self) -> &Self::Target {
    self.0.as_ref()
  }
}

impl DerefMut for DriverGuard {
  fn deref_mut(&mut self) -> &mut Self::Target {
    self.0.as_mut()
  }
}

impl Drop for DriverGuard {
  fn drop(&mut self) {
    if let Err(err) = self.0.cleanup() {
      warn!(error = %err, "sandbox cleanup failed");
    }
  }
}

/// Build the package described by `config` in a fresh sandbox of `kind`.
///
/// Returns the artifacts copied to the output directory.
pub fn build(
  kind: DriverKind,
  config: &BuildConfig,
  driver_config: &DriverConfig,
) -> Result<Vec<PathBuf>, OrchestrateError> {
  prepare_sandbox(config)?;
  let driver = driver::create_driver(kind, config, driver_config)?;
  run_build(driver, config, terminal::stdin_is_terminal())
}

/// Run the package build with an already provisioned driver.
///
/// With `interactive` set, a failing build command opens a debug shell in the
/// sandbox before the failure is returned.
pub fn run_build(
  driver: Box<dyn BuildDriver>,
  config: &BuildConfig,
  interactive: bool,
) -> Result<Vec<PathBuf>, OrchestrateError> {
  let driver = DriverGuard(driver);
  metadata::write_metadata(&driver.build_metadata())?;

  let result = build_package(&*driver, config);
  if let Err(err) = &result {
    error!(error = %err, "build failed");
    if interactive && err.is_command_failure() {
      info!("dropping into a shell in the sandbox, exit it to clean up");
      if let Err(shell_err) = driver.drop_into_shell() {
        warn!(error = %shell_err, "could not open debug shell");
      }
    }
  }
  result
}

fn build_package(driver: &dyn BuildDriver, config: &BuildConfig) -> Result<Vec<PathBuf>, OrchestrateError> {
  let source_dir = config.build_source_dir();
  driver.run_command(&["apt-get", "-y", "build-dep", "."], Some(&source_dir), true)?;
  driver.run_command(
    &["dpkg-buildpackage", "-us", "-uc", "-ui", "-nc", "-b"],
    Some(&source_dir),
    false,
  )?;

  if config.sign {
    warn!("package signing is not supported, artifacts are left unsigned");
  }

  collect_artifacts(&config.build_work_dir(), &config.output_dir)
}

/// Copy build results from `work_dir` into `output_dir`.
pub fn collect_artifacts(work_dir: &Path, output_dir: &Path) -> Result<Vec<PathBuf>, OrchestrateError> {
  let entries = fs::read_dir(work_dir).map_err(|source| OrchestrateError::Artifact {
    path: work_dir.to_path_buf(),
    source,
  })?;

  let mut copied = Vec::new();
  for entry in entries {
    let path = entry
      .map_err(|source| OrchestrateError::Artifact {
        path: work_dir.to_path_buf(),
        source,
      })?
      .path();
    let is_artifact = path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| ARTIFACT_EXTENSIONS.contains(&ext));
    let Some(file_name) = path.file_name() else {
      continue;
    };
    if !is_artifact || !path.is_file() {
      continue;
    }

    let target = output_dir.join(file_name);
    fs::copy(&path, &target).map_err(|source| OrchestrateError::Artifact {
      path: path.clone(),
      source,
    })?;
    info!(artifact = %target.display(), "collected");
    copied.push(target);
  }
  copied.sort();
  Ok(copied)
}

/// Open a shell in the running sandbox at `sandbox_root`.
pub fn attach_shell(sandbox_root: &Path, driver_config: &DriverConfig) -> Result<(), OrchestrateError> {
  let driver = driver::attach(sandbox_root, driver_config)?;
  driver.drop_into_shell()?;
  Ok(())
}

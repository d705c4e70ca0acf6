//! Bare driver: no isolation, commands run on the host.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use super::{BuildConfig, BuildDriver, BuildMetadata, DriverError, DriverKind, DriverMetadata, relative_inside};
use crate::platform::{self, terminal};
use crate::process;

#[derive(Debug, Clone)]
pub struct BareDriver {
  build_root: PathBuf,
  source_dir: PathBuf,
  /// The original source tree, also allowed as working directory.
  host_source_dir: Option<PathBuf>,
  dry_run: bool,
}

impl BareDriver {
  pub fn create(config: &BuildConfig) -> Self {
    Self {
      build_root: config.build_root.clone(),
      source_dir: config.build_source_dir(),
      host_source_dir: Some(config.source_dir.clone()),
      dry_run: config.dry_run,
    }
  }

  pub fn from_metadata(metadata: &BuildMetadata) -> Self {
    Self {
      build_root: metadata.build_root.clone(),
      source_dir: metadata.source_dir.clone(),
      host_source_dir: None,
      dry_run: false,
    }
  }

  fn command_line(&self, cmd: &[&str], requires_root: bool) -> Vec<String> {
    let mut line = Vec::with_capacity(cmd.len() + 1);
    if requires_root && !platform::is_elevated() {
      line.push("sudo".to_string());
    }
    line.extend(cmd.iter().map(|arg| arg.to_string()));
    line
  }
}

impl BuildDriver for BareDriver {
  fn kind(&self) -> DriverKind {
    DriverKind::Bare
  }

  fn build_root(&self) -> &Path {
    &self.build_root
  }

  fn source_dir(&self) -> &Path {
    &self.source_dir
  }

  fn metadata(&self) -> DriverMetadata {
    DriverMetadata::new()
  }

  fn translate_path(&self, host_path: &Path) -> Result<PathBuf, DriverError> {
    let allowed = relative_inside(host_path, &self.build_root).is_some()
      || self
        .host_source_dir
        .as_ref()
        .is_some_and(|dir| relative_inside(host_path, dir).is_some());
    if allowed {
      Ok(host_path.to_path_buf())
    } else {
      Err(DriverError::PathOutsideSandbox {
        path: host_path.to_path_buf(),
        root: self.build_root.clone(),
      })
    }
  }

  fn run_command(&self, cmd: &[&str], cwd: Option<&Path>, requires_root: bool) -> Result<(), DriverError> {
    let cwd = self.translate_path(cwd.unwrap_or(&self.source_dir))?;
    let line = self.command_line(cmd, requires_root);
    let Some((program, args)) = line.split_first() else {
      return Ok(());
    };

    let mut command = Command::new(program);
    command.args(args).current_dir(&cwd);
    if self.dry_run {
      info!(cmd = %process::display_command(&command), "dry-run, not running");
      return Ok(());
    }
    process::run(&mut command)?;
    Ok(())
  }

  fn drop_into_shell(&self) -> Result<(), DriverError> {
    let mut shell = Command::new("/usr/bin/env");
    shell.arg("bash").current_dir(&self.source_dir);
    let status = terminal::run_in_foreground(&mut shell)?;
    debug!(code = ?status.code(), "shell exited");
    Ok(())
  }

  fn cleanup(&mut self) -> Result<(), DriverError> {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::TempDir;

  fn driver(root: &Path, dry_run: bool) -> BareDriver {
    let config = BuildConfig {
      package_identifier: "hello-1.0".to_string(),
      source_dir: root.join("host-src"),
      output_dir: root.join("out"),
      build_root: root.join("sandbox"),
      distro: "debian".to_string(),
      distro_version: "trixie".to_string(),
      dry_run,
      sign: false,
    };
    config.create_dirs().unwrap();
    BareDriver::create(&config)
  }

  #[test]
  fn runs_in_sandbox_source_dir_by_default() {
    let temp = TempDir::new().unwrap();
    let driver = driver(temp.path(), false);

    driver.run_command(&["touch", "built"], None, false).unwrap();

    assert!(driver.source_dir().join("built").exists());
  }

  #[test]
  fn rejects_cwd_outside_sandbox() {
    let temp = TempDir::new().unwrap();
    let driver = driver(temp.path(), false);

    let err = driver
      .run_command(&["touch", "x"], Some(Path::new("/etc")), false)
      .unwrap_err();

    assert!(matches!(err, DriverError::PathOutsideSandbox { .. }));
  }

  #[test]
  fn rejects_cwd_escaping_through_parent_dirs() {
    let temp = TempDir::new().unwrap();
    let driver = driver(temp.path(), false);
    let escape = driver.build_root().join("../../../etc");

    let err = driver
      .run_command(&["/bin/sh", "-c", "pwd > escaped"], Some(&escape), false)
      .unwrap_err();

    assert!(matches!(err, DriverError::PathOutsideSandbox { .. }));
    assert!(driver.translate_path(&temp.path().join("host-src/../sandbox")).is_err());
  }

  #[test]
  fn host_source_dir_is_allowed() {
    let temp = TempDir::new().unwrap();
    let driver = driver(temp.path(), false);
    let host_src = temp.path().join("host-src/debian");

    assert_eq!(driver.translate_path(&host_src).unwrap(), host_src);
  }

  #[test]
  fn failing_command_is_command_failure() {
    let temp = TempDir::new().unwrap();
    let driver = driver(temp.path(), false);

    let err = driver.run_command(&["/bin/sh", "-c", "exit 3"], None, false).unwrap_err();

    assert!(err.is_command_failure());
    assert!(matches!(err, DriverError::CommandFailed { code: Some(3), .. }));
  }

  #[test]
  fn dry_run_skips_commands() {
    let temp = TempDir::new().unwrap();
    let driver = driver(temp.path(), true);

    driver.run_command(&["touch", "built"], None, true).unwrap();

    assert!(fs::read_dir(driver.source_dir()).unwrap().next().is_none());
  }

  #[test]
  fn elevation_prefix_only_when_unprivileged() {
    let temp = TempDir::new().unwrap();
    let driver = driver(temp.path(), true);
    let line = driver.command_line(&["apt-get", "-y", "build-dep", "."], true);

    if platform::is_elevated() {
      assert_eq!(line[0], "apt-get");
    } else {
      assert_eq!(line[0], "sudo");
    }
    assert_eq!(driver.command_line(&["make"], false), vec!["make"]);
  }

  #[test]
  fn cleanup_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let mut driver = driver(temp.path(), false);
    driver.cleanup().unwrap();
    driver.cleanup().unwrap();
    assert!(driver.build_root().exists());
  }
}

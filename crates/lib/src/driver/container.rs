//! Container driver for docker and podman.
//!
//! The sandbox root is bind-mounted at [`SANDBOX_MOUNT_POINT`] inside a
//! long-running container built from a small image with the package's build
//! dependencies preinstalled. Commands run as root through `exec`; on cleanup
//! the mounted tree is handed back to the invoking user so the next build can
//! remove it.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use nix::unistd::{getegid, geteuid};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::{
  BuildConfig, BuildDriver, BuildMetadata, DriverConfig, DriverError, DriverKind, DriverMetadata, relative_inside,
};
use crate::consts::{APP_NAME, SANDBOX_MOUNT_POINT};
use crate::platform::terminal;
use crate::process;

const CONTAINER_NAME_KEY: &str = "container_name";

const DOCKERFILE_TEMPLATE: &str = r#"FROM {base_image}
RUN apt-get update && apt-get install -y --no-install-recommends dpkg-dev build-essential debhelper
RUN mkdir -p /build/package/debian
COPY debian/control /build/package/debian/control
RUN apt-get -y build-dep /build/package
RUN mkdir -p {mount_point}
ENTRYPOINT ["sleep", "infinity"]
"#;

/// Image definition for the sandbox container.
pub fn render_dockerfile(base_image: &str) -> String {
  DOCKERFILE_TEMPLATE
    .replace("{base_image}", base_image)
    .replace("{mount_point}", SANDBOX_MOUNT_POINT)
}

#[derive(Debug)]
pub struct ContainerDriver {
  kind: DriverKind,
  build_root: PathBuf,
  source_dir: PathBuf,
  container_name: String,
  persistent: bool,
  dry_run: bool,
  /// Image build context, removed on cleanup.
  context: Option<TempDir>,
  /// Set once the container was started (or restarted).
  running: bool,
  cleaned_up: bool,
}

impl ContainerDriver {
  /// Build the image and start the container.
  ///
  /// Whatever was provisioned before a failing step is cleaned up again.
  pub fn create(kind: DriverKind, config: &BuildConfig, driver_config: &DriverConfig) -> Result<Self, DriverError> {
    let mut driver = Self {
      kind,
      build_root: config.build_root.clone(),
      source_dir: config.build_source_dir(),
      container_name: format!("{APP_NAME}-{}", config.build_identifier()),
      persistent: driver_config.persistent,
      dry_run: config.dry_run,
      context: None,
      running: false,
      cleaned_up: false,
    };

    if let Err(err) = driver.provision(config, driver_config) {
      if let Err(cleanup_err) = driver.cleanup() {
        warn!(error = %cleanup_err, "cleanup after failed provisioning failed");
      }
      return Err(err);
    }
    Ok(driver)
  }

  pub fn from_metadata(metadata: &BuildMetadata, driver_config: &DriverConfig) -> Result<Self, DriverError> {
    let container_name = metadata
      .driver_metadata
      .get(CONTAINER_NAME_KEY)
      .cloned()
      .ok_or(DriverError::MissingMetadataKey(CONTAINER_NAME_KEY))?;

    Ok(Self {
      kind: metadata.driver,
      build_root: metadata.build_root.clone(),
      source_dir: metadata.source_dir.clone(),
      container_name,
      persistent: driver_config.persistent,
      dry_run: false,
      context: None,
      running: true,
      cleaned_up: false,
    })
  }

  pub fn container_name(&self) -> &str {
    &self.container_name
  }

  /// Inverse of [`BuildDriver::translate_path`].
  pub fn host_path(&self, sandbox_path: &Path) -> Result<PathBuf, DriverError> {
    let relative = relative_inside(sandbox_path, Path::new(SANDBOX_MOUNT_POINT)).ok_or_else(|| {
      DriverError::PathOutsideSandbox {
        path: sandbox_path.to_path_buf(),
        root: PathBuf::from(SANDBOX_MOUNT_POINT),
      }
    })?;
    Ok(self.build_root.join(relative))
  }

  fn runtime(&self) -> Command {
    Command::new(self.kind.as_str())
  }

  /// Run a provisioning step of the container runtime.
  fn runtime_step<I, S>(&self, step: &'static str, args: I) -> Result<(), DriverError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
  {
    let mut cmd = self.runtime();
    cmd.args(args);
    if self.dry_run {
      info!(cmd = %process::display_command(&cmd), step, "dry-run, not running");
      return Ok(());
    }
    process::run(&mut cmd).map_err(|source| DriverError::Provision { step, source })
  }

  fn container_exists(&self) -> Result<bool, DriverError> {
    let mut inspect = self.runtime();
    inspect.args(["container", "inspect", self.container_name.as_str()]);
    let code = process::probe(&mut inspect).map_err(|source| DriverError::Provision {
      step: "query existing containers",
      source,
    })?;
    Ok(code == Some(0))
  }

  fn provision(&mut self, config: &BuildConfig, driver_config: &DriverConfig) -> Result<(), DriverError> {
    let exists = !self.dry_run && self.container_exists()?;

    if exists && self.persistent {
      info!(container = %self.container_name, "restarting persistent container");
      self.runtime_step("start container", ["start", self.container_name.as_str()])?;
      self.running = true;
      return Ok(());
    }
    if exists {
      debug!(container = %self.container_name, "removing stale container");
      self.runtime_step("remove stale container", ["rm", "-f", self.container_name.as_str()])?;
    }

    let image = self.build_image(config, driver_config)?;
    let mount = format!("type=bind,src={},dst={}", self.build_root.display(), SANDBOX_MOUNT_POINT);
    info!(container = %self.container_name, image = %image, "starting container");
    self.runtime_step(
      "start container",
      [
        "run",
        "--detach",
        "--name",
        self.container_name.as_str(),
        "--mount",
        mount.as_str(),
        image.as_str(),
      ],
    )?;
    self.running = true;
    Ok(())
  }

  /// Give everything below the mount point back to the invoking user.
  fn release_ownership(&self) -> Result<(), DriverError> {
    let owner = format!("{}:{}", geteuid(), getegid());
    debug!(container = %self.container_name, owner = %owner, "restoring sandbox ownership");
    self.runtime_step(
      "restore sandbox ownership",
      [
        "exec",
        self.container_name.as_str(),
        "chown",
        "-R",
        owner.as_str(),
        SANDBOX_MOUNT_POINT,
      ],
    )
  }

  fn build_image(&mut self, config: &BuildConfig, driver_config: &DriverConfig) -> Result<String, DriverError> {
    let base_image = driver_config
      .container
      .base_image
      .clone()
      .unwrap_or_else(|| format!("docker.io/{}:{}", config.distro, config.distro_version));

    let control = config.build_source_dir().join("debian").join("control");
    if !control.is_file() {
      return Err(DriverError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("'{}' not found, cannot install build dependencies", control.display()),
      )));
    }

    let context = tempfile::Builder::new()
      .prefix("image-")
      .tempdir_in(config.build_temp_dir())?;
    let dockerfile = context.path().join("Dockerfile");
    fs::write(&dockerfile, render_dockerfile(&base_image))?;
    fs::create_dir_all(context.path().join("debian"))?;
    fs::copy(&control, context.path().join("debian").join("control"))?;

    let image = format!("{APP_NAME}-{}", config.build_identifier());
    let context_dir = context.path().to_path_buf();
    self.context = Some(context);

    info!(image = %image, base = %base_image, "building sandbox image");
    self.runtime_step(
      "build sandbox image",
      [
        OsStr::new("build"),
        OsStr::new("--tag"),
        OsStr::new(&image),
        OsStr::new("-f"),
        dockerfile.as_os_str(),
        context_dir.as_os_str(),
      ],
    )?;
    Ok(image)
  }
}

impl BuildDriver for ContainerDriver {
  fn kind(&self) -> DriverKind {
    self.kind
  }

  fn build_root(&self) -> &Path {
    &self.build_root
  }

  fn source_dir(&self) -> &Path {
    &self.source_dir
  }

  fn metadata(&self) -> DriverMetadata {
    DriverMetadata::from([(CONTAINER_NAME_KEY.to_string(), self.container_name.clone())])
  }

  fn translate_path(&self, host_path: &Path) -> Result<PathBuf, DriverError> {
    let relative = relative_inside(host_path, &self.build_root).ok_or_else(|| DriverError::PathOutsideSandbox {
      path: host_path.to_path_buf(),
      root: self.build_root.clone(),
    })?;
    Ok(Path::new(SANDBOX_MOUNT_POINT).join(relative))
  }

  /// Commands already run as root in the container, so `requires_root` has no effect.
  fn run_command(&self, cmd: &[&str], cwd: Option<&Path>, _requires_root: bool) -> Result<(), DriverError> {
    if cmd.is_empty() {
      return Ok(());
    }
    let workdir = self.translate_path(cwd.unwrap_or(&self.source_dir))?;

    let mut exec = self.runtime();
    exec
      .arg("exec")
      .arg("--workdir")
      .arg(&workdir)
      .arg(&self.container_name)
      .args(cmd);
    if self.dry_run {
      info!(cmd = %process::display_command(&exec), "dry-run, not running");
      return Ok(());
    }
    process::run(&mut exec)?;
    Ok(())
  }

  fn drop_into_shell(&self) -> Result<(), DriverError> {
    let workdir = self.translate_path(&self.source_dir)?;
    let mut shell = self.runtime();
    shell
      .args(["exec", "--interactive", "--tty", "--workdir"])
      .arg(&workdir)
      .arg(&self.container_name)
      .args(["/usr/bin/env", "bash"]);
    let status = terminal::run_in_foreground(&mut shell).map_err(|source| DriverError::Spawn {
      cmd: process::display_command(&shell),
      source,
    })?;
    debug!(code = ?status.code(), "shell exited");
    Ok(())
  }

  fn cleanup(&mut self) -> Result<(), DriverError> {
    if self.cleaned_up {
      return Ok(());
    }
    self.cleaned_up = true;

    // Files written as root in the container must stay removable by the host user.
    if self.running {
      if let Err(err) = self.release_ownership() {
        warn!(error = %err, "failed to restore sandbox ownership");
      }
    }

    let name = self.container_name.clone();
    let result = if self.persistent {
      info!(container = %name, "stopping container");
      self.runtime_step("stop container", ["stop", name.as_str()])
    } else {
      info!(container = %name, "removing container");
      self.runtime_step("remove container", ["rm", "-f", name.as_str()])
    };

    if let Some(context) = self.context.take() {
      context.close()?;
    }
    result
  }
}

//! Build drivers: sandboxes that build commands run in.
//!
//! A driver owns one sandbox for the duration of a build. It runs commands
//! inside it, maps host paths into it, and can be reconstructed by a later
//! process from the [`BuildMetadata`] persisted in the sandbox root.
//!
//! # Submodules
//!
//! - [`bare`] - commands run directly on the host
//! - [`container`] - docker or podman containers
//! - [`metadata`] - `build.json` persistence

pub mod bare;
pub mod container;
pub mod metadata;
mod types;

use std::path::{Component, Path, PathBuf};

use tracing::info;

pub use bare::BareDriver;
pub use container::ContainerDriver;
pub use types::*;

pub trait BuildDriver {
  fn kind(&self) -> DriverKind;

  /// Sandbox root on the host.
  fn build_root(&self) -> &Path;

  /// Host path of the source tree copy the build runs in.
  fn source_dir(&self) -> &Path;

  /// Driver-specific state needed to reattach, such as the container name.
  fn metadata(&self) -> DriverMetadata;

  fn build_metadata(&self) -> BuildMetadata {
    BuildMetadata {
      driver: self.kind(),
      build_root: self.build_root().to_path_buf(),
      source_dir: self.source_dir().to_path_buf(),
      driver_metadata: self.metadata(),
    }
  }

  /// Map a host path to the path the sandbox sees.
  ///
  /// Fails with [`DriverError::PathOutsideSandbox`] for paths the sandbox
  /// cannot reach.
  fn translate_path(&self, host_path: &Path) -> Result<PathBuf, DriverError>;

  /// Run `cmd` in the sandbox, in `cwd` (a host path) or the source dir.
  ///
  /// `requires_root` elevates the command where the sandbox does not
  /// already run as root.
  fn run_command(&self, cmd: &[&str], cwd: Option<&Path>, requires_root: bool) -> Result<(), DriverError>;

  /// Open an interactive shell in the sandbox and wait for it to exit.
  fn drop_into_shell(&self) -> Result<(), DriverError>;

  /// Tear the sandbox down. Calling it again is a no-op.
  fn cleanup(&mut self) -> Result<(), DriverError>;
}

/// Provision a new sandbox of `kind` for `config`.
pub fn create_driver(
  kind: DriverKind,
  config: &BuildConfig,
  driver_config: &DriverConfig,
) -> Result<Box<dyn BuildDriver>, DriverError> {
  info!(driver = %kind, identifier = %config.build_identifier(), "creating build driver");
  Ok(match kind {
    DriverKind::Bare => Box::new(BareDriver::create(config)),
    DriverKind::Docker | DriverKind::Podman => Box::new(ContainerDriver::create(kind, config, driver_config)?),
  })
}

/// Reconstruct the driver of an existing sandbox without provisioning anything.
pub fn driver_from_metadata(
  metadata: &BuildMetadata,
  driver_config: &DriverConfig,
) -> Result<Box<dyn BuildDriver>, DriverError> {
  Ok(match metadata.driver {
    DriverKind::Bare => Box::new(BareDriver::from_metadata(metadata)),
    DriverKind::Docker | DriverKind::Podman => Box::new(ContainerDriver::from_metadata(metadata, driver_config)?),
  })
}

/// Reattach to the sandbox at `build_root` through its `build.json`.
pub fn attach(build_root: &Path, driver_config: &DriverConfig) -> Result<Box<dyn BuildDriver>, DriverError> {
  let metadata = metadata::read_metadata(build_root)?;
  info!(driver = %metadata.driver, root = %build_root.display(), "attaching to build");
  driver_from_metadata(&metadata, driver_config)
}

/// `path` relative to `root` when it lies inside it.
///
/// Containment is lexical, so any `..` below `root` is refused rather than resolved.
pub(crate) fn relative_inside<'a>(path: &'a Path, root: &Path) -> Option<&'a Path> {
  let relative = path.strip_prefix(root).ok()?;
  let escapes = relative
    .components()
    .any(|component| matches!(component, Component::ParentDir));
  (!escapes).then_some(relative)
}

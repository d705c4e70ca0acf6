//! Implementation of the `debrig build` command.
//!
//! Copies the source package into a fresh sandbox, runs `dpkg-buildpackage`
//! there and collects the resulting packages.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use debrig_lib::config::Config;
use debrig_lib::driver::{BuildConfig, DriverKind};
use debrig_lib::orchestrate;
use debrig_lib::package::SourcePackage;

use crate::output::{self, format_duration};

pub struct BuildArgs {
  pub source_dir: PathBuf,
  pub output_dir: PathBuf,
  pub driver: DriverKind,
  pub persistent: bool,
  pub dry_run: bool,
}

/// Execute the build command.
///
/// Prints the collected artifacts on success. A failing build command opens
/// a shell in the sandbox first when running on a terminal.
pub fn cmd_build(config_file: Option<&Path>, args: &BuildArgs) -> Result<()> {
  let config = Config::load(config_file).context("Failed to load configuration")?;

  let source_dir = dunce::canonicalize(&args.source_dir)
    .with_context(|| format!("Source directory not found: {}", args.source_dir.display()))?;
  let source = SourcePackage::query(&source_dir).context("Failed to read source package")?;

  fs::create_dir_all(&args.output_dir)
    .with_context(|| format!("Failed to create output directory {}", args.output_dir.display()))?;
  let output_dir = dunce::canonicalize(&args.output_dir)?;

  let identifier = source.identifier();
  let build_config = BuildConfig {
    build_root: orchestrate::sandbox_root(&config.build_root, &identifier),
    package_identifier: identifier.clone(),
    source_dir,
    output_dir,
    distro: config.distro,
    distro_version: config.distro_version,
    dry_run: args.dry_run || config.dry_run,
    sign: false,
  };
  debug!(root = %build_config.build_root.display(), "sandbox root");
  let mut driver_config = config.driver;
  driver_config.persistent |= args.persistent;

  output::print_info(&format!("Building {identifier} with the {} driver", args.driver));
  let started = Instant::now();
  let artifacts = orchestrate::build(args.driver, &build_config, &driver_config).context("Build failed")?;

  output::print_success(&format!("Built {identifier} in {}", format_duration(started.elapsed())));
  for artifact in &artifacts {
    output::print_stat("artifact", &artifact.display().to_string());
  }
  Ok(())
}

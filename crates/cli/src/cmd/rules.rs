//! Implementation of the `debrig rules` command.
//!
//! This is what `debian/rules` calls: it runs the stages of one rules target
//! with the chosen presets, in the current source tree.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::debug;

use debrig_lib::build::BuildFlags;
use debrig_lib::config::Config;
use debrig_lib::package::{Package, RulesTarget, SourcePackage};
use debrig_lib::preset::Preset;
use debrig_lib::preset::autotools::AutotoolsPreset;
use debrig_lib::preset::default::DefaultPreset;
use debrig_lib::preset::dh::DhPreset;

use crate::output;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PresetKind {
  /// Split debhelper sequences into stages
  Dh,
  /// configure and make
  Autotools,
}

pub struct RulesArgs {
  pub target: RulesTarget,
  pub source_dir: PathBuf,
  pub presets: Vec<PresetKind>,
  pub dh_args: Vec<String>,
  pub maint_options: Option<String>,
  pub dry_run: bool,
}

impl RulesArgs {
  fn presets(&self) -> Vec<Box<dyn Preset>> {
    self
      .presets
      .iter()
      .map(|kind| -> Box<dyn Preset> {
        match kind {
          PresetKind::Dh => Box::new(DhPreset::with_args(self.dh_args.clone())),
          PresetKind::Autotools => Box::new(AutotoolsPreset),
        }
      })
      .collect()
  }
}

/// Execute the rules command.
pub fn cmd_rules(config_file: Option<&Path>, args: &RulesArgs) -> Result<()> {
  let config = Config::load(config_file).context("Failed to load configuration")?;

  let source_dir = dunce::canonicalize(&args.source_dir)
    .with_context(|| format!("Source directory not found: {}", args.source_dir.display()))?;
  let source = SourcePackage::query(&source_dir).context("Failed to read source package")?;

  let fallback = DefaultPreset::with_dh(DhPreset::with_args(args.dh_args.clone()));
  let package =
    Package::with_fallback(source, args.presets(), Box::new(fallback)).context("Failed to initialize presets")?;

  let flags = BuildFlags::query(&source_dir, args.maint_options.as_deref()).context("Failed to query build flags")?;
  debug!(flags = flags.len(), host = ?flags.get("DEB_HOST_GNU_TYPE"), "queried build flags");
  let mut build = package.new_build(flags).with_dry_run(args.dry_run || config.dry_run);

  package
    .run_target(&mut build, args.target)
    .with_context(|| format!("debian/rules {} failed", args.target))?;

  output::print_success(&format!("{} {} done", package.source().identifier(), args.target));
  Ok(())
}

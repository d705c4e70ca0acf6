//! The fallback preset, always tried last.
//!
//! Provides every stage so that pipeline resolution never comes up empty.
//! Clean, install and package run the corresponding debhelper sequences; the
//! remaining stages do nothing. Supply a preset providing clean, install and
//! package to avoid depending on debhelper.

use std::fs;

use tracing::debug;

use crate::build::{Build, BuildError};
use crate::package::SourcePackage;
use crate::preset::dh::DhPreset;
use crate::preset::{CommandOverrides, Preset, PresetError};
use crate::stage::StageSet;

#[derive(Debug, Default)]
pub struct DefaultPreset {
  dh: DhPreset,
}

impl DefaultPreset {
  pub fn new() -> Self {
    Self::default()
  }

  /// Use a specific dh preset for clean, install and package.
  pub fn with_dh(dh: DhPreset) -> Self {
    Self { dh }
  }
}

impl Preset for DefaultPreset {
  fn name(&self) -> &'static str {
    "default"
  }

  fn capabilities(&self) -> StageSet {
    StageSet::ALL
  }

  fn initialize(&mut self, source: &SourcePackage) -> Result<(), PresetError> {
    self.dh.initialize(source)
  }

  fn command_overrides_mut(&mut self) -> Option<&mut CommandOverrides> {
    self.dh.command_overrides_mut()
  }

  fn clean(&self, build: &mut Build) -> Result<(), BuildError> {
    for (package, dir) in build.install_dirs() {
      if dir.is_dir() && !build.dry_run {
        debug!(package, dir = %dir.display(), "removing install dir");
        fs::remove_dir_all(&dir)?;
      }
    }
    self.dh.clean(build)
  }

  fn prepare(&self, _build: &mut Build) -> Result<(), BuildError> {
    Ok(())
  }

  fn configure(&self, _build: &mut Build) -> Result<(), BuildError> {
    Ok(())
  }

  fn build(&self, _build: &mut Build) -> Result<(), BuildError> {
    Ok(())
  }

  fn test(&self, _build: &mut Build) -> Result<(), BuildError> {
    Ok(())
  }

  fn install(&self, build: &mut Build) -> Result<(), BuildError> {
    self.dh.install(build)
  }

  fn package(&self, build: &mut Build) -> Result<(), BuildError> {
    self.dh.package(build)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::build::{BinaryPackage, BuildFlags};
  use crate::preset::dh::HelperSequences;
  use crate::preset::dh::sequence::STAMP_LINE;
  use crate::stage::Stage;
  use tempfile::TempDir;

  fn preset(dir: &std::path::Path) -> DefaultPreset {
    let build = vec![
      "dh_auto_configure".to_string(),
      "dh_auto_test".to_string(),
      STAMP_LINE.to_string(),
    ];
    let mut install = build.clone();
    install.push("touch installed".to_string());
    let mut binary = install.clone();
    binary.push("touch packaged".to_string());
    let sequences = HelperSequences {
      clean: vec!["touch cleaned".to_string()],
      build,
      install,
      binary,
    };
    let mut preset = DefaultPreset::with_dh(DhPreset::new().with_source(sequences));
    preset.initialize(&SourcePackage::new("hello", "1.0", dir)).unwrap();
    preset
  }

  #[test]
  fn provides_every_stage() {
    assert_eq!(DefaultPreset::new().capabilities(), StageSet::ALL);
  }

  #[test]
  fn middle_stages_are_noops() {
    let temp = TempDir::new().unwrap();
    let preset = preset(temp.path());
    let mut build = Build::new(temp.path(), BuildFlags::default());

    for stage in [Stage::Prepare, Stage::Configure, Stage::Build, Stage::Test] {
      preset.run(stage, &mut build).unwrap();
    }
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
  }

  #[test]
  fn clean_removes_install_dirs_and_runs_dh_clean() {
    let temp = TempDir::new().unwrap();
    let preset = preset(temp.path());
    let mut build =
      Build::new(temp.path(), BuildFlags::default()).with_binary_packages(vec![BinaryPackage::new("hello", true)]);
    let install_dir = build.install_dir("hello").unwrap();
    std::fs::create_dir_all(install_dir.join("usr/bin")).unwrap();

    preset.run(Stage::Clean, &mut build).unwrap();

    assert!(!install_dir.exists());
    assert!(temp.path().join("cleaned").exists());
  }

  #[test]
  fn install_and_package_use_dh() {
    let temp = TempDir::new().unwrap();
    let preset = preset(temp.path());
    let mut build = Build::new(temp.path(), BuildFlags::default());

    preset.run(Stage::Install, &mut build).unwrap();
    preset.run(Stage::Package, &mut build).unwrap();

    assert!(temp.path().join("installed").exists());
    assert!(temp.path().join("packaged").exists());
  }
}

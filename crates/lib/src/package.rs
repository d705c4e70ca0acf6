//! Source packages and their build configuration.
//!
//! A [`Package`] ties a [`SourcePackage`] to the presets and stage overrides
//! its `debian/rules` chose, and runs the pipeline for a `debian/rules`
//! target.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info};

use crate::build::{BinaryPackage, Build, BuildError, BuildFlags, PackageFilter};
use crate::pipeline::{Pipeline, StageOverrides};
use crate::preset::default::DefaultPreset;
use crate::preset::{Preset, PresetError, StageFn};
use crate::process;
use crate::stage::Stage;

/// Identity and binary packages of a Debian source package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePackage {
  pub name: String,
  pub version: String,
  /// Directory containing `debian/`.
  pub base_dir: PathBuf,
  pub binary_packages: Vec<BinaryPackage>,
}

impl SourcePackage {
  pub fn new(name: impl Into<String>, version: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
    Self {
      name: name.into(),
      version: version.into(),
      base_dir: base_dir.into(),
      binary_packages: Vec::new(),
    }
  }

  pub fn with_binary_packages(mut self, packages: Vec<BinaryPackage>) -> Self {
    self.binary_packages = packages;
    self
  }

  /// Read name, version and binary packages with the dpkg and debhelper tools.
  pub fn query(base_dir: &Path) -> Result<Self, BuildError> {
    let changelog = base_dir.join("debian/changelog");
    if !changelog.is_file() {
      return Err(BuildError::MissingFile {
        path: changelog,
        hint: "not a Debian source package".to_string(),
      });
    }

    let field = |name: &str| -> Result<String, BuildError> {
      let mut cmd = Command::new("dpkg-parsechangelog");
      cmd.args(["-S", name]).current_dir(base_dir);
      Ok(process::output(&mut cmd)?.trim().to_string())
    };
    let list = |args: &[&str]| -> Result<Vec<String>, BuildError> {
      let mut cmd = Command::new("dh_listpackages");
      cmd.args(args).current_dir(base_dir);
      Ok(process::output(&mut cmd)?.split_whitespace().map(str::to_string).collect())
    };

    let arch_dependent: BTreeSet<String> = list(&["-a"])?.into_iter().collect();
    let binary_packages = list(&[])?
      .into_iter()
      .map(|name| {
        let arch = arch_dependent.contains(&name);
        BinaryPackage::new(name, arch)
      })
      .collect();

    let source = Self::new(field("Source")?, field("Version")?, base_dir).with_binary_packages(binary_packages);
    debug!(
      name = %source.name,
      version = %source.version,
      binaries = source.binary_packages.len(),
      "queried source package"
    );
    Ok(source)
  }

  /// `<name>-<version>`, unique per build of this package.
  pub fn identifier(&self) -> String {
    format!("{}-{}", self.name, self.version)
  }
}

/// A target `dpkg-buildpackage` invokes on `debian/rules`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulesTarget {
  Clean,
  Build,
  BuildArch,
  BuildIndep,
  Binary,
  BinaryArch,
  BinaryIndep,
}

#[derive(Debug, Error)]
#[error("unknown debian/rules target '{0}'")]
pub struct ParseRulesTargetError(String);

impl RulesTarget {
  pub const ALL: [RulesTarget; 7] = [
    RulesTarget::Clean,
    RulesTarget::Build,
    RulesTarget::BuildArch,
    RulesTarget::BuildIndep,
    RulesTarget::Binary,
    RulesTarget::BinaryArch,
    RulesTarget::BinaryIndep,
  ];

  pub const fn as_str(self) -> &'static str {
    match self {
      RulesTarget::Clean => "clean",
      RulesTarget::Build => "build",
      RulesTarget::BuildArch => "build-arch",
      RulesTarget::BuildIndep => "build-indep",
      RulesTarget::Binary => "binary",
      RulesTarget::BinaryArch => "binary-arch",
      RulesTarget::BinaryIndep => "binary-indep",
    }
  }

  /// Last stage the target runs.
  pub const fn stage(self) -> Stage {
    match self {
      RulesTarget::Clean => Stage::Clean,
      RulesTarget::Build | RulesTarget::BuildArch | RulesTarget::BuildIndep => Stage::Build,
      RulesTarget::Binary | RulesTarget::BinaryArch | RulesTarget::BinaryIndep => Stage::Package,
    }
  }

  pub const fn filter(self) -> PackageFilter {
    match self {
      RulesTarget::BuildArch | RulesTarget::BinaryArch => PackageFilter::ArchSpecific,
      RulesTarget::BuildIndep | RulesTarget::BinaryIndep => PackageFilter::ArchIndependent,
      _ => PackageFilter::All,
    }
  }
}

impl fmt::Display for RulesTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for RulesTarget {
  type Err = ParseRulesTargetError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    RulesTarget::ALL
      .into_iter()
      .find(|target| target.as_str() == s)
      .ok_or_else(|| ParseRulesTargetError(s.to_string()))
  }
}

/// A source package with the presets and overrides that build it.
pub struct Package {
  source: SourcePackage,
  presets: Vec<Box<dyn Preset>>,
  fallback: Box<dyn Preset>,
  stage_overrides: StageOverrides,
}

impl Package {
  /// Build `source` with `presets`, tried in order before the default preset.
  pub fn new(source: SourcePackage, presets: Vec<Box<dyn Preset>>) -> Result<Self, PresetError> {
    Self::with_fallback(source, presets, Box::new(DefaultPreset::new()))
  }

  /// Like [`Package::new`] with a custom fallback preset.
  ///
  /// Every preset, the fallback included, is initialized here.
  pub fn with_fallback(
    source: SourcePackage,
    mut presets: Vec<Box<dyn Preset>>,
    mut fallback: Box<dyn Preset>,
  ) -> Result<Self, PresetError> {
    for preset in presets.iter_mut().chain(std::iter::once(&mut fallback)) {
      debug!(preset = preset.name(), "initializing preset");
      preset.initialize(&source)?;
    }
    Ok(Self {
      source,
      presets,
      fallback,
      stage_overrides: StageOverrides::new(),
    })
  }

  pub fn source(&self) -> &SourcePackage {
    &self.source
  }

  /// Use `f` for `stage` regardless of what the presets provide.
  pub fn override_stage(&mut self, stage: Stage, f: StageFn) {
    debug!(stage = %stage, "registered stage override");
    self.stage_overrides.set(stage, f);
  }

  /// Replace the external command `id` in every preset that runs it.
  ///
  /// Fails with [`PresetError::UnknownCommand`] when no preset knows `id`.
  pub fn override_command<F>(&mut self, id: &str, hook: F) -> Result<(), PresetError>
  where
    F: Fn(&mut Build) -> Result<(), BuildError> + 'static,
  {
    let hook = Rc::new(hook);
    let mut registered = false;
    for preset in self.presets.iter_mut().chain(std::iter::once(&mut self.fallback)) {
      let Some(overrides) = preset.command_overrides_mut() else {
        continue;
      };
      if overrides.knows(id) {
        let hook = Rc::clone(&hook);
        overrides.register(id, Box::new(move |build| (*hook)(build)))?;
        registered = true;
      }
    }

    if registered {
      Ok(())
    } else {
      Err(PresetError::UnknownCommand { id: id.to_string() })
    }
  }

  pub fn pipeline(&self) -> Pipeline<'_> {
    Pipeline::new(self.presets.iter().map(|preset| preset.as_ref()).collect())
      .with_overrides(&self.stage_overrides)
      .with_fallback(self.fallback.as_ref())
  }

  /// A fresh build context for this package.
  pub fn new_build(&self, flags: BuildFlags) -> Build {
    Build::new(&self.source.base_dir, flags).with_binary_packages(self.source.binary_packages.clone())
  }

  pub fn run(&self, build: &mut Build, target: Option<Stage>) -> Result<(), BuildError> {
    self.pipeline().run(build, target)
  }

  /// Run the stages a `debian/rules` target stands for.
  pub fn run_target(&self, build: &mut Build, target: RulesTarget) -> Result<(), BuildError> {
    info!(target = %target, package = %self.source.name, "running rules target");
    let filter = target.filter();
    if filter != PackageFilter::All {
      build.filter_packages(filter);
    }
    self.run(build, Some(target.stage()))
  }
}

impl fmt::Debug for Package {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Package")
      .field("source", &self.source)
      .field("presets", &self.presets.iter().map(|p| p.name()).collect::<Vec<_>>())
      .field("fallback", &self.fallback.name())
      .field("stage_overrides", &self.stage_overrides)
      .finish()
  }
}

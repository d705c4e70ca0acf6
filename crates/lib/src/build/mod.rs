//! Per-invocation build context.
//!
//! A [`Build`] is created fresh for every pipeline run and shared by all
//! stage executions. Presets and stage overrides receive it mutably so they
//! can narrow the package selection, but stage-completion bookkeeping is
//! owned by the [`Pipeline`](crate::pipeline::Pipeline).
//!
//! # Submodules
//!
//! - [`cmd`] - command execution for stage implementations

pub mod cmd;
mod types;

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::stage::{Stage, StageSet};

pub use types::*;

#[derive(Debug, Clone)]
pub struct Build {
  /// Root of the unpacked source package.
  pub source_dir: PathBuf,
  /// Parent of the per-binary install directories (`debian/` by default).
  pub install_base_dir: PathBuf,
  pub binary_packages: Vec<BinaryPackage>,
  /// GNU triplet of the machine running the build (`DEB_BUILD_GNU_TYPE`).
  pub build_triplet: String,
  /// GNU triplet of the machine the packages are built for (`DEB_HOST_GNU_TYPE`).
  pub host_triplet: String,
  /// Job count handed to build tools that parallelise internally.
  pub parallel: usize,
  pub prefix: PathBuf,
  /// Log commands instead of running them.
  pub dry_run: bool,
  flags: BuildFlags,
  selected: Option<BTreeSet<String>>,
  completed: StageSet,
}

impl Build {
  pub fn new(source_dir: impl Into<PathBuf>, flags: BuildFlags) -> Self {
    let source_dir = source_dir.into();
    let parallel = std::thread::available_parallelism()
      .map(NonZeroUsize::get)
      .unwrap_or(1);

    Self {
      install_base_dir: source_dir.join("debian"),
      source_dir,
      binary_packages: Vec::new(),
      build_triplet: flags.get("DEB_BUILD_GNU_TYPE").unwrap_or_default().to_string(),
      host_triplet: flags.get("DEB_HOST_GNU_TYPE").unwrap_or_default().to_string(),
      parallel,
      prefix: PathBuf::from("/usr"),
      dry_run: false,
      flags,
      selected: None,
      completed: StageSet::EMPTY,
    }
  }

  pub fn with_binary_packages(mut self, packages: Vec<BinaryPackage>) -> Self {
    self.binary_packages = packages;
    self
  }

  pub fn with_dry_run(mut self, dry_run: bool) -> Self {
    self.dry_run = dry_run;
    self
  }

  pub fn flags(&self) -> &BuildFlags {
    &self.flags
  }

  /// Install directory of every binary package, keyed by package name.
  pub fn install_dirs(&self) -> BTreeMap<&str, PathBuf> {
    self
      .binary_packages
      .iter()
      .map(|pkg| (pkg.name.as_str(), self.install_base_dir.join(&pkg.name)))
      .collect()
  }

  pub fn install_dir(&self, package: &str) -> Result<PathBuf, BuildError> {
    self
      .binary_packages
      .iter()
      .find(|pkg| pkg.name == package)
      .map(|pkg| self.install_base_dir.join(&pkg.name))
      .ok_or_else(|| BuildError::UnknownPackage(package.to_string()))
  }

  /// Packages the current run builds. Everything until a selection is made.
  pub fn selected_packages(&self) -> Vec<&BinaryPackage> {
    match &self.selected {
      None => self.binary_packages.iter().collect(),
      Some(names) => self
        .binary_packages
        .iter()
        .filter(|pkg| names.contains(&pkg.name))
        .collect(),
    }
  }

  /// Only build the named packages. Unknown names are ignored.
  pub fn select_packages<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
    let names: BTreeSet<String> = names.into_iter().map(str::to_string).collect();
    debug!(packages = ?names, "selecting binary packages");
    self.selected = Some(names);
  }

  pub fn filter_packages(&mut self, filter: PackageFilter) {
    let names: Vec<String> = filter
      .apply(&self.binary_packages)
      .into_iter()
      .map(|pkg| pkg.name.clone())
      .collect();
    self.select_packages(names.iter().map(String::as_str));
  }

  pub fn clear_selection(&mut self) {
    self.selected = None;
  }

  pub fn is_stage_completed(&self, stage: Stage) -> bool {
    self.completed.contains(stage)
  }

  pub fn completed_stages(&self) -> StageSet {
    self.completed
  }

  pub(crate) fn mark_stage_done(&mut self, stage: Stage) {
    self.completed.insert(stage);
  }

  fn resolve_cwd(&self, cwd: Option<&Path>) -> PathBuf {
    match cwd {
      Some(dir) if dir.is_absolute() => dir.to_path_buf(),
      Some(dir) => self.source_dir.join(dir),
      None => self.source_dir.clone(),
    }
  }
}

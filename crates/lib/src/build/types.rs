use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::preset::PresetError;
use crate::process::{self, CommandError};
use crate::stage::Stage;

/// Errors raised while running pipeline stages.
#[derive(Debug, Error)]
pub enum BuildError {
  /// An external tool exited unsuccessfully or could not be started.
  #[error(transparent)]
  Command(#[from] CommandError),

  /// Neither an override nor any preset (including the fallback) provides the stage.
  #[error("{0} stage was never executed: no override and no preset provides it")]
  UnresolvedStage(Stage),

  /// A preset's capability map claims a stage its implementation does not provide.
  #[error("preset '{preset}' declares the {stage} stage but does not implement it")]
  StageNotProvided { preset: String, stage: Stage },

  /// A file a stage depends on is missing.
  #[error("{hint}: '{}' not found", path.display())]
  MissingFile { path: PathBuf, hint: String },

  #[error("no binary package named '{0}' in this build")]
  UnknownPackage(String),

  #[error(transparent)]
  Preset(#[from] PresetError),

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// A binary package produced from the source package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryPackage {
  pub name: String,
  /// False for `Architecture: all` packages.
  pub arch_dependent: bool,
}

impl BinaryPackage {
  pub fn new(name: impl Into<String>, arch_dependent: bool) -> Self {
    Self {
      name: name.into(),
      arch_dependent,
    }
  }
}

/// Subset of binary packages a build operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageFilter {
  #[default]
  All,
  /// Packages built per architecture.
  ArchSpecific,
  /// `Architecture: all` packages.
  ArchIndependent,
}

impl PackageFilter {
  pub fn matches(self, package: &BinaryPackage) -> bool {
    match self {
      PackageFilter::All => true,
      PackageFilter::ArchSpecific => package.arch_dependent,
      PackageFilter::ArchIndependent => !package.arch_dependent,
    }
  }

  pub fn apply(self, packages: &[BinaryPackage]) -> Vec<&BinaryPackage> {
    packages.iter().filter(|pkg| self.matches(pkg)).collect()
  }
}

/// Build-system environment variables (`CFLAGS`, `DEB_HOST_ARCH`, ...).
///
/// Read-only once constructed. Stage commands receive these as their
/// environment; the process environment is never modified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildFlags(BTreeMap<String, String>);

impl BuildFlags {
  /// Query `dpkg-buildflags` and `dpkg-architecture` the way
  /// `buildflags.mk` and `architecture.mk` would.
  pub fn query(source_dir: &Path, maint_options: Option<&str>) -> Result<Self, BuildError> {
    let mut flags = BTreeMap::new();
    if let Some(options) = maint_options {
      flags.insert("DEB_BUILD_MAINT_OPTIONS".to_string(), options.to_string());
    }

    let mut buildflags = Command::new("dpkg-buildflags");
    buildflags.current_dir(source_dir).envs(&flags);
    parse_assignments(&process::output(&mut buildflags)?, &mut flags);

    let mut architecture = Command::new("dpkg-architecture");
    architecture.current_dir(source_dir).envs(&flags);
    parse_assignments(&process::output(&mut architecture)?, &mut flags);

    debug!(count = flags.len(), "queried build flags");
    Ok(Self(flags))
  }

  /// Parse `KEY=VALUE` lines, later lines overriding earlier ones.
  pub fn parse(output: &str) -> Self {
    let mut flags = BTreeMap::new();
    parse_assignments(output, &mut flags);
    Self(flags)
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.0.get(key).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BuildFlags {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
  }
}

fn parse_assignments(output: &str, into: &mut BTreeMap<String, String>) {
  for line in output.lines() {
    if let Some((name, value)) = line.split_once('=') {
      let name = name.trim();
      if !name.is_empty() {
        into.insert(name.to_string(), value.to_string());
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn packages() -> Vec<BinaryPackage> {
    vec![
      BinaryPackage::new("htop", true),
      BinaryPackage::new("htop-doc", false),
      BinaryPackage::new("libhtop0", true),
    ]
  }

  #[test]
  fn filter_arch_specific() {
    let pkgs = packages();
    let names: Vec<_> = PackageFilter::ArchSpecific
      .apply(&pkgs)
      .iter()
      .map(|p| p.name.as_str())
      .collect();
    assert_eq!(names, vec!["htop", "libhtop0"]);
  }

  #[test]
  fn filter_arch_independent() {
    let pkgs = packages();
    let names: Vec<_> = PackageFilter::ArchIndependent
      .apply(&pkgs)
      .iter()
      .map(|p| p.name.as_str())
      .collect();
    assert_eq!(names, vec!["htop-doc"]);
  }

  #[test]
  fn filter_all_keeps_everything() {
    assert_eq!(PackageFilter::All.apply(&packages()).len(), 3);
  }

  #[test]
  fn parse_flags_output() {
    let flags = BuildFlags::parse("CFLAGS=-g -O2\nLDFLAGS=-Wl,-z,relro\nnot an assignment\nCFLAGS=-O3\n");
    assert_eq!(flags.get("CFLAGS"), Some("-O3"));
    assert_eq!(flags.get("LDFLAGS"), Some("-Wl,-z,relro"));
    assert_eq!(flags.len(), 2);
  }

  #[test]
  fn flag_values_may_contain_equals() {
    let flags = BuildFlags::parse("CPPFLAGS=-D_FORTIFY_SOURCE=2\n");
    assert_eq!(flags.get("CPPFLAGS"), Some("-D_FORTIFY_SOURCE=2"));
  }
}

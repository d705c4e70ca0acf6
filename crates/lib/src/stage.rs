//! Build stages and stage sets.
//!
//! A package build walks a fixed, totally ordered list of stages. The order
//! of [`Stage::ALL`] is the pipeline's iteration order and never changes at
//! runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One phase of a package build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
  /// Undo whatever previous builds left in the source tree.
  Clean,
  /// Patch or otherwise prepare the source tree.
  Prepare,
  Configure,
  Build,
  Test,
  /// Install build results into the per-binary install directories.
  Install,
  /// Assemble binary packages from the install directories.
  Package,
}

impl Stage {
  /// All stages in pipeline order.
  pub const ALL: [Stage; 7] = [
    Stage::Clean,
    Stage::Prepare,
    Stage::Configure,
    Stage::Build,
    Stage::Test,
    Stage::Install,
    Stage::Package,
  ];

  pub const fn as_str(self) -> &'static str {
    match self {
      Stage::Clean => "clean",
      Stage::Prepare => "prepare",
      Stage::Configure => "configure",
      Stage::Build => "build",
      Stage::Test => "test",
      Stage::Install => "install",
      Stage::Package => "package",
    }
  }

  const fn bit(self) -> u8 {
    1 << (self as u8)
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error)]
#[error("unknown stage '{0}', expected one of: clean, prepare, configure, build, test, install, package")]
pub struct ParseStageError(String);

impl FromStr for Stage {
  type Err = ParseStageError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Stage::ALL
      .into_iter()
      .find(|stage| stage.as_str() == s)
      .ok_or_else(|| ParseStageError(s.to_string()))
  }
}

/// A set of stages, used both as a preset's capability map and as the
/// pipeline's completion record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StageSet(u8);

impl StageSet {
  pub const EMPTY: StageSet = StageSet(0);
  pub const ALL: StageSet = StageSet::of(&Stage::ALL);

  /// Build a set from a list of stages.
  pub const fn of(stages: &[Stage]) -> Self {
    let mut bits = 0;
    let mut idx = 0;
    while idx < stages.len() {
      bits |= stages[idx].bit();
      idx += 1;
    }
    StageSet(bits)
  }

  pub const fn contains(self, stage: Stage) -> bool {
    self.0 & stage.bit() != 0
  }

  pub fn insert(&mut self, stage: Stage) {
    self.0 |= stage.bit();
  }

  pub const fn with(self, stage: Stage) -> Self {
    StageSet(self.0 | stage.bit())
  }

  pub const fn is_empty(self) -> bool {
    self.0 == 0
  }

  pub fn len(self) -> usize {
    self.0.count_ones() as usize
  }

  /// Stages in the set, in pipeline order.
  pub fn iter(self) -> impl Iterator<Item = Stage> {
    Stage::ALL.into_iter().filter(move |stage| self.contains(*stage))
  }
}

impl FromIterator<Stage> for StageSet {
  fn from_iter<I: IntoIterator<Item = Stage>>(iter: I) -> Self {
    let mut set = StageSet::EMPTY;
    for stage in iter {
      set.insert(stage);
    }
    set
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stage_order_is_fixed() {
    let names: Vec<_> = Stage::ALL.iter().map(|s| s.as_str()).collect();
    assert_eq!(
      names,
      ["clean", "prepare", "configure", "build", "test", "install", "package"]
    );
    assert!(Stage::ALL.windows(2).all(|w| w[0] < w[1]));
  }

  #[test]
  fn parse_stage() {
    assert_eq!("install".parse::<Stage>().unwrap(), Stage::Install);
    let err = "compile".parse::<Stage>().unwrap_err();
    assert!(err.to_string().contains("compile"));
  }

  #[test]
  fn stage_set_membership() {
    let set = StageSet::of(&[Stage::Clean, Stage::Install]);
    assert!(set.contains(Stage::Clean));
    assert!(set.contains(Stage::Install));
    assert!(!set.contains(Stage::Build));
    assert_eq!(set.len(), 2);
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![Stage::Clean, Stage::Install]);
  }

  #[test]
  fn stage_set_all_and_empty() {
    assert_eq!(StageSet::ALL.len(), 7);
    assert!(StageSet::EMPTY.is_empty());
    assert_eq!(Stage::ALL.into_iter().collect::<StageSet>(), StageSet::ALL);
  }

  #[test]
  fn stage_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Stage::Configure).unwrap(), "\"configure\"");
  }
}

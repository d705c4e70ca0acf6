//! The stage pipeline.
//!
//! Walks [`Stage::ALL`] in order and resolves each stage to exactly one
//! implementation, first match wins:
//!
//! 1. a stage override registered on the package,
//! 2. the first preset whose capabilities include the stage,
//! 3. the fallback preset.
//!
//! Completed stages are recorded in the [`Build`] and skipped on later runs,
//! so a run truncated at a target stage can be resumed by running again.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info};

use crate::build::{Build, BuildError};
use crate::preset::{Preset, StageFn};
use crate::stage::Stage;

/// Stage implementations registered directly on a package.
#[derive(Default)]
pub struct StageOverrides(BTreeMap<Stage, StageFn>);

impl StageOverrides {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `f` for `stage`, replacing any earlier override.
  pub fn set(&mut self, stage: Stage, f: StageFn) {
    self.0.insert(stage, f);
  }

  pub fn get(&self, stage: Stage) -> Option<&StageFn> {
    self.0.get(&stage)
  }

  pub fn contains(&self, stage: Stage) -> bool {
    self.0.contains_key(&stage)
  }
}

impl fmt::Debug for StageOverrides {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_set().entries(self.0.keys()).finish()
  }
}

/// What a stage resolved to.
pub enum Resolution<'a> {
  Override(&'a StageFn),
  Preset(&'a dyn Preset),
  Fallback(&'a dyn Preset),
}

impl Resolution<'_> {
  /// Short description for logs: `override`, `preset:<name>` or `fallback:<name>`.
  pub fn describe(&self) -> String {
    match self {
      Resolution::Override(_) => "override".to_string(),
      Resolution::Preset(preset) => format!("preset:{}", preset.name()),
      Resolution::Fallback(preset) => format!("fallback:{}", preset.name()),
    }
  }

  fn execute(&self, stage: Stage, build: &mut Build) -> Result<(), BuildError> {
    match self {
      Resolution::Override(f) => f(build),
      Resolution::Preset(preset) | Resolution::Fallback(preset) => preset.run(stage, build),
    }
  }
}

pub struct Pipeline<'a> {
  overrides: Option<&'a StageOverrides>,
  presets: Vec<&'a dyn Preset>,
  fallback: Option<&'a dyn Preset>,
}

impl<'a> Pipeline<'a> {
  /// A pipeline over `presets`, tried in the given order.
  pub fn new(presets: Vec<&'a dyn Preset>) -> Self {
    Self {
      overrides: None,
      presets,
      fallback: None,
    }
  }

  pub fn with_overrides(mut self, overrides: &'a StageOverrides) -> Self {
    self.overrides = Some(overrides);
    self
  }

  /// Preset used for any stage nothing else resolves.
  ///
  /// Unlike regular presets the fallback is used whether or not its
  /// capabilities include the stage.
  pub fn with_fallback(mut self, fallback: &'a dyn Preset) -> Self {
    self.fallback = Some(fallback);
    self
  }

  pub fn resolve(&self, stage: Stage) -> Option<Resolution<'a>> {
    if let Some(f) = self.overrides.and_then(|overrides| overrides.get(stage)) {
      return Some(Resolution::Override(f));
    }
    if let Some(preset) = self.presets.iter().find(|preset| preset.provides(stage)) {
      return Some(Resolution::Preset(*preset));
    }
    self.fallback.map(Resolution::Fallback)
  }

  /// Run every stage not yet completed, stopping after `target` if given.
  ///
  /// A stage is marked completed only after it returned successfully; the
  /// first error aborts the run.
  pub fn run(&self, build: &mut Build, target: Option<Stage>) -> Result<(), BuildError> {
    for stage in Stage::ALL {
      if build.is_stage_completed(stage) {
        debug!(stage = %stage, "stage already completed, skipping");
      } else {
        let resolution = self.resolve(stage).ok_or(BuildError::UnresolvedStage(stage))?;
        info!(stage = %stage, via = %resolution.describe(), "running stage");
        resolution.execute(stage, build)?;
        build.mark_stage_done(stage);
      }

      if target == Some(stage) {
        debug!(stage = %stage, "reached target stage");
        break;
      }
    }
    Ok(())
  }
}

//! Presets: pluggable providers of stage implementations.
//!
//! A preset adapts an existing build technology (debhelper, autotools, ...)
//! to the fixed [`Stage`] model. Each preset declares the stages it
//! implements as data through [`Preset::capabilities`], so the pipeline can
//! decide which preset handles a stage before calling anything.
//!
//! # Submodules
//!
//! - [`dh`] - debhelper sequence decomposition
//! - [`autotools`] - `./configure && make`
//! - [`default`] - the mandatory fallback preset

pub mod autotools;
pub mod default;
pub mod dh;

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::build::{Build, BuildError};
use crate::package::SourcePackage;
use crate::process::CommandError;
use crate::stage::{Stage, StageSet};

/// A stage implementation supplied outside of a preset.
pub type StageFn = Box<dyn Fn(&mut Build) -> Result<(), BuildError>>;

/// Errors from preset initialization and hook registration.
#[derive(Debug, Error)]
pub enum PresetError {
  /// The dh build sequence did not end with the build stamp line.
  #[error("build stamp creation line missing from dh build sequence")]
  MissingStampLine,

  #[error("marker command '{marker}' not found in dh build sequence")]
  MarkerNotFound { marker: &'static str },

  /// A longer dh sequence does not start with the shorter one it should extend.
  #[error("dh {sequence} sequence diverges from the preceding sequence at command {position}")]
  SequenceDiverged { sequence: &'static str, position: usize },

  #[error("no preset sequence contains the command '{id}'")]
  UnknownCommand { id: String },

  #[error("preset '{preset}' was used before initialize() was called")]
  NotInitialized { preset: &'static str },

  #[error("querying the packaging helper failed: {0}")]
  Helper(#[from] CommandError),
}

/// Provider of stage implementations for one build technology.
///
/// Implementors override the stage methods they support and list exactly
/// those stages in [`capabilities`](Preset::capabilities). The default stage
/// methods fail with [`BuildError::StageNotProvided`]; a preset whose
/// capabilities disagree with its methods surfaces as that error.
pub trait Preset {
  fn name(&self) -> &'static str;

  /// Stages this preset implements.
  fn capabilities(&self) -> StageSet;

  /// Called once with the source package before any stage is resolved.
  fn initialize(&mut self, _source: &SourcePackage) -> Result<(), PresetError> {
    Ok(())
  }

  fn provides(&self, stage: Stage) -> bool {
    self.capabilities().contains(stage)
  }

  /// Per-command hooks, for presets that run external command sequences.
  fn command_overrides_mut(&mut self) -> Option<&mut CommandOverrides> {
    None
  }

  fn clean(&self, _build: &mut Build) -> Result<(), BuildError> {
    Err(not_provided(self.name(), Stage::Clean))
  }

  fn prepare(&self, _build: &mut Build) -> Result<(), BuildError> {
    Err(not_provided(self.name(), Stage::Prepare))
  }

  fn configure(&self, _build: &mut Build) -> Result<(), BuildError> {
    Err(not_provided(self.name(), Stage::Configure))
  }

  fn build(&self, _build: &mut Build) -> Result<(), BuildError> {
    Err(not_provided(self.name(), Stage::Build))
  }

  fn test(&self, _build: &mut Build) -> Result<(), BuildError> {
    Err(not_provided(self.name(), Stage::Test))
  }

  fn install(&self, _build: &mut Build) -> Result<(), BuildError> {
    Err(not_provided(self.name(), Stage::Install))
  }

  fn package(&self, _build: &mut Build) -> Result<(), BuildError> {
    Err(not_provided(self.name(), Stage::Package))
  }

  /// Dispatch to the method implementing `stage`.
  fn run(&self, stage: Stage, build: &mut Build) -> Result<(), BuildError> {
    match stage {
      Stage::Clean => self.clean(build),
      Stage::Prepare => self.prepare(build),
      Stage::Configure => self.configure(build),
      Stage::Build => self.build(build),
      Stage::Test => self.test(build),
      Stage::Install => self.install(build),
      Stage::Package => self.package(build),
    }
  }
}

fn not_provided(preset: &str, stage: Stage) -> BuildError {
  BuildError::StageNotProvided {
    preset: preset.to_string(),
    stage,
  }
}

/// Hooks replacing individual commands of an external command sequence.
///
/// Hooks can only be registered for command identifiers the preset has seen
/// in its sequences.
#[derive(Default)]
pub struct CommandOverrides {
  known: BTreeSet<String>,
  hooks: HashMap<String, StageFn>,
}

impl CommandOverrides {
  /// Replace the set of known command identifiers.
  pub fn set_known(&mut self, ids: impl IntoIterator<Item = String>) {
    self.known = ids.into_iter().collect();
  }

  pub fn knows(&self, id: &str) -> bool {
    self.known.contains(id)
  }

  pub fn known(&self) -> impl Iterator<Item = &str> {
    self.known.iter().map(String::as_str)
  }

  pub fn register(&mut self, id: &str, hook: StageFn) -> Result<(), PresetError> {
    if !self.knows(id) {
      return Err(PresetError::UnknownCommand { id: id.to_string() });
    }
    debug!(id, "registered command override");
    self.hooks.insert(id.to_string(), hook);
    Ok(())
  }

  pub fn get(&self, id: &str) -> Option<&StageFn> {
    self.hooks.get(id)
  }
}

impl fmt::Debug for CommandOverrides {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CommandOverrides")
      .field("known", &self.known)
      .field("hooks", &self.hooks.keys().collect::<BTreeSet<_>>())
      .finish()
  }
}

//! Debhelper preset.
//!
//! Runs the commands `dh` would run, split into stages. The sequences are
//! queried once in [`Preset::initialize`] with `dh <sequence> --no-act` and
//! then cut at fixed markers (see [`sequence`]). Individual dh commands can be
//! replaced with hooks through [`DhPreset::override_command`].

pub mod sequence;

use std::fmt;
use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::build::{Build, BuildError};
use crate::package::SourcePackage;
use crate::preset::{CommandOverrides, Preset, PresetError, StageFn};
use crate::process;
use crate::stage::{Stage, StageSet};

pub use sequence::{HelperSequences, StageSequences};

/// Source of raw dh command sequences.
pub trait SequenceSource {
  /// Commands of the dh `sequence` (`clean`, `build`, `install`, `binary`), in order.
  fn fetch(&self, base_dir: &Path, sequence: &str, args: &[String]) -> Result<Vec<String>, PresetError>;
}

/// Queries the installed `dh`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DhHelper;

impl SequenceSource for DhHelper {
  fn fetch(&self, base_dir: &Path, sequence: &str, args: &[String]) -> Result<Vec<String>, PresetError> {
    let mut cmd = Command::new("dh");
    cmd.arg(sequence).arg("--no-act").args(args).current_dir(base_dir);
    let output = process::output(&mut cmd)?;
    Ok(sequence::parse_sequence(&output))
  }
}

/// Pre-recorded sequences, ignoring the base dir and arguments.
impl SequenceSource for HelperSequences {
  fn fetch(&self, _base_dir: &Path, sequence: &str, _args: &[String]) -> Result<Vec<String>, PresetError> {
    Ok(match sequence {
      "clean" => self.clean.clone(),
      "build" => self.build.clone(),
      "install" => self.install.clone(),
      "binary" => self.binary.clone(),
      _ => Vec::new(),
    })
  }
}

pub struct DhPreset {
  args: Vec<String>,
  source: Box<dyn SequenceSource>,
  sequences: Option<StageSequences>,
  overrides: CommandOverrides,
}

impl DhPreset {
  const CAPABILITIES: StageSet = StageSet::of(&[
    Stage::Clean,
    Stage::Configure,
    Stage::Build,
    Stage::Test,
    Stage::Install,
    Stage::Package,
  ]);

  pub fn new() -> Self {
    Self::with_args(Vec::new())
  }

  /// Extra arguments passed to every `dh` invocation (`--with autoreconf`, ...).
  pub fn with_args(args: Vec<String>) -> Self {
    Self {
      args,
      source: Box::new(DhHelper),
      sequences: None,
      overrides: CommandOverrides::default(),
    }
  }

  pub fn with_source(mut self, source: impl SequenceSource + 'static) -> Self {
    self.source = Box::new(source);
    self
  }

  pub fn args(&self) -> &[String] {
    &self.args
  }

  /// Derived stage sequences, available after initialization.
  pub fn sequences(&self) -> Option<&StageSequences> {
    self.sequences.as_ref()
  }

  /// Run `hook` instead of the dh command `id`.
  pub fn override_command(&mut self, id: &str, hook: StageFn) -> Result<(), PresetError> {
    self.overrides.register(id, hook)
  }

  fn run_sequence(&self, stage: Stage, build: &mut Build) -> Result<(), BuildError> {
    let sequences = self
      .sequences
      .as_ref()
      .ok_or(PresetError::NotInitialized { preset: "dh" })?;
    let Some(commands) = sequences.get(stage) else {
      return Ok(());
    };

    for line in commands {
      let id = sequence::command_id(line);
      match self.overrides.get(id) {
        Some(hook) => {
          info!(id, stage = %stage, "running dh command override");
          hook(build)?;
        }
        None => build.shell(line, None)?,
      }
    }
    Ok(())
  }
}

impl Default for DhPreset {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for DhPreset {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DhPreset")
      .field("args", &self.args)
      .field("sequences", &self.sequences)
      .field("overrides", &self.overrides)
      .finish_non_exhaustive()
  }
}

impl Preset for DhPreset {
  fn name(&self) -> &'static str {
    "dh"
  }

  fn capabilities(&self) -> StageSet {
    Self::CAPABILITIES
  }

  fn initialize(&mut self, source: &SourcePackage) -> Result<(), PresetError> {
    let fetch = |name: &str| self.source.fetch(&source.base_dir, name, &self.args);
    let raw = HelperSequences {
      clean: fetch("clean")?,
      build: fetch("build")?,
      install: fetch("install")?,
      binary: fetch("binary")?,
    };

    let sequences = StageSequences::split(&raw)?;
    debug!(
      configure = sequences.configure.len(),
      build = sequences.build.len(),
      test = sequences.test.len(),
      install = sequences.install.len(),
      package = sequences.package.len(),
      "split dh sequences"
    );
    self.overrides.set_known(sequences.command_ids());
    self.sequences = Some(sequences);
    Ok(())
  }

  fn command_overrides_mut(&mut self) -> Option<&mut CommandOverrides> {
    Some(&mut self.overrides)
  }

  fn clean(&self, build: &mut Build) -> Result<(), BuildError> {
    self.run_sequence(Stage::Clean, build)
  }

  fn configure(&self, build: &mut Build) -> Result<(), BuildError> {
    self.run_sequence(Stage::Configure, build)
  }

  fn build(&self, build: &mut Build) -> Result<(), BuildError> {
    self.run_sequence(Stage::Build, build)
  }

  fn test(&self, build: &mut Build) -> Result<(), BuildError> {
    self.run_sequence(Stage::Test, build)
  }

  fn install(&self, build: &mut Build) -> Result<(), BuildError> {
    self.run_sequence(Stage::Install, build)
  }

  fn package(&self, build: &mut Build) -> Result<(), BuildError> {
    self.run_sequence(Stage::Package, build)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::build::BuildFlags;
  use std::fs;
  use tempfile::TempDir;

  fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  /// Sequences made of shell commands that leave a trace in the source dir.
  fn recording_sequences() -> HelperSequences {
    let build = lines(&[
      "echo testdir >> log",
      "dh_auto_configure",
      "echo build >> log",
      "dh_auto_test",
      sequence::STAMP_LINE,
    ]);
    let mut install = build.clone();
    install.push("echo install >> log".to_string());
    let mut binary = install.clone();
    binary.push("echo package >> log".to_string());
    HelperSequences {
      clean: lines(&["echo clean >> log"]),
      build,
      install,
      binary,
    }
  }

  fn initialized(dir: &Path) -> DhPreset {
    let mut preset = DhPreset::new().with_source(recording_sequences());
    preset.initialize(&SourcePackage::new("hello", "1.0-1", dir)).unwrap();
    preset
  }

  #[test]
  fn stage_before_initialize_fails() {
    let preset = DhPreset::new();
    let mut build = Build::new("/src", BuildFlags::default());
    let err = preset.clean(&mut build).unwrap_err();
    assert!(matches!(
      err,
      BuildError::Preset(PresetError::NotInitialized { preset: "dh" })
    ));
  }

  #[test]
  fn prepare_is_not_provided() {
    let preset = DhPreset::new();
    assert!(!preset.provides(Stage::Prepare));
    assert!(preset.provides(Stage::Clean));
    assert!(preset.provides(Stage::Package));
  }

  #[test]
  fn runs_commands_in_source_dir_with_overrides() {
    let temp = TempDir::new().unwrap();
    let mut preset = initialized(temp.path());
    preset
      .override_command(
        "dh_auto_configure",
        Box::new(|build: &mut Build| build.shell("echo configure-hook >> log", None)),
      )
      .unwrap();
    preset
      .override_command("dh_auto_test", Box::new(|_: &mut Build| Ok(())))
      .unwrap();

    let mut build = Build::new(temp.path(), BuildFlags::default());
    for stage in [Stage::Configure, Stage::Build, Stage::Test, Stage::Install] {
      preset.run(stage, &mut build).unwrap();
    }

    let log = fs::read_to_string(temp.path().join("log")).unwrap();
    assert_eq!(log, "testdir\nconfigure-hook\nbuild\ninstall\n");
  }

  #[test]
  fn override_for_unknown_command_is_rejected() {
    let temp = TempDir::new().unwrap();
    let mut preset = initialized(temp.path());
    let err = preset
      .override_command("dh_not_in_sequence", Box::new(|_: &mut Build| Ok(())))
      .unwrap_err();
    assert!(matches!(err, PresetError::UnknownCommand { .. }));
  }

  #[test]
  fn initialize_propagates_split_errors() {
    let mut raw = recording_sequences();
    raw.build.pop();
    let mut preset = DhPreset::new().with_source(raw);
    let err = preset
      .initialize(&SourcePackage::new("hello", "1.0-1", "/src"))
      .unwrap_err();
    assert!(matches!(err, PresetError::MissingStampLine));
    assert!(preset.sequences().is_none());
  }
}

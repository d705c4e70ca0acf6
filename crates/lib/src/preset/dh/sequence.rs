//! Splitting debhelper sequences into stages.
//!
//! `dh` only knows coarse sequences: `clean`, `build` (configure, compile
//! and test), `install` (build plus install) and `binary` (install plus
//! packaging). The functions here cut those flat command lists at fixed
//! marker commands. Splitting is positional: it relies on dh emitting
//! `dh_auto_configure` before `dh_auto_test` and on every longer sequence
//! repeating the shorter one verbatim. When either assumption breaks the
//! split fails instead of guessing.

use std::collections::BTreeSet;

use crate::preset::PresetError;
use crate::stage::Stage;

/// Last line of the dh `build` sequence.
pub const STAMP_LINE: &str = "create-stamp debian/debhelper-build-stamp";

/// Command ending the configure stage.
pub const CONFIGURE_MARKER: &str = "dh_auto_configure";

/// Command starting the test stage.
pub const TEST_MARKER: &str = "dh_auto_test";

/// Raw sequences as reported by `dh <sequence> --no-act`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelperSequences {
  pub clean: Vec<String>,
  pub build: Vec<String>,
  pub install: Vec<String>,
  pub binary: Vec<String>,
}

/// Per-stage command lists derived from [`HelperSequences`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageSequences {
  pub clean: Vec<String>,
  pub configure: Vec<String>,
  pub build: Vec<String>,
  pub test: Vec<String>,
  pub install: Vec<String>,
  pub package: Vec<String>,
}

impl StageSequences {
  pub fn split(raw: &HelperSequences) -> Result<Self, PresetError> {
    let build_seq = match raw.build.split_last() {
      Some((last, rest)) if last == STAMP_LINE => rest,
      _ => return Err(PresetError::MissingStampLine),
    };

    let configure_end = marker_index(build_seq, CONFIGURE_MARKER, 0)?;
    let test_start = marker_index(build_seq, TEST_MARKER, configure_end + 1)?;

    Ok(Self {
      clean: raw.clean.clone(),
      configure: build_seq[..=configure_end].to_vec(),
      build: build_seq[configure_end + 1..test_start].to_vec(),
      test: build_seq[test_start..].to_vec(),
      install: strip_head(&raw.install, &raw.build, "install")?.to_vec(),
      package: strip_head(&raw.binary, &raw.install, "binary")?.to_vec(),
    })
  }

  /// Commands for `stage`, or `None` for stages dh has no sequence for.
  pub fn get(&self, stage: Stage) -> Option<&[String]> {
    match stage {
      Stage::Clean => Some(&self.clean),
      Stage::Prepare => None,
      Stage::Configure => Some(&self.configure),
      Stage::Build => Some(&self.build),
      Stage::Test => Some(&self.test),
      Stage::Install => Some(&self.install),
      Stage::Package => Some(&self.package),
    }
  }

  /// Every command identifier occurring in any stage.
  pub fn command_ids(&self) -> BTreeSet<String> {
    [
      &self.clean,
      &self.configure,
      &self.build,
      &self.test,
      &self.install,
      &self.package,
    ]
    .into_iter()
    .flatten()
    .map(|line| command_id(line).to_string())
    .collect()
  }
}

/// Parse `dh --no-act` output into one command per line.
pub fn parse_sequence(output: &str) -> Vec<String> {
  output
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(str::to_string)
    .collect()
}

/// The program name of a command line.
pub fn command_id(line: &str) -> &str {
  line.split_whitespace().next().unwrap_or_default()
}

/// Index of the first command at or after `start` whose identifier is `marker`.
pub fn marker_index(seq: &[String], marker: &'static str, start: usize) -> Result<usize, PresetError> {
  seq
    .iter()
    .enumerate()
    .skip(start)
    .find(|(_, line)| command_id(line) == marker)
    .map(|(idx, _)| idx)
    .ok_or(PresetError::MarkerNotFound { marker })
}

/// Remove `head` from the front of `seq`.
///
/// `seq` must start with every element of `head`; the first mismatching
/// position is reported as [`PresetError::SequenceDiverged`].
pub fn strip_head<'a>(seq: &'a [String], head: &[String], sequence: &'static str) -> Result<&'a [String], PresetError> {
  let common = seq.iter().zip(head).take_while(|(a, b)| a == b).count();
  if common < head.len() {
    return Err(PresetError::SequenceDiverged {
      sequence,
      position: common,
    });
  }
  Ok(&seq[common..])
}

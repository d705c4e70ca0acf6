//! External process execution.
//!
//! Every tool debrig shells out to (build tools, the debhelper sequencer,
//! container runtimes) goes through these helpers so that invocations are
//! logged the same way and a non-zero exit always becomes a
//! [`CommandError::Failed`].

use std::borrow::Cow;
use std::io;
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::{debug, info};

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum CommandError {
  /// The program could not be started at all.
  #[error("failed to spawn '{cmd}': {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: io::Error,
  },

  /// The program ran and exited unsuccessfully.
  #[error("command failed with exit code {code:?}: {cmd}")]
  Failed { cmd: String, code: Option<i32> },

  #[error("command produced non-UTF-8 output: {cmd}")]
  Utf8 { cmd: String },
}

impl CommandError {
  /// Exit code of a failed command, if it exited normally.
  pub fn exit_code(&self) -> Option<i32> {
    match self {
      CommandError::Failed { code, .. } => *code,
      _ => None,
    }
  }
}

/// Render a command as a copy-pasteable shell line.
pub fn display_command(cmd: &Command) -> String {
  std::iter::once(cmd.get_program())
    .chain(cmd.get_args())
    .map(|arg| quote(&arg.to_string_lossy()).into_owned())
    .collect::<Vec<_>>()
    .join(" ")
}

fn quote(arg: &str) -> Cow<'_, str> {
  let plain = !arg.is_empty()
    && arg
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
  if plain {
    Cow::Borrowed(arg)
  } else {
    Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
  }
}

fn check_status(cmd: String, status: ExitStatus) -> Result<(), CommandError> {
  if status.success() {
    Ok(())
  } else {
    Err(CommandError::Failed {
      cmd,
      code: status.code(),
    })
  }
}

/// Run a command with inherited stdio and wait for it.
pub fn run(cmd: &mut Command) -> Result<(), CommandError> {
  let rendered = display_command(cmd);
  info!(cmd = %rendered, "running");

  let status = cmd.status().map_err(|source| CommandError::Spawn {
    cmd: rendered.clone(),
    source,
  })?;
  check_status(rendered, status)
}

/// Run a command and return its stdout.
///
/// Stdin is closed and stderr is captured; on failure the captured stderr is
/// logged at debug level.
pub fn output(cmd: &mut Command) -> Result<String, CommandError> {
  let rendered = display_command(cmd);
  debug!(cmd = %rendered, "querying");

  let output = cmd
    .stdin(Stdio::null())
    .output()
    .map_err(|source| CommandError::Spawn {
      cmd: rendered.clone(),
      source,
    })?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
      debug!(stderr = %stderr.trim(), "command stderr");
    }
    return Err(CommandError::Failed {
      cmd: rendered,
      code: output.status.code(),
    });
  }

  String::from_utf8(output.stdout).map_err(|_| CommandError::Utf8 { cmd: rendered })
}

/// Run a command silently and report its exit code.
///
/// Used for queries where the exit code itself is the answer (for example
/// `make -q <target>`). Returns `None` when the process was killed by a signal.
pub fn probe(cmd: &mut Command) -> Result<Option<i32>, CommandError> {
  let rendered = display_command(cmd);
  debug!(cmd = %rendered, "probing");

  let status = cmd
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .status()
    .map_err(|source| CommandError::Spawn { cmd: rendered, source })?;
  Ok(status.code())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_quotes_only_when_needed() {
    let mut cmd = Command::new("make");
    cmd.args(["-j4", "DESTDIR=/tmp/x y", "it's"]);
    assert_eq!(display_command(&cmd), r"make -j4 'DESTDIR=/tmp/x y' 'it'\''s'");
  }

  #[test]
  fn run_reports_exit_code() {
    let err = run(Command::new("/bin/sh").args(["-c", "exit 3"])).unwrap_err();
    assert_eq!(err.exit_code(), Some(3));
    assert!(err.to_string().contains("exit 3"));
  }

  #[test]
  fn run_missing_program_is_spawn_error() {
    let err = run(&mut Command::new("/nonexistent/debrig-test-binary")).unwrap_err();
    assert!(matches!(err, CommandError::Spawn { .. }));
  }

  #[test]
  fn output_captures_stdout() {
    let out = output(Command::new("/bin/sh").args(["-c", "echo one; echo two"])).unwrap();
    assert_eq!(out.lines().collect::<Vec<_>>(), vec!["one", "two"]);
  }

  #[test]
  fn output_fails_on_nonzero_exit() {
    let err = output(Command::new("/bin/sh").args(["-c", "echo oops >&2; exit 1"])).unwrap_err();
    assert_eq!(err.exit_code(), Some(1));
  }

  #[test]
  fn probe_returns_exit_code() {
    assert_eq!(probe(Command::new("/bin/sh").args(["-c", "exit 1"])).unwrap(), Some(1));
    assert_eq!(probe(Command::new("/bin/sh").args(["-c", "true"])).unwrap(), Some(0));
  }
}

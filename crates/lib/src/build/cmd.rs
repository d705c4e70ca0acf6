//! Command execution for stage implementations.
//!
//! Commands run with the build flags as their environment and the source
//! directory as the default working directory. In dry-run mode they are only
//! logged.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

use tracing::info;

use super::{Build, BuildError};
use crate::process;

impl Build {
  fn command<I, S>(&self, args: I, cwd: Option<&Path>) -> Option<Command>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
  {
    let mut args = args.into_iter();
    let program = args.next()?;
    let mut command = Command::new(program);
    command
      .args(args)
      .current_dir(self.resolve_cwd(cwd))
      .envs(self.flags().iter());
    Some(command)
  }

  /// Run a program with arguments.
  ///
  /// `cwd` defaults to the source directory; relative paths are resolved
  /// against it. An empty argument list is a no-op.
  pub fn cmd<I, S>(&self, args: I, cwd: Option<&Path>) -> Result<(), BuildError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
  {
    let Some(mut command) = self.command(args, cwd) else {
      return Ok(());
    };

    if self.dry_run {
      info!(cmd = %process::display_command(&command), "dry-run, not running");
      return Ok(());
    }

    process::run(&mut command)?;
    Ok(())
  }

  /// Run a command line verbatim through `/bin/sh -c`.
  pub fn shell(&self, line: &str, cwd: Option<&Path>) -> Result<(), BuildError> {
    self.cmd(["/bin/sh", "-c", line], cwd)
  }

  /// Run a read-only query and return its exit code.
  ///
  /// Probes run even in dry-run mode since they don't change anything.
  pub fn probe<I, S>(&self, args: I, cwd: Option<&Path>) -> Result<Option<i32>, BuildError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
  {
    match self.command(args, cwd) {
      Some(mut command) => Ok(process::probe(&mut command)?),
      None => Ok(None),
    }
  }
}

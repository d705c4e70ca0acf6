//! Terminal foreground handoff for interactive sessions.
//!
//! An interactive child must own the terminal while it runs: it gets its own
//! process group, that group becomes the terminal's foreground group, and
//! keyboard signals (Ctrl-C, Ctrl-Z) reach only the child. When the child
//! exits, the previous foreground group and terminal attributes are restored
//! on every exit path by [`ForegroundGuard`].

use std::io::{self, IsTerminal};
use std::os::fd::AsFd;
use std::os::unix::process::CommandExt;
use std::process::{Command, ExitStatus};

use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, Signal, kill};
use nix::sys::termios::{self, SetArg, Termios};
use nix::unistd::{Pid, tcgetpgrp, tcsetpgrp};
use tracing::{debug, warn};

use crate::process::display_command;

/// Returns true if stdin is attached to a terminal.
pub fn stdin_is_terminal() -> bool {
  io::stdin().is_terminal()
}

/// Saved terminal ownership of `tty`, restored on drop.
pub struct ForegroundGuard<F: AsFd> {
  tty: F,
  /// `None` when `tty` is not our controlling terminal, so there is no
  /// foreground group to hand over.
  pgrp: Option<Pid>,
  attrs: Termios,
}

impl<F: AsFd> ForegroundGuard<F> {
  /// Remember the current foreground process group and attributes of `tty`.
  pub fn save(tty: F) -> io::Result<Self> {
    let pgrp = match tcgetpgrp(&tty) {
      Ok(pgrp) => Some(pgrp),
      Err(Errno::ENOTTY) => None,
      Err(err) => return Err(err.into()),
    };
    let attrs = termios::tcgetattr(&tty)?;
    Ok(Self { tty, pgrp, attrs })
  }

  /// True if the terminal's foreground group can be handed to a child.
  pub fn controls_foreground(&self) -> bool {
    self.pgrp.is_some()
  }

  /// Make `pgrp` the terminal's foreground process group.
  pub fn hand_to(&self, pgrp: Pid) -> io::Result<()> {
    if self.controls_foreground() {
      tcsetpgrp(&self.tty, pgrp)?;
    }
    Ok(())
  }

  /// Put back the saved foreground group and attributes.
  ///
  /// Every step is attempted even if an earlier one fails; the first error
  /// is returned.
  fn restore(&self) -> io::Result<()> {
    let mut first_err = None;
    let mut note = |result: Result<(), Errno>| {
      if let Err(err) = result {
        first_err.get_or_insert(err);
      }
    };

    if let Some(pgrp) = self.pgrp {
      // tcsetpgrp from a background group raises SIGTTOU, which would stop us.
      // SAFETY: SIG_IGN installs no Rust code as a handler.
      let previous = unsafe { signal::signal(Signal::SIGTTOU, SigHandler::SigIgn) };
      if let Err(err) = previous {
        note(Err(err));
      }
      note(tcsetpgrp(&self.tty, pgrp));
      if let Ok(previous) = previous {
        // SAFETY: reinstates the handler that was active before.
        note(unsafe { signal::signal(Signal::SIGTTOU, previous) }.map(drop));
      }
    }
    note(termios::tcsetattr(&self.tty, SetArg::TCSADRAIN, &self.attrs));

    match first_err {
      Some(err) => Err(err.into()),
      None => Ok(()),
    }
  }
}

impl<F: AsFd> Drop for ForegroundGuard<F> {
  fn drop(&mut self) {
    if let Err(err) = self.restore() {
      warn!(error = %err, "failed to restore terminal foreground");
    }
  }
}

/// Run `cmd` in its own process group as the terminal's foreground job and
/// wait for it.
///
/// Without a terminal on stdin the command simply runs attached to the
/// current process group.
pub fn run_in_foreground(cmd: &mut Command) -> io::Result<ExitStatus> {
  debug!(cmd = %display_command(cmd), "running in foreground");
  if !stdin_is_terminal() {
    return cmd.status();
  }
  run_on_terminal(io::stdin(), cmd)
}

/// Run `cmd` with `tty` handed to it, restoring the terminal afterwards.
pub fn run_on_terminal<F: AsFd>(tty: F, cmd: &mut Command) -> io::Result<ExitStatus> {
  let guard = ForegroundGuard::save(tty)?;
  if guard.controls_foreground() {
    cmd.process_group(0);
  }
  let mut child = cmd.spawn()?;
  let pid = Pid::from_raw(child.id() as i32);

  if guard.controls_foreground() {
    if let Err(err) = guard.hand_to(pid) {
      let _ = child.kill();
      let _ = child.wait();
      return Err(err);
    }
    // The child may have been stopped by SIGTTIN/SIGTTOU before it owned the terminal.
    if let Err(err) = kill(pid, Signal::SIGCONT) {
      debug!(error = %err, "failed to resume foreground child");
    }
  }

  let status = child.wait();
  drop(guard);
  status
}

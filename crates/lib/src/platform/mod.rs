pub mod paths;
pub mod terminal;

use nix::unistd::geteuid;

/// Returns true if the current process runs as root.
pub fn is_elevated() -> bool {
  geteuid().is_root()
}

mod build;
mod rules;
mod shell;

pub use build::{BuildArgs, cmd_build};
pub use rules::{PresetKind, RulesArgs, cmd_rules};
pub use shell::cmd_shell;

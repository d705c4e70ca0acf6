//! Implementation of the `debrig shell` command.

use std::path::Path;

use anyhow::{Context, Result};

use debrig_lib::config::Config;
use debrig_lib::orchestrate;
use debrig_lib::package::SourcePackage;

use crate::output;

/// Attach an interactive shell to the sandbox of a build that is still running.
pub fn cmd_shell(config_file: Option<&Path>, source_dir: &Path, sandbox: Option<&Path>) -> Result<()> {
  let config = Config::load(config_file).context("Failed to load configuration")?;

  let sandbox_root = match sandbox {
    Some(root) => root.to_path_buf(),
    None => {
      let source_dir = dunce::canonicalize(source_dir)
        .with_context(|| format!("Source directory not found: {}", source_dir.display()))?;
      let source = SourcePackage::query(&source_dir).context("Failed to read source package")?;
      orchestrate::sandbox_root(&config.build_root, &source.identifier())
    }
  };

  output::print_info(&format!("Entering sandbox {}", sandbox_root.display()));
  orchestrate::attach_shell(&sandbox_root, &config.driver).context("Failed to open a shell in the sandbox")?;
  Ok(())
}

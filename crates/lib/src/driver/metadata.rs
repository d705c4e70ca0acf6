//! `build.json`: what a later invocation needs to reattach to a sandbox.
//!
//! Written once right after the driver is created and never updated.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{BuildMetadata, DriverError};
use crate::consts::BUILD_METADATA_FILENAME;

pub fn metadata_path(build_root: &Path) -> PathBuf {
  build_root.join(BUILD_METADATA_FILENAME)
}

pub fn write_metadata(metadata: &BuildMetadata) -> Result<PathBuf, DriverError> {
  let path = metadata_path(&metadata.build_root);
  let json = serde_json::to_string_pretty(metadata).map_err(|source| DriverError::InvalidMetadata {
    path: path.clone(),
    source,
  })?;
  fs::write(&path, json)?;
  debug!(path = %path.display(), driver = %metadata.driver, "wrote build metadata");
  Ok(path)
}

pub fn read_metadata(build_root: &Path) -> Result<BuildMetadata, DriverError> {
  let path = metadata_path(build_root);
  if !path.is_file() {
    return Err(DriverError::MissingMetadata(path));
  }
  let content = fs::read_to_string(&path)?;
  serde_json::from_str(&content).map_err(|source| DriverError::InvalidMetadata { path, source })
}

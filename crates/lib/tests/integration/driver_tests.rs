use std::fs;
use std::path::{Path, PathBuf};

use debrig_lib::consts::SANDBOX_MOUNT_POINT;
use debrig_lib::driver::{self, BuildConfig, DriverConfig, DriverError, DriverKind, metadata};
use debrig_lib::orchestrate;
use tempfile::TempDir;

fn build_config(temp: &Path, dry_run: bool) -> BuildConfig {
  let source = temp.join("hello");
  fs::create_dir_all(source.join("debian")).unwrap();
  fs::write(source.join("debian/control"), "Source: hello\n").unwrap();
  fs::write(source.join("debian/rules"), "#!/usr/bin/make -f\n").unwrap();

  BuildConfig {
    package_identifier: "hello-2.10-3".to_string(),
    source_dir: source,
    output_dir: temp.join("out"),
    build_root: orchestrate::sandbox_root(&temp.join("builds"), "hello-2.10-3"),
    distro: "debian".to_string(),
    distro_version: "trixie".to_string(),
    dry_run,
    sign: false,
  }
}

#[test]
fn bare_driver_builds_in_sandbox_copy() {
  let temp = TempDir::new().unwrap();
  let config = build_config(temp.path(), false);
  orchestrate::prepare_sandbox(&config).unwrap();

  let driver = driver::create_driver(DriverKind::Bare, &config, &DriverConfig::default()).unwrap();
  driver
    .run_command(&["/bin/sh", "-c", "ls debian > listing"], None, false)
    .unwrap();

  let listing = fs::read_to_string(config.build_source_dir().join("listing")).unwrap();
  assert_eq!(listing.lines().collect::<Vec<_>>(), ["control", "rules"]);
  assert!(!config.source_dir.join("listing").exists());
}

#[test]
fn bare_driver_reattaches_from_metadata() {
  let temp = TempDir::new().unwrap();
  let config = build_config(temp.path(), false);
  orchestrate::prepare_sandbox(&config).unwrap();
  let driver = driver::create_driver(DriverKind::Bare, &config, &DriverConfig::default()).unwrap();
  metadata::write_metadata(&driver.build_metadata()).unwrap();

  let attached = driver::attach(&config.build_root, &DriverConfig::default()).unwrap();
  attached.run_command(&["touch", "from-attached"], None, false).unwrap();

  assert_eq!(attached.source_dir(), config.build_source_dir());
  assert!(config.build_source_dir().join("from-attached").exists());
  // The host source tree is only reachable from the creating process.
  assert!(matches!(
    attached.translate_path(&config.source_dir),
    Err(DriverError::PathOutsideSandbox { .. })
  ));
}

#[test]
fn container_driver_dry_run_round_trip() {
  let temp = TempDir::new().unwrap();
  let config = build_config(temp.path(), true);
  orchestrate::prepare_sandbox(&config).unwrap();

  let mut driver = driver::create_driver(DriverKind::Podman, &config, &DriverConfig::default()).unwrap();
  let path = metadata::write_metadata(&driver.build_metadata()).unwrap();

  let inside = driver.translate_path(&config.build_source_dir()).unwrap();
  assert_eq!(
    inside,
    PathBuf::from(SANDBOX_MOUNT_POINT).join("work/hello-2.10-3")
  );
  driver.run_command(&["dpkg-buildpackage", "-b"], None, false).unwrap();
  driver.cleanup().unwrap();

  assert!(path.is_file());
  let attached = driver::attach(&config.build_root, &DriverConfig::default()).unwrap();
  assert_eq!(attached.kind(), DriverKind::Podman);
  assert_eq!(attached.build_metadata(), driver.build_metadata());
}

#[test]
fn container_metadata_names_the_container() {
  let temp = TempDir::new().unwrap();
  let config = build_config(temp.path(), true);
  orchestrate::prepare_sandbox(&config).unwrap();

  let driver = driver::create_driver(DriverKind::Docker, &config, &DriverConfig::default()).unwrap();

  assert_eq!(
    driver.metadata().get("container_name").map(String::as_str),
    Some("debrig-hello-2.10-3-debian-trixie")
  );
}

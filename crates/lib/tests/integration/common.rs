//! Shared helpers for library integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use debrig_lib::build::{BinaryPackage, Build, BuildError, BuildFlags};
use debrig_lib::package::{Package, SourcePackage};
use debrig_lib::preset::Preset;
use debrig_lib::preset::default::DefaultPreset;
use debrig_lib::preset::dh::sequence::STAMP_LINE;
use debrig_lib::preset::dh::{DhPreset, HelperSequences};
use tempfile::TempDir;

/// File in the source dir that recording hooks append to.
pub const JOURNAL: &str = "journal";

/// dh commands replaced by recording hooks in [`hello_package`].
pub const DH_COMMANDS: [&str; 8] = [
  "dh_testdir",
  "dh_auto_configure",
  "dh_auto_build",
  "dh_auto_test",
  "dh_prep",
  "dh_auto_install",
  "dh_installdocs",
  "dh_builddeb",
];

fn lines(items: &[&str]) -> Vec<String> {
  items.iter().map(|item| item.to_string()).collect()
}

/// What `dh --no-act` reports for a plain debhelper package.
pub fn hello_sequences() -> HelperSequences {
  let build = lines(&[
    "dh_testdir",
    "dh_auto_configure",
    "dh_auto_build",
    "dh_auto_test",
    STAMP_LINE,
  ]);
  let mut install = build.clone();
  install.extend(lines(&["dh_prep", "dh_auto_install"]));
  let mut binary = install.clone();
  binary.extend(lines(&["dh_installdocs", "dh_builddeb"]));

  HelperSequences {
    clean: lines(&["rm -f journal"]),
    build,
    install,
    binary,
  }
}

/// A source tree with a `debian/` directory.
pub struct SourceTree {
  pub temp: TempDir,
}

impl SourceTree {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("debian")).unwrap();
    Self { temp }
  }

  pub fn path(&self) -> &Path {
    self.temp.path()
  }

  pub fn journal_path(&self) -> PathBuf {
    self.path().join(JOURNAL)
  }

  /// Lines appended by recording hooks so far.
  pub fn journal(&self) -> Vec<String> {
    fs::read_to_string(self.journal_path())
      .unwrap_or_default()
      .lines()
      .map(str::to_string)
      .collect()
  }

  pub fn source_package(&self) -> SourcePackage {
    SourcePackage::new("hello", "2.10-3", self.path()).with_binary_packages(vec![
      BinaryPackage::new("hello", true),
      BinaryPackage::new("hello-doc", false),
    ])
  }
}

/// Hook that appends `entry` to the journal through the shell.
pub fn record(entry: &str) -> impl Fn(&mut Build) -> Result<(), BuildError> + 'static {
  let line = format!("echo {entry} >> {JOURNAL}");
  move |build: &mut Build| build.shell(&line, None)
}

/// `hello` built by dh with every dh command replaced by a recording hook.
pub fn hello_package(tree: &SourceTree, presets: Vec<Box<dyn Preset>>) -> Package {
  let fallback = DefaultPreset::with_dh(DhPreset::new().with_source(hello_sequences()));
  let mut package = Package::with_fallback(tree.source_package(), presets, Box::new(fallback)).unwrap();
  for id in DH_COMMANDS {
    package.override_command(id, record(id)).unwrap();
  }
  package
}

pub fn dh_preset() -> Box<dyn Preset> {
  Box::new(DhPreset::new().with_source(hello_sequences()))
}

pub fn new_build(package: &Package) -> Build {
  package.new_build(BuildFlags::from_iter([("DEB_HOST_GNU_TYPE", "x86_64-linux-gnu")]))
}

use debrig_lib::build::BuildError;
use debrig_lib::package::{Package, RulesTarget};
use debrig_lib::preset::PresetError;
use debrig_lib::preset::default::DefaultPreset;
use debrig_lib::preset::dh::{DhPreset, HelperSequences};
use debrig_lib::stage::{Stage, StageSet};

use super::common::{DH_COMMANDS, SourceTree, dh_preset, hello_package, hello_sequences, new_build, record};

#[test]
fn dh_package_runs_every_command_in_order() {
  let tree = SourceTree::new();
  let package = hello_package(&tree, vec![dh_preset()]);
  let mut build = new_build(&package);

  package.run(&mut build, None).unwrap();

  assert_eq!(tree.journal(), DH_COMMANDS);
  assert_eq!(build.completed_stages(), StageSet::ALL);
}

#[test]
fn build_target_then_binary_target_resumes() {
  let tree = SourceTree::new();
  let package = hello_package(&tree, vec![dh_preset()]);
  let mut build = new_build(&package);

  package.run_target(&mut build, RulesTarget::Build).unwrap();
  assert_eq!(
    tree.journal(),
    ["dh_testdir", "dh_auto_configure", "dh_auto_build"]
  );
  assert!(!build.is_stage_completed(Stage::Test));

  package.run_target(&mut build, RulesTarget::Binary).unwrap();
  assert_eq!(tree.journal(), DH_COMMANDS);
}

#[test]
fn stage_override_replaces_preset_stage() {
  let tree = SourceTree::new();
  let mut package = hello_package(&tree, vec![dh_preset()]);
  package.override_stage(Stage::Test, Box::new(record("custom-test")));
  let mut build = new_build(&package);

  package.run(&mut build, Some(Stage::Install)).unwrap();

  assert_eq!(
    tree.journal(),
    [
      "dh_testdir",
      "dh_auto_configure",
      "dh_auto_build",
      "custom-test",
      "dh_prep",
      "dh_auto_install"
    ]
  );
}

#[test]
fn fallback_alone_runs_clean_install_and_package() {
  let tree = SourceTree::new();
  let package = hello_package(&tree, Vec::new());
  let mut build = new_build(&package);
  let stale = build.install_dir("hello").unwrap();
  std::fs::create_dir_all(stale.join("usr/bin")).unwrap();

  package.run(&mut build, None).unwrap();

  assert!(!stale.exists());
  assert_eq!(
    tree.journal(),
    ["dh_prep", "dh_auto_install", "dh_installdocs", "dh_builddeb"]
  );
}

#[test]
fn arch_target_selects_arch_dependent_packages() {
  let tree = SourceTree::new();
  let package = hello_package(&tree, vec![dh_preset()]);
  let mut build = new_build(&package);

  package.run_target(&mut build, RulesTarget::BinaryArch).unwrap();

  let selected: Vec<&str> = build.selected_packages().iter().map(|pkg| pkg.name.as_str()).collect();
  assert_eq!(selected, ["hello"]);
}

#[test]
fn failing_command_stops_pipeline_before_marking_stage() {
  let tree = SourceTree::new();
  let mut package = hello_package(&tree, vec![dh_preset()]);
  package
    .override_command("dh_auto_build", |build| build.shell("exit 4", None))
    .unwrap();
  let mut build = new_build(&package);

  let err = package.run(&mut build, None).unwrap_err();

  assert!(matches!(&err, BuildError::Command(cmd) if cmd.exit_code() == Some(4)));
  assert!(build.is_stage_completed(Stage::Configure));
  assert!(!build.is_stage_completed(Stage::Build));
  assert_eq!(tree.journal(), ["dh_testdir", "dh_auto_configure"]);
}

#[test]
fn override_for_unknown_command_is_rejected() {
  let tree = SourceTree::new();
  let mut package = hello_package(&tree, vec![dh_preset()]);

  let err = package.override_command("dh_auto_frobnicate", record("x")).unwrap_err();

  assert!(matches!(err, PresetError::UnknownCommand { id } if id == "dh_auto_frobnicate"));
}

#[test]
fn build_sequence_without_stamp_fails_package_setup() {
  let tree = SourceTree::new();
  let mut sequences = hello_sequences();
  sequences.build.pop();
  let broken = DhPreset::new().with_source(sequences);
  let fallback = DefaultPreset::with_dh(DhPreset::new().with_source(hello_sequences()));

  let err = Package::with_fallback(tree.source_package(), vec![Box::new(broken)], Box::new(fallback)).unwrap_err();

  assert!(matches!(err, PresetError::MissingStampLine));
}

#[test]
fn diverging_install_sequence_fails_package_setup() {
  let tree = SourceTree::new();
  let mut sequences: HelperSequences = hello_sequences();
  sequences.install[0] = "dh_testroot".to_string();
  let fallback = DefaultPreset::with_dh(DhPreset::new().with_source(sequences));

  let err = Package::with_fallback(tree.source_package(), Vec::new(), Box::new(fallback)).unwrap_err();

  assert!(matches!(err, PresetError::SequenceDiverged { sequence: "install", position: 0 }));
}

#[test]
fn dry_run_logs_instead_of_running() {
  let tree = SourceTree::new();
  let fallback = DefaultPreset::with_dh(DhPreset::new().with_source(hello_sequences()));
  let package = Package::with_fallback(tree.source_package(), vec![dh_preset()], Box::new(fallback)).unwrap();
  std::fs::write(tree.journal_path(), "kept\n").unwrap();
  let mut build = new_build(&package).with_dry_run(true);

  package.run(&mut build, None).unwrap();

  assert_eq!(tree.journal(), ["kept"]);
  assert_eq!(build.completed_stages(), StageSet::ALL);
}

//! GNU autotools preset for the `./configure && make` workflow.
//!
//! The preset stages skip silently when their input (`configure` or a
//! makefile) is missing. The free functions are the building blocks the
//! preset uses and can be called from stage overrides with custom arguments;
//! they fail with [`BuildError::MissingFile`] instead.

use std::path::Path;

use crate::build::{Build, BuildError};
use crate::stage::{Stage, StageSet};

use super::Preset;

const MAKEFILES: [&str; 3] = ["GNUmakefile", "makefile", "Makefile"];

#[derive(Debug, Clone, Copy, Default)]
pub struct AutotoolsPreset;

impl AutotoolsPreset {
  const CAPABILITIES: StageSet = StageSet::of(&[
    Stage::Clean,
    Stage::Configure,
    Stage::Build,
    Stage::Test,
    Stage::Install,
  ]);
}

impl Preset for AutotoolsPreset {
  fn name(&self) -> &'static str {
    "autotools"
  }

  fn capabilities(&self) -> StageSet {
    Self::CAPABILITIES
  }

  fn clean(&self, build: &mut Build) -> Result<(), BuildError> {
    if !has_makefile(&build.source_dir) {
      return Ok(());
    }
    clean(build, None)
  }

  fn configure(&self, build: &mut Build) -> Result<(), BuildError> {
    if !has_configure(&build.source_dir) {
      return Ok(());
    }
    configure(build, &[])
  }

  fn build(&self, build: &mut Build) -> Result<(), BuildError> {
    if !has_makefile(&build.source_dir) {
      return Ok(());
    }
    compile(build, &[])
  }

  fn test(&self, build: &mut Build) -> Result<(), BuildError> {
    if !has_makefile(&build.source_dir) {
      return Ok(());
    }
    test(build, None)
  }

  fn install(&self, build: &mut Build) -> Result<(), BuildError> {
    if !has_makefile(&build.source_dir) {
      return Ok(());
    }
    install(build, "install")
  }
}

/// Regenerate `configure` from `configure.ac`.
pub fn autoreconf(build: &Build) -> Result<(), BuildError> {
  let configure_ac = build.source_dir.join("configure.ac");
  if !configure_ac.is_file() {
    return Err(BuildError::MissingFile {
      path: configure_ac,
      hint: "autoreconf needs configure.ac".to_string(),
    });
  }
  build.cmd(["autoreconf", "--force", "--install", "--verbose"], None)
}

/// Run a clean target; without `target` the first of `distclean`,
/// `realclean` and `clean` the makefile has.
pub fn clean(build: &Build, target: Option<&str>) -> Result<(), BuildError> {
  require_makefile(build)?;
  let target = match target {
    Some(target) => Some(target.to_string()),
    None => find_make_target(build, &["distclean", "realclean", "clean"])?,
  };
  match target {
    Some(target) => build.cmd(["make", target.as_str()], None),
    None => Ok(()),
  }
}

/// Arguments `./configure` is called with, as autotools-dev recommends for Debian.
pub fn configure_args(build: &Build) -> Vec<String> {
  let mut args: Vec<String> = vec![
    "./configure".to_string(),
    format!("--prefix={}", build.prefix.display()),
  ];
  args.extend(
    [
      "--includedir=${prefix}/include",
      "--mandir=${prefix}/share/man",
      "--infodir=${prefix}/share/info",
      "--sysconfdir=/etc",
      "--localstatedir=/var",
      "--runstatedir=/run",
      "--disable-maintainer-mode",
      "--disable-dependency-tracking",
    ]
    .map(str::to_string),
  );

  match build.flags().get("DEB_HOST_MULTIARCH").filter(|m| !m.is_empty()) {
    Some(multiarch) => {
      args.push(format!("--libdir=${{prefix}}/lib/{multiarch}"));
      args.push(format!("--libexecdir=${{prefix}}/lib/{multiarch}"));
    }
    None => args.push("--libexecdir=${prefix}/lib".to_string()),
  }

  if !build.build_triplet.is_empty() {
    args.push(format!("--build={}", build.build_triplet));
    if !build.host_triplet.is_empty() && build.host_triplet != build.build_triplet {
      args.push(format!("--host={}", build.host_triplet));
    }
  }
  args
}

/// Run `./configure` with the default arguments followed by `extra`.
pub fn configure(build: &Build, extra: &[&str]) -> Result<(), BuildError> {
  if !has_configure(&build.source_dir) {
    return Err(BuildError::MissingFile {
      path: build.source_dir.join("configure"),
      hint: "no configure script, perhaps run autoreconf first".to_string(),
    });
  }
  let mut args = configure_args(build);
  args.extend(extra.iter().map(|arg| arg.to_string()));
  build.cmd(args, None)
}

/// Run `make -j<parallel>` followed by `extra`.
pub fn compile(build: &Build, extra: &[&str]) -> Result<(), BuildError> {
  require_makefile(build)?;
  let mut args = vec!["make".to_string(), format!("-j{}", build.parallel)];
  args.extend(extra.iter().map(|arg| arg.to_string()));
  build.cmd(args, None)
}

/// Run a test target; without `target` the first of `test` and `check` the makefile has.
pub fn test(build: &Build, target: Option<&str>) -> Result<(), BuildError> {
  require_makefile(build)?;
  let target = match target {
    Some(target) => Some(target.to_string()),
    None => find_make_target(build, &["test", "check"])?,
  };
  match target {
    Some(target) => build.cmd(["make", target.as_str()], None),
    None => Ok(()),
  }
}

/// Run `make DESTDIR=<dir> <target>`.
///
/// With a single selected binary package the files go straight into its
/// install dir; otherwise into `debian/tmp` for `dh_install` to distribute.
pub fn install(build: &Build, target: &str) -> Result<(), BuildError> {
  require_makefile(build)?;
  let destdir = match build.selected_packages().as_slice() {
    [only] => build.install_dir(&only.name)?,
    _ => build.install_base_dir.join("tmp"),
  };
  build.cmd(["make".to_string(), format!("DESTDIR={}", destdir.display()), target.to_string()], None)
}

fn has_makefile(dir: &Path) -> bool {
  MAKEFILES.iter().any(|name| dir.join(name).is_file())
}

fn has_configure(dir: &Path) -> bool {
  dir.join("configure").is_file()
}

fn require_makefile(build: &Build) -> Result<(), BuildError> {
  if has_makefile(&build.source_dir) {
    Ok(())
  } else {
    Err(BuildError::MissingFile {
      path: build.source_dir.join("Makefile"),
      hint: "no makefile, perhaps run configure first".to_string(),
    })
  }
}

/// First candidate target the makefile defines.
///
/// `make -q` exits with 1 for a target that exists but is out of date and
/// with 2 for one it has no rule for.
fn find_make_target(build: &Build, candidates: &[&str]) -> Result<Option<String>, BuildError> {
  for candidate in candidates {
    if build.probe(["make", "-q", candidate], None)? == Some(1) {
      return Ok(Some(candidate.to_string()));
    }
  }
  Ok(None)
}

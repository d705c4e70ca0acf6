mod cmd;
mod output;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use debrig_lib::driver::DriverKind;
use debrig_lib::package::RulesTarget;

use cmd::PresetKind;

/// Build Debian packages in a sandbox, stage by stage
#[derive(Parser)]
#[command(name = "debrig")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Additional configuration file, layered over the user configuration
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build the package in a fresh sandbox with dpkg-buildpackage
  Build {
    /// Source package directory (contains debian/)
    #[arg(short, long, default_value = ".")]
    source_dir: PathBuf,

    /// Where built packages are copied to
    #[arg(short, long, default_value = "..")]
    output_dir: PathBuf,

    /// Sandbox to build in
    #[arg(short, long, default_value = "bare")]
    driver: DriverKind,

    /// Keep the container between builds
    #[arg(long)]
    persistent: bool,

    /// Print commands instead of running them
    #[arg(long)]
    dry_run: bool,
  },

  /// Open a shell in the sandbox of a running build
  Shell {
    /// Source package directory whose sandbox to enter
    #[arg(short, long, default_value = ".")]
    source_dir: PathBuf,

    /// Sandbox root to enter, instead of looking it up from the source package
    #[arg(long, conflicts_with = "source_dir")]
    sandbox: Option<PathBuf>,
  },

  /// Run the stages of a debian/rules target
  Rules {
    /// clean, build, build-arch, build-indep, binary, binary-arch or binary-indep
    target: RulesTarget,

    /// Source package directory (contains debian/)
    #[arg(short, long, default_value = ".")]
    source_dir: PathBuf,

    /// Presets to try before the default one, in order
    #[arg(short, long = "preset", value_enum)]
    presets: Vec<PresetKind>,

    /// Extra argument for every dh invocation
    #[arg(long = "dh-arg", allow_hyphen_values = true)]
    dh_args: Vec<String>,

    /// DEB_BUILD_MAINT_OPTIONS used when querying build flags
    #[arg(long)]
    maint_options: Option<String>,

    /// Print commands instead of running them
    #[arg(long)]
    dry_run: bool,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .without_time()
    .init();

  match run(cli.command, cli.config.as_deref()) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      output::print_error(&format!("{err:#}"));
      ExitCode::FAILURE
    }
  }
}

fn run(command: Commands, config: Option<&Path>) -> Result<()> {
  match command {
    Commands::Build {
      source_dir,
      output_dir,
      driver,
      persistent,
      dry_run,
    } => cmd::cmd_build(
      config,
      &cmd::BuildArgs {
        source_dir,
        output_dir,
        driver,
        persistent,
        dry_run,
      },
    ),
    Commands::Shell { source_dir, sandbox } => cmd::cmd_shell(config, &source_dir, sandbox.as_deref()),
    Commands::Rules {
      target,
      source_dir,
      presets,
      dh_args,
      maint_options,
      dry_run,
    } => cmd::cmd_rules(
      config,
      &cmd::RulesArgs {
        target,
        source_dir,
        presets,
        dh_args,
        maint_options,
        dry_run,
      },
    ),
  }
}

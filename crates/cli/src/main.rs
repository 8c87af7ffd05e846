mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use srcbuild_lib::config::Config;
use tracing_subscriber::EnvFilter;

use crate::output::OutputFormat;

/// srcbuild - source package import, patching and code generation
#[derive(Parser)]
#[command(name = "srcbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Configuration file (default: $SRCBUILD_CONFIG, else built-in defaults)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Print the environment composed from installation prefixes
  Env {
    /// Installation prefixes, registered in order
    #[arg(required = true)]
    prefixes: Vec<PathBuf>,
  },

  /// Synchronize the patch stack of a source tree
  Patch {
    /// Source tree to patch
    srcdir: PathBuf,

    /// Patches to apply, in order. None removes every applied patch
    patches: Vec<PathBuf>,
  },

  /// Print the merged, sorted generator flags
  Flags {
    /// Flags merged after the configured options
    #[arg(allow_hyphen_values = true)]
    flags: Vec<String>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let mut config = match &cli.config {
    Some(path) => Config::load(path).with_context(|| format!("Failed to load config {}", path.display()))?,
    None => Config::from_env().context("Failed to load config")?,
  };
  config.verbose |= cli.verbose;

  match cli.command {
    Commands::Env { prefixes } => cmd::cmd_env(&prefixes, cli.output),
    Commands::Patch { srcdir, patches } => cmd::cmd_patch(&config, &srcdir, &patches, cli.output),
    Commands::Flags { flags } => cmd::cmd_flags(&config, &flags, cli.output),
  }
}

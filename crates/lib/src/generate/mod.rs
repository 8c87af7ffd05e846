//! Code generation for generator-based packages.
//!
//! Generation is expensive, so [`GeneratorPackage`] only invokes the external
//! generator when [`GenerationTracker`] says the previous run no longer
//! matches: see the tracker for the decision rules and [`cmdline`] for how the
//! fingerprinted command line is built.

pub mod cmdline;
mod package;
mod tracker;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::util::mtime::MtimeError;

pub use package::{GenerateContext, GeneratorPackage};
pub use tracker::{Decision, GenerationTracker};

/// Errors that can occur while preparing or running a generation.
#[derive(Debug, Error)]
pub enum GenerateError {
  #[error("failed to read generation stamp '{path}': {source}")]
  ReadStamp {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write generation stamp '{path}': {source}")]
  WriteStamp {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Timestamps(#[from] MtimeError),

  #[error("failed to list '{srcdir}': {source}")]
  ListSourceDir {
    srcdir: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("cannot find a specification file (*.{extension}) in '{srcdir}'")]
  NoSpecFile { srcdir: PathBuf, extension: String },

  #[error("cannot find '{tool}' in PATH")]
  ToolNotFound { tool: String },

  #[error("cannot determine the version of '{tool}'")]
  UnknownVersion { tool: PathBuf },

  #[error("failed to read '{path}': {source}")]
  ReadVersion {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to run generator '{cmd}': {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: io::Error,
  },

  #[error("generator failed with exit code {code:?}: {cmd}")]
  GeneratorFailed { cmd: String, code: Option<i32> },
}

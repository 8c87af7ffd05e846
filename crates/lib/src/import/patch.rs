//! Patch stack synchronization.
//!
//! The patches applied to a source tree are recorded, one path per line, in
//! [`PATCH_STAMP_FILE`] at the root of the tree. Synchronizing never tries to
//! be clever: when the recorded stack differs from the desired one, every
//! applied patch is reverted (last first) and the desired ones are applied in
//! order. The stamp is rewritten after every attempt, including failed ones,
//! so it always lists exactly what is applied on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::consts::PATCH_STAMP_FILE;
use crate::package::Package;
use crate::process::{Invocation, ProcessRunner};

#[derive(Debug, Error)]
pub enum PatchError {
  #[error("failed to read patch stamp '{path}': {source}")]
  ReadStamp {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write patch stamp '{path}': {source}")]
  WriteStamp {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to run '{tool}' for '{patch}': {source}")]
  Spawn {
    tool: String,
    patch: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("{action} '{patch}' failed with exit code {code:?}")]
  ToolFailed {
    action: &'static str,
    patch: PathBuf,
    code: Option<i32>,
  },
}

/// Path of the applied-patches stamp inside `srcdir`.
pub fn stamp_path(srcdir: &Path) -> PathBuf {
  srcdir.join(PATCH_STAMP_FILE)
}

/// Read the applied patch stack. A missing stamp means nothing is applied.
pub fn read_stamp(srcdir: &Path) -> Result<Vec<PathBuf>, PatchError> {
  let path = stamp_path(srcdir);
  let content = match fs::read_to_string(&path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(source) => return Err(PatchError::ReadStamp { path, source }),
  };

  Ok(
    content
      .lines()
      .map(str::trim_end)
      .filter(|line| !line.is_empty())
      .map(PathBuf::from)
      .collect(),
  )
}

/// Replace the stamp with `applied`.
pub fn write_stamp(srcdir: &Path, applied: &[PathBuf]) -> Result<(), PatchError> {
  let path = stamp_path(srcdir);
  let content = applied
    .iter()
    .map(|p| p.to_string_lossy())
    .collect::<Vec<_>>()
    .join("\n");

  fs::write(&path, content).map_err(|source| PatchError::WriteStamp { path, source })
}

/// Brings a source tree's patch stack in line with a desired list by running
/// an external `patch` tool.
pub struct PatchSynchronizer<'a> {
  runner: &'a dyn ProcessRunner,
  tool: String,
  env: Vec<(String, String)>,
}

impl<'a> PatchSynchronizer<'a> {
  pub fn new(runner: &'a dyn ProcessRunner, tool: impl Into<String>) -> Self {
    Self {
      runner,
      tool: tool.into(),
      env: Vec::new(),
    }
  }

  /// Variables passed to every patch invocation.
  pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
    self.env = env;
    self
  }

  /// Synchronize `package.srcdir` with `desired`.
  ///
  /// Returns whether anything had to be done.
  pub fn sync(&self, package: &Package, desired: &[PathBuf]) -> Result<bool, PatchError> {
    let srcdir = &package.srcdir;
    let mut applied = read_stamp(srcdir)?;

    if applied == desired {
      debug!(package = %package.name, count = applied.len(), "patches already in sync");
      return Ok(false);
    }

    if !desired.is_empty() {
      package.progress("patching %s");
    }

    let result = self.reconcile(srcdir, &mut applied, desired);
    let written = write_stamp(srcdir, &applied);

    info!(package = %package.name, applied = applied.len(), "patch stack written");
    result.and(written).map(|()| true)
  }

  fn reconcile(&self, srcdir: &Path, applied: &mut Vec<PathBuf>, desired: &[PathBuf]) -> Result<(), PatchError> {
    while let Some(patch) = applied.last() {
      self.call(srcdir, patch, true)?;
      applied.pop();
    }

    for patch in desired {
      self.call(srcdir, patch, false)?;
      applied.push(patch.clone());
    }

    Ok(())
  }

  fn call(&self, srcdir: &Path, patch: &Path, reverse: bool) -> Result<(), PatchError> {
    let action = if reverse { "unapply" } else { "apply" };
    debug!(patch = %patch.display(), action, "running patch tool");

    let mut invocation = Invocation::new(&self.tool).arg("-p0");
    if reverse {
      invocation = invocation.arg("-R");
    }
    let invocation = invocation
      .current_dir(srcdir)
      .stdin_file(srcdir.join(patch))
      .envs(self.env.clone());

    let outcome = self.runner.run(&invocation).map_err(|source| PatchError::Spawn {
      tool: self.tool.clone(),
      patch: patch.to_path_buf(),
      source,
    })?;

    if !outcome.success() {
      return Err(PatchError::ToolFailed {
        action,
        patch: patch.to_path_buf(),
        code: outcome.code,
      });
    }
    Ok(())
  }
}

//! Generation staleness tracking.
//!
//! The stamp file holds the command line of the last successful generation,
//! one token per line. A generation pass is required when forced, when there
//! is no stamp, when the command line changed, or when the generated build
//! system's probe target reports it is out of date.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::consts::{GENERATED_MAKEFILE, UPTODATE_PROBE_TARGET};
use crate::generate::GenerateError;
use crate::process::{Invocation, ProcessRunner};
use crate::util::mtime;

/// Outcome of a staleness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
  /// Regeneration is forced by configuration.
  Forced,
  /// No previous generation was recorded.
  MissingStamp,
  /// The command line differs from the recorded one.
  CmdlineChanged,
  /// The generated build system reports it is out of date.
  Stale,
  /// Nothing to do.
  UpToDate,
}

impl Decision {
  pub fn requires_generation(self) -> bool {
    !matches!(self, Decision::UpToDate)
  }
}

/// Tracks the generation stamp of one package.
#[derive(Debug, Clone)]
pub struct GenerationTracker {
  stamp: PathBuf,
  builddir: PathBuf,
  make: String,
  env: Vec<(String, String)>,
}

impl GenerationTracker {
  pub fn new(stamp: impl Into<PathBuf>, builddir: impl Into<PathBuf>) -> Self {
    Self {
      stamp: stamp.into(),
      builddir: builddir.into(),
      make: "make".to_string(),
      env: Vec::new(),
    }
  }

  /// Program used to run the probe target.
  pub fn with_make(mut self, make: impl Into<String>) -> Self {
    self.make = make.into();
    self
  }

  /// Variables passed to the probe.
  pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
    self.env = env;
    self
  }

  pub fn stamp_path(&self) -> &Path {
    &self.stamp
  }

  /// Command line recorded by the last generation, `None` without a stamp.
  pub fn read_fingerprint(&self) -> Result<Option<Vec<String>>, GenerateError> {
    match fs::read_to_string(&self.stamp) {
      Ok(content) => Ok(Some(content.lines().map(str::to_string).collect())),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(source) => Err(GenerateError::ReadStamp {
        path: self.stamp.clone(),
        source,
      }),
    }
  }

  /// Record `cmdline` as the last successful generation.
  pub fn write_fingerprint(&self, cmdline: &[String]) -> Result<(), GenerateError> {
    let write = || -> io::Result<()> {
      if let Some(parent) = self.stamp.parent() {
        fs::create_dir_all(parent)?;
      }
      fs::write(&self.stamp, cmdline.join("\n"))
    };

    write().map_err(|source| GenerateError::WriteStamp {
      path: self.stamp.clone(),
      source,
    })
  }

  /// Remove the stamp so the next check regenerates.
  pub fn invalidate(&self) -> Result<(), GenerateError> {
    match fs::remove_file(&self.stamp) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(source) => Err(GenerateError::WriteStamp {
        path: self.stamp.clone(),
        source,
      }),
    }
  }

  /// Whether the stamp is older than its inputs.
  ///
  /// True when the stamp is missing, when a dependency stamp is missing or
  /// newer than it, or when any file of `srcdir` (outside the stamp directory,
  /// the build directory and VCS metadata) is newer than it.
  pub fn is_outdated(&self, dependency_stamps: &[PathBuf], srcdir: &Path) -> Result<bool, GenerateError> {
    let Some(stamp_time) = mtime::modified(&self.stamp)? else {
      return Ok(true);
    };

    for dep in dependency_stamps {
      match mtime::modified(dep)? {
        Some(time) if time <= stamp_time => {}
        Some(_) => {
          debug!(dependency = %dep.display(), "dependency is newer than generation stamp");
          return Ok(true);
        }
        None => {
          debug!(dependency = %dep.display(), "dependency stamp missing");
          return Ok(true);
        }
      }
    }

    let mut exclude = vec![self.builddir.clone()];
    if let Some(parent) = self.stamp.parent() {
      exclude.push(parent.to_path_buf());
    }

    let newest = mtime::newest_in_tree(srcdir, &exclude)?;
    Ok(newest.is_some_and(|time| time > stamp_time))
  }

  /// Ask the generated build system whether generation is current.
  ///
  /// Without a stamp, or before the build system has been generated, there
  /// is nothing to ask and the answer is yes.
  pub fn probe_uptodate(&self, runner: &dyn ProcessRunner) -> bool {
    if !self.stamp.is_file() || !self.builddir.join(GENERATED_MAKEFILE).is_file() {
      return true;
    }

    let invocation = Invocation::new(&self.make)
      .arg("-C")
      .arg(self.builddir.to_string_lossy())
      .arg(UPTODATE_PROBE_TARGET)
      .envs(self.env.clone());

    match runner.run(&invocation) {
      Ok(outcome) => outcome.success(),
      Err(e) => {
        debug!(error = %e, "up-to-date probe could not run");
        false
      }
    }
  }

  /// Decide whether `cmdline` requires a new generation pass.
  pub fn evaluate(
    &self,
    cmdline: &[String],
    force_always: bool,
    runner: &dyn ProcessRunner,
  ) -> Result<Decision, GenerateError> {
    if force_always {
      return Ok(Decision::Forced);
    }

    let decision = match self.read_fingerprint()? {
      None => Decision::MissingStamp,
      Some(previous) if previous != cmdline => Decision::CmdlineChanged,
      Some(_) if !self.probe_uptodate(runner) => Decision::Stale,
      Some(_) => Decision::UpToDate,
    };
    Ok(decision)
  }

  /// Run `generate` if needed, then record or refresh the stamp.
  ///
  /// After a generation the stamp holds `cmdline`; otherwise only its
  /// modification time is updated.
  pub fn decide<F>(
    &self,
    cmdline: &[String],
    force_always: bool,
    runner: &dyn ProcessRunner,
    generate: F,
  ) -> Result<Decision, GenerateError>
  where
    F: FnOnce(&[String]) -> Result<(), GenerateError>,
  {
    let decision = self.evaluate(cmdline, force_always, runner)?;

    if decision.requires_generation() {
      info!(reason = ?decision, stamp = %self.stamp.display(), "generation required");
      generate(cmdline)?;
      self.write_fingerprint(cmdline)?;
    } else {
      debug!(stamp = %self.stamp.display(), "generation up to date");
      mtime::touch(&self.stamp).map_err(|source| GenerateError::WriteStamp {
        path: self.stamp.clone(),
        source,
      })?;
    }

    Ok(decision)
  }
}

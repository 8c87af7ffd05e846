//! Test utilities for srcbuild-lib.
//!
//! Stand-ins for the external collaborators: a process runner that records
//! invocations instead of spawning them, and a VCS backend driven by closures.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::sync::{Arc, Mutex};

use crate::import::{BackendError, ImportStatus, StatusKind, VcsBackend};
use crate::package::Package;
use crate::process::{ExitOutcome, Invocation, ProcessRunner};

/// Records every invocation and answers with a scripted exit code.
pub struct RecordingRunner {
  exit_code: Box<dyn Fn(&Invocation) -> i32>,
  invocations: RefCell<Vec<Invocation>>,
}

impl RecordingRunner {
  pub fn new(exit_code: impl Fn(&Invocation) -> i32 + 'static) -> Self {
    Self {
      exit_code: Box::new(exit_code),
      invocations: RefCell::new(Vec::new()),
    }
  }

  pub fn succeeding() -> Self {
    Self::new(|_| 0)
  }

  pub fn invocations(&self) -> Vec<Invocation> {
    self.invocations.borrow().clone()
  }
}

impl ProcessRunner for RecordingRunner {
  fn run(&self, invocation: &Invocation) -> io::Result<ExitOutcome> {
    self.invocations.borrow_mut().push(invocation.clone());
    Ok(ExitOutcome {
      code: Some((self.exit_code)(invocation)),
    })
  }
}

type Failure = Box<dyn Fn() -> BackendError + Send + Sync>;

/// Backend whose checkout creates the source directory. Either step can be
/// made to fail; a failing checkout still leaves a partial tree behind.
pub struct ScriptedBackend {
  checkout_failure: Option<Failure>,
  update_failure: Option<Failure>,
  calls: Arc<Mutex<Vec<&'static str>>>,
}

impl ScriptedBackend {
  pub fn succeeding() -> Self {
    Self {
      checkout_failure: None,
      update_failure: None,
      calls: Arc::new(Mutex::new(Vec::new())),
    }
  }

  pub fn failing_checkout(error: impl Fn() -> BackendError + Send + Sync + 'static) -> Self {
    Self {
      checkout_failure: Some(Box::new(error)),
      ..Self::succeeding()
    }
  }

  pub fn failing_update(error: impl Fn() -> BackendError + Send + Sync + 'static) -> Self {
    Self {
      update_failure: Some(Box::new(error)),
      ..Self::succeeding()
    }
  }

  /// Shared log of the steps run on this backend.
  pub fn calls(&self) -> Arc<Mutex<Vec<&'static str>>> {
    self.calls.clone()
  }
}

impl VcsBackend for ScriptedBackend {
  fn name(&self) -> &str {
    "scripted"
  }

  fn checkout(&self, package: &Package) -> Result<(), BackendError> {
    self.calls.lock().unwrap().push("checkout");
    fs::create_dir_all(package.srcdir.join("partial")).map_err(|e| BackendError::Other(Box::new(e)))?;
    match &self.checkout_failure {
      Some(failure) => Err(failure()),
      None => Ok(()),
    }
  }

  fn update(&self, _package: &Package) -> Result<(), BackendError> {
    self.calls.lock().unwrap().push("update");
    match &self.update_failure {
      Some(failure) => Err(failure()),
      None => Ok(()),
    }
  }

  fn status(&self, _package: &Package) -> Result<ImportStatus, BackendError> {
    Ok(ImportStatus::new(StatusKind::UpToDate))
  }
}

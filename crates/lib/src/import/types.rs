//! Types for source import.
//!
//! This module defines the status record returned by backends, the errors
//! backends report, and the errors of the import orchestration itself.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::import::patch::PatchError;

/// Position of a working copy relative to its remote.
///
/// Ordered from "nothing to do" to "diverged". The engines attach no
/// behavior to these values; callers decide the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusKind {
  /// Remote and local are at the same point.
  UpToDate,
  /// Local has everything remote has, plus new commits.
  Advanced,
  /// The next update will require a merge.
  NeedsMerge,
  /// The next update will be a fast-forward.
  SimpleUpdate,
}

/// Status of a checkout w.r.t. its remote repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatus {
  pub kind: StatusKind,
  /// True if the working copy has uncommitted changes.
  pub uncommitted_code: bool,
  /// Commits in the remote that an update would bring in.
  pub remote_commits: Vec<String>,
  /// Commits in the local copy that are not in the remote.
  pub local_commits: Vec<String>,
}

impl ImportStatus {
  pub fn new(kind: StatusKind) -> Self {
    Self {
      kind,
      uncommitted_code: false,
      remote_commits: Vec::new(),
      local_commits: Vec::new(),
    }
  }
}

/// A failure the import machinery knows how to recover from: the partial
/// checkout is removed and fallbacks are consulted.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ImportFailure {
  pub message: String,
  #[source]
  pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ImportFailure {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      source: None,
    }
  }

  pub fn with_source(message: impl Into<String>, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    Self {
      message: message.into(),
      source: Some(source.into()),
    }
  }
}

/// Error reported by a [`crate::import::VcsBackend`].
#[derive(Debug, Error)]
pub enum BackendError {
  /// Recognized import failure (network, missing revision, tool failure).
  #[error(transparent)]
  Import(#[from] ImportFailure),

  /// Anything else. Never triggers a fallback.
  #[error(transparent)]
  Other(Box<dyn std::error::Error + Send + Sync>),
}

/// The step of an import that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
  Checkout,
  Update,
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Step::Checkout => write!(f, "checkout"),
      Step::Update => write!(f, "update"),
    }
  }
}

/// Operations that can be re-dispatched to a fallback importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  Import,
}

/// Errors that can occur while importing a package.
#[derive(Debug, Error)]
pub enum ImportError {
  /// The source path exists but is not a directory. Never retried.
  #[error("'{0}' exists but is not a directory")]
  NotADirectory(PathBuf),

  /// Recognized failure from the backend.
  #[error("{step} of '{package}' failed: {source}")]
  Failed {
    package: String,
    step: Step,
    #[source]
    source: ImportFailure,
  },

  /// Unrecognized failure from the backend, passed through untouched.
  #[error("{step} of '{package}' failed unexpectedly: {source}")]
  Unrecognized {
    package: String,
    step: Step,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// Patch synchronization failed.
  #[error("patching '{package}' failed: {source}")]
  Patch {
    package: String,
    #[source]
    source: PatchError,
  },
}

impl ImportError {
  pub(crate) fn from_backend(package: &str, step: Step, error: BackendError) -> Self {
    match error {
      BackendError::Import(source) => ImportError::Failed {
        package: package.to_string(),
        step,
        source,
      },
      BackendError::Other(source) => ImportError::Unrecognized {
        package: package.to_string(),
        step,
        source,
      },
    }
  }

  /// Whether this error may be recovered through fallbacks.
  pub fn is_recognized(&self) -> bool {
    matches!(self, ImportError::Failed { .. } | ImportError::Patch { .. })
  }
}

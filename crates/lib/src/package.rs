//! Package description consumed by the engines.
//!
//! A [`Package`] is owned by the surrounding orchestrator; the engines only
//! borrow it for the duration of one operation.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

/// Receives human-readable progress messages for a package.
pub trait Progress: Send + Sync {
  fn report(&self, package: &str, message: &str);
}

/// Default progress sink: forwards messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl Progress for TracingProgress {
  fn report(&self, package: &str, message: &str) {
    info!(package, "{}", message);
  }
}

/// A package as seen by the import and generation engines.
#[derive(Clone)]
pub struct Package {
  pub name: String,
  /// Source tree managed by the importer.
  pub srcdir: PathBuf,
  /// Installation root.
  pub prefix: PathBuf,
  /// Build directory of the generated build system.
  pub builddir: PathBuf,
  /// Names of the packages this one depends on.
  pub dependencies: Vec<String>,
  /// Set by the importer once the source tree has been checked out or updated.
  pub updated: bool,
  progress: Arc<dyn Progress>,
}

impl Package {
  /// Create a package. The build directory defaults to `<srcdir>/build`.
  pub fn new(name: impl Into<String>, srcdir: impl Into<PathBuf>, prefix: impl Into<PathBuf>) -> Self {
    let srcdir = srcdir.into();
    Self {
      name: name.into(),
      builddir: srcdir.join("build"),
      srcdir,
      prefix: prefix.into(),
      dependencies: Vec::new(),
      updated: false,
      progress: Arc::new(TracingProgress),
    }
  }

  pub fn with_builddir(mut self, builddir: impl Into<PathBuf>) -> Self {
    self.builddir = builddir.into();
    self
  }

  pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.dependencies = dependencies.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
    self.progress = progress;
    self
  }

  /// Report progress. `%s` in `message` is replaced by the package name.
  pub fn progress(&self, message: &str) {
    self.progress.report(&self.name, &message.replace("%s", &self.name));
  }
}

impl fmt::Debug for Package {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Package")
      .field("name", &self.name)
      .field("srcdir", &self.srcdir)
      .field("prefix", &self.prefix)
      .field("builddir", &self.builddir)
      .field("dependencies", &self.dependencies)
      .field("updated", &self.updated)
      .finish_non_exhaustive()
  }
}

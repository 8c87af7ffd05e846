//! Source import.
//!
//! An [`Importer`] brings a package's source tree up to date through a
//! [`VcsBackend`] and then synchronizes its patch stack:
//!
//! - existing directory: update (when updates are enabled), then patch
//! - existing non-directory: configuration error
//! - missing: checkout, then patch; the partial tree is removed on failure
//!
//! Recognized failures are handed to the [`FallbackRegistry`], which may
//! provide a substitute importer that re-runs the same operation.

pub mod fallback;
pub mod patch;
mod types;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::env::EnvironmentStore;
use crate::package::Package;
use crate::process::ProcessRunner;

pub use fallback::{FallbackHandler, FallbackRegistry};
pub use patch::{PatchError, PatchSynchronizer};
pub use types::{BackendError, ImportError, ImportFailure, ImportStatus, Operation, StatusKind, Step};

/// Version-control specific checkout mechanics.
pub trait VcsBackend {
  /// Short backend name for messages (`git`, `svn`, `archive`, ...).
  fn name(&self) -> &str;

  /// Create `package.srcdir` from the remote repository.
  fn checkout(&self, package: &Package) -> Result<(), BackendError>;

  /// Bring the existing `package.srcdir` up to date.
  fn update(&self, package: &Package) -> Result<(), BackendError>;

  /// Compare the checkout with its remote.
  fn status(&self, package: &Package) -> Result<ImportStatus, BackendError>;
}

/// Everything an import needs besides the package itself.
#[derive(Clone, Copy)]
pub struct ImportContext<'a> {
  pub config: &'a Config,
  pub fallbacks: &'a FallbackRegistry,
  pub runner: &'a dyn ProcessRunner,
  /// Environment exported to the patch tool.
  pub env: &'a EnvironmentStore,
}

/// Orchestrates checkout, update and patching for one backend.
pub struct Importer {
  backend: Box<dyn VcsBackend>,
  patches: Vec<PathBuf>,
}

impl Importer {
  pub fn new(backend: impl VcsBackend + 'static) -> Self {
    Self {
      backend: Box::new(backend),
      patches: Vec::new(),
    }
  }

  /// Patches applied, in order, after every checkout or update.
  pub fn with_patches<I, P>(mut self, patches: I) -> Self
  where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
  {
    self.patches = patches.into_iter().map(Into::into).collect();
    self
  }

  pub fn patches(&self) -> &[PathBuf] {
    &self.patches
  }

  pub fn backend(&self) -> &dyn VcsBackend {
    self.backend.as_ref()
  }

  /// Run `operation` for `package`.
  pub fn run(&self, operation: Operation, package: &mut Package, ctx: &ImportContext<'_>) -> Result<(), ImportError> {
    match operation {
      Operation::Import => self.import(package, ctx),
    }
  }

  /// Check out or update `package.srcdir`, then synchronize its patches.
  pub fn import(&self, package: &mut Package, ctx: &ImportContext<'_>) -> Result<(), ImportError> {
    let srcdir = package.srcdir.clone();

    if srcdir.is_dir() {
      if !ctx.config.do_update {
        if ctx.config.verbose {
          info!(package = %package.name, "not updating");
        } else {
          debug!(package = %package.name, "not updating");
        }
        return Ok(());
      }

      package.progress("updating %s");
      if let Err(e) = self.backend.update(package) {
        let error = ImportError::from_backend(&package.name, Step::Update, e);
        return self.fallback(error, package, ctx, Operation::Import);
      }

      self.patch(package, ctx)?;
      package.updated = true;
      Ok(())
    } else if fs::symlink_metadata(&srcdir).is_ok() {
      Err(ImportError::NotADirectory(srcdir))
    } else {
      package.progress("checking out %s");
      let result = self
        .backend
        .checkout(package)
        .map_err(|e| ImportError::from_backend(&package.name, Step::Checkout, e))
        .and_then(|()| self.patch(package, ctx));

      match result {
        Ok(()) => {
          package.updated = true;
          Ok(())
        }
        Err(error) => {
          remove_partial_checkout(&srcdir);
          if error.is_recognized() {
            self.fallback(error, package, ctx, Operation::Import)
          } else {
            Err(error)
          }
        }
      }
    }
  }

  /// Query the backend for the checkout's status.
  pub fn status(&self, package: &Package) -> Result<ImportStatus, BackendError> {
    self.backend.status(package)
  }

  fn patch(&self, package: &Package, ctx: &ImportContext<'_>) -> Result<(), ImportError> {
    PatchSynchronizer::new(ctx.runner, ctx.config.tool("patch"))
      .with_env(ctx.env.exported())
      .sync(package, &self.patches)
      .map(|_| ())
      .map_err(|source| ImportError::Patch {
        package: package.name.clone(),
        source,
      })
  }

  /// Re-run `operation` on the first substitute offered, or return `error`.
  fn fallback(
    &self,
    error: ImportError,
    package: &mut Package,
    ctx: &ImportContext<'_>,
    operation: Operation,
  ) -> Result<(), ImportError> {
    match ctx.fallbacks.find_substitute(package, self) {
      Some(substitute) => {
        info!(
          package = %package.name,
          failed = self.backend.name(),
          substitute = substitute.backend.name(),
          error = %error,
          "retrying with fallback importer"
        );
        substitute.run(operation, package, ctx)
      }
      None => {
        debug!(package = %package.name, handlers = ctx.fallbacks.len(), "no fallback importer available");
        Err(error)
      }
    }
  }
}

impl fmt::Debug for Importer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Importer")
      .field("backend", &self.backend.name())
      .field("patches", &self.patches)
      .finish()
  }
}

/// Best-effort removal of a partially created source tree.
fn remove_partial_checkout(srcdir: &Path) {
  let result = match fs::symlink_metadata(srcdir) {
    Ok(meta) if meta.is_dir() => fs::remove_dir_all(srcdir),
    Ok(_) => fs::remove_file(srcdir),
    Err(_) => return,
  };

  if let Err(e) = result {
    warn!(path = %srcdir.display(), error = %e, "failed to remove partial checkout");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{RecordingRunner, ScriptedBackend};
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tempfile::TempDir;
  use tracing_test::traced_test;

  struct Fixture {
    _temp: TempDir,
    config: Config,
    fallbacks: FallbackRegistry,
    runner: RecordingRunner,
    env: EnvironmentStore,
    package: Package,
  }

  impl Fixture {
    fn new() -> Self {
      let temp = TempDir::new().unwrap();
      let package = Package::new("pkg", temp.path().join("src"), temp.path().join("install"));
      Self {
        _temp: temp,
        config: Config::default(),
        fallbacks: FallbackRegistry::new(),
        runner: RecordingRunner::succeeding(),
        env: EnvironmentStore::with_inherited(Vec::<(String, String)>::new()),
        package,
      }
    }

    fn import(&mut self, importer: &Importer) -> Result<(), ImportError> {
      let ctx = ImportContext {
        config: &self.config,
        fallbacks: &self.fallbacks,
        runner: &self.runner,
        env: &self.env,
      };
      importer.import(&mut self.package, &ctx)
    }
  }

  #[test]
  fn checkout_then_patch_marks_updated() {
    let mut fx = Fixture::new();
    let importer = Importer::new(ScriptedBackend::succeeding()).with_patches(["fix.patch"]);

    fx.import(&importer).unwrap();

    assert!(fx.package.updated);
    assert_eq!(patch::read_stamp(&fx.package.srcdir).unwrap(), vec![PathBuf::from("fix.patch")]);
    assert_eq!(fx.runner.invocations().len(), 1);
  }

  #[test]
  fn existing_tree_is_updated() {
    let mut fx = Fixture::new();
    fs::create_dir_all(&fx.package.srcdir).unwrap();
    let backend = ScriptedBackend::succeeding();
    let calls = backend.calls();
    let importer = Importer::new(backend);

    fx.import(&importer).unwrap();

    assert!(fx.package.updated);
    assert_eq!(*calls.lock().unwrap(), vec!["update"]);
  }

  #[test]
  fn update_resyncs_patch_stack() {
    let mut fx = Fixture::new();
    fs::create_dir_all(&fx.package.srcdir).unwrap();
    patch::write_stamp(&fx.package.srcdir, &[PathBuf::from("a.patch")]).unwrap();
    let backend = ScriptedBackend::succeeding();
    let calls = backend.calls();
    let importer = Importer::new(backend).with_patches(["b.patch"]);

    fx.import(&importer).unwrap();

    assert!(fx.package.updated);
    assert_eq!(*calls.lock().unwrap(), vec!["update"]);
    let invocations = fx.runner.invocations();
    assert_eq!(invocations.len(), 2);
    assert_eq!(invocations[0].args, vec!["-p0", "-R"]);
    assert_eq!(invocations[0].stdin, Some(fx.package.srcdir.join("a.patch")));
    assert_eq!(invocations[1].args, vec!["-p0"]);
    assert_eq!(invocations[1].stdin, Some(fx.package.srcdir.join("b.patch")));
    assert_eq!(patch::read_stamp(&fx.package.srcdir).unwrap(), vec![PathBuf::from("b.patch")]);
  }

  /// Level at which the "not updating" message was logged.
  fn not_updating_level(lines: &[&str]) -> Option<&'static str> {
    let line = lines.iter().find(|line| line.contains("not updating"))?;
    ["ERROR", "WARN", "INFO", "DEBUG", "TRACE"]
      .into_iter()
      .find(|level| line.contains(level))
  }

  #[test]
  #[traced_test]
  fn disabled_updates_leave_tree_alone() {
    let mut fx = Fixture::new();
    fx.config.do_update = false;
    fs::create_dir_all(&fx.package.srcdir).unwrap();
    let backend = ScriptedBackend::succeeding();
    let calls = backend.calls();

    fx.import(&Importer::new(backend)).unwrap();

    assert!(!fx.package.updated);
    assert!(calls.lock().unwrap().is_empty());
    logs_assert(|lines| match not_updating_level(lines) {
      Some("DEBUG") => Ok(()),
      other => Err(format!("expected a debug message, got {other:?}")),
    });
  }

  #[test]
  #[traced_test]
  fn disabled_updates_are_reported_when_verbose() {
    let mut fx = Fixture::new();
    fx.config.do_update = false;
    fx.config.verbose = true;
    fs::create_dir_all(&fx.package.srcdir).unwrap();

    fx.import(&Importer::new(ScriptedBackend::succeeding())).unwrap();

    assert!(!fx.package.updated);
    logs_assert(|lines| match not_updating_level(lines) {
      Some("INFO") => Ok(()),
      other => Err(format!("expected an info message, got {other:?}")),
    });
  }

  #[test]
  fn file_in_place_of_srcdir_is_config_error() {
    let mut fx = Fixture::new();
    fs::create_dir_all(fx.package.srcdir.parent().unwrap()).unwrap();
    fs::write(&fx.package.srcdir, "").unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = hits.clone();
    fx.fallbacks.register(move |_, _| {
      seen.fetch_add(1, Ordering::SeqCst);
      Some(Importer::new(ScriptedBackend::succeeding()))
    });

    let err = fx.import(&Importer::new(ScriptedBackend::succeeding())).unwrap_err();

    assert!(matches!(err, ImportError::NotADirectory(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(fx.package.srcdir.is_file());
  }

  #[test]
  fn recognized_checkout_failure_removes_partial_tree() {
    let mut fx = Fixture::new();
    let importer = Importer::new(ScriptedBackend::failing_checkout(|| ImportFailure::new("connection reset").into()));

    let err = fx.import(&importer).unwrap_err();

    assert!(matches!(err, ImportError::Failed { step: Step::Checkout, .. }));
    assert!(!fx.package.srcdir.exists());
    assert!(!fx.package.updated);
  }

  #[test]
  fn unrecognized_checkout_failure_skips_fallbacks() {
    let mut fx = Fixture::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = hits.clone();
    fx.fallbacks.register(move |_, _| {
      seen.fetch_add(1, Ordering::SeqCst);
      Some(Importer::new(ScriptedBackend::succeeding()))
    });
    let importer = Importer::new(ScriptedBackend::failing_checkout(|| BackendError::Other("disk on fire".into())));

    let err = fx.import(&importer).unwrap_err();

    assert!(matches!(err, ImportError::Unrecognized { .. }));
    assert_eq!(err.to_string(), "checkout of 'pkg' failed unexpectedly: disk on fire");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(!fx.package.srcdir.exists());
  }

  #[test]
  fn fallback_substitute_performs_the_import() {
    let mut fx = Fixture::new();
    let mirror = ScriptedBackend::succeeding();
    let mirror_calls = mirror.calls();
    let mirror = Arc::new(std::sync::Mutex::new(Some(mirror)));
    fx.fallbacks.register(move |_, failing| {
      assert_eq!(failing.backend().name(), "scripted");
      mirror.lock().unwrap().take().map(|b| Importer::new(b).with_patches(["mirror.patch"]))
    });
    let importer = Importer::new(ScriptedBackend::failing_checkout(|| ImportFailure::new("404").into()));

    fx.import(&importer).unwrap();

    assert!(fx.package.updated);
    assert_eq!(*mirror_calls.lock().unwrap(), vec!["checkout"]);
    assert_eq!(
      patch::read_stamp(&fx.package.srcdir).unwrap(),
      vec![PathBuf::from("mirror.patch")]
    );
  }

  #[test]
  fn update_failure_uses_fallback() {
    let mut fx = Fixture::new();
    fs::create_dir_all(&fx.package.srcdir).unwrap();
    let substitute = ScriptedBackend::succeeding();
    let substitute_calls = substitute.calls();
    let substitute = Arc::new(std::sync::Mutex::new(Some(substitute)));
    fx.fallbacks.register(move |_, _| substitute.lock().unwrap().take().map(Importer::new));
    let importer = Importer::new(ScriptedBackend::failing_update(|| BackendError::Other("bad remote".into())));

    fx.import(&importer).unwrap();

    assert!(fx.package.updated);
    assert_eq!(*substitute_calls.lock().unwrap(), vec!["update"]);
  }

  #[test]
  fn update_failure_without_fallback_is_returned() {
    let mut fx = Fixture::new();
    fs::create_dir_all(&fx.package.srcdir).unwrap();
    let importer = Importer::new(ScriptedBackend::failing_update(|| ImportFailure::new("timeout").into()));

    let err = fx.import(&importer).unwrap_err();

    assert!(matches!(err, ImportError::Failed { step: Step::Update, .. }));
    assert!(fx.package.srcdir.is_dir());
  }

  #[test]
  fn patch_failure_after_checkout_removes_tree() {
    let mut fx = Fixture::new();
    fx.runner = RecordingRunner::new(|_| 1);
    let importer = Importer::new(ScriptedBackend::succeeding()).with_patches(["broken.patch"]);

    let err = fx.import(&importer).unwrap_err();

    assert!(matches!(err, ImportError::Patch { .. }));
    assert!(!fx.package.srcdir.exists());
  }

  #[test]
  fn status_is_delegated() {
    let fx = Fixture::new();
    let importer = Importer::new(ScriptedBackend::succeeding());

    let status = importer.status(&fx.package).unwrap();

    assert_eq!(status.kind, StatusKind::UpToDate);
    assert!(status.remote_commits.is_empty());
  }
}

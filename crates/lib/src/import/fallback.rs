//! Fallback handlers for failing imports.
//!
//! When an import fails with a recognized error, the registered handlers are
//! asked, most recently registered first, for a substitute [`Importer`]
//! (a mirror, an archive, a local cache). The first substitute returned is
//! used and no further handlers are consulted.
//!
//! The registry does not guard against a handler returning an importer that
//! fails the same way again and again; handlers are responsible for not
//! recursing forever.

use std::fmt;
use std::sync::{OnceLock, RwLock};

use crate::import::Importer;
use crate::package::Package;

/// A recovery strategy: given the package and the failing importer, returns
/// an importer to use instead, or `None` to pass.
pub type FallbackHandler = Box<dyn Fn(&Package, &Importer) -> Option<Importer> + Send + Sync>;

/// Ordered chain of fallback handlers.
#[derive(Default)]
pub struct FallbackRegistry {
  handlers: Vec<FallbackHandler>,
}

impl FallbackRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// The registry of this process. Populated at startup, read-only afterwards.
  pub fn shared() -> &'static RwLock<FallbackRegistry> {
    static SHARED: OnceLock<RwLock<FallbackRegistry>> = OnceLock::new();
    SHARED.get_or_init(|| RwLock::new(FallbackRegistry::new()))
  }

  /// Register `handler`. It will be tried before every handler registered
  /// earlier.
  pub fn register<F>(&mut self, handler: F)
  where
    F: Fn(&Package, &Importer) -> Option<Importer> + Send + Sync + 'static,
  {
    self.handlers.push(Box::new(handler));
  }

  pub fn len(&self) -> usize {
    self.handlers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.handlers.is_empty()
  }

  /// First substitute offered for `package`, scanning the most recently
  /// registered handler first.
  pub fn find_substitute(&self, package: &Package, failing: &Importer) -> Option<Importer> {
    self.handlers.iter().rev().find_map(|handler| handler(package, failing))
  }
}

impl fmt::Debug for FallbackRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FallbackRegistry")
      .field("handlers", &self.handlers.len())
      .finish()
  }
}

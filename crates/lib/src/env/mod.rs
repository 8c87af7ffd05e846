//! Environment composition.
//!
//! [`EnvironmentStore`] keeps list-valued environment variables (search
//! paths) as ordered sequences. A variable is seeded from the inherited
//! environment the first time it is written; from then on the in-memory
//! sequence is authoritative and its joined form is what child processes see.
//!
//! # Sharing
//!
//! Stores are plain values so tests can build isolated ones. The process has
//! one mirroring instance, [`EnvironmentStore::shared`], whose writes are also
//! applied to the real process environment. The store itself does no locking
//! of its own: composition has to be serialized by the orchestrator even when
//! package builds run in parallel.

mod prefix;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use tracing::debug;

pub use prefix::InterpreterLayout;

/// Separator used to join list-valued variables.
#[cfg(windows)]
pub const PATH_SEPARATOR: char = ';';

/// Separator used to join list-valued variables.
#[cfg(not(windows))]
pub const PATH_SEPARATOR: char = ':';

/// Where untouched variables are seeded from.
#[derive(Debug, Clone, Default)]
enum Inherited {
  /// The live process environment.
  #[default]
  Process,
  /// A fixed snapshot.
  Snapshot(HashMap<String, String>),
}

/// Ordered, list-valued environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentStore {
  vars: BTreeMap<String, Vec<String>>,
  inherited: Inherited,
  mirror: bool,
  layout: InterpreterLayout,
  module_search_path: Vec<PathBuf>,
}

impl EnvironmentStore {
  /// Isolated store seeded from the process environment. Writes are only
  /// visible through [`exported`](Self::exported).
  pub fn new() -> Self {
    Self::default()
  }

  /// Isolated store seeded from a fixed set of variables.
  pub fn with_inherited<I, K, V>(vars: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    Self {
      inherited: Inherited::Snapshot(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
      ..Self::default()
    }
  }

  /// Store whose writes are mirrored into the process environment.
  ///
  /// Mirroring calls `std::env::set_var`, so all writes must happen while no
  /// other thread reads or writes the environment.
  pub fn mirroring() -> Self {
    Self {
      mirror: true,
      ..Self::default()
    }
  }

  /// The single mirroring store of this process.
  pub fn shared() -> &'static Mutex<EnvironmentStore> {
    static SHARED: OnceLock<Mutex<EnvironmentStore>> = OnceLock::new();
    SHARED.get_or_init(|| Mutex::new(EnvironmentStore::mirroring()))
  }

  pub fn with_layout(mut self, layout: InterpreterLayout) -> Self {
    self.layout = layout;
    self
  }

  pub fn layout(&self) -> &InterpreterLayout {
    &self.layout
  }

  /// Current sequence of a variable that has been written this process.
  pub fn get(&self, name: &str) -> Option<&[String]> {
    self.vars.get(name).map(Vec::as_slice)
  }

  /// Serialized value: the joined sequence once touched, otherwise the
  /// inherited value.
  pub fn value(&self, name: &str) -> Option<String> {
    match self.vars.get(name) {
      Some(values) => Some(join(values)),
      None => self.inherited_value(name),
    }
  }

  /// Replace the sequence of `name` with `values`.
  pub fn set<I, S>(&mut self, name: &str, values: I)
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.vars.insert(name.to_string(), Vec::new());
    self.add(name, values);
  }

  /// Prepend `values`, in the order given, in front of the current sequence.
  pub fn add<I, S>(&mut self, name: &str, values: I)
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut updated: Vec<String> = values.into_iter().map(Into::into).collect();
    updated.extend(self.current(name));

    debug!(name, value = %join(&updated), "environment updated");
    self.vars.insert(name.to_string(), updated);
    self.export(name);
  }

  /// Prepend each existing directory of `paths` that is not already part of
  /// the variable. Non-directories and duplicates are skipped silently.
  pub fn add_path<I, P>(&mut self, name: &str, paths: I)
  where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
  {
    for path in paths {
      let path = path.as_ref();
      if !path.is_dir() {
        continue;
      }

      let entry = path.to_string_lossy().into_owned();
      if self.current(name).contains(&entry) {
        continue;
      }

      self.add(name, [entry]);
      if name == self.layout.variable {
        self.module_search_path.insert(0, path.to_path_buf());
      }
    }
  }

  /// Directories made importable in-process through the interpreter module
  /// variable, most recent first.
  pub fn module_search_path(&self) -> &[PathBuf] {
    &self.module_search_path
  }

  /// Serialized form of every variable written this process, sorted by name.
  pub fn exported(&self) -> Vec<(String, String)> {
    self.vars.iter().map(|(name, values)| (name.clone(), join(values))).collect()
  }

  /// Resolve `program` against the composed `PATH`.
  pub fn find_in_path(&self, program: &str) -> Option<PathBuf> {
    let path = self.value("PATH")?;
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    which::which_in(program, Some(path), cwd).ok()
  }

  /// Current sequence, seeding from the inherited value when untouched.
  fn current(&self, name: &str) -> Vec<String> {
    match self.vars.get(name) {
      Some(values) => values.clone(),
      None => self.inherited_value(name).map(|v| split(&v)).unwrap_or_default(),
    }
  }

  fn inherited_value(&self, name: &str) -> Option<String> {
    match &self.inherited {
      Inherited::Process => std::env::var(name).ok(),
      Inherited::Snapshot(vars) => vars.get(name).cloned(),
    }
  }

  fn export(&self, name: &str) {
    if !self.mirror {
      return;
    }
    if let Some(values) = self.vars.get(name) {
      // SAFETY: mirroring stores are only written while environment
      // composition is serialized (see module docs).
      unsafe { std::env::set_var(name, join(values)) };
    }
  }
}

fn join(values: &[String]) -> String {
  let separator = PATH_SEPARATOR.to_string();
  values.join(&separator)
}

/// Split an inherited value. Empty entries are dropped.
fn split(value: &str) -> Vec<String> {
  value
    .split(PATH_SEPARATOR)
    .filter(|entry| !entry.is_empty())
    .map(str::to_string)
    .collect()
}

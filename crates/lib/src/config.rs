//! Orchestrator configuration.
//!
//! Every field has a default so an empty JSON object (or no file at all) is a
//! valid configuration. The file named by [`CONFIG_ENV_VAR`] is used by
//! [`Config::from_env`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::CONFIG_ENV_VAR;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The configuration file could not be read.
  #[error("failed to read config '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The configuration file is not valid JSON for [`Config`].
  #[error("failed to parse config '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Process-wide settings shared by the import and generation engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Whether existing checkouts are updated. When false, importing a package
  /// whose source tree exists does nothing.
  pub do_update: bool,

  /// Verbose progress reporting: skipped updates are logged at `info` instead
  /// of `debug`.
  pub verbose: bool,

  /// Overrides for external tools, keyed by logical name (`patch`, `make`, ...).
  pub tools: BTreeMap<String, String>,

  /// Parallelism passed down to generators that support it.
  pub parallel_build_level: usize,

  /// Settings of the code generator package type.
  pub generator: GeneratorConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      do_update: true,
      verbose: false,
      tools: BTreeMap::new(),
      parallel_build_level: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
      generator: GeneratorConfig::default(),
    }
  }
}

impl Config {
  /// Load configuration from a JSON file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    debug!(path = %path.display(), "loaded config");
    Ok(config)
  }

  /// Load the file named by `SRCBUILD_CONFIG`, or the defaults when unset.
  pub fn from_env() -> Result<Self, ConfigError> {
    match std::env::var_os(CONFIG_ENV_VAR) {
      Some(path) if !path.is_empty() => Self::load(Path::new(&path)),
      _ => Ok(Self::default()),
    }
  }

  /// Program to run for the logical tool `name`.
  ///
  /// Falls back to `name` itself, resolved through `PATH` at spawn time.
  pub fn tool<'a>(&'a self, name: &'a str) -> &'a str {
    self.tools.get(name).map(String::as_str).unwrap_or(name)
  }
}

/// Settings of the code generator package type.
///
/// Per-package overrides live on [`crate::generate::GeneratorPackage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
  /// Generator program name, also used to name the stamp directory.
  pub name: String,

  /// Extension of the specification file looked up in the source tree.
  pub spec_extension: String,

  /// Interpreter the generator script is run with (`<interpreter> -S <tool>`).
  /// `None` runs the tool directly.
  pub interpreter: Option<String>,

  /// Regenerate on every run, skipping fingerprint and probe checks.
  ///
  /// Off by default, so an unchanged command line with a current build
  /// system skips generation. Setups that expect a generation pass on every
  /// run have to turn it on.
  pub always_regenerate: bool,

  /// Default for `--corba`.
  pub corba: Option<bool>,

  /// Default for `--extended-states` / `--no-extended-states`.
  pub extended_states: Option<bool>,

  /// Enabled transports.
  pub transports: Vec<String>,

  /// Value of `--type-export-policy`.
  pub type_export_policy: String,

  /// Raw options appended after the computed ones; they take precedence.
  pub options: Vec<String>,
}

impl Default for GeneratorConfig {
  fn default() -> Self {
    Self {
      name: "orogen".to_string(),
      spec_extension: "orogen".to_string(),
      interpreter: Some("ruby".to_string()),
      always_regenerate: false,
      corba: None,
      extended_states: None,
      transports: vec!["corba".to_string(), "typelib".to_string(), "mqueue".to_string()],
      type_export_policy: "used".to_string(),
      options: Vec::new(),
    }
  }
}

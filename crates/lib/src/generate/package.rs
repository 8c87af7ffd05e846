//! Generator-based package type.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{Config, GeneratorConfig};
use crate::env::EnvironmentStore;
use crate::generate::cmdline::{finalize, merge_flag, version_at_least};
use crate::generate::{Decision, GenerateError, GenerationTracker};
use crate::package::Package;
use crate::process::{Invocation, ProcessRunner};

/// Everything a generation pass needs besides the package itself.
#[derive(Clone, Copy)]
pub struct GenerateContext<'a> {
  pub config: &'a Config,
  pub runner: &'a dyn ProcessRunner,
  /// Environment used to find the generator and exported to it.
  pub env: &'a EnvironmentStore,
}

/// Per-package generator settings. Unset values fall back to
/// [`GeneratorConfig`].
#[derive(Debug, Clone, Default)]
pub struct GeneratorPackage {
  corba: Option<bool>,
  extended_states: Option<bool>,
  options: Vec<String>,
  spec_file: Option<String>,
  version: Option<String>,
}

impl GeneratorPackage {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_corba(mut self, corba: bool) -> Self {
    self.corba = Some(corba);
    self
  }

  pub fn with_extended_states(mut self, extended_states: bool) -> Self {
    self.extended_states = Some(extended_states);
    self
  }

  /// Raw options, merged after the global ones.
  pub fn with_options<I, S>(mut self, options: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.options = options.into_iter().map(Into::into).collect();
    self
  }

  /// Specification file, relative to the source directory.
  pub fn with_spec_file(mut self, spec_file: impl Into<String>) -> Self {
    self.spec_file = Some(spec_file.into());
    self
  }

  /// Generator version, skipping detection from the installed tool.
  pub fn with_version(mut self, version: impl Into<String>) -> Self {
    self.version = Some(version.into());
    self
  }

  pub fn corba(&self, settings: &GeneratorConfig) -> bool {
    self.corba.or(settings.corba).unwrap_or(false)
  }

  pub fn extended_states(&self, settings: &GeneratorConfig) -> Option<bool> {
    self.extended_states.or(settings.extended_states)
  }

  /// `<srcdir>/.<generator>/<generator>-stamp`
  pub fn stamp_path(package: &Package, settings: &GeneratorConfig) -> PathBuf {
    package
      .srcdir
      .join(format!(".{}", settings.name))
      .join(format!("{}-stamp", settings.name))
  }

  pub fn tracker(&self, package: &Package, ctx: &GenerateContext<'_>) -> GenerationTracker {
    GenerationTracker::new(Self::stamp_path(package, &ctx.config.generator), &package.builddir)
      .with_make(ctx.config.tool("make"))
      .with_env(ctx.env.exported())
  }

  /// Specification file of the package.
  ///
  /// Without an explicit setting, the first `*.<spec_extension>` file of the
  /// source directory is used. Returns `None` while the package is not
  /// checked out.
  pub fn spec_file(&self, package: &Package, settings: &GeneratorConfig) -> Result<Option<String>, GenerateError> {
    if let Some(spec_file) = &self.spec_file {
      return Ok(Some(spec_file.clone()));
    }
    if !package.srcdir.is_dir() {
      return Ok(None);
    }

    let no_spec = || GenerateError::NoSpecFile {
      srcdir: package.srcdir.clone(),
      extension: settings.spec_extension.clone(),
    };

    let mut candidates: Vec<String> = fs::read_dir(&package.srcdir)
      .map_err(|source| GenerateError::ListSourceDir {
        srcdir: package.srcdir.clone(),
        source,
      })?
      .filter_map(Result::ok)
      .map(|entry| entry.path())
      .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == settings.spec_extension.as_str()))
      .filter_map(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
      .collect();
    candidates.sort();

    candidates.into_iter().next().map(Some).ok_or_else(no_spec)
  }

  /// Version of the generator installed at `tool_path`.
  ///
  /// Read from `<root>/lib/<generator>/version.rb`, where `<root>` is two
  /// levels above the tool.
  pub fn version(&self, tool_path: &Path, settings: &GeneratorConfig) -> Result<String, GenerateError> {
    if let Some(version) = &self.version {
      return Ok(version.clone());
    }

    let unknown = || GenerateError::UnknownVersion {
      tool: tool_path.to_path_buf(),
    };

    let root = tool_path.parent().and_then(Path::parent).ok_or_else(unknown)?;
    let lib = root.join("lib").join(&settings.name);
    if !lib.is_dir() {
      return Err(unknown());
    }

    let version_file = lib.join("version.rb");
    let content = fs::read_to_string(&version_file).map_err(|source| GenerateError::ReadVersion {
      path: version_file,
      source,
    })?;
    parse_version(&content).ok_or_else(unknown)
  }

  /// Fingerprinted command line for `version`.
  pub fn cmdline(&self, settings: &GeneratorConfig, version: &str, parallel: usize, spec_file: &str) -> Vec<String> {
    let mut cmdline = Vec::new();
    if self.corba(settings) {
      cmdline.push("--corba".to_string());
    }

    if let Some(extended) = self.extended_states(settings) {
      cmdline.retain(|flag: &String| !flag.contains("extended-states"));
      cmdline.push(if extended { "--extended-states" } else { "--no-extended-states" }.to_string());
    }

    if version_at_least(version, "1.0") {
      cmdline.push(format!("--parallel-build={parallel}"));
    }
    if version_at_least(version, "1.1") {
      let mut transports = settings.transports.clone();
      transports.sort();
      transports.dedup();
      cmdline.push(format!("--type-export-policy={}", settings.type_export_policy));
      cmdline.push(format!("--transports={}", transports.join(",")));
    }

    for option in settings.options.iter().chain(&self.options) {
      merge_flag(&mut cmdline, option);
    }

    finalize(cmdline, spec_file)
  }

  /// Regenerate when the stamp is older than the dependencies' install stamps
  /// or the source tree. Returns `None` when the stamp is newer than all of
  /// them.
  pub fn prepare(
    &self,
    package: &Package,
    dependency_stamps: &[PathBuf],
    ctx: &GenerateContext<'_>,
  ) -> Result<Option<Decision>, GenerateError> {
    let tracker = self.tracker(package, ctx);
    if !tracker.is_outdated(dependency_stamps, &package.srcdir)? {
      debug!(package = %package.name, "generation stamp newer than its inputs");
      return Ok(None);
    }
    self.regen(package, ctx).map(Some)
  }

  /// Compute the command line and run the generator if the tracker asks for it.
  pub fn regen(&self, package: &Package, ctx: &GenerateContext<'_>) -> Result<Decision, GenerateError> {
    let settings = &ctx.config.generator;

    let tool_path = ctx
      .env
      .find_in_path(&settings.name)
      .ok_or_else(|| GenerateError::ToolNotFound {
        tool: settings.name.clone(),
      })?;
    let version = self.version(&tool_path, settings)?;
    let spec_file = self.spec_file(package, settings)?.ok_or_else(|| GenerateError::NoSpecFile {
      srcdir: package.srcdir.clone(),
      extension: settings.spec_extension.clone(),
    })?;

    let cmdline = self.cmdline(settings, &version, ctx.config.parallel_build_level, &spec_file);
    let tracker = self.tracker(package, ctx);

    let decision = tracker.decide(&cmdline, settings.always_regenerate, ctx.runner, |cmdline| {
      package.progress("generating %s");
      self.run_generator(package, ctx, &tool_path, cmdline)?;
      package.progress("generated %s");
      Ok(())
    })?;

    if !decision.requires_generation() {
      info!(package = %package.name, "no need to regenerate");
    }
    Ok(decision)
  }

  /// Drop the stamp so the next preparation regenerates unconditionally.
  pub fn prepare_for_forced_build(&self, package: &Package, ctx: &GenerateContext<'_>) -> Result<(), GenerateError> {
    self.tracker(package, ctx).invalidate()
  }

  /// Register the package's installed prefix, including the type plugins it
  /// ships.
  pub fn update_environment(&self, package: &Package, env: &mut EnvironmentStore) {
    env.update_for_prefix(&package.prefix);
    env.add_path(
      "TYPELIB_RUBY_PLUGIN_PATH",
      [package.prefix.join("share").join("typelib").join("ruby")],
    );
  }

  fn run_generator(
    &self,
    package: &Package,
    ctx: &GenerateContext<'_>,
    tool_path: &Path,
    cmdline: &[String],
  ) -> Result<(), GenerateError> {
    let tool = tool_path.to_string_lossy().into_owned();
    let invocation = match &ctx.config.generator.interpreter {
      Some(interpreter) => Invocation::new(ctx.config.tool(interpreter)).arg("-S").arg(tool),
      None => Invocation::new(tool),
    }
    .args(cmdline.iter().cloned())
    .current_dir(&package.srcdir)
    .envs(ctx.env.exported());

    let outcome = ctx.runner.run(&invocation).map_err(|source| GenerateError::Spawn {
      cmd: invocation.display(),
      source,
    })?;

    if !outcome.success() {
      return Err(GenerateError::GeneratorFailed {
        cmd: invocation.display(),
        code: outcome.code,
      });
    }
    Ok(())
  }
}

/// Extract `x` from a `VERSION = "x"` line.
fn parse_version(content: &str) -> Option<String> {
  content.lines().find_map(|line| {
    let (_, rest) = line.split_once("VERSION")?;
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let value = rest.strip_prefix('"')?.trim_end().strip_suffix('"')?;
    (!value.is_empty()).then(|| value.to_string())
  })
}

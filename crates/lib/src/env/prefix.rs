//! Search-path updates for newly installed prefixes.

use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use super::EnvironmentStore;

/// Where an interpreter looks for modules below an installation prefix.
///
/// Defaults describe a Ruby 1.8 layout: `RUBYLIB`, `lib/ruby/1.8` and
/// `lib/ruby/1.8/<arch>`, with `.rb` module files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterLayout {
  /// Module search path variable.
  pub variable: String,
  /// Directory below `lib/` holding the interpreter's own module tree.
  pub lib_subdir: String,
  pub version: String,
  pub arch: String,
  /// Extension of module source files, without the dot.
  pub module_extension: String,
}

impl Default for InterpreterLayout {
  fn default() -> Self {
    Self {
      variable: "RUBYLIB".to_string(),
      lib_subdir: "ruby".to_string(),
      version: "1.8".to_string(),
      arch: format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
      module_extension: "rb".to_string(),
    }
  }
}

impl EnvironmentStore {
  /// Register a newly installed prefix.
  ///
  /// `prefix/bin` goes to `PATH` and `prefix/lib/pkgconfig` to
  /// `PKG_CONFIG_PATH`. `prefix/lib` itself is only added to the module
  /// variable when it is not an interpreter library tree and ships at least
  /// one module source file, so prefixes holding only compiled libraries do
  /// not end up on the module path.
  pub fn update_for_prefix(&mut self, prefix: &Path) {
    debug!(prefix = %prefix.display(), "updating environment for prefix");

    self.add_path("PATH", [prefix.join("bin")]);
    self.add_path("PKG_CONFIG_PATH", [prefix.join("lib").join("pkgconfig")]);

    let layout = self.layout.clone();
    let lib = prefix.join("lib");
    if !lib.join(&layout.lib_subdir).is_dir() && contains_modules(&lib, &layout.module_extension) {
      self.add_path(&layout.variable, [&lib]);
    }

    let versioned = lib.join(&layout.lib_subdir).join(&layout.version);
    self.add_path(&layout.variable, [versioned.clone()]);
    self.add_path(&layout.variable, [versioned.join(&layout.arch)]);
  }
}

/// Whether any file with `extension` exists below `dir`.
fn contains_modules(dir: &Path, extension: &str) -> bool {
  WalkDir::new(dir)
    .into_iter()
    .filter_map(Result::ok)
    .any(|e| e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == extension))
}

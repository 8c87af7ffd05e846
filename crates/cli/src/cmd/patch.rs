//! Patch command implementation.
//!
//! Brings the patch stack of a source tree in line with the given list,
//! unapplying whatever the tree's stamp records first.

use std::path::{self, Path, PathBuf};

use anyhow::{Context, Result, bail};
use srcbuild_lib::config::Config;
use srcbuild_lib::import::PatchSynchronizer;
use srcbuild_lib::package::Package;
use srcbuild_lib::process::CommandRunner;

use crate::output::{OutputFormat, describe_patches, print_info, print_json, print_success, symbols};

pub fn cmd_patch(config: &Config, srcdir: &Path, patches: &[PathBuf], output: OutputFormat) -> Result<()> {
  if !srcdir.is_dir() {
    bail!("Source directory not found: {}", srcdir.display());
  }

  let name = srcdir
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_else(|| srcdir.display().to_string());
  let package = Package::new(name, srcdir, srcdir);

  // relative patch paths are taken from the invocation directory
  let patches = patches
    .iter()
    .map(|patch| path::absolute(patch).with_context(|| format!("Failed to resolve {}", patch.display())))
    .collect::<Result<Vec<_>>>()?;

  let runner = CommandRunner;
  let changed = PatchSynchronizer::new(&runner, config.tool("patch"))
    .sync(&package, &patches)
    .with_context(|| format!("Failed to patch {}", srcdir.display()))?;

  if output.is_json() {
    return print_json(&serde_json::json!({
      "srcdir": srcdir,
      "changed": changed,
      "applied": patches,
    }));
  }

  if !changed {
    print_info("Patches already in sync");
    return Ok(());
  }

  print_success(&describe_patches(patches.len()));
  for patch in &patches {
    println!("  {} {}", symbols::PLUS, patch.display());
  }
  Ok(())
}

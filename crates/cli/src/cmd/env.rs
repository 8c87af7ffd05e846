//! Env command implementation.
//!
//! Registers each installation prefix in a fresh environment store and prints
//! the variables that changed.

use std::collections::BTreeMap;
use std::path::{self, PathBuf};

use anyhow::{Context, Result, bail};
use srcbuild_lib::env::EnvironmentStore;

use crate::output::{OutputFormat, print_info, print_json, print_var};

pub fn cmd_env(prefixes: &[PathBuf], output: OutputFormat) -> Result<()> {
  let mut env = EnvironmentStore::new();

  for prefix in prefixes {
    if !prefix.is_dir() {
      bail!("Prefix not found: {}", prefix.display());
    }
    let prefix = path::absolute(prefix).with_context(|| format!("Failed to resolve {}", prefix.display()))?;
    env.update_for_prefix(&prefix);
  }

  let vars = env.exported();

  if output.is_json() {
    let map: BTreeMap<_, _> = vars.into_iter().collect();
    return print_json(&map);
  }

  if vars.is_empty() {
    print_info("No variables changed");
  }
  for (name, value) in &vars {
    print_var(name, value);
  }

  Ok(())
}

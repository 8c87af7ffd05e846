use anyhow::Result;
use srcbuild_lib::config::Config;
use srcbuild_lib::generate::cmdline::merge_flag;

use crate::output::{OutputFormat, print_json};

pub fn cmd_flags(config: &Config, flags: &[String], output: OutputFormat) -> Result<()> {
  let mut cmdline = Vec::new();
  for flag in config.generator.options.iter().chain(flags) {
    merge_flag(&mut cmdline, flag);
  }
  cmdline.sort();

  if output.is_json() {
    return print_json(&cmdline);
  }

  for flag in &cmdline {
    println!("{}", flag);
  }
  Ok(())
}

//! Generator command-line construction.
//!
//! The command line doubles as the generation fingerprint, so it has to be
//! built deterministically: later flags replace earlier ones with the same
//! name, and the final list is sorted before the specification file is
//! appended.

/// Append `flag` to `cmdline`, replacing earlier occurrences of the option.
///
/// A bare flag (letters, digits, `_` and `-` only) first removes every entry
/// starting with it. `--no-X` additionally removes entries starting with
/// `--X`. Anything else, e.g. `--opt=value`, is appended as-is.
pub fn merge_flag(cmdline: &mut Vec<String>, flag: &str) {
  if !is_bare_flag(flag) {
    cmdline.push(flag.to_string());
    return;
  }

  cmdline.retain(|entry| !entry.starts_with(flag));
  if let Some(positive) = flag.strip_prefix("--no-") {
    let positive = format!("--{positive}");
    cmdline.retain(|entry| !entry.starts_with(&positive));
  }
  cmdline.push(flag.to_string());
}

/// Sort `flags` and append the specification file.
pub fn finalize(mut flags: Vec<String>, spec_file: &str) -> Vec<String> {
  flags.sort();
  flags.push(spec_file.to_string());
  flags
}

/// Whether `version` is at least `minimum`.
///
/// The comparison is a plain string comparison: "1.10" sorts before "1.9".
pub fn version_at_least(version: &str, minimum: &str) -> bool {
  version >= minimum
}

fn is_bare_flag(flag: &str) -> bool {
  !flag.is_empty() && flag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

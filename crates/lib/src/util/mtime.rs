//! File modification time helpers.
//!
//! Used by the generation tracker to compare stamps against dependency
//! stamps and source trees.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use walkdir::WalkDir;

/// Version control metadata never counts as source content.
const VCS_DIRS: &[&str] = &[".git", ".svn", ".hg", "CVS"];

#[derive(Debug, Error)]
pub enum MtimeError {
  #[error("failed to walk '{path}': {message}")]
  WalkDir { path: PathBuf, message: String },

  #[error("failed to stat '{path}': {source}")]
  Stat {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Modification time of `path`, `None` if it does not exist.
pub fn modified(path: &Path) -> Result<Option<SystemTime>, MtimeError> {
  match fs::metadata(path) {
    Ok(meta) => meta.modified().map(Some).map_err(|source| MtimeError::Stat {
      path: path.to_path_buf(),
      source,
    }),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(source) => Err(MtimeError::Stat {
      path: path.to_path_buf(),
      source,
    }),
  }
}

/// Set the modification time of `path` to now, creating it empty if missing.
pub fn touch(path: &Path) -> io::Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  let file = OpenOptions::new().create(true).append(true).open(path)?;
  file.set_modified(SystemTime::now())
}

/// Newest modification time of any file below `root`.
///
/// Directories listed in `exclude` (and VCS metadata directories) are not
/// descended into. Returns `None` for an empty or missing tree.
pub fn newest_in_tree(root: &Path, exclude: &[PathBuf]) -> Result<Option<SystemTime>, MtimeError> {
  if !root.is_dir() {
    return Ok(None);
  }

  let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
    let excluded_name = e
      .file_name()
      .to_str()
      .map(|name| VCS_DIRS.contains(&name))
      .unwrap_or(false);
    !excluded_name && !exclude.iter().any(|p| p == e.path())
  });

  let mut newest = None;
  for entry in walker {
    let entry = entry.map_err(|e| MtimeError::WalkDir {
      path: root.to_path_buf(),
      message: e.to_string(),
    })?;

    if !entry.file_type().is_file() {
      continue;
    }

    let mtime = entry
      .metadata()
      .map_err(|e| MtimeError::WalkDir {
        path: entry.path().to_path_buf(),
        message: e.to_string(),
      })?
      .modified()
      .map_err(|source| MtimeError::Stat {
        path: entry.path().to_path_buf(),
        source,
      })?;

    if newest.is_none_or(|current| mtime > current) {
      newest = Some(mtime);
    }
  }

  Ok(newest)
}

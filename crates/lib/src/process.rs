//! External process invocation.
//!
//! The patch tool, the code generator and the up-to-date probe are all run
//! through a [`ProcessRunner`]. [`CommandRunner`] spawns real processes;
//! tests substitute a recording implementation.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

/// A fully described process invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
  /// Working directory. Inherited when `None`.
  pub cwd: Option<PathBuf>,
  /// File connected to the child's stdin.
  pub stdin: Option<PathBuf>,
  /// Variables set on top of the inherited environment.
  pub env: Vec<(String, String)>,
}

impl Invocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      ..Default::default()
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
    self.stdin = Some(path.into());
    self
  }

  pub fn envs(mut self, env: Vec<(String, String)>) -> Self {
    self.env = env;
    self
  }

  /// Program and arguments joined for messages.
  pub fn display(&self) -> String {
    std::iter::once(self.program.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// Exit status of a finished process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
  /// Exit code, `None` when terminated by a signal.
  pub code: Option<i32>,
}

impl ExitOutcome {
  pub fn success(self) -> bool {
    self.code == Some(0)
  }
}

/// Runs an [`Invocation`] to completion.
///
/// An `Err` means the process could not be started at all; a non-zero exit is
/// reported through [`ExitOutcome`].
pub trait ProcessRunner {
  fn run(&self, invocation: &Invocation) -> io::Result<ExitOutcome>;
}

/// Spawns real child processes and blocks until they exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandRunner;

impl ProcessRunner for CommandRunner {
  fn run(&self, invocation: &Invocation) -> io::Result<ExitOutcome> {
    let mut command = Command::new(&invocation.program);
    command.args(&invocation.args);

    if let Some(cwd) = &invocation.cwd {
      command.current_dir(cwd);
    }

    for (key, value) in &invocation.env {
      command.env(key, value);
    }

    let stdin = match &invocation.stdin {
      Some(path) => Stdio::from(File::open(path)?),
      None => Stdio::null(),
    };
    command.stdin(stdin);

    debug!(cmd = %invocation.display(), cwd = ?invocation.cwd, "spawning process");

    let output = command.output()?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      let stdout = String::from_utf8_lossy(&output.stdout);

      if !stderr.is_empty() {
        debug!(stderr = %stderr, "command stderr");
      }
      if !stdout.is_empty() {
        debug!(stdout = %stdout, "command stdout");
      }
    }

    Ok(ExitOutcome {
      code: output.status.code(),
    })
  }
}

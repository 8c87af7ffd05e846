//! srcbuild-lib: Core engines for the srcbuild package orchestrator
//!
//! This crate brings a package's source tree up to date and keeps the
//! environment of downstream build steps consistent:
//! - `import`: checkout/update through a pluggable VCS backend, with fallbacks
//! - `import::patch`: reconciles the applied patch stack with the desired one
//! - `env`: ordered, deduplicated search-path composition
//! - `generate`: decides when a code generation pass must re-run

pub mod config;
pub mod consts;
pub mod env;
pub mod generate;
pub mod import;
pub mod package;
pub mod process;
pub mod util;

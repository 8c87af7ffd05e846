//! Shared utilities.
//!
//! File timestamp helpers and test support.

pub mod mtime;

#[cfg(test)]
pub mod testutil;

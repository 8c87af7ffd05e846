mod env;
mod flags;
mod patch;

pub use env::cmd_env;
pub use flags::cmd_flags;
pub use patch::cmd_patch;

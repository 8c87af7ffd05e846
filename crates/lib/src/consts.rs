/// Environment variable naming the configuration file to load.
pub const CONFIG_ENV_VAR: &str = "SRCBUILD_CONFIG";

/// Name of the file, inside a source tree, listing the patches applied to it.
pub const PATCH_STAMP_FILE: &str = "patches-autobuild-stamp";

/// Target of the generated build system that answers "is generation current".
pub const UPTODATE_PROBE_TARGET: &str = "check-uptodate";

/// Build system file whose presence means the probe target can be invoked.
pub const GENERATED_MAKEFILE: &str = "Makefile";

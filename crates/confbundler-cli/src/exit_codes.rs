//! Exit codes of the `confbundler` binary. They are part of the public contract.

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_BUILD_FAILED: i32 = 1; // Fatal load, resolve or encode error
pub const EXIT_CONFIG_ERROR: i32 = 2; // Bad arguments or refused output path
pub const EXIT_WARNINGS: i32 = 3; // Diagnostics present with --deny-warnings

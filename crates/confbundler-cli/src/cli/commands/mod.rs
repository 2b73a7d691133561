use super::args::{Cli, Command};
use confbundler_core::{load_path, Bundle, Diagnostics, LoadError};
use std::path::PathBuf;

pub mod build;
pub mod plan;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Build(args) => build::run(args),
        Command::Plan(args) => plan::run(args),
    }
}

/// Load bundles in order and fold them into one.
pub(crate) fn load_bundles(
    paths: &[PathBuf],
    diags: &mut Diagnostics,
) -> Result<Bundle, LoadError> {
    let mut merged = Bundle::new();
    for path in paths {
        merged.merge_from(load_path(path, diags)?);
    }
    Ok(merged)
}

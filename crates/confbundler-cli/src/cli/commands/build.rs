use super::super::args::BuildArgs;
use super::load_bundles;
use crate::exit_codes;
use anyhow::Context;
use confbundler_core::{BuildOptions, Compression, Diagnostics};
use std::io::{BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

const ARCHIVE_MODE: u32 = 0o644;

pub fn run(args: BuildArgs) -> anyhow::Result<i32> {
    let Some(output) = args.output() else {
        eprintln!("error: missing OUTPUT");
        return Ok(exit_codes::EXIT_CONFIG_ERROR);
    };
    if output.exists() && !args.force {
        eprintln!(
            "error: {} already exists (use --force to overwrite)",
            output.display()
        );
        return Ok(exit_codes::EXIT_CONFIG_ERROR);
    }

    let mut diags = Diagnostics::new();
    let bundle = match load_bundles(args.bundles(), &mut diags) {
        Ok(bundle) => bundle,
        Err(e) => {
            eprintln!("error: {}", e);
            return Ok(exit_codes::EXIT_BUILD_FAILED);
        }
    };

    tracing::debug!(
        bundles = args.bundles().len(),
        output = %output.display(),
        "bundles merged"
    );

    let options = BuildOptions {
        compression: if args.gzip || is_gzip_name(output) {
            Compression::Gzip
        } else {
            Compression::None
        },
    };

    // Written beside OUTPUT so the final rename stays on one filesystem.
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staging = tempfile::Builder::new()
        .prefix(".confbundler-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;

    let (summary, writer) =
        match confbundler_core::build(&bundle, BufWriter::new(staging), &options, &mut diags) {
            Ok(done) => done,
            Err(e) => {
                eprintln!("error: {}", e);
                return Ok(exit_codes::EXIT_BUILD_FAILED);
            }
        };
    let mut staging = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("failed to flush archive")?;
    staging.flush().context("failed to flush archive")?;

    if args.deny_warnings && diags.warnings() > 0 {
        eprintln!(
            "error: {} warning(s) reported with --deny-warnings; {} not written",
            diags.warnings(),
            output.display()
        );
        return Ok(exit_codes::EXIT_WARNINGS);
    }

    std::fs::set_permissions(
        staging.path(),
        std::fs::Permissions::from_mode(ARCHIVE_MODE),
    )
    .context("failed to set archive permissions")?;
    let persisted = if args.force {
        staging.persist(output)
    } else {
        staging.persist_noclobber(output)
    };
    persisted
        .map_err(|e| e.error)
        .with_context(|| format!("failed to write {}", output.display()))?;

    eprintln!(
        "wrote {} ({} entries, {} skipped, {} warning(s))",
        output.display(),
        summary.written,
        summary.skipped,
        diags.warnings()
    );
    Ok(exit_codes::EXIT_SUCCESS)
}

fn is_gzip_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".tar.gz") || name.ends_with(".tgz"))
}

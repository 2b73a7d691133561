use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "confbundler",
    version,
    about = "Compile declarative file, package and user bundles into a tar archive"
)]
pub struct Cli {
    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge bundles and write the resulting archive
    Build(BuildArgs),
    /// Print the declared state of the merged bundles
    Plan(PlanArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Overwrite OUTPUT if it exists
    #[arg(short, long)]
    pub force: bool,

    /// Gzip the archive (implied by a .tar.gz or .tgz OUTPUT)
    #[arg(long)]
    pub gzip: bool,

    /// Fail with exit code 3 when any warning is reported
    #[arg(long)]
    pub deny_warnings: bool,

    /// Bundles in merge order (manifest files or bundle directories), then OUTPUT
    #[arg(required = true, num_args = 2.., value_name = "BUNDLE... OUTPUT")]
    pub paths: Vec<PathBuf>,
}

impl BuildArgs {
    pub fn bundles(&self) -> &[PathBuf] {
        self.paths
            .split_last()
            .map(|(_, bundles)| bundles)
            .unwrap_or_default()
    }

    pub fn output(&self) -> Option<&PathBuf> {
        self.paths.last()
    }
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Bundles in merge order (manifest files or bundle directories)
    #[arg(required = true, value_name = "BUNDLE")]
    pub bundles: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn build_splits_bundles_and_output() {
        let cli = Cli::parse_from(["confbundler", "build", "--gzip", "base", "site", "out.tar"]);
        let Command::Build(args) = cli.cmd else {
            panic!("expected build");
        };
        assert!(args.gzip);
        assert_eq!(args.bundles(), &[PathBuf::from("base"), PathBuf::from("site")]);
        assert_eq!(args.output(), Some(&PathBuf::from("out.tar")));
    }

    #[test]
    fn build_needs_a_bundle_and_an_output() {
        assert!(Cli::try_parse_from(["confbundler", "build", "out.tar"]).is_err());
    }
}

use super::super::args::PlanArgs;
use super::load_bundles;
use crate::exit_codes;
use confbundler_core::{Diagnostics, Plan};

pub fn run(args: PlanArgs) -> anyhow::Result<i32> {
    let mut diags = Diagnostics::new();
    let bundle = match load_bundles(&args.bundles, &mut diags) {
        Ok(bundle) => bundle,
        Err(e) => {
            eprintln!("error: {}", e);
            return Ok(exit_codes::EXIT_BUILD_FAILED);
        }
    };

    let plan = Plan::new(&bundle);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", plan);
    }
    Ok(exit_codes::EXIT_SUCCESS)
}

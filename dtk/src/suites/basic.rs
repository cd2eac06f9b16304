//! Basic build/install/run sanity suite.
//!
//! With every argument at its default the daemon must build, install into
//! the secured directory, launch through the parent and exit cleanly.

use dtk_harness::build::BuildArgs;
use dtk_harness::classify::SuiteReport;
use dtk_harness::outcome::Outcome;

use super::{Ctx, run_suite};

pub fn run(ctx: &Ctx<'_>) -> SuiteReport {
    run_suite(
        "basic",
        "Basic build/install/run test:",
        1,
        ctx.paths,
        |classifier| {
            let args = BuildArgs::standard(ctx.paths, ctx.options);
            let result = ctx.pipeline.full_run(&args, &["1".to_string()]);
            classifier.check(
                "build, install and run with all-default arguments",
                Outcome::Success,
                result.outcome,
                result.transcript,
            );
        },
    )
}

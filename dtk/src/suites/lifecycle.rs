//! Single-instance lifecycle suite.
//!
//! Three build guards first: the daemon's instance lock underpins its pipe
//! handling, so builds must fail whenever a pipe is enabled while the lock
//! file path is left undefined. The scenario proper then validates the lock
//! at runtime: launch in the background, probe a conflicting launch,
//! terminate, relaunch.

use dtk_harness::build::BuildArgs;
use dtk_harness::classify::SuiteReport;
use dtk_harness::lifecycle::{LifecycleScenario, SCENARIO_RECORDS};
use dtk_harness::outcome::Outcome;
use dtk_harness::pipeline::Target;

use super::{Ctx, run_suite};

const LOCK_GUARDS: usize = 3;

pub fn run(ctx: &Ctx<'_>) -> SuiteReport {
    run_suite(
        "lifecycle",
        "Singular daemon process validation tests:",
        LOCK_GUARDS + SCENARIO_RECORDS,
        ctx.paths,
        |classifier| {
            for (enable_in, enable_out) in [(true, false), (false, true), (true, true)] {
                let description = format!(
                    "Build must fail with the lock file path undefined, input pipe {}, output pipe {}.",
                    if enable_in { "enabled" } else { "disabled" },
                    if enable_out { "enabled" } else { "disabled" },
                );
                let args = BuildArgs::standard(ctx.paths, ctx.options)
                    .lock_file(None::<String>)
                    .in_pipe(enable_in.then(|| ctx.paths.in_pipe_path().display().to_string()))
                    .out_pipe(enable_out.then(|| ctx.paths.out_pipe_path().display().to_string()));

                let mut transcript = ctx.pipeline.transcript();
                let actual = match ctx
                    .pipeline
                    .build_install(Target::Daemon, &args, &mut transcript)
                {
                    Ok(()) => Outcome::Success,
                    Err(outcome) => outcome,
                };
                classifier.check(&description, Outcome::BuildFailure, actual, transcript);
            }

            LifecycleScenario::new(ctx.pipeline, ctx.paths, ctx.options).run(classifier);
        },
    )
}

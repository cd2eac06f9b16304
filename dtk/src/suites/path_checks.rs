//! Install path verification suites.
//!
//! The daemon can be built to verify that it runs from its required install
//! path, and that its launcher runs from the required parent path in a
//! secured directory. Each grid crosses a correct/incorrect launch location
//! with the verification options and expects the precise refusal the daemon
//! is contracted to emit.

use std::path::PathBuf;

use dtk_harness::build::BuildArgs;
use dtk_harness::classify::{Classifier, SuiteReport};
use dtk_harness::outcome::Outcome;
use dtk_harness::pipeline::Target;

use super::{Ctx, run_suite};

const DAEMON_GRID: usize = 4;
const PARENT_GRID: usize = 8;

pub fn run(ctx: &Ctx<'_>) -> SuiteReport {
    run_suite(
        "path-checks",
        "Path validation tests:",
        DAEMON_GRID + PARENT_GRID,
        ctx.paths,
        |classifier| {
            daemon_grid(ctx, classifier);
            parent_grid(ctx, classifier);
        },
    )
}

/// 2×2: the parent launches the daemon from the right or wrong location,
/// with the daemon's own path check enabled or disabled. Only the
/// wrong-location/check-enabled cell is refused.
fn daemon_grid(ctx: &Ctx<'_>, classifier: &mut Classifier) {
    // The build output left in the source directory doubles as the
    // wrong-location daemon copy.
    let alt_daemon: PathBuf = ctx.paths.daemon_build_path();

    for run_expected in [false, true] {
        for require_expected in [true, false] {
            let description = format!(
                "{} daemon path, path checking {}.",
                if run_expected { "Correct" } else { "Incorrect" },
                if require_expected { "enabled" } else { "disabled" },
            );
            let expected = if require_expected && !run_expected {
                Outcome::BadDaemonPath
            } else {
                Outcome::Success
            };

            // The parent's build decides where it launches the daemon from;
            // the daemon's build decides whether that location is checked.
            let parent_args = if run_expected {
                BuildArgs::standard(ctx.paths, ctx.options)
            } else {
                BuildArgs::standard(ctx.paths, ctx.options)
                    .daemon_path(Some(alt_daemon.display().to_string()))
            };
            let daemon_args =
                BuildArgs::standard(ctx.paths, ctx.options).verify_path(require_expected);

            let mut transcript = ctx.pipeline.transcript();
            let result = ctx
                .pipeline
                .build_install(Target::Parent, &parent_args, &mut transcript)
                .and_then(|()| {
                    ctx.pipeline
                        .build_install(Target::Daemon, &daemon_args, &mut transcript)
                });
            let actual = match result {
                Ok(()) => ctx.pipeline.run(
                    &ctx.paths.parent_secure_path(),
                    &["1".to_string()],
                    ctx.options.run_timeout,
                    &mut transcript,
                ),
                Err(outcome) => outcome,
            };
            classifier.check(&description, expected, actual, transcript);
        }
    }
}

/// 2×2×2: launch from the right or wrong parent location, with the parent
/// path check and the parent directory security check each enabled or
/// disabled. Path mismatch wins over directory security when both apply.
fn parent_grid(ctx: &Ctx<'_>, classifier: &mut Classifier) {
    let alt_parent: PathBuf = ctx.paths.parent_build_path();

    // One parent build serves all eight cells; its build output stays in
    // the source directory as the wrong-location copy.
    let parent_args = BuildArgs::standard(ctx.paths, ctx.options);
    let mut transcript = ctx.pipeline.transcript();
    let parent_built = ctx
        .pipeline
        .build_install(Target::Parent, &parent_args, &mut transcript);
    drop(transcript);

    for index in 0..PARENT_GRID {
        let run_expected = index % 2 == 0;
        let require_expected = (index / 2) % 2 == 0;
        let require_secure = (index / 4) % 2 == 0;

        let description = format!(
            "{} parent path, path checks {}, path security checks {}.",
            if run_expected { "Correct" } else { "Incorrect" },
            if require_expected { "enabled" } else { "disabled" },
            if require_secure { "enabled" } else { "disabled" },
        );
        let expected = if require_expected && !run_expected {
            Outcome::BadParentPath
        } else if require_secure && !run_expected {
            Outcome::InsecureParentDir
        } else {
            Outcome::Success
        };

        let exec = if run_expected {
            ctx.paths.parent_secure_path()
        } else {
            alt_parent.clone()
        };
        let required_parent = require_expected
            .then(|| ctx.paths.parent_secure_path().display().to_string());
        let daemon_args = BuildArgs::standard(ctx.paths, ctx.options)
            .parent_path(required_parent)
            .verify_parent_security(require_secure);

        let mut transcript = ctx.pipeline.transcript();
        let actual = match parent_built {
            Ok(()) => {
                match ctx
                    .pipeline
                    .build_install(Target::Daemon, &daemon_args, &mut transcript)
                {
                    Ok(()) => ctx.pipeline.run(
                        &exec,
                        &["1".to_string()],
                        ctx.options.run_timeout,
                        &mut transcript,
                    ),
                    Err(outcome) => outcome,
                }
            }
            Err(outcome) => {
                transcript.note("not executed: the shared parent build failed");
                outcome
            }
        };
        classifier.check(&description, expected, actual, transcript);
    }
}

//! Compilation argument matrix suite.
//!
//! The daemon checks several security conditions fixed at compile time. Each
//! axis below lists candidate values for one of those build arguments with
//! the best outcome that value permits; the suite traverses every
//! combination and expects the worst floor among the selected values.

use anyhow::Result;
use dtk_harness::axis::Axis;
use dtk_harness::build::{BuildArgs, vars};
use dtk_harness::classify::SuiteReport;
use dtk_harness::matrix::{ConfigMatrix, Configuration};
use dtk_harness::options::Options;
use dtk_harness::outcome::Outcome;
use dtk_harness::paths::TestPaths;

use super::{Ctx, run_suite};

/// Key limit used by every combination with a valid limit.
const VALID_KEY_LIMIT: &str = "20";

/// Axis tables: one entry per tested build argument value.
///
/// An empty path makes the build itself fail; an unsecured location builds
/// but is refused at launch; the secured location is fully valid.
pub fn axes(paths: &TestPaths) -> Vec<Axis> {
    vec![
        Axis::new("Install Path", vars::DAEMON_PATH)
            .with("", "empty", Outcome::BuildFailure)
            .with(
                paths.daemon_unsecure_path().display().to_string(),
                "unsecured",
                Outcome::InsecureDaemonDir,
            )
            .with(
                paths.daemon_secure_path().display().to_string(),
                "secured",
                Outcome::Success,
            ),
        Axis::new("Parent Path", vars::PARENT_PATH)
            .with("", "empty", Outcome::BuildFailure)
            .with(
                paths.parent_unsecure_path().display().to_string(),
                "unsecured",
                Outcome::InsecureParentDir,
            )
            .with(
                paths.parent_secure_path().display().to_string(),
                "secured",
                Outcome::Success,
            ),
        Axis::new("Key Limit", vars::KEY_LIMIT)
            .with("", "empty", Outcome::BuildFailure)
            .with("five", "bad type", Outcome::BuildFailure)
            .with("-20", "negative", Outcome::RuntimeError)
            .with("0", "zero", Outcome::RuntimeError)
            .with(VALID_KEY_LIMIT, "valid", Outcome::Success),
    ]
}

/// Overlay one matrix selection onto the standard argument set.
fn args_for(config: &Configuration, paths: &TestPaths, options: &Options) -> BuildArgs {
    BuildArgs::standard(paths, options)
        .daemon_path(config.value_of(vars::DAEMON_PATH))
        .parent_path(config.value_of(vars::PARENT_PATH))
        .key_limit(config.value_of(vars::KEY_LIMIT).unwrap_or_default())
}

pub fn run(ctx: &Ctx<'_>) -> Result<SuiteReport> {
    let matrix = ConfigMatrix::new(axes(ctx.paths))?;
    let report = run_suite(
        "build-config",
        "Compilation argument tests:",
        matrix.cardinality(),
        ctx.paths,
        |classifier| {
            for config in matrix.iter() {
                let args = args_for(&config, ctx.paths, ctx.options);
                let result = ctx.pipeline.full_run(&args, &["1".to_string()]);
                classifier.check(
                    &config.description(),
                    config.expected_outcome(),
                    result.outcome,
                    result.transcript,
                );
            }
        },
    );
    Ok(report)
}

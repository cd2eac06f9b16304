//! Tracked key code argument suite.
//!
//! The daemon receives the key codes it should track as one
//! whitespace-separated argument string. These cases verify that valid
//! argument sets are accepted and invalid ones rejected, against a build
//! with a tracked-key limit of five.

use dtk_harness::build::BuildArgs;
use dtk_harness::classify::SuiteReport;
use dtk_harness::outcome::Outcome;
use dtk_harness::pipeline::{Target, launch_path};

use super::{Ctx, run_suite};

/// Tracked-key limit the suite's daemon is built with.
const KEY_LIMIT: &str = "5";

struct KeyArgCase {
    args: &'static str,
    description: &'static str,
    expected: Outcome,
}

const CASES: &[KeyArgCase] = &[
    KeyArgCase {
        args: "3",
        description: "minimum valid key count",
        expected: Outcome::Success,
    },
    KeyArgCase {
        args: "22 55 220",
        description: "median valid key count",
        expected: Outcome::Success,
    },
    KeyArgCase {
        args: "44 66 88 100 101",
        description: "maximum valid key count",
        expected: Outcome::Success,
    },
    KeyArgCase {
        args: "            4   5",
        description: "ignoring whitespace",
        expected: Outcome::Success,
    },
    KeyArgCase {
        args: "237 238 239",
        description: "upper valid keycode range",
        expected: Outcome::Success,
    },
    KeyArgCase {
        args: "1 2 3",
        description: "lower valid keycode range",
        expected: Outcome::Success,
    },
    KeyArgCase {
        args: "",
        description: "no arguments",
        expected: Outcome::RuntimeError,
    },
    KeyArgCase {
        args: "\"\"",
        description: "empty arguments",
        expected: Outcome::RuntimeError,
    },
    KeyArgCase {
        args: "non-numeric",
        description: "entirely non-numeric arguments",
        expected: Outcome::RuntimeError,
    },
    KeyArgCase {
        args: "3 5 9!",
        description: "bad characters within otherwise valid arguments",
        expected: Outcome::RuntimeError,
    },
    KeyArgCase {
        args: "-2 -4 -6",
        description: "negative key codes",
        expected: Outcome::RuntimeError,
    },
    KeyArgCase {
        args: "240",
        description: "value outside the valid keycode range",
        expected: Outcome::RuntimeError,
    },
    KeyArgCase {
        args: "9223372036854775808",
        description: "value outside of numeric limits",
        expected: Outcome::RuntimeError,
    },
    KeyArgCase {
        args: "1 2 3 4 5 6",
        description: "exceeding the tracked key count limit",
        expected: Outcome::RuntimeError,
    },
];

pub fn run(ctx: &Ctx<'_>) -> SuiteReport {
    run_suite(
        "key-args",
        "Tracked keycode argument tests:",
        CASES.len(),
        ctx.paths,
        |classifier| {
            let args = BuildArgs::standard(ctx.paths, ctx.options).key_limit(KEY_LIMIT);

            // Build and install once; every case reuses the installation.
            let mut transcript = ctx.pipeline.transcript();
            let built = ctx
                .pipeline
                .build_install(Target::Parent, &args, &mut transcript)
                .and_then(|()| {
                    ctx.pipeline
                        .build_install(Target::Daemon, &args, &mut transcript)
                });
            if let Err(outcome) = built {
                // A broken build fails every case with the build's outcome.
                for case in CASES {
                    let mut t = ctx.pipeline.transcript();
                    t.note("not executed: the shared build failed");
                    classifier.check(case.description, case.expected, outcome, t);
                }
                return;
            }

            let exec = launch_path(&args);
            for case in CASES {
                let mut transcript = ctx.pipeline.transcript();
                let actual = ctx.pipeline.run(
                    &exec,
                    &[case.args.to_string()],
                    ctx.options.run_timeout,
                    &mut transcript,
                );
                classifier.check(case.description, case.expected, actual, transcript);
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_table_matches_declared_count() {
        assert_eq!(CASES.len(), 14);
    }

    #[test]
    fn test_boundary_cases_have_expected_floors() {
        let by_args = |args: &str| CASES.iter().find(|c| c.args == args).unwrap();
        assert_eq!(by_args("1 2 3 4 5 6").expected, Outcome::RuntimeError);
        assert_eq!(by_args("3 5 9!").expected, Outcome::RuntimeError);
        assert_eq!(by_args("22 55 220").expected, Outcome::Success);
    }

    #[test]
    fn test_valid_cases_stay_within_limit() {
        let limit: usize = KEY_LIMIT.parse().unwrap();
        for case in CASES.iter().filter(|c| c.expected == Outcome::Success) {
            let count = case.args.split_whitespace().count();
            assert!(
                count <= limit,
                "case '{}' tracks {count} keys over limit {limit}",
                case.description
            );
        }
    }
}

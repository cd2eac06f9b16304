//! Interactive key event reading check.
//!
//! Builds the daemon to track every valid key code and leaves it running in
//! the foreground for a listening window so a human can press keys and watch
//! the codes get reported. The daemon must still exit cleanly when the
//! window closes.

use std::time::Duration;

use dtk_harness::build::BuildArgs;
use dtk_harness::classify::SuiteReport;
use dtk_harness::outcome::Outcome;
use dtk_harness::pipeline::{Target, launch_path};

use super::{Ctx, run_suite};

/// Valid key code range the daemon accepts.
const LOWEST_KEY_CODE: u32 = 1;
const HIGHEST_KEY_CODE: u32 = 239;

pub fn run(ctx: &Ctx<'_>, listen_secs: u64) -> SuiteReport {
    run_suite(
        "key-read",
        "Key event reading test:",
        1,
        ctx.paths,
        |classifier| {
            let limit = (HIGHEST_KEY_CODE - LOWEST_KEY_CODE + 1).to_string();
            let args = BuildArgs::standard(ctx.paths, ctx.options)
                .key_limit(limit)
                .daemon_timeout(Some(listen_secs));

            let mut transcript = ctx.pipeline.transcript();
            let built = ctx
                .pipeline
                .build_install(Target::Parent, &args, &mut transcript)
                .and_then(|()| {
                    ctx.pipeline
                        .build_install(Target::Daemon, &args, &mut transcript)
                });
            let actual = match built {
                Ok(()) => {
                    let key_args = (LOWEST_KEY_CODE..=HIGHEST_KEY_CODE)
                        .map(|code| code.to_string())
                        .collect::<Vec<_>>()
                        .join(" ");
                    println!(
                        "  Listening for key events for {listen_secs} seconds; press any \
                         keyboard key and verify that its code is registered."
                    );
                    ctx.pipeline.run(
                        &launch_path(&args),
                        &[key_args],
                        // Leave the daemon its full window plus shutdown room.
                        Duration::from_secs(listen_secs + 10),
                        &mut transcript,
                    )
                }
                Err(outcome) => outcome,
            };
            classifier.check(
                "track the full keycode range through a listening window",
                Outcome::Success,
                actual,
                transcript,
            );
        },
    )
}

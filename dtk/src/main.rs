//! Daemon Testkit - test driver CLI
//!
//! Builds, installs and runs the daemon and its gatekeeper parent under
//! varying compile-time configurations, classifying every observed outcome
//! against a prediction. One subcommand per suite; `all` runs every
//! automated suite in sequence and prints the aggregate summary.

#![forbid(unsafe_code)]

mod suites;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use dtk_harness::classify::{RunReport, SuiteReport};
use dtk_harness::logging::init_logging;
use dtk_harness::options::Options;
use dtk_harness::paths::TestPaths;
use dtk_harness::pipeline::Pipeline;

use suites::Ctx;

#[derive(Parser)]
#[command(name = "dtk")]
#[command(author, version, about = "Daemon testkit - configuration matrix tests for the daemon")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Project root holding the daemon and parent source directories
    #[arg(long, global = true, env = "DTK_ROOT", default_value = ".")]
    root: PathBuf,

    /// Use verbose build/test logging and stream transcripts live
    #[arg(short, long, global = true, env = "DTK_VERBOSE")]
    verbose: bool,

    /// Build in Release mode instead of Debug
    #[arg(short, long, global = true)]
    release: bool,

    /// Seconds the daemon runs before exiting on its own; 0 disables the
    /// daemon-side timeout
    #[arg(short = 't', long, global = true)]
    timeout: Option<u64>,

    /// Upper bound in seconds on one foreground run before force-kill
    #[arg(long, global = true, default_value = "30")]
    run_timeout: u64,

    /// Write a machine-readable JSON run report to this path
    #[arg(long, global = true, env = "DTK_REPORT")]
    report: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every automated suite (the default)
    All,
    /// Build, install and run with all-default arguments
    Basic,
    /// Every combination of install path, parent path and key limit
    BuildConfig,
    /// Valid and invalid tracked key code argument strings
    KeyArgs,
    /// Daemon and parent install path verification options
    PathChecks,
    /// Single-instance lock and background process lifecycle
    Lifecycle,
    /// Interactive key event reading window (requires a human at the keyboard)
    KeyRead {
        /// Seconds to listen for key events
        #[arg(long, default_value = "10")]
        listen_secs: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = Options {
        verbose: cli.verbose,
        release_build: cli.release,
        daemon_timeout_secs: match cli.timeout {
            Some(0) => None,
            Some(secs) => Some(secs),
            None => Some(1),
        },
        run_timeout: Duration::from_secs(cli.run_timeout),
    };

    let paths = TestPaths::new(&cli.root).context("resolving the test fixture layout")?;
    paths
        .prepare()
        .context("preparing the test fixture directories")?;
    info!("fixture root: {}", paths.root().display());

    let pipeline = Pipeline::new(&paths, options.clone());
    let ctx = Ctx {
        pipeline: &pipeline,
        paths: &paths,
        options: &options,
    };

    let reports: Vec<SuiteReport> = match cli.command.unwrap_or(Commands::All) {
        Commands::All => vec![
            suites::basic::run(&ctx),
            suites::build_config::run(&ctx)?,
            suites::key_args::run(&ctx),
            suites::path_checks::run(&ctx),
            suites::lifecycle::run(&ctx),
        ],
        Commands::Basic => vec![suites::basic::run(&ctx)],
        Commands::BuildConfig => vec![suites::build_config::run(&ctx)?],
        Commands::KeyArgs => vec![suites::key_args::run(&ctx)],
        Commands::PathChecks => vec![suites::path_checks::run(&ctx)],
        Commands::Lifecycle => vec![suites::lifecycle::run(&ctx)],
        Commands::KeyRead { listen_secs } => vec![suites::key_read::run(&ctx, listen_secs)],
    };

    let report = RunReport::new(reports);
    println!(
        "Passed {} of {} tests.",
        report.summary.passed, report.summary.total
    );
    if let Some(path) = &cli.report {
        report
            .write_json(path)
            .with_context(|| format!("writing run report to {}", path.display()))?;
        info!("run report written to {}", path.display());
    }

    if !report.summary.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

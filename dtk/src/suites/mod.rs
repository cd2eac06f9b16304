//! Test suite definitions.
//!
//! Each suite builds its classifier against the shared failure log, runs its
//! tests through the shared pipeline, and hands back a report for the
//! aggregate summary.

pub mod basic;
pub mod build_config;
pub mod key_args;
pub mod key_read;
pub mod lifecycle;
pub mod path_checks;

use dtk_harness::classify::{Classifier, SuiteReport};
use dtk_harness::options::Options;
use dtk_harness::paths::TestPaths;
use dtk_harness::pipeline::Pipeline;
use dtk_harness::transcript::FailureLog;

/// Shared context threaded into every suite.
pub struct Ctx<'a> {
    pub pipeline: &'a Pipeline,
    pub paths: &'a TestPaths,
    pub options: &'a Options,
}

/// Print the suite title, run its body against a fresh classifier, and
/// collect the report.
pub fn run_suite(
    name: &str,
    title: &str,
    expected_count: usize,
    paths: &TestPaths,
    body: impl FnOnce(&mut Classifier),
) -> SuiteReport {
    println!("- {title}");
    let mut classifier = Classifier::new(
        expected_count,
        FailureLog::new(paths.failure_log_path()),
    );
    body(&mut classifier);
    let summary = classifier.finish();
    SuiteReport {
        name: name.to_string(),
        summary,
        records: classifier.into_records(),
    }
}

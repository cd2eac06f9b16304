//! Outcome classification, per-test reporting and the run summary.
//!
//! Classification compares by taxonomy identity: a prediction must be exact,
//! so an unexpectedly better outcome still fails. Passing tests discard
//! their transcript; failing tests persist it to the failure log first.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::outcome::Outcome;
use crate::transcript::{FailureLog, Transcript};

/// One classified test, kept for the machine-readable run report.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationRecord {
    pub index: usize,
    pub description: String,
    pub expected: Outcome,
    pub actual: Outcome,
    pub passed: bool,
}

/// Aggregate pass counts for one suite or a whole run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    /// Fold another suite's counts into this one.
    pub fn absorb(&mut self, other: RunSummary) {
        self.total += other.total;
        self.passed += other.passed;
    }
}

/// Machine-readable report for one whole run, one entry per suite.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub summary: RunSummary,
    pub suites: Vec<SuiteReport>,
}

#[derive(Debug, Serialize)]
pub struct SuiteReport {
    pub name: String,
    pub summary: RunSummary,
    pub records: Vec<ClassificationRecord>,
}

impl RunReport {
    pub fn new(suites: Vec<SuiteReport>) -> Self {
        let mut summary = RunSummary::default();
        for suite in &suites {
            summary.absorb(suite.summary);
        }
        Self {
            generated_at: Utc::now(),
            summary,
            suites,
        }
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(std::io::Error::from)
    }
}

/// Classifies actual against expected outcomes for one suite and accumulates
/// its summary.
pub struct Classifier {
    expected_count: usize,
    records: Vec<ClassificationRecord>,
    summary: RunSummary,
    failure_log: FailureLog,
}

impl Classifier {
    /// `expected_count` is the number of tests the suite intends to run;
    /// a mismatch at the end of the suite is reported, not ignored.
    pub fn new(expected_count: usize, failure_log: FailureLog) -> Self {
        Self {
            expected_count,
            records: Vec::new(),
            summary: RunSummary::default(),
            failure_log,
        }
    }

    pub fn expected_count(&self) -> usize {
        self.expected_count
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn records(&self) -> &[ClassificationRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ClassificationRecord> {
        self.records
    }

    /// Classify one test, print its console line, and either discard the
    /// transcript (pass) or persist it to the failure log first (fail).
    ///
    /// Taking the transcript by value enforces single ownership: it is
    /// consumed here on every path.
    pub fn check(
        &mut self,
        description: &str,
        expected: Outcome,
        actual: Outcome,
        transcript: Transcript,
    ) -> bool {
        let passed = actual == expected;
        self.summary.total += 1;
        let index = self.summary.total;
        let index_label = format!("Test {index}/{}", self.expected_count);

        let verdict = if passed { "PASS" } else { "FAIL" };
        println!("  {index}/{}: {verdict}: {description}", self.expected_count);
        println!("       Result: {}", actual.description());
        if passed {
            self.summary.passed += 1;
        } else {
            println!("       Expected: {}", expected.description());
            println!(
                "       See {} for more information.",
                self.failure_log.path().display()
            );
            if let Err(err) = self.failure_log.append_block(
                &index_label,
                description,
                expected,
                actual,
                &transcript,
            ) {
                warn!("could not persist failure transcript: {err}");
            }
        }

        self.records.push(ClassificationRecord {
            index,
            description: description.to_string(),
            expected,
            actual,
            passed,
        });
        passed
    }

    /// Print the suite's closing line and hand back its summary. Reports a
    /// count mismatch when the suite ran a different number of tests than it
    /// declared.
    pub fn finish(&self) -> RunSummary {
        if self.summary.total != self.expected_count {
            println!(
                "  Expected {} tests, but only ran {}",
                self.expected_count, self.summary.total
            );
        }
        println!(
            "  Passed {} of {} tests.",
            self.summary.passed, self.summary.total
        );
        self.summary
    }
}

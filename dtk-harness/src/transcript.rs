//! Transcript capture and the durable failure log.
//!
//! Every pipeline stage appends to an in-memory transcript. A passing test
//! discards its transcript; a failing test's transcript is appended as one
//! structured block to the append-only failure log, which is never rotated
//! or truncated during a run.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

use crate::outcome::Outcome;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("failed to append to failure log {path}: {source}")]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Captured output of one test, buffered in memory.
///
/// With live echo enabled (verbose mode) every line is also written to
/// stderr the moment it is captured; the buffered copy still feeds the
/// failure log so the two modes share one code path.
#[derive(Debug)]
pub struct Transcript {
    lines: Vec<String>,
    live: bool,
}

impl Transcript {
    pub fn new(live: bool) -> Self {
        Self {
            lines: Vec::new(),
            live,
        }
    }

    /// Append one harness-generated line.
    pub fn note(&mut self, line: impl Into<String>) {
        let line = line.into();
        if self.live {
            eprintln!("    {line}");
        }
        self.lines.push(line);
    }

    /// Append a captured stdout/stderr blob, one transcript line per line,
    /// prefixed with its source label.
    pub fn capture(&mut self, label: &str, text: &str) {
        for line in text.lines() {
            self.note(format!("{label}: {line}"));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Append-only failure log.
#[derive(Debug, Clone)]
pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one structured failure block: timestamped header with the test
    /// index and description, expected and actual outcome text, then the
    /// transcript tab-indented line by line.
    pub fn append_block(
        &self,
        index_label: &str,
        description: &str,
        expected: Outcome,
        actual: Outcome,
        transcript: &Transcript,
    ) -> Result<(), TranscriptError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| TranscriptError::Append {
                path: self.path.clone(),
                source,
            })?;
        let mut writer = BufWriter::new(file);
        let write = |writer: &mut BufWriter<std::fs::File>| -> std::io::Result<()> {
            writeln!(writer)?;
            writeln!(
                writer,
                "[{}] {index_label} {description}",
                Utc::now().to_rfc3339()
            )?;
            writeln!(writer, "    Expected: {}", expected.description())?;
            writeln!(writer, "    Actual:   {}", actual.description())?;
            writeln!(writer, "Test output:")?;
            for line in transcript.lines() {
                writeln!(writer, "\t{line}")?;
            }
            writer.flush()
        };
        write(&mut writer).map_err(|source| TranscriptError::Append {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_and_capture_buffer_lines() {
        let mut transcript = Transcript::new(false);
        transcript.note("Cleaning daemon");
        transcript.capture("make", "compiling\nlinking\n");
        assert_eq!(
            transcript.lines(),
            &[
                "Cleaning daemon".to_string(),
                "make: compiling".to_string(),
                "make: linking".to_string(),
            ]
        );
    }

    #[test]
    fn test_append_block_is_additive() {
        let dir = tempfile::tempdir().unwrap();
        let log = FailureLog::new(dir.path().join("failure-log.txt"));

        let mut transcript = Transcript::new(false);
        transcript.note("make: error: no rule for target");
        log.append_block(
            "Test 1/45",
            "[Install Path]:empty",
            Outcome::BuildFailure,
            Outcome::Success,
            &transcript,
        )
        .unwrap();
        log.append_block(
            "Test 2/45",
            "[Install Path]:unsecured",
            Outcome::InsecureDaemonDir,
            Outcome::Success,
            &transcript,
        )
        .unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert!(text.contains("Test 1/45 [Install Path]:empty"));
        assert!(text.contains("Test 2/45 [Install Path]:unsecured"));
        assert!(text.contains("    Expected: Failed to build the target program."));
        assert!(text.contains("\tmake: error: no rule for target"));
        // Both blocks survive: the log only ever grows within a run.
        assert_eq!(text.matches("Test output:").count(), 2);
    }
}

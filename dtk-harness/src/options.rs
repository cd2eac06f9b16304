//! Run options threaded through every suite.

use std::time::Duration;

/// Immutable knobs shared by the pipeline, classifier and suites.
#[derive(Debug, Clone)]
pub struct Options {
    /// Stream transcripts live and raise build/daemon verbosity.
    pub verbose: bool,
    /// Build the daemon and parent in Release mode instead of Debug.
    pub release_build: bool,
    /// Seconds before the daemon exits on its own; `None` disables the
    /// daemon-side timeout entirely.
    pub daemon_timeout_secs: Option<u64>,
    /// Upper bound on one foreground run of the daemon or parent. The
    /// process is force-killed when exceeded.
    pub run_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verbose: false,
            release_build: false,
            daemon_timeout_secs: Some(1),
            run_timeout: Duration::from_secs(30),
        }
    }
}

impl Options {
    /// Label passed to the build system's configuration-mode variable.
    pub fn config_mode(&self) -> &'static str {
        if self.release_build { "Release" } else { "Debug" }
    }
}

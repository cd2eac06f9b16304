//! Outcome taxonomy for daemon test results.
//!
//! Every test ends in exactly one `Outcome`. Outcomes form a total order from
//! least to most successful, used for worst-case folding when several
//! predicted outcomes combine, and compared by identity when classifying an
//! actual result against a prediction.

use std::fmt;
use std::process::ExitStatus;

use serde::{Deserialize, Serialize};

/// Exit status values the daemon and parent are contracted to return.
///
/// Any positive status outside this set is the daemon's own generic refusal
/// (for example rejected key-code arguments) and maps to
/// [`Outcome::RuntimeError`].
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_BAD_DAEMON_PATH: i32 = 1;
pub const EXIT_BAD_PARENT_PATH: i32 = 2;
pub const EXIT_INSECURE_DAEMON_DIR: i32 = 3;
pub const EXIT_INSECURE_PARENT_DIR: i32 = 4;
pub const EXIT_ALREADY_RUNNING: i32 = 5;
pub const EXIT_PARENT_ENDED: i32 = 6;
pub const EXIT_FD_CLEANUP_FAILED: i32 = 7;
pub const EXIT_EXEC_FAILED: i32 = 8;

/// One classified result of driving the daemon through a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The build stage produced no fresh artifact.
    BuildFailure,
    /// The install stage left no fresh artifact at the target path.
    InstallFailure,
    /// The run-stage process could not be spawned at all.
    LaunchFailure,
    /// The run-stage process was force-killed at the configured timeout.
    TimedOut,
    /// The process was terminated by a signal.
    Signaled,
    /// The daemon exited with an unrecognized nonzero status.
    RuntimeError,
    /// The parent failed to exec the daemon executable.
    ExecFailed,
    /// The daemon could not clear its open file table before launching.
    FdCleanupFailed,
    /// The daemon was not running from its required install path.
    BadDaemonPath,
    /// The daemon's launcher was not at the required parent path.
    BadParentPath,
    /// The daemon was installed in an unsecured directory.
    InsecureDaemonDir,
    /// The parent was installed in an unsecured directory.
    InsecureParentDir,
    /// Another daemon instance already holds the instance lock.
    AlreadyRunning,
    /// The daemon exited because its parent process stopped running.
    ParentEnded,
    /// A background launch succeeded and the process is still alive.
    Running,
    /// The daemon ran and exited normally.
    Success,
}

impl Outcome {
    /// Explicit severity rank, lowest = least successful.
    ///
    /// Ranks are assigned here rather than inherited from declaration order
    /// so the total order stays an explicit, testable contract.
    pub fn severity_rank(self) -> u8 {
        match self {
            Self::BuildFailure => 0,
            Self::InstallFailure => 1,
            Self::LaunchFailure => 2,
            Self::TimedOut => 3,
            Self::Signaled => 4,
            Self::RuntimeError => 5,
            Self::ExecFailed => 6,
            Self::FdCleanupFailed => 7,
            Self::BadDaemonPath => 8,
            Self::BadParentPath => 9,
            Self::InsecureDaemonDir => 10,
            Self::InsecureParentDir => 11,
            Self::AlreadyRunning => 12,
            Self::ParentEnded => 13,
            Self::Running => 14,
            Self::Success => 15,
        }
    }

    /// Return whichever outcome ranks lower (less successful).
    ///
    /// A combination of predictions is only as good as its worst member.
    pub fn worst(self, other: Self) -> Self {
        if other.severity_rank() < self.severity_rank() {
            other
        } else {
            self
        }
    }

    /// Map a finished process's exit status onto the taxonomy.
    ///
    /// Exit 0 and the contracted positive codes map 1:1; any other positive
    /// status is the daemon's generic runtime refusal; signal-style
    /// termination is its own outcome, distinct from every positive code.
    pub fn from_exit_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(EXIT_SUCCESS) => Self::Success,
            Some(EXIT_BAD_DAEMON_PATH) => Self::BadDaemonPath,
            Some(EXIT_BAD_PARENT_PATH) => Self::BadParentPath,
            Some(EXIT_INSECURE_DAEMON_DIR) => Self::InsecureDaemonDir,
            Some(EXIT_INSECURE_PARENT_DIR) => Self::InsecureParentDir,
            Some(EXIT_ALREADY_RUNNING) => Self::AlreadyRunning,
            Some(EXIT_PARENT_ENDED) => Self::ParentEnded,
            Some(EXIT_FD_CLEANUP_FAILED) => Self::FdCleanupFailed,
            Some(EXIT_EXEC_FAILED) => Self::ExecFailed,
            Some(_) => Self::RuntimeError,
            // No exit code means the process died to a signal.
            None => Self::Signaled,
        }
    }

    /// Full sentence describing this outcome in reports and failure logs.
    pub fn description(self) -> &'static str {
        match self {
            Self::BuildFailure => "Failed to build the target program.",
            Self::InstallFailure => "Failed to install the target program.",
            Self::LaunchFailure => "Failed to start the test process.",
            Self::TimedOut => "The process was killed after exceeding its run timeout.",
            Self::Signaled => "The process was terminated by a signal.",
            Self::RuntimeError => "The daemon rejected its runtime configuration.",
            Self::ExecFailed => "The parent failed to run the daemon executable.",
            Self::FdCleanupFailed => {
                "Failed to clear the open file table before launching the daemon."
            }
            Self::BadDaemonPath => "The daemon was not installed at the required path.",
            Self::BadParentPath => "The launcher was not installed at the required parent path.",
            Self::InsecureDaemonDir => "The daemon was installed in an unsecured directory.",
            Self::InsecureParentDir => "The parent was installed in an unsecured directory.",
            Self::AlreadyRunning => "The daemon was already running in another process.",
            Self::ParentEnded => "The daemon exited because its parent stopped running.",
            Self::Running => "The daemon launched and kept running in the background.",
            Self::Success => "The daemon ran and exited normally.",
        }
    }

    /// Short label used in per-test console lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::BuildFailure => "build-failure",
            Self::InstallFailure => "install-failure",
            Self::LaunchFailure => "launch-failure",
            Self::TimedOut => "timed-out",
            Self::Signaled => "signaled",
            Self::RuntimeError => "runtime-error",
            Self::ExecFailed => "exec-failed",
            Self::FdCleanupFailed => "fd-cleanup-failed",
            Self::BadDaemonPath => "bad-daemon-path",
            Self::BadParentPath => "bad-parent-path",
            Self::InsecureDaemonDir => "insecure-daemon-dir",
            Self::InsecureParentDir => "insecure-parent-dir",
            Self::AlreadyRunning => "already-running",
            Self::ParentEnded => "parent-ended",
            Self::Running => "running",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Fold the worst outcome out of a set of predictions.
///
/// Returns `None` for an empty set; combining zero predictions is a caller
/// bug, not a silently optimistic default.
pub fn worst_of(outcomes: impl IntoIterator<Item = Outcome>) -> Option<Outcome> {
    outcomes.into_iter().reduce(Outcome::worst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    fn status(raw: i32) -> ExitStatus {
        ExitStatus::from_raw(raw)
    }

    #[test]
    fn test_ranks_are_unique_and_total() {
        let all = [
            Outcome::BuildFailure,
            Outcome::InstallFailure,
            Outcome::LaunchFailure,
            Outcome::TimedOut,
            Outcome::Signaled,
            Outcome::RuntimeError,
            Outcome::ExecFailed,
            Outcome::FdCleanupFailed,
            Outcome::BadDaemonPath,
            Outcome::BadParentPath,
            Outcome::InsecureDaemonDir,
            Outcome::InsecureParentDir,
            Outcome::AlreadyRunning,
            Outcome::ParentEnded,
            Outcome::Running,
            Outcome::Success,
        ];
        let mut ranks: Vec<u8> = all.iter().map(|o| o.severity_rank()).collect();
        ranks.sort_unstable();
        ranks.dedup();
        assert_eq!(ranks.len(), all.len(), "two outcomes share a rank");
    }

    #[test]
    fn test_worst_prefers_lower_rank() {
        assert_eq!(
            Outcome::Success.worst(Outcome::BuildFailure),
            Outcome::BuildFailure
        );
        assert_eq!(
            Outcome::BuildFailure.worst(Outcome::Success),
            Outcome::BuildFailure
        );
        assert_eq!(
            Outcome::RuntimeError.worst(Outcome::InstallFailure),
            Outcome::InstallFailure
        );
        // Identity on ties.
        assert_eq!(Outcome::Success.worst(Outcome::Success), Outcome::Success);
    }

    #[test]
    fn test_worst_of_folds_mixed_predictions() {
        let combined = worst_of([Outcome::Success, Outcome::RuntimeError, Outcome::Success]);
        assert_eq!(combined, Some(Outcome::RuntimeError));

        let combined = worst_of([Outcome::BuildFailure, Outcome::Success, Outcome::Success]);
        assert_eq!(combined, Some(Outcome::BuildFailure));

        assert_eq!(worst_of([]), None);
    }

    #[test]
    fn test_contracted_exit_codes_map_one_to_one() {
        // Raw wait status: exit code lives in the high byte.
        let cases = [
            (EXIT_SUCCESS, Outcome::Success),
            (EXIT_BAD_DAEMON_PATH, Outcome::BadDaemonPath),
            (EXIT_BAD_PARENT_PATH, Outcome::BadParentPath),
            (EXIT_INSECURE_DAEMON_DIR, Outcome::InsecureDaemonDir),
            (EXIT_INSECURE_PARENT_DIR, Outcome::InsecureParentDir),
            (EXIT_ALREADY_RUNNING, Outcome::AlreadyRunning),
            (EXIT_PARENT_ENDED, Outcome::ParentEnded),
            (EXIT_FD_CLEANUP_FAILED, Outcome::FdCleanupFailed),
            (EXIT_EXEC_FAILED, Outcome::ExecFailed),
        ];
        for (code, expected) in cases {
            assert_eq!(Outcome::from_exit_status(status(code << 8)), expected);
        }
    }

    #[test]
    fn test_unrecognized_positive_exit_is_runtime_error() {
        assert_eq!(
            Outcome::from_exit_status(status(9 << 8)),
            Outcome::RuntimeError
        );
        assert_eq!(
            Outcome::from_exit_status(status(42 << 8)),
            Outcome::RuntimeError
        );
    }

    #[test]
    fn test_signal_termination_is_distinct() {
        // SIGKILL in the low byte of a raw wait status.
        assert_eq!(Outcome::from_exit_status(status(9)), Outcome::Signaled);
        assert_ne!(Outcome::Signaled, Outcome::RuntimeError);
    }
}

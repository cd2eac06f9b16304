//! Single-instance lifecycle scenario.
//!
//! Validates the daemon's instance lock and parent-liveness handling by
//! walking a linear state machine: build the parent, build the daemon with
//! its self-timeout disabled, launch it in the background, probe a
//! conflicting foreground launch, terminate the background instance, then
//! relaunch. Each transition emits one classification record. The background
//! child is a scoped resource: it is killed and reaped on every exit path,
//! including a mid-scenario failure.

use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::build::BuildArgs;
use crate::classify::Classifier;
use crate::options::Options;
use crate::outcome::Outcome;
use crate::paths::TestPaths;
use crate::pipeline::{Pipeline, Target};
use crate::transcript::Transcript;

/// Number of classification records one scenario emits.
pub const SCENARIO_RECORDS: usize = 6;

/// Upper bound on the conflicting foreground probe. The probe should exit
/// almost immediately with the already-running status; anything that
/// outlives this bound is a lock failure.
const CONFLICT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Seconds the parent is told to let the daemon run during foreground
/// probes, passed as its `--timeout` launch flag.
const PROBE_RUN_SECS: u64 = 1;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to launch background process {name}: {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },

    #[error("background process {name} did not exit after being killed: {source}")]
    Unkillable {
        name: String,
        source: std::io::Error,
    },
}

/// Transitions of the scenario state machine, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    ParentBuilt,
    DaemonBuilt,
    BackgroundLaunched,
    ConflictProbed,
    Terminated,
    Reprobed,
}

impl Stage {
    fn description(self) -> &'static str {
        match self {
            Self::ParentBuilt => "Building and installing the parent launcher.",
            Self::DaemonBuilt => "Building and installing the daemon with its timeout disabled.",
            Self::BackgroundLaunched => "Launching the daemon in the background.",
            Self::ConflictProbed => "Launching a second instance while the first is running.",
            Self::Terminated => "Terminating the background daemon process.",
            Self::Reprobed => "Relaunching after the first instance was terminated.",
        }
    }

    fn expected(self) -> Outcome {
        match self {
            Self::ParentBuilt | Self::DaemonBuilt | Self::Reprobed => Outcome::Success,
            Self::BackgroundLaunched => Outcome::Running,
            Self::ConflictProbed => Outcome::AlreadyRunning,
            Self::Terminated => Outcome::Signaled,
        }
    }
}

/// Exclusive ownership of one spawned background process.
///
/// Dropping the handle kills and reaps the child if it is still alive, so no
/// scenario exit path can leak a running daemon.
#[derive(Debug)]
pub struct BackgroundProcess {
    name: String,
    child: Child,
}

impl BackgroundProcess {
    /// Spawn `exec` detached from the harness's stdio.
    pub fn spawn(exec: &Path) -> Result<Self, LifecycleError> {
        let name = exec
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| exec.display().to_string());
        // Null stdio: nothing reads the pipes, and a filled pipe buffer
        // would block the daemon.
        let child = Command::new(exec)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| LifecycleError::Spawn {
                name: name.clone(),
                source,
            })?;
        debug!("spawned background process {name} (pid={})", child.id());
        Ok(Self { name, child })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-blocking liveness probe.
    pub fn poll(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Kill the process and wait for it to be reaped.
    pub fn terminate(&mut self) -> Result<ExitStatus, LifecycleError> {
        let _ = self.child.kill();
        self.child.wait().map_err(|source| LifecycleError::Unkillable {
            name: self.name.clone(),
            source,
        })
    }
}

impl Drop for BackgroundProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            warn!("background process {} still alive at scope exit", self.name);
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Drives one single-instance lifecycle scenario.
pub struct LifecycleScenario<'a> {
    pipeline: &'a Pipeline,
    paths: &'a TestPaths,
    options: &'a Options,
}

impl<'a> LifecycleScenario<'a> {
    pub fn new(pipeline: &'a Pipeline, paths: &'a TestPaths, options: &'a Options) -> Self {
        Self {
            pipeline,
            paths,
            options,
        }
    }

    /// Run the scenario, emitting one record per transition.
    ///
    /// A build failure is terminal: later transitions are not executed, and
    /// their records carry the failure outcome as the actual result.
    pub fn run(&self, classifier: &mut Classifier) {
        let parent_args = BuildArgs::standard(self.paths, self.options);
        // The background daemon must run until killed, so its self-timeout
        // is disabled for this scenario.
        let daemon_args = BuildArgs::standard(self.paths, self.options).daemon_timeout(None);
        let probe_args = vec!["--timeout".to_string(), PROBE_RUN_SECS.to_string()];
        let parent_exec = self.paths.parent_secure_path();

        let mut transcript = self.pipeline.transcript();
        let parent_built = self
            .pipeline
            .build_install(Target::Parent, &parent_args, &mut transcript);
        let actual = match parent_built {
            Ok(()) => Outcome::Success,
            Err(outcome) => outcome,
        };
        self.record(classifier, Stage::ParentBuilt, actual, transcript);

        let mut terminal = parent_built.err();
        match terminal {
            None => {
                let mut transcript = self.pipeline.transcript();
                let daemon_built = self
                    .pipeline
                    .build_install(Target::Daemon, &daemon_args, &mut transcript);
                let actual = match daemon_built {
                    Ok(()) => Outcome::Success,
                    Err(outcome) => outcome,
                };
                self.record(classifier, Stage::DaemonBuilt, actual, transcript);
                terminal = daemon_built.err();
            }
            Some(failure) => self.skip(classifier, Stage::DaemonBuilt, failure),
        }
        if let Some(failure) = terminal {
            // Terminal: report the remaining transitions with the build
            // failure as their actual outcome.
            for stage in [
                Stage::BackgroundLaunched,
                Stage::ConflictProbed,
                Stage::Terminated,
                Stage::Reprobed,
            ] {
                self.skip(classifier, stage, failure);
            }
            return;
        }

        let mut transcript = self.pipeline.transcript();
        let mut background = match BackgroundProcess::spawn(&parent_exec) {
            Ok(background) => background,
            Err(err) => {
                transcript.note(err.to_string());
                self.record(
                    classifier,
                    Stage::BackgroundLaunched,
                    Outcome::LaunchFailure,
                    transcript,
                );
                for stage in [Stage::ConflictProbed, Stage::Terminated, Stage::Reprobed] {
                    self.skip(classifier, stage, Outcome::LaunchFailure);
                }
                return;
            }
        };

        // Classify the launch by observed liveness, not optimism: an
        // immediate exit reports that exit's outcome instead of Running.
        let launch_outcome = match background.poll() {
            Ok(None) => Outcome::Running,
            Ok(Some(status)) => Outcome::from_exit_status(status),
            Err(err) => {
                transcript.note(format!("could not poll background process: {err}"));
                Outcome::LaunchFailure
            }
        };
        self.record(classifier, Stage::BackgroundLaunched, launch_outcome, transcript);

        let mut transcript = self.pipeline.transcript();
        let conflict = self.pipeline.run(
            &parent_exec,
            &probe_args,
            CONFLICT_PROBE_TIMEOUT,
            &mut transcript,
        );
        self.record(classifier, Stage::ConflictProbed, conflict, transcript);

        let mut transcript = self.pipeline.transcript();
        let terminated = match background.terminate() {
            Ok(status) => Outcome::from_exit_status(status),
            Err(err) => {
                // An unkillable process is its own reported error, never
                // silently ignored.
                transcript.note(err.to_string());
                Outcome::Running
            }
        };
        self.record(classifier, Stage::Terminated, terminated, transcript);
        drop(background);

        let mut transcript = self.pipeline.transcript();
        let relaunch = self.pipeline.run(
            &parent_exec,
            &probe_args,
            self.options.run_timeout,
            &mut transcript,
        );
        self.record(classifier, Stage::Reprobed, relaunch, transcript);
    }

    fn record(
        &self,
        classifier: &mut Classifier,
        stage: Stage,
        actual: Outcome,
        transcript: Transcript,
    ) {
        classifier.check(stage.description(), stage.expected(), actual, transcript);
    }

    fn skip(&self, classifier: &mut Classifier, stage: Stage, failure: Outcome) {
        let mut transcript = self.pipeline.transcript();
        transcript.note("not executed: an earlier stage failed");
        self.record(classifier, stage, failure, transcript);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_failure_is_reported() {
        let err = BackgroundProcess::spawn(Path::new("/nonexistent/basic-parent")).unwrap_err();
        assert!(matches!(err, LifecycleError::Spawn { .. }));
        assert!(err.to_string().contains("basic-parent"));
    }

    #[test]
    fn test_background_guard_kills_live_child() {
        let child = Command::new("/bin/sleep")
            .arg("30")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let mut background = BackgroundProcess {
            name: "sleep".to_string(),
            child,
        };
        assert!(matches!(background.poll(), Ok(None)));

        let status = background.terminate().unwrap();
        // Killed by SIGKILL, not a normal exit.
        assert_eq!(Outcome::from_exit_status(status), Outcome::Signaled);
        assert!(matches!(background.poll(), Ok(Some(_))));
    }

    #[test]
    fn test_exited_child_polls_its_status() {
        let child = Command::new("/bin/true")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let mut background = BackgroundProcess {
            name: "true".to_string(),
            child,
        };
        // Wait for the short-lived process to finish, then poll.
        std::thread::sleep(Duration::from_millis(200));
        match background.poll() {
            Ok(Some(status)) => {
                assert_eq!(Outcome::from_exit_status(status), Outcome::Success);
            }
            other => panic!("expected exited status, got {other:?}"),
        }
    }
}

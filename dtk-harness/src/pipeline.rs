//! The build/install/run pipeline executed against one configuration.
//!
//! Stages run in fixed order, each gating the next; the first failing stage's
//! outcome is returned immediately and later stages do not run. Build and
//! install waits are unbounded (a toolchain hang hangs the suite, by
//! contract); the run stage is bounded by a configurable timeout after which
//! the process is force-killed.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use tracing::debug;

use crate::build::{BuildArgs, BuildTool, vars};
use crate::options::Options;
use crate::outcome::Outcome;
use crate::paths::TestPaths;
use crate::transcript::Transcript;

/// Which of the two build targets a stage operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Daemon,
    Parent,
}

impl Target {
    fn label(self) -> &'static str {
        match self {
            Self::Daemon => "daemon",
            Self::Parent => "parent",
        }
    }

    fn install_var(self) -> &'static str {
        match self {
            Self::Daemon => vars::DAEMON_PATH,
            Self::Parent => vars::PARENT_PATH,
        }
    }
}

/// Result of one full pipeline execution, owned by the classifier until
/// consumed.
#[derive(Debug)]
pub struct PipelineResult {
    pub outcome: Outcome,
    pub transcript: Transcript,
}

/// Sequences external build, install and run steps for one configuration.
pub struct Pipeline {
    daemon_tool: BuildTool,
    parent_tool: BuildTool,
    options: Options,
}

impl Pipeline {
    pub fn new(paths: &TestPaths, options: Options) -> Self {
        Self {
            daemon_tool: BuildTool::new(paths.daemon_src_dir()),
            parent_tool: BuildTool::new(paths.parent_src_dir()),
            options,
        }
    }

    /// Construct against explicit tools; integration tests substitute stubs.
    pub fn with_tools(daemon_tool: BuildTool, parent_tool: BuildTool, options: Options) -> Self {
        Self {
            daemon_tool,
            parent_tool,
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Open a transcript honoring the verbose live-echo option.
    pub fn transcript(&self) -> Transcript {
        Transcript::new(self.options.verbose)
    }

    fn tool(&self, target: Target) -> &BuildTool {
        match target {
            Target::Daemon => &self.daemon_tool,
            Target::Parent => &self.parent_tool,
        }
    }

    /// Stages 1–3 for one target: best-effort clean, gated build, gated
    /// install. Returns the stage outcome on failure.
    pub fn build_install(
        &self,
        target: Target,
        args: &BuildArgs,
        transcript: &mut Transcript,
    ) -> Result<(), Outcome> {
        let tool = self.tool(target);
        let arg_list = args.to_args();
        transcript.note(format!(
            "Build arguments for {}: {}",
            target.label(),
            arg_list.join(" ")
        ));

        // Clean stage: clear any prior installation so the freshness check
        // below cannot be satisfied by a leftover artifact. Failures here
        // are swallowed.
        transcript.note(format!("Cleaning {}:", target.label()));
        let install_value = match target {
            Target::Daemon => args.daemon_path.as_deref(),
            Target::Parent => args.parent_path.as_deref(),
        };
        if let Some(path) = install_value.filter(|p| !p.is_empty()) {
            tool.uninstall(target.install_var(), Path::new(path), transcript);
        }
        tool.clean(transcript);

        let pre_build = SystemTime::now();

        transcript.note(format!("Building {}:", target.label()));
        match tool.build(&arg_list, transcript) {
            Ok(true) => {}
            Ok(false) => return Err(Outcome::BuildFailure),
            Err(err) => {
                transcript.note(format!("build tool error: {err}"));
                return Err(Outcome::BuildFailure);
            }
        }

        transcript.note(format!("Installing {}:", target.label()));
        match tool.install(&arg_list, target.install_var(), pre_build, transcript) {
            Ok(true) => Ok(()),
            Ok(false) => Err(Outcome::InstallFailure),
            Err(err) => {
                transcript.note(format!("install tool error: {err}"));
                Err(Outcome::InstallFailure)
            }
        }
    }

    /// Run stage: execute an installed artifact in the foreground, bounded
    /// by `timeout`, and map its exit status onto the taxonomy.
    pub fn run(
        &self,
        exec: &Path,
        run_args: &[String],
        timeout: Duration,
        transcript: &mut Transcript,
    ) -> Outcome {
        transcript.note(format!(
            "Running {}:",
            exec.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| exec.display().to_string())
        ));
        debug!("running {} {:?} (timeout {:?})", exec.display(), run_args, timeout);

        let mut child = match Command::new(exec)
            .args(run_args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                transcript.note(format!("failed to start {}: {err}", exec.display()));
                return Outcome::LaunchFailure;
            }
        };

        let stdout_handle = child
            .stdout
            .take()
            .map(|mut pipe| thread::spawn(move || read_to_string(&mut pipe)));
        let stderr_handle = child
            .stderr
            .take()
            .map(|mut pipe| thread::spawn(move || read_to_string(&mut pipe)));

        let start = Instant::now();
        let mut timed_out = false;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {}
                Err(err) => {
                    transcript.note(format!("failed to wait for {}: {err}", exec.display()));
                    break None;
                }
            }
            if start.elapsed() >= timeout {
                timed_out = true;
                let _ = child.kill();
                break child.wait().ok();
            }
            thread::sleep(Duration::from_millis(10));
        };

        let stdout = join_output(stdout_handle);
        let stderr = join_output(stderr_handle);
        transcript.capture("stdout", &stdout);
        transcript.capture("stderr", &stderr);

        if timed_out {
            transcript.note(format!("process killed after {timeout:?} timeout"));
            return Outcome::TimedOut;
        }
        match status {
            Some(status) => Outcome::from_exit_status(status),
            None => Outcome::LaunchFailure,
        }
    }

    /// Run the daemon the way a deployment would: through the gatekeeper
    /// parent when one is configured and present, directly otherwise.
    pub fn run_daemon(
        &self,
        args: &BuildArgs,
        run_args: &[String],
        transcript: &mut Transcript,
    ) -> Outcome {
        let exec = launch_path(args);
        self.run(&exec, run_args, self.options.run_timeout, transcript)
    }

    /// One configuration end-to-end: parent build+install, daemon
    /// build+install, then the run stage. First failing stage wins.
    pub fn full_run(&self, args: &BuildArgs, run_args: &[String]) -> PipelineResult {
        let mut transcript = self.transcript();

        if let Err(outcome) = self.build_install(Target::Parent, args, &mut transcript) {
            return PipelineResult {
                outcome,
                transcript,
            };
        }
        if let Err(outcome) = self.build_install(Target::Daemon, args, &mut transcript) {
            return PipelineResult {
                outcome,
                transcript,
            };
        }
        let outcome = self.run_daemon(args, run_args, &mut transcript);
        PipelineResult {
            outcome,
            transcript,
        }
    }
}

/// Resolve the executable the run stage launches: the configured parent when
/// it exists on disk, the daemon's install path otherwise.
pub fn launch_path(args: &BuildArgs) -> PathBuf {
    if let Some(parent) = args.parent_path.as_deref()
        && Path::new(parent).is_file()
    {
        return PathBuf::from(parent);
    }
    PathBuf::from(args.daemon_path.as_deref().unwrap_or_default())
}

fn read_to_string<R: Read>(reader: &mut R) -> String {
    let mut buffer = Vec::new();
    if reader.read_to_end(&mut buffer).is_ok() {
        String::from_utf8_lossy(&buffer).to_string()
    } else {
        String::new()
    }
}

fn join_output(handle: Option<thread::JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.join().unwrap_or_default(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> Pipeline {
        let dir = std::env::temp_dir();
        Pipeline::with_tools(
            BuildTool::new(&dir),
            BuildTool::new(&dir),
            Options::default(),
        )
    }

    #[test]
    fn test_run_maps_clean_exit_to_success() {
        let mut transcript = Transcript::new(false);
        let outcome = pipeline().run(
            Path::new("/bin/true"),
            &[],
            Duration::from_secs(5),
            &mut transcript,
        );
        assert_eq!(outcome, Outcome::Success);
    }

    #[test]
    fn test_run_maps_unknown_exit_to_runtime_error() {
        let mut transcript = Transcript::new(false);
        let outcome = pipeline().run(
            Path::new("/bin/false"),
            &[],
            Duration::from_secs(5),
            &mut transcript,
        );
        assert_eq!(outcome, Outcome::RuntimeError);
    }

    #[test]
    fn test_run_spawn_failure_is_launch_failure() {
        let mut transcript = Transcript::new(false);
        let outcome = pipeline().run(
            Path::new("/nonexistent/daemon"),
            &[],
            Duration::from_secs(5),
            &mut transcript,
        );
        assert_eq!(outcome, Outcome::LaunchFailure);
        assert!(!transcript.is_empty());
    }

    #[test]
    fn test_run_times_out_and_kills() {
        let mut transcript = Transcript::new(false);
        let start = Instant::now();
        let outcome = pipeline().run(
            Path::new("/bin/sleep"),
            &["30".to_string()],
            Duration::from_millis(200),
            &mut transcript,
        );
        assert_eq!(outcome, Outcome::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_launch_path_prefers_existing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("basic-parent");
        std::fs::write(&parent, "").unwrap();

        let args = BuildArgs {
            daemon_path: Some("/secure/basic-daemon".to_string()),
            parent_path: Some(parent.display().to_string()),
            in_pipe_path: None,
            out_pipe_path: None,
            lock_file_path: None,
            verify_path: true,
            verify_path_security: true,
            verify_parent_path_security: true,
            require_running_parent: true,
            key_limit: None,
            daemon_timeout_secs: Some(1),
            config_mode: "Debug".to_string(),
            verbose: false,
        };
        assert_eq!(launch_path(&args), parent);

        // A configured-but-absent parent falls back to the daemon.
        let args = BuildArgs {
            parent_path: Some("/nonexistent/basic-parent".to_string()),
            ..args
        };
        assert_eq!(
            launch_path(&args),
            PathBuf::from("/secure/basic-daemon")
        );
    }
}

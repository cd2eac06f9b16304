//! Driver for the external `make`-based build system.
//!
//! Build success is judged by observed effect, never by exit status alone: a
//! build must leave a fresh artifact behind, and an install must leave a file
//! at the resolved install path with a modification time strictly newer than
//! the moment the build began. Both rules guard against stale artifacts
//! silently passing as successes.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use thiserror::Error;
use tracing::{debug, warn};

use crate::options::Options;
use crate::paths::TestPaths;
use crate::transcript::Transcript;

/// Build variable names understood by the daemon's and parent's makefiles.
pub mod vars {
    /// Absolute path the daemon installs to and must run from.
    pub const DAEMON_PATH: &str = "DT_DAEMON_PATH";
    /// Absolute path of the only executable allowed to launch the daemon.
    pub const PARENT_PATH: &str = "DT_REQUIRED_PARENT_PATH";
    pub const IN_PIPE_PATH: &str = "DT_INPUT_PIPE_PATH";
    pub const OUT_PIPE_PATH: &str = "DT_OUTPUT_PIPE_PATH";
    pub const LOCK_FILE_PATH: &str = "DT_LOCK_FILE_PATH";
    /// Whether the daemon verifies it runs from [`DAEMON_PATH`].
    pub const VERIFY_PATH: &str = "DT_VERIFY_PATH";
    /// Whether the daemon verifies its install directory is secured.
    pub const VERIFY_PATH_SECURITY: &str = "DT_VERIFY_PATH_SECURITY";
    /// Whether the daemon verifies its parent's directory is secured.
    pub const VERIFY_PARENT_PATH_SECURITY: &str = "DT_VERIFY_PARENT_PATH_SECURITY";
    /// Whether the daemon exits when its parent process ends.
    pub const REQUIRE_RUNNING_PARENT: &str = "DT_REQUIRE_RUNNING_PARENT";
    /// Maximum number of key codes the daemon will track.
    pub const KEY_LIMIT: &str = "DT_KEY_LIMIT";
    /// Seconds before the daemon exits on its own.
    pub const TIMEOUT: &str = "DT_TIMEOUT";
    /// Debug/Release configuration mode.
    pub const CONFIG: &str = "DT_CONFIG";
    pub const VERBOSE: &str = "DT_VERBOSE";
    /// Name of the produced build artifact, resolved via introspection.
    pub const APP_TARGET: &str = "APP_TARGET";
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to invoke build tool {program} in {dir}: {source}")]
    Invoke {
        program: String,
        dir: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to remove stale artifact {path}: {source}")]
    StaleArtifact {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("build variable {0} resolved to an empty value")]
    EmptyVar(String),
}

pub type BuildResult<T> = Result<T, BuildError>;

/// Complete `KEY=value` argument set for one build/install invocation.
///
/// Field defaults mirror a known-good installation: with no overrides the
/// daemon builds, installs and runs successfully.
#[derive(Debug, Clone)]
pub struct BuildArgs {
    pub daemon_path: Option<String>,
    pub parent_path: Option<String>,
    pub in_pipe_path: Option<String>,
    pub out_pipe_path: Option<String>,
    pub lock_file_path: Option<String>,
    pub verify_path: bool,
    pub verify_path_security: bool,
    pub verify_parent_path_security: bool,
    pub require_running_parent: bool,
    pub key_limit: Option<String>,
    pub daemon_timeout_secs: Option<u64>,
    pub config_mode: String,
    pub verbose: bool,
}

impl BuildArgs {
    /// All-default arguments for the secured install layout.
    pub fn standard(paths: &TestPaths, options: &Options) -> Self {
        Self {
            daemon_path: Some(paths.daemon_secure_path().display().to_string()),
            parent_path: Some(paths.parent_secure_path().display().to_string()),
            in_pipe_path: Some(paths.in_pipe_path().display().to_string()),
            out_pipe_path: Some(paths.out_pipe_path().display().to_string()),
            lock_file_path: Some(paths.lock_file_path().display().to_string()),
            verify_path: true,
            verify_path_security: true,
            verify_parent_path_security: true,
            require_running_parent: true,
            key_limit: None,
            daemon_timeout_secs: options.daemon_timeout_secs,
            config_mode: options.config_mode().to_string(),
            verbose: options.verbose,
        }
    }

    pub fn daemon_path(mut self, path: Option<impl Into<String>>) -> Self {
        self.daemon_path = path.map(Into::into);
        self
    }

    pub fn parent_path(mut self, path: Option<impl Into<String>>) -> Self {
        self.parent_path = path.map(Into::into);
        self
    }

    pub fn in_pipe(mut self, path: Option<impl Into<String>>) -> Self {
        self.in_pipe_path = path.map(Into::into);
        self
    }

    pub fn out_pipe(mut self, path: Option<impl Into<String>>) -> Self {
        self.out_pipe_path = path.map(Into::into);
        self
    }

    pub fn lock_file(mut self, path: Option<impl Into<String>>) -> Self {
        self.lock_file_path = path.map(Into::into);
        self
    }

    pub fn verify_path(mut self, enabled: bool) -> Self {
        self.verify_path = enabled;
        self
    }

    pub fn verify_parent_security(mut self, enabled: bool) -> Self {
        self.verify_parent_path_security = enabled;
        self
    }

    pub fn key_limit(mut self, limit: impl Into<String>) -> Self {
        self.key_limit = Some(limit.into());
        self
    }

    pub fn daemon_timeout(mut self, secs: Option<u64>) -> Self {
        self.daemon_timeout_secs = secs;
        self
    }

    /// Render the full argument list.
    ///
    /// Path variables are omitted entirely when unset (an undefined variable
    /// is how a build is made to fail on purpose); boolean variables are
    /// always emitted as `1`/`0`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![format!("{}={}", vars::CONFIG, self.config_mode)];
        let strings = [
            (vars::DAEMON_PATH, &self.daemon_path),
            (vars::PARENT_PATH, &self.parent_path),
            (vars::IN_PIPE_PATH, &self.in_pipe_path),
            (vars::OUT_PIPE_PATH, &self.out_pipe_path),
            (vars::LOCK_FILE_PATH, &self.lock_file_path),
            (vars::KEY_LIMIT, &self.key_limit),
        ];
        for (name, value) in strings {
            if let Some(value) = value {
                args.push(format!("{name}={value}"));
            }
        }
        let bools = [
            (vars::VERIFY_PATH, self.verify_path),
            (vars::VERIFY_PATH_SECURITY, self.verify_path_security),
            (
                vars::VERIFY_PARENT_PATH_SECURITY,
                self.verify_parent_path_security,
            ),
            (vars::REQUIRE_RUNNING_PARENT, self.require_running_parent),
            (vars::VERBOSE, self.verbose),
        ];
        for (name, value) in bools {
            args.push(format!("{name}={}", u8::from(value)));
        }
        if let Some(secs) = self.daemon_timeout_secs {
            args.push(format!("{}={secs}", vars::TIMEOUT));
        }
        args
    }
}

/// One target directory driven through the external build tool.
#[derive(Debug, Clone)]
pub struct BuildTool {
    program: String,
    dir: PathBuf,
}

impl BuildTool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_program("make", dir)
    }

    /// Override the tool binary; integration tests point this at a stub.
    pub fn with_program(program: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn invoke(&self, args: &[String], transcript: &mut Transcript) -> BuildResult<()> {
        debug!("invoking {} {:?} in {}", self.program, args, self.dir.display());
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.dir)
            .output()
            .map_err(|source| BuildError::Invoke {
                program: self.program.clone(),
                dir: self.dir.clone(),
                source,
            })?;
        transcript.capture(&self.program, &String::from_utf8_lossy(&output.stdout));
        transcript.capture(
            &format!("{}:stderr", self.program),
            &String::from_utf8_lossy(&output.stderr),
        );
        Ok(())
    }

    /// Resolve a build variable's value for a given argument list via the
    /// tool's `print-<VAR>` introspection action.
    pub fn read_var(&self, args: &[String], var: &str) -> BuildResult<String> {
        let mut full = vec![format!("print-{var}")];
        full.extend_from_slice(args);
        let output = Command::new(&self.program)
            .args(&full)
            .current_dir(&self.dir)
            .output()
            .map_err(|source| BuildError::Invoke {
                program: self.program.clone(),
                dir: self.dir.clone(),
                source,
            })?;
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if value.is_empty() {
            return Err(BuildError::EmptyVar(var.to_string()));
        }
        Ok(value)
    }

    /// Build the target, succeeding only if a fresh artifact appears.
    ///
    /// Any pre-existing artifact is removed first so a failed build cannot
    /// pass on a stale file.
    pub fn build(&self, args: &[String], transcript: &mut Transcript) -> BuildResult<bool> {
        let target = match self.read_var(args, vars::APP_TARGET) {
            Ok(target) => target,
            Err(err) => {
                transcript.note(format!("could not resolve {}: {err}", vars::APP_TARGET));
                return Ok(false);
            }
        };
        let artifact = self.dir.join(&target);
        if artifact.is_file() {
            std::fs::remove_file(&artifact).map_err(|source| BuildError::StaleArtifact {
                path: artifact.clone(),
                source,
            })?;
        }
        self.invoke(args, transcript)?;
        Ok(artifact.is_file())
    }

    /// Install the target, succeeding only if the installed file exists and
    /// is strictly newer than `pre_build`.
    pub fn install(
        &self,
        args: &[String],
        install_var: &str,
        pre_build: SystemTime,
        transcript: &mut Transcript,
    ) -> BuildResult<bool> {
        let install_path = match self.read_var(args, install_var) {
            Ok(path) => PathBuf::from(path),
            Err(err) => {
                transcript.note(format!("could not resolve {install_var}: {err}"));
                return Ok(false);
            }
        };
        let mut install_args = vec!["install".to_string()];
        install_args.extend_from_slice(args);
        self.invoke(&install_args, transcript)?;

        if !install_path.is_file() {
            transcript.note(format!(
                "no file installed to path {}",
                install_path.display()
            ));
            return Ok(false);
        }
        if !installed_fresh(&install_path, pre_build) {
            transcript.note(format!(
                "file installed to path {} was not updated",
                install_path.display()
            ));
            return Ok(false);
        }
        Ok(true)
    }

    /// Delete build output for both configuration modes. Best-effort:
    /// failures are logged and swallowed.
    pub fn clean(&self, transcript: &mut Transcript) {
        for mode in ["Debug", "Release"] {
            let args = vec!["clean".to_string(), format!("{}={mode}", vars::CONFIG)];
            if let Err(err) = self.invoke(&args, transcript) {
                warn!("clean failed in {}: {err}", self.dir.display());
            }
        }
    }

    /// Remove a previously installed artifact. Best-effort.
    pub fn uninstall(&self, install_var: &str, install_path: &Path, transcript: &mut Transcript) {
        let args = vec![
            "uninstall".to_string(),
            format!("{install_var}={}", install_path.display()),
        ];
        if let Err(err) = self.invoke(&args, transcript) {
            warn!("uninstall failed in {}: {err}", self.dir.display());
        }
    }
}

/// True when `path` exists with a modification time strictly newer than
/// `pre_build`. A present-but-stale file is not a successful install.
pub fn installed_fresh(path: &Path, pre_build: SystemTime) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    match metadata.modified() {
        Ok(modified) => modified > pre_build,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample_args() -> BuildArgs {
        BuildArgs {
            daemon_path: Some("/secure/basic-daemon".to_string()),
            parent_path: Some("/secure/basic-parent".to_string()),
            in_pipe_path: None,
            out_pipe_path: None,
            lock_file_path: Some("/run/daemon.lock".to_string()),
            verify_path: true,
            verify_path_security: true,
            verify_parent_path_security: false,
            require_running_parent: true,
            key_limit: Some("5".to_string()),
            daemon_timeout_secs: Some(1),
            config_mode: "Debug".to_string(),
            verbose: false,
        }
    }

    #[test]
    fn test_to_args_emits_config_mode_first() {
        let args = sample_args().to_args();
        assert_eq!(args[0], "DT_CONFIG=Debug");
    }

    #[test]
    fn test_to_args_omits_unset_paths() {
        let args = sample_args().to_args();
        assert!(!args.iter().any(|a| a.starts_with("DT_INPUT_PIPE_PATH")));
        assert!(!args.iter().any(|a| a.starts_with("DT_OUTPUT_PIPE_PATH")));
        assert!(args.contains(&"DT_LOCK_FILE_PATH=/run/daemon.lock".to_string()));
    }

    #[test]
    fn test_to_args_renders_booleans_and_timeout() {
        let args = sample_args().to_args();
        assert!(args.contains(&"DT_VERIFY_PATH=1".to_string()));
        assert!(args.contains(&"DT_VERIFY_PARENT_PATH_SECURITY=0".to_string()));
        assert!(args.contains(&"DT_TIMEOUT=1".to_string()));

        let args = sample_args().daemon_timeout(None).to_args();
        assert!(!args.iter().any(|a| a.starts_with("DT_TIMEOUT")));
    }

    #[test]
    fn test_installed_fresh_rejects_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("basic-daemon");
        std::fs::write(&artifact, "binary").unwrap();
        // A checkpoint taken after the write makes the file stale.
        let pre_build = SystemTime::now() + Duration::from_secs(5);
        assert!(!installed_fresh(&artifact, pre_build));
    }

    #[test]
    fn test_installed_fresh_accepts_newer_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("basic-daemon");
        let pre_build = SystemTime::now() - Duration::from_secs(5);
        std::fs::write(&artifact, "binary").unwrap();
        assert!(installed_fresh(&artifact, pre_build));
    }

    #[test]
    fn test_installed_fresh_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!installed_fresh(
            &dir.path().join("missing"),
            SystemTime::now()
        ));
    }
}

//! Fixture path layout for a daemon test project.
//!
//! All paths derive from one project root: the daemon and parent source
//! trees, the secured and unsecured install directories, pipe and lock file
//! locations, and the durable failure log. The secured directory must be
//! bootstrapped by a privileged account; the harness verifies it rather than
//! escalating privileges itself.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Name of the daemon test executable.
pub const DAEMON_NAME: &str = "basic-daemon";
/// Name of the gatekeeper parent executable that launches the daemon.
pub const PARENT_NAME: &str = "basic-parent";
/// File name of the durable failure log.
pub const FAILURE_LOG_NAME: &str = "failure-log.txt";

#[derive(Debug, Error)]
pub enum PathsError {
    #[error("project root {0} is not a directory")]
    BadRoot(PathBuf),

    #[error(
        "secured fixture directory {0} is missing; create it as a privileged \
         account with `mkdir {0} && chown root:root {0} && chmod o-w {0}`"
    )]
    MissingSecureDir(PathBuf),

    #[error(
        "secured fixture directory {0} is world-writable; remove the \
         permission with `chmod o-w {0}`"
    )]
    WorldWritableSecureDir(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolved locations of every file the harness touches.
#[derive(Debug, Clone)]
pub struct TestPaths {
    root: PathBuf,
    daemon_src_dir: PathBuf,
    parent_src_dir: PathBuf,
    secure_dir: PathBuf,
    unsecure_dir: PathBuf,
    failure_log: PathBuf,
}

impl TestPaths {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, PathsError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(PathsError::BadRoot(root));
        }
        let exec_dir = root.join("exec");
        Ok(Self {
            daemon_src_dir: root.join(DAEMON_NAME),
            parent_src_dir: root.join(PARENT_NAME),
            secure_dir: exec_dir.join("secured"),
            unsecure_dir: exec_dir.join("unsecured"),
            failure_log: root.join(FAILURE_LOG_NAME),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Source directory holding the daemon's makefile.
    pub fn daemon_src_dir(&self) -> &Path {
        &self.daemon_src_dir
    }

    /// Source directory holding the parent's makefile.
    pub fn parent_src_dir(&self) -> &Path {
        &self.parent_src_dir
    }

    pub fn secure_dir(&self) -> &Path {
        &self.secure_dir
    }

    pub fn unsecure_dir(&self) -> &Path {
        &self.unsecure_dir
    }

    pub fn daemon_secure_path(&self) -> PathBuf {
        self.secure_dir.join(DAEMON_NAME)
    }

    pub fn daemon_unsecure_path(&self) -> PathBuf {
        self.unsecure_dir.join(DAEMON_NAME)
    }

    /// Build-output location of the daemon, before installation.
    pub fn daemon_build_path(&self) -> PathBuf {
        self.daemon_src_dir.join(DAEMON_NAME)
    }

    pub fn parent_secure_path(&self) -> PathBuf {
        self.secure_dir.join(PARENT_NAME)
    }

    pub fn parent_unsecure_path(&self) -> PathBuf {
        self.unsecure_dir.join(PARENT_NAME)
    }

    /// Build-output location of the parent, before installation.
    pub fn parent_build_path(&self) -> PathBuf {
        self.parent_src_dir.join(PARENT_NAME)
    }

    pub fn in_pipe_path(&self) -> PathBuf {
        self.root.join("exec").join(".in-pipe")
    }

    pub fn out_pipe_path(&self) -> PathBuf {
        self.root.join("exec").join(".out-pipe")
    }

    pub fn lock_file_path(&self) -> PathBuf {
        self.root.join("exec").join(".lock")
    }

    pub fn failure_log_path(&self) -> &Path {
        &self.failure_log
    }

    /// Prepare the fixture tree for a suite run.
    ///
    /// Removes any failure log left by a previous run, creates the
    /// world-writable unsecured directory, and verifies the secured
    /// directory's permissions. Privileged ownership cannot be bootstrapped
    /// from here; a missing or misconfigured secured directory is a fatal
    /// configuration error carrying its own remediation text.
    pub fn prepare(&self) -> Result<(), PathsError> {
        if self.failure_log.is_file() {
            debug!("removing stale failure log {}", self.failure_log.display());
            fs::remove_file(&self.failure_log)?;
        }

        if !self.unsecure_dir.is_dir() {
            fs::create_dir_all(&self.unsecure_dir)?;
            fs::set_permissions(&self.unsecure_dir, fs::Permissions::from_mode(0o777))?;
            debug!(
                "created world-writable fixture dir {}",
                self.unsecure_dir.display()
            );
        }

        if !self.secure_dir.is_dir() {
            return Err(PathsError::MissingSecureDir(self.secure_dir.clone()));
        }
        let mode = fs::metadata(&self.secure_dir)?.permissions().mode();
        if mode & 0o002 != 0 {
            return Err(PathsError::WorldWritableSecureDir(self.secure_dir.clone()));
        }
        Ok(())
    }
}

//! End-to-end pipeline tests against a stub build tool.
//!
//! The stub is a shell script honoring the same contract as the real
//! makefiles: `print-<VAR>` introspection, a default build action that
//! produces an artifact only for buildable configurations, and
//! install/uninstall/clean actions. The daemon and parent each get their own
//! stub, as each real makefile knows its own install variable.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use dtk_harness::build::{BuildArgs, BuildTool};
use dtk_harness::options::Options;
use dtk_harness::outcome::Outcome;
use dtk_harness::pipeline::{Pipeline, Target};

/// Write a stub build tool into `dir` that installs via `install_var`.
///
/// The build action refuses to produce an artifact when `DT_KEY_LIMIT` is
/// present but not a plain number, mirroring the real daemon's compile-time
/// validation. With `install_noop` the install action leaves the target
/// untouched, to exercise stale-artifact detection.
fn write_stub(dir: &Path, install_var: &str, install_noop: bool) -> PathBuf {
    let install_body = if install_noop {
        "        :".to_string()
    } else {
        format!(
            "        target=\"$(lookup {install_var} \"$@\")\"\n\
             \x20       if [ -n \"$target\" ]; then sleep 0.05; cp \"$dir/app\" \"$target\"; fi"
        )
    };
    let uninstall_body = if install_noop {
        "        :".to_string()
    } else {
        format!(
            "        target=\"$(lookup {install_var} \"$@\")\"\n\
             \x20       if [ -n \"$target\" ]; then rm -f \"$target\"; fi"
        )
    };
    let script = format!(
        r#"#!/bin/sh
set -u
dir="$(cd "$(dirname "$0")" && pwd)"
lookup() {{
    name="$1"; shift
    for arg in "$@"; do
        case "$arg" in
            "$name"=*) printf '%s' "${{arg#*=}}";;
        esac
    done
}}
case "${{1:-}}" in
    print-APP_TARGET)
        printf 'app\n'
        ;;
    print-*)
        var="${{1#print-}}"; shift
        printf '%s\n' "$(lookup "$var" "$@")"
        ;;
    install)
        shift
{install_body}
        ;;
    uninstall)
        shift
{uninstall_body}
        ;;
    clean)
        rm -f "$dir/app"
        ;;
    *)
        limit="$(lookup DT_KEY_LIMIT "$@")"
        if printf '%s' "$limit" | grep -q '[^0-9-]'; then
            echo "error: tracked key limit '$limit' is not numeric" >&2
            exit 2
        fi
        echo "building app"
        printf '#!/bin/sh\nexit 0\n' > "$dir/app"
        chmod +x "$dir/app"
        ;;
esac
"#
    );
    let path = dir.join("stubmake");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

struct Fixture {
    _root: tempfile::TempDir,
    pipeline: Pipeline,
    args: BuildArgs,
}

fn fixture(install_noop: bool) -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let daemon_dir = root.path().join("basic-daemon");
    let parent_dir = root.path().join("basic-parent");
    let install_dir = root.path().join("secured");
    fs::create_dir_all(&daemon_dir).unwrap();
    fs::create_dir_all(&parent_dir).unwrap();
    fs::create_dir_all(&install_dir).unwrap();

    let daemon_stub = write_stub(&daemon_dir, "DT_DAEMON_PATH", install_noop);
    let parent_stub = write_stub(&parent_dir, "DT_REQUIRED_PARENT_PATH", false);

    let options = Options::default();
    let pipeline = Pipeline::with_tools(
        BuildTool::with_program(daemon_stub.display().to_string(), &daemon_dir),
        BuildTool::with_program(parent_stub.display().to_string(), &parent_dir),
        options.clone(),
    );

    let args = BuildArgs {
        daemon_path: Some(install_dir.join("basic-daemon").display().to_string()),
        parent_path: Some(install_dir.join("basic-parent").display().to_string()),
        in_pipe_path: None,
        out_pipe_path: None,
        lock_file_path: Some(root.path().join(".lock").display().to_string()),
        verify_path: true,
        verify_path_security: true,
        verify_parent_path_security: true,
        require_running_parent: true,
        key_limit: Some("5".to_string()),
        daemon_timeout_secs: Some(1),
        config_mode: options.config_mode().to_string(),
        verbose: false,
    };

    Fixture {
        _root: root,
        pipeline,
        args,
    }
}

#[test]
fn test_full_run_succeeds_with_valid_configuration() {
    let fixture = fixture(false);
    let result = fixture.pipeline.full_run(&fixture.args, &[]);
    assert_eq!(result.outcome, Outcome::Success);
    // Install artifacts survive a successful run.
    let daemon_path = fixture.args.daemon_path.as_deref().unwrap();
    assert!(Path::new(daemon_path).is_file());
}

#[test]
fn test_bad_key_limit_is_a_build_failure() {
    let fixture = fixture(false);
    let args = fixture.args.clone().key_limit("five");
    let result = fixture.pipeline.full_run(&args, &[]);
    assert_eq!(result.outcome, Outcome::BuildFailure);
    // The failure came from the daemon stage; the parent built first and
    // its transcript lines are present.
    let lines = result.transcript.lines().join("\n");
    assert!(lines.contains("Building parent:"));
    assert!(lines.contains("Building daemon:"));
}

#[test]
fn test_empty_install_path_fails_install_stage() {
    let fixture = fixture(false);
    let args = fixture.args.clone().daemon_path(Some(""));
    let result = fixture.pipeline.full_run(&args, &[]);
    assert_eq!(result.outcome, Outcome::InstallFailure);
}

#[test]
fn test_noop_install_with_stale_artifact_fails() {
    let fixture = fixture(true);
    // A file already sits at the install path, but the stub's install never
    // refreshes it: the presence of the stale file must not count.
    let daemon_path = fixture.args.daemon_path.as_deref().unwrap();
    fs::write(daemon_path, "#!/bin/sh\nexit 0\n").unwrap();
    std::thread::sleep(std::time::Duration::from_millis(100));

    let mut transcript = fixture.pipeline.transcript();
    let outcome = fixture
        .pipeline
        .build_install(Target::Daemon, &fixture.args, &mut transcript);
    assert_eq!(outcome, Err(Outcome::InstallFailure));
    let lines = transcript.lines().join("\n");
    assert!(lines.contains("was not updated"));
}

#[test]
fn test_same_configuration_is_idempotent() {
    let fixture = fixture(false);
    let first = fixture.pipeline.full_run(&fixture.args, &[]);
    let second = fixture.pipeline.full_run(&fixture.args, &[]);
    assert_eq!(first.outcome, second.outcome);
    assert_eq!(first.outcome, Outcome::Success);
}

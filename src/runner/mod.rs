//! Runner trait and host-tool implementation for executing vignette scripts.
//!
//! The default [`ScriptRunner`] launches the test's driver script with the
//! tool recorded on the [`TestCase`] and redirects the child's stdout/stderr
//! into `Testing/output.log` and `Testing/error.log`. The exit code is
//! recorded but never judged; the comparisons that follow decide pass/fail.

use crate::config::{RunnerConfig, ToolKind};
use crate::core::context::Context;
use crate::core::error::{Error, Result};
use crate::suite::TestCase;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub mod paraview;
pub mod visit;

pub use paraview::ParaViewLauncher;
pub use visit::VisItLauncher;

/// Script names in a test directory that are infrastructure, not tests.
const INFRASTRUCTURE_SCRIPTS: &[&str] = &["run_script.py", "test_suite.py"];

/// Runner trait for executing a single test case.
pub trait Runner: Send + Sync {
    /// Execute the test case's driver script.
    ///
    /// Returns information about the run; a non-zero exit is not an error.
    fn run(&self, ctx: &Context, case: &TestCase) -> Result<RunResult>;

    /// Get a human-readable name for this runner.
    fn name(&self) -> &str;
}

/// Builds the command line for one visualization tool.
pub trait ToolLauncher: Send + Sync {
    /// Build the command that runs `script` under this tool.
    fn command(
        &self,
        config: &RunnerConfig,
        locator: &ToolLocator,
        script: &Path,
    ) -> Result<Command>;

    /// Tool handled by this launcher.
    fn tool(&self) -> ToolKind;
}

/// Result of running a test script.
#[derive(Debug)]
pub struct RunResult {
    /// Exit code from the tool (-1 when killed by a signal).
    pub exit_code: i32,

    /// Whether the tool exited successfully. Informational only.
    pub success: bool,

    /// Whether the run was terminated due to a timeout.
    pub timed_out: bool,
}

impl RunResult {
    /// Create a new run result.
    pub fn new(exit_code: i32, success: bool) -> Self {
        Self {
            exit_code,
            success,
            timed_out: false,
        }
    }

    /// Create a successful result with exit code 0.
    pub fn success() -> Self {
        Self::new(0, true)
    }

    /// Mark the result as timed out.
    pub fn with_timeout(mut self) -> Self {
        self.timed_out = true;
        self
    }
}

/// Locates tool executables through install-path env vars and `PATH`.
#[derive(Debug, Clone, Default)]
pub struct ToolLocator {
    search_path: Vec<PathBuf>,
    install_dirs: HashMap<String, PathBuf>,
}

impl ToolLocator {
    /// Env vars consulted for install directories.
    pub const INSTALL_VARS: &'static [&'static str] =
        &["PARAVIEW_PATH", "VISIT_PATH", "MPI_EXEC_PATH", "SRUN_PATH"];

    /// Create a locator with an explicit search path and no install overrides.
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        Self {
            search_path,
            install_dirs: HashMap::new(),
        }
    }

    /// Create a locator from `PATH` and the install-path env vars.
    pub fn from_env() -> Self {
        let search_path = std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).collect())
            .unwrap_or_default();
        let mut locator = Self::new(search_path);
        for var in Self::INSTALL_VARS {
            if let Some(dir) = std::env::var_os(var).filter(|v: &OsString| !v.is_empty()) {
                locator = locator.with_install_dir(*var, dir);
            }
        }
        locator
    }

    /// Register an install directory for an env var name.
    pub fn with_install_dir(mut self, env_var: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.install_dirs.insert(env_var.into(), dir.into());
        self
    }

    /// Find `name`, preferring `<install dir of env_var>/<name>` over `PATH`.
    pub fn find(&self, name: &str, env_var: &str) -> Option<PathBuf> {
        if let Some(dir) = self.install_dirs.get(env_var) {
            let candidate = dir.join(name);
            if is_executable(&candidate) {
                return Some(candidate);
            }
        }

        self.search_path
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
    }

    /// Like [`find`](Self::find), but a missing tool is a configuration error.
    pub fn require(&self, name: &str, env_var: &str) -> Result<PathBuf> {
        self.find(name, env_var).ok_or_else(|| {
            Error::config(format!(
                "{} not found: set {} to its install directory or add it to PATH",
                name, env_var
            ))
        })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Locate the test's driver script.
///
/// The driver is the first `*.py` file (by name) that is not one of the
/// infrastructure scripts.
pub fn find_test_script(test_dir: &Path) -> Result<PathBuf> {
    let mut scripts: Vec<PathBuf> = std::fs::read_dir(test_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("py"))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !INFRASTRUCTURE_SCRIPTS.contains(&n))
        })
        .collect();
    scripts.sort();

    scripts
        .into_iter()
        .next()
        .ok_or_else(|| Error::FileNotFound(test_dir.join("*.py")))
}

/// Default runner: launches ParaView or VisIt as a subprocess.
pub struct ScriptRunner {
    locator: ToolLocator,
    launchers: Vec<Box<dyn ToolLauncher>>,
}

impl ScriptRunner {
    /// Create a runner that locates tools from the environment.
    pub fn new() -> Self {
        Self::with_locator(ToolLocator::from_env())
    }

    /// Create a runner with a custom tool locator.
    pub fn with_locator(locator: ToolLocator) -> Self {
        Self {
            locator,
            launchers: vec![Box::new(ParaViewLauncher::new()), Box::new(VisItLauncher::new())],
        }
    }

    /// Build the command for a test case without running it.
    pub fn command(&self, ctx: &Context, case: &TestCase) -> Result<Command> {
        let tool = case.tool.ok_or_else(|| {
            Error::config(format!(
                "cannot determine the visualization tool for {} (set runner.tool or --test_type)",
                case.name
            ))
        })?;
        let script = case
            .script
            .as_deref()
            .ok_or_else(|| Error::FileNotFound(case.dir.join("*.py")))?;

        let launcher = self
            .launchers
            .iter()
            .find(|l| l.tool() == tool)
            .ok_or_else(|| Error::config(format!("no launcher registered for {}", tool)))?;

        let mut cmd = launcher.command(&ctx.config.runner, &self.locator, script)?;
        let threads = ctx.config.runner.threads.to_string();
        cmd.env("OMP_NUM_THREADS", &threads);
        cmd.env("TBB_NUM_THREADS", &threads);
        cmd.current_dir(&case.dir);
        Ok(cmd)
    }
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner for ScriptRunner {
    fn run(&self, ctx: &Context, case: &TestCase) -> Result<RunResult> {
        let mut cmd = self.command(ctx, case)?;
        let testing_dir = case.testing_dir();
        crate::util::fs::ensure_dir_exists(&testing_dir)?;

        tracing::debug!(command = ?cmd, "executing");
        let result = execute_logged(
            &mut cmd,
            &case.output_log(),
            &case.error_log(),
            ctx.config.runner.timeout.map(Duration::from_secs),
        )?;

        if result.timed_out {
            tracing::warn!(test = %case.name, "tool killed after timeout");
        } else if !result.success {
            tracing::warn!(
                test = %case.name,
                exit_code = result.exit_code,
                "tool exited with failure; comparisons will judge the outcome"
            );
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "host tool"
    }
}

/// Run `cmd` to completion with stdout/stderr redirected into files.
///
/// When `timeout` is set, a watchdog thread kills the child once it elapses.
/// On unix the child leads its own process group and the whole group is
/// killed, so ranks started by `mpirun` or `srun` go down with it.
pub fn execute_logged(
    cmd: &mut Command,
    stdout_path: &Path,
    stderr_path: &Path,
    timeout: Option<Duration>,
) -> Result<RunResult> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let stdout_file = File::create(stdout_path)?;
    let stderr_file = File::create(stderr_path)?;

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::from(stdout_file));
    cmd.stderr(Stdio::from(stderr_file));
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::runner(format!("failed to execute {}: {}", program, e)))?;

    // Set up timeout watchdog
    let timed_out = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));
    if let Some(limit) = timeout {
        let timed_out = timed_out.clone();
        let finished = finished.clone();
        let child_id = child.id();
        std::thread::spawn(move || {
            std::thread::sleep(limit);
            if !finished.swap(true, Ordering::SeqCst) {
                timed_out.store(true, Ordering::SeqCst);
                #[cfg(unix)]
                {
                    // SAFETY: plain signal delivery to the process group we spawned.
                    unsafe {
                        libc::kill(-(child_id as i32), libc::SIGKILL);
                    }
                }
                #[cfg(not(unix))]
                {
                    let _ = child_id;
                }
            }
        });
    }

    let status = child
        .wait()
        .map_err(|e| Error::runner(format!("failed to wait for {}: {}", program, e)))?;

    // Tell the watchdog not to kill; don't join, it would block until the timeout.
    finished.store(true, Ordering::SeqCst);

    let mut result = RunResult::new(status.code().unwrap_or(-1), status.success());
    if timed_out.load(Ordering::SeqCst) {
        result = result.with_timeout();
    }
    Ok(result)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn test_run_result_success() {
        let result = RunResult::success();
        assert_eq!(result.exit_code, 0);
        assert!(result.success);
        assert!(!result.timed_out);
    }

    #[test]
    fn test_run_result_timeout() {
        let result = RunResult::new(-1, false).with_timeout();
        assert!(result.timed_out);
    }

    #[test]
    fn test_find_test_script_skips_infrastructure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run_script.py"), "").unwrap();
        std::fs::write(dir.path().join("test_suite.py"), "").unwrap();
        std::fs::write(dir.path().join("pv_contour.py"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let script = find_test_script(dir.path()).unwrap();
        assert_eq!(script, dir.path().join("pv_contour.py"));
    }

    #[test]
    fn test_find_test_script_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run_script.py"), "").unwrap();
        assert!(matches!(
            find_test_script(dir.path()),
            Err(Error::FileNotFound(_))
        ));
    }

    #[cfg(unix)]
    pub(crate) fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_locator_prefers_install_dir() {
        let install = tempfile::tempdir().unwrap();
        let on_path = tempfile::tempdir().unwrap();
        let preferred = fake_tool(install.path(), "pvbatch", "exit 0");
        fake_tool(on_path.path(), "pvbatch", "exit 0");

        let locator = ToolLocator::new(vec![on_path.path().to_path_buf()])
            .with_install_dir("PARAVIEW_PATH", install.path());
        assert_eq!(locator.find("pvbatch", "PARAVIEW_PATH"), Some(preferred));
    }

    #[cfg(unix)]
    #[test]
    fn test_locator_falls_back_to_path() {
        let install = tempfile::tempdir().unwrap();
        let on_path = tempfile::tempdir().unwrap();
        let expected = fake_tool(on_path.path(), "visit", "exit 0");

        let locator = ToolLocator::new(vec![on_path.path().to_path_buf()])
            .with_install_dir("VISIT_PATH", install.path());
        assert_eq!(locator.find("visit", "VISIT_PATH"), Some(expected));
    }

    #[cfg(unix)]
    #[test]
    fn test_locator_ignores_non_executable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mpirun"), "not executable").unwrap();
        let locator = ToolLocator::new(vec![dir.path().to_path_buf()]);
        assert!(locator.find("mpirun", "MPI_EXEC_PATH").is_none());
    }

    #[test]
    fn test_locator_require_names_env_var() {
        let locator = ToolLocator::new(Vec::new());
        let err = locator.require("visit", "VISIT_PATH").unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("VISIT_PATH"));
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_logged_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output.log");
        let err = dir.path().join("error.log");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo hello; echo oops 1>&2; exit 3");
        let result = execute_logged(&mut cmd, &out, &err, None).unwrap();

        assert_eq!(result.exit_code, 3);
        assert!(!result.success);
        assert!(!result.timed_out);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello\n");
        assert_eq!(std::fs::read_to_string(&err).unwrap(), "oops\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_logged_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let result = execute_logged(
            &mut cmd,
            &dir.path().join("o.log"),
            &dir.path().join("e.log"),
            Some(Duration::from_millis(200)),
        )
        .unwrap();
        assert!(result.timed_out);
        assert!(!result.success);
    }

    #[cfg(target_os = "linux")]
    fn is_running(pid: i32) -> bool {
        // a reaped process has no entry; a killed but unreaped one is a zombie
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .is_some_and(|(_, rest)| !rest.trim_start().starts_with('Z')),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_execute_logged_timeout_kills_process_group() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("grandchild.pid");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("sleep 30 & echo $! > {}; wait", pid_file.display()));
        let result = execute_logged(
            &mut cmd,
            &dir.path().join("o.log"),
            &dir.path().join("e.log"),
            Some(Duration::from_millis(300)),
        )
        .unwrap();
        assert!(result.timed_out);

        let pid: i32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let mut alive = is_running(pid);
        for _ in 0..50 {
            if !alive {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
            alive = is_running(pid);
        }
        assert!(!alive, "background sleep {pid} survived the timeout");
    }

    #[cfg(unix)]
    #[test]
    fn test_script_runner_runs_in_test_dir() {
        use crate::config::Config;
        use crate::suite::discover;

        let bin = tempfile::tempdir().unwrap();
        fake_tool(
            bin.path(),
            "visit",
            r#"echo "threads=$OMP_NUM_THREADS/$TBB_NUM_THREADS"
echo "cwd=$(pwd -P)"
echo "args=$*"
if [ -f "$4" ]; then echo "script=found"; else echo "script=missing"; fi
echo "visit warning" 1>&2
exit 2"#,
        );

        // a root named relative to the current directory
        let root = tempfile::tempdir_in(".").unwrap();
        let test_dir = root.path().join("VisIt_Vignettes/ex00_visitQuery");
        std::fs::create_dir_all(&test_dir).unwrap();
        std::fs::write(test_dir.join("ex00_visitQuery.py"), "# driver\n").unwrap();
        let relative_root = PathBuf::from(root.path().file_name().unwrap());

        let mut config = Config::default();
        config.runner.threads = 3;
        let ctx = Context::new(config, relative_root, "VisIt").unwrap();
        let cases = discover(&ctx).unwrap();
        assert_eq!(cases.len(), 1);

        let runner = ScriptRunner::with_locator(ToolLocator::new(vec![bin.path().to_path_buf()]));
        let result = runner.run(&ctx, &cases[0]).unwrap();
        assert_eq!(result.exit_code, 2);
        assert!(!result.success);

        let output = std::fs::read_to_string(cases[0].output_log()).unwrap();
        assert!(output.contains("threads=3/3"), "{output}");
        let cwd = std::fs::canonicalize(&test_dir).unwrap();
        assert!(output.contains(&format!("cwd={}", cwd.display())), "{output}");
        assert!(output.contains("args=-cli -nowin -s /"), "{output}");
        assert!(output.contains("script=found"), "{output}");

        let errors = std::fs::read_to_string(cases[0].error_log()).unwrap();
        assert_eq!(errors, "visit warning\n");
    }

    #[test]
    fn test_execute_logged_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let mut cmd = Command::new("definitely-not-a-real-program-xyz");
        let err = execute_logged(
            &mut cmd,
            &dir.path().join("o.log"),
            &dir.path().join("e.log"),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed to execute"));
    }
}

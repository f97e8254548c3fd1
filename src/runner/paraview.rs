use super::{ToolLauncher, ToolLocator};
use crate::config::{RunnerConfig, ToolKind};
use crate::core::error::{Error, Result};
use std::path::Path;
use std::process::Command;

/// Launches ParaView scripts through `pvbatch` under an MPI launcher.
///
/// `mpirun` is preferred; `srun` with the configured resource request is the
/// fallback. With neither available the launch is a configuration error.
pub struct ParaViewLauncher;

impl ParaViewLauncher {
    /// Create a new ParaView launcher.
    pub fn new() -> Self {
        Self
    }
}

impl Default for ParaViewLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolLauncher for ParaViewLauncher {
    fn command(
        &self,
        config: &RunnerConfig,
        locator: &ToolLocator,
        script: &Path,
    ) -> Result<Command> {
        let mut cmd = if let Some(mpirun) = locator.find("mpirun", "MPI_EXEC_PATH") {
            let mut cmd = Command::new(mpirun);
            cmd.args(&config.mpi_args);
            cmd
        } else if let Some(srun) = locator.find("srun", "SRUN_PATH") {
            let mut cmd = Command::new(srun);
            cmd.args(&config.srun_args);
            cmd
        } else {
            return Err(Error::config(
                "neither mpirun nor srun was found (set MPI_EXEC_PATH or SRUN_PATH, or add one to PATH)",
            ));
        };

        let pvbatch = locator.require("pvbatch", "PARAVIEW_PATH")?;
        cmd.arg(pvbatch);
        cmd.arg("--force-offscreen-rendering");
        cmd.arg(script);
        Ok(cmd)
    }

    fn tool(&self) -> ToolKind {
        ToolKind::ParaView
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::runner::tests::fake_tool;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_prefers_mpirun() {
        let bin = tempfile::tempdir().unwrap();
        let mpirun = fake_tool(bin.path(), "mpirun", "exit 0");
        fake_tool(bin.path(), "srun", "exit 0");
        let pvbatch = fake_tool(bin.path(), "pvbatch", "exit 0");
        let locator = ToolLocator::new(vec![bin.path().to_path_buf()]);

        let cmd = ParaViewLauncher::new()
            .command(&RunnerConfig::default(), &locator, Path::new("/t/ex01/pv.py"))
            .unwrap();

        assert_eq!(cmd.get_program(), mpirun.as_os_str());
        assert_eq!(
            args(&cmd),
            vec![
                "-np".to_string(),
                "1".to_string(),
                "--bind-to".to_string(),
                "none".to_string(),
                pvbatch.display().to_string(),
                "--force-offscreen-rendering".to_string(),
                "/t/ex01/pv.py".to_string(),
            ]
        );
    }

    #[test]
    fn test_falls_back_to_srun() {
        let bin = tempfile::tempdir().unwrap();
        let srun = fake_tool(bin.path(), "srun", "exit 0");
        fake_tool(bin.path(), "pvbatch", "exit 0");
        let locator = ToolLocator::new(vec![bin.path().to_path_buf()]);

        let cmd = ParaViewLauncher::new()
            .command(&RunnerConfig::default(), &locator, Path::new("pv.py"))
            .unwrap();

        assert_eq!(cmd.get_program(), srun.as_os_str());
        let args = args(&cmd);
        assert_eq!(args[0], "--hint=nomultithread");
        assert!(args.contains(&"--cpus-per-task=32".to_string()));
        assert_eq!(args.last().unwrap(), "pv.py");
    }

    #[test]
    fn test_no_launcher_names_both() {
        let bin = tempfile::tempdir().unwrap();
        fake_tool(bin.path(), "pvbatch", "exit 0");
        let locator = ToolLocator::new(vec![bin.path().to_path_buf()]);

        let err = ParaViewLauncher::new()
            .command(&RunnerConfig::default(), &locator, Path::new("pv.py"))
            .unwrap_err();
        let msg = err.to_string();
        assert!(err.is_fatal());
        assert!(msg.contains("mpirun"));
        assert!(msg.contains("srun"));
    }

    #[test]
    fn test_missing_pvbatch() {
        let bin = tempfile::tempdir().unwrap();
        fake_tool(bin.path(), "mpirun", "exit 0");
        let locator = ToolLocator::new(vec![bin.path().to_path_buf()]);

        let err = ParaViewLauncher::new()
            .command(&RunnerConfig::default(), &locator, Path::new("pv.py"))
            .unwrap_err();
        assert!(err.to_string().contains("PARAVIEW_PATH"));
    }
}

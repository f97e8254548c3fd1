use super::{ToolLauncher, ToolLocator};
use crate::config::{RunnerConfig, ToolKind};
use crate::core::error::Result;
use std::path::Path;
use std::process::Command;

/// Launches VisIt scripts as a single process: `visit -cli -nowin -s <script>`.
pub struct VisItLauncher;

impl VisItLauncher {
    /// Create a new VisIt launcher.
    pub fn new() -> Self {
        Self
    }
}

impl Default for VisItLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolLauncher for VisItLauncher {
    fn command(
        &self,
        _config: &RunnerConfig,
        locator: &ToolLocator,
        script: &Path,
    ) -> Result<Command> {
        let visit = locator.require("visit", "VISIT_PATH")?;
        let mut cmd = Command::new(visit);
        cmd.args(["-cli", "-nowin", "-s"]);
        cmd.arg(script);
        Ok(cmd)
    }

    fn tool(&self) -> ToolKind {
        ToolKind::VisIt
    }
}

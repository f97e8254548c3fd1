use crate::chart::{ChartRenderer, SvgRenderer};
use crate::config::{Config, ConfigLoader};
use crate::core::context::{Context, RunMode};
use crate::core::error::{Error, Result};
use crate::metrics::{RegressionDetector, TwoPointDetector};
use crate::runner::{Runner, ScriptRunner};
use crate::suite::TestSuite;
use std::path::PathBuf;

/// Builder for creating a test suite.
pub struct SuiteBuilder {
    config: Option<Config>,
    root_dir: Option<PathBuf>,
    test_type: Option<String>,
    machine_name: Option<String>,
    paraview_version: Option<String>,
    visit_version: Option<String>,
    mode: RunMode,
    accept_baseline: bool,
    runner: Option<Box<dyn Runner>>,
    detector: Option<Box<dyn RegressionDetector>>,
    renderer: Option<Box<dyn ChartRenderer>>,
}

impl SuiteBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: None,
            root_dir: None,
            test_type: None,
            machine_name: None,
            paraview_version: None,
            visit_version: None,
            mode: RunMode::Run,
            accept_baseline: false,
            runner: None,
            detector: None,
            renderer: None,
        }
    }

    /// Set the configuration directly.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from `<root>/vignette-runner.toml` (if present),
    /// the active profile, and the environment.
    ///
    /// Requires [`root_dir`](Self::root_dir) to be set first.
    pub fn load_config(self, config_file: Option<PathBuf>, profile: Option<String>) -> Result<Self> {
        let root_dir = self
            .root_dir
            .clone()
            .ok_or_else(|| Error::config("root directory not set (call root_dir first)"))?;

        let mut loader = ConfigLoader::new().root_dir(root_dir);
        if let Some(path) = config_file {
            loader = loader.config_file(path);
        }
        if let Some(name) = profile {
            loader = loader.profile(name);
        }
        let config = loader.load()?;
        Ok(self.with_config(config))
    }

    /// Set the repository root holding `<test_type>_Vignettes/`.
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Set the test tree selector, e.g. `ParaView` or `VisIt`.
    pub fn test_type(mut self, test_type: impl Into<String>) -> Self {
        self.test_type = Some(test_type.into());
        self
    }

    /// Override the machine name used for history and reports.
    pub fn machine_name(mut self, name: impl Into<String>) -> Self {
        self.machine_name = Some(name.into());
        self
    }

    /// Record the ParaView version with collected metrics.
    pub fn paraview_version(mut self, version: impl Into<String>) -> Self {
        self.paraview_version = Some(version.into());
        self
    }

    /// Record the VisIt version with collected metrics.
    pub fn visit_version(mut self, version: impl Into<String>) -> Self {
        self.visit_version = Some(version.into());
        self
    }

    /// Set the execution mode.
    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Allow creating missing baselines under the explicit baseline policy.
    pub fn accept_baseline(mut self, accept: bool) -> Self {
        self.accept_baseline = accept;
        self
    }

    // --- Components ---

    /// Set a custom runner implementation.
    pub fn runner<R: Runner + 'static>(mut self, runner: R) -> Self {
        self.runner = Some(Box::new(runner));
        self
    }

    /// Set a custom regression detector.
    pub fn detector<D: RegressionDetector + 'static>(mut self, detector: D) -> Self {
        self.detector = Some(Box::new(detector));
        self
    }

    /// Set a custom chart renderer.
    pub fn chart_renderer<C: ChartRenderer + 'static>(mut self, renderer: C) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    // --- Build ---

    /// Build the test suite.
    pub fn build(self) -> Result<TestSuite> {
        let config = self
            .config
            .ok_or_else(|| Error::config("no configuration provided"))?;

        let root_dir = self
            .root_dir
            .ok_or_else(|| Error::config("root directory not set (call root_dir)"))?;

        let test_type = self
            .test_type
            .ok_or_else(|| Error::MissingConfig("test_type".to_string()))?;

        let detector = match self.detector {
            Some(d) => d,
            None => Box::new(TwoPointDetector::new(config.regression.threshold)),
        };

        let mut ctx = Context::new(config, root_dir, test_type)?;
        if let Some(name) = self.machine_name {
            ctx.machine_name = name;
        }
        ctx.paraview_version = self.paraview_version;
        ctx.visit_version = self.visit_version;
        ctx.mode = self.mode;
        ctx.accept_baseline = self.accept_baseline;

        let runner = self
            .runner
            .unwrap_or_else(|| Box::new(ScriptRunner::new()));
        let renderer = self
            .renderer
            .unwrap_or_else(|| Box::new(SvgRenderer::default()));

        TestSuite::new(ctx, runner, detector, renderer)
    }
}

impl Default for SuiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("ParaView_Vignettes")).unwrap();
        dir
    }

    #[test]
    fn test_builder_error_missing_config() {
        let result = SuiteBuilder::new()
            .root_dir("/tmp")
            .test_type("ParaView")
            .build();
        let err = result.err().expect("should fail");
        assert!(err.to_string().contains("no configuration"));
    }

    #[test]
    fn test_builder_error_missing_root() {
        let result = SuiteBuilder::new()
            .with_config(Config::default())
            .test_type("ParaView")
            .build();
        let err = result.err().expect("should fail");
        assert!(err.to_string().contains("root directory"));
    }

    #[test]
    fn test_builder_error_missing_test_type() {
        let root = make_root();
        let result = SuiteBuilder::new()
            .with_config(Config::default())
            .root_dir(root.path())
            .build();
        let err = result.err().expect("should fail");
        assert!(matches!(err, Error::MissingConfig(_)));
    }

    #[test]
    fn test_builder_error_missing_tree() {
        let root = tempfile::tempdir().unwrap();
        let result = SuiteBuilder::new()
            .with_config(Config::default())
            .root_dir(root.path())
            .test_type("VisIt")
            .build();
        let err = result.err().expect("should fail");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_builder_sets_context() {
        let root = make_root();
        let suite = SuiteBuilder::new()
            .with_config(Config::default())
            .root_dir(root.path())
            .test_type("ParaView")
            .machine_name("ibex")
            .paraview_version("5.13.1")
            .mode(RunMode::MetricsOnly)
            .accept_baseline(true)
            .build()
            .unwrap();

        let ctx = suite.context();
        assert_eq!(ctx.machine_name, "ibex");
        assert_eq!(ctx.paraview_version.as_deref(), Some("5.13.1"));
        assert_eq!(ctx.visit_version, None);
        assert_eq!(ctx.mode, RunMode::MetricsOnly);
        assert!(ctx.accept_baseline);
    }

    #[test]
    fn test_builder_rejects_bad_ignore_pattern() {
        let root = make_root();
        let mut config = Config::default();
        config.comparison.ignore_patterns = vec!["(".to_string()];
        let result = SuiteBuilder::new()
            .with_config(config)
            .root_dir(root.path())
            .test_type("ParaView")
            .build();
        assert!(matches!(result, Err(Error::Comparison(_))));
    }

    #[test]
    fn test_load_config_requires_root() {
        let result = SuiteBuilder::new().load_config(None, None);
        assert!(result.is_err());
    }
}

use super::{CONFIG_FILE_NAME, Config};
use crate::core::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Configuration loader that supports multiple sources.
pub struct ConfigLoader {
    /// Repository root, searched for `vignette-runner.toml`.
    root_dir: Option<PathBuf>,
    /// Path to an explicit config file.
    config_file: Option<PathBuf>,
    /// Profile selected on the command line.
    profile: Option<String>,
}

impl ConfigLoader {
    /// Create a new configuration loader.
    pub fn new() -> Self {
        Self {
            root_dir: None,
            config_file: None,
            profile: None,
        }
    }

    /// Set the repository root directory.
    pub fn root_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(root.into());
        self
    }

    /// Set an explicit configuration file path.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Select a profile. Takes precedence over `VIGNETTE_RUNNER_PROFILE`.
    pub fn profile(mut self, name: impl Into<String>) -> Self {
        self.profile = Some(name.into());
        self
    }

    /// Load configuration from all enabled sources.
    ///
    /// Priority (later sources override earlier):
    /// 1. Default values
    /// 2. Explicit config file, or `<root>/vignette-runner.toml` when present
    /// 3. Profile overlay (`--profile` or `VIGNETTE_RUNNER_PROFILE`)
    /// 4. Individual env var overrides (`VIGNETTE_RUNNER_*`)
    pub fn load(self) -> Result<Config> {
        let mut value = serde_json::to_value(Config::default())
            .map_err(|e| Error::config(format!("failed to serialize config: {}", e)))?;
        let mut profiles: HashMap<String, serde_json::Value> = HashMap::new();

        if let Some(path) = self.resolve_config_path()? {
            let file_value = self.load_toml_file(&path)?;
            extract_profiles(&file_value, &mut profiles);
            deep_merge(&mut value, &file_value);
        }

        let profile_name = self.profile.clone().or_else(super::env::get_profile_name);
        if let Some(profile_name) = profile_name {
            let profile_value = profiles.get(&profile_name).ok_or_else(|| {
                let mut available: Vec<&str> = profiles.keys().map(|s| s.as_str()).collect();
                available.sort_unstable();
                if available.is_empty() {
                    Error::config(format!(
                        "profile '{}' not found (no profiles defined)",
                        profile_name,
                    ))
                } else {
                    Error::config(format!(
                        "profile '{}' not found. Available profiles: {}",
                        profile_name,
                        available.join(", "),
                    ))
                }
            })?;
            deep_merge(&mut value, profile_value);
        }

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("profiles");
        }

        let mut config: Config = serde_json::from_value(value)
            .map_err(|e| Error::config(format!("invalid configuration: {}", e)))?;

        super::env::apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Pick the config file to read, if any.
    ///
    /// An explicit file must exist; the root-level file is optional.
    fn resolve_config_path(&self) -> Result<Option<PathBuf>> {
        if let Some(ref path) = self.config_file {
            if !path.exists() {
                return Err(Error::FileNotFound(path.clone()));
            }
            return Ok(Some(path.clone()));
        }

        Ok(self
            .root_dir
            .as_ref()
            .map(|root| root.join(CONFIG_FILE_NAME))
            .filter(|p| p.is_file()))
    }

    /// Load a TOML file as a generic value so profiles can be overlaid.
    fn load_toml_file(&self, path: &Path) -> Result<serde_json::Value> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::config(format!("failed to parse TOML config: {}", e)))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract profile definitions from a config value.
///
/// Profiles live at `value["profiles"]` as `{ name: { ...config fields... } }`.
fn extract_profiles(
    value: &serde_json::Value,
    profiles: &mut HashMap<String, serde_json::Value>,
) {
    if let Some(serde_json::Value::Object(map)) = value.get("profiles") {
        for (name, profile_value) in map {
            profiles.insert(name.clone(), profile_value.clone());
        }
    }
}

/// Recursively deep-merge `overlay` into `base`.
///
/// - Objects: keys are merged recursively (overlay keys win for conflicts).
/// - Scalars and arrays: overlay replaces base entirely.
pub(crate) fn deep_merge(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let entry = base_map
                    .entry(key.clone())
                    .or_insert(serde_json::Value::Null);
                deep_merge(entry, overlay_val);
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

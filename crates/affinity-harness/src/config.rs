//! Configuration loading and validation

use affinity_core::{DeviceHierarchy, AFFINITY_MASK_ENV, HIERARCHY_ENV};
use affinity_verify::{ProbeCommand, ScenarioOptions};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
    #[serde(default)]
    pub enumeration: EnumerationConfig,
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Probe executable
    #[serde(default = "default_program")]
    pub program: PathBuf,
    /// Extra arguments placed before the driver identity
    #[serde(default)]
    pub args: Vec<String>,
    /// Variable the driver reads the affinity mask from
    #[serde(default = "default_mask_env")]
    pub mask_env: String,
    /// Variable the driver reads the hierarchy mode from
    #[serde(default = "default_hierarchy_env")]
    pub hierarchy_env: String,
    /// Per-line read deadline in seconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Deadline for the probe to exit after reporting, in seconds
    #[serde(default = "default_exit_timeout")]
    pub exit_timeout_secs: u64,
    /// Kill probes that miss the read deadline
    #[serde(default = "default_true")]
    pub kill_on_timeout: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            mask_env: default_mask_env(),
            hierarchy_env: default_hierarchy_env(),
            read_timeout_secs: default_read_timeout(),
            exit_timeout_secs: default_exit_timeout(),
            kill_on_timeout: true,
        }
    }
}

fn default_program() -> PathBuf {
    PathBuf::from("affinity-probe")
}

fn default_mask_env() -> String {
    AFFINITY_MASK_ENV.to_string()
}

fn default_hierarchy_env() -> String {
    HIERARCHY_ENV.to_string()
}

fn default_read_timeout() -> u64 {
    5
}

fn default_exit_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Path to the topology file
    #[serde(default = "default_topology_path")]
    pub path: PathBuf,
    /// Driver identity passed to the probe (defaults to the topology's driver)
    #[serde(default)]
    pub driver: Option<String>,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            path: default_topology_path(),
            driver: None,
        }
    }
}

fn default_topology_path() -> PathBuf {
    PathBuf::from("./topology.toml")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumerationConfig {
    /// Enumerate every leaf selection
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Refuse to enumerate forests with more leaves than this
    #[serde(default = "default_max_leaves")]
    pub max_leaves: usize,
    /// Run the hand-picked literal masks
    #[serde(default = "default_true")]
    pub literals: bool,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_leaves: default_max_leaves(),
            literals: true,
        }
    }
}

fn default_max_leaves() -> usize {
    affinity_core::enumerate::DEFAULT_MAX_LEAVES
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Hierarchy modes to verify
    #[serde(default = "default_modes")]
    pub modes: Vec<DeviceHierarchy>,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            modes: default_modes(),
        }
    }
}

fn default_modes() -> Vec<DeviceHierarchy> {
    DeviceHierarchy::ALL.to_vec()
}

impl Config {
    /// Convert to probe invocation settings
    pub fn to_probe_command(&self) -> ProbeCommand {
        ProbeCommand {
            program: self.probe.program.clone(),
            args: self.probe.args.clone(),
            mask_env: self.probe.mask_env.clone(),
            hierarchy_env: self.probe.hierarchy_env.clone(),
            read_timeout_ms: self.probe.read_timeout_secs.saturating_mul(1000),
            exit_timeout_ms: self.probe.exit_timeout_secs.saturating_mul(1000),
            kill_on_timeout: self.probe.kill_on_timeout,
        }
    }

    /// Convert to scenario selection
    pub fn to_scenario_options(&self) -> ScenarioOptions {
        ScenarioOptions {
            mask_env: self.probe.mask_env.clone(),
            hierarchy_env: self.probe.hierarchy_env.clone(),
            enumerate: self.enumeration.enabled,
            max_leaves: self.enumeration.max_leaves,
            literals: self.enumeration.literals,
            hierarchies: self.hierarchy.modes.clone(),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_saved_defaults_load_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("affinity.toml");
        save_default_config(&path).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.probe.program, PathBuf::from("affinity-probe"));
        assert_eq!(config.enumeration.max_leaves, 16);
        assert_eq!(config.hierarchy.modes, DeviceHierarchy::ALL.to_vec());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(&temp_dir.path().join("affinity.toml")).unwrap();
        assert_eq!(config.probe.mask_env, "ZE_AFFINITY_MASK");
        assert_eq!(config.probe.read_timeout_secs, 5);
        assert!(config.probe.kill_on_timeout);
        assert_eq!(config.hierarchy.modes.len(), 3);
    }

    #[test]
    fn test_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("affinity.toml");
        std::fs::write(
            &path,
            r#"
[probe]
program = "/opt/tests/device/affinity_helper"
read_timeout_secs = 2

[enumeration]
max_leaves = 8
literals = false

[hierarchy]
modes = ["COMPOSITE"]
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        let probe = config.to_probe_command();
        assert_eq!(probe.program, PathBuf::from("/opt/tests/device/affinity_helper"));
        assert_eq!(probe.read_timeout_ms, 2000);
        assert_eq!(probe.exit_timeout_ms, 10_000);
        assert_eq!(probe.mask_env, "ZE_AFFINITY_MASK");

        let options = config.to_scenario_options();
        assert!(options.enumerate);
        assert!(!options.literals);
        assert_eq!(options.max_leaves, 8);
        assert_eq!(options.hierarchies, vec![DeviceHierarchy::Composite]);
        assert_eq!(config.topology.path, PathBuf::from("./topology.toml"));
    }

    #[test]
    fn test_huge_timeouts_saturate() {
        let mut config = Config::default();
        config.probe.read_timeout_secs = u64::MAX;
        config.probe.exit_timeout_secs = u64::MAX / 10;
        let probe = config.to_probe_command();
        assert_eq!(probe.read_timeout_ms, u64::MAX);
        assert_eq!(probe.exit_timeout_ms, u64::MAX);
    }

    #[test]
    fn test_invalid_hierarchy_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("affinity.toml");
        std::fs::write(&path, "[hierarchy]\nmodes = [\"TREE\"]\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}

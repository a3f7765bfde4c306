//! Engine configuration
//!
//! Loaded from `engine.yaml`; every field has a default:
//!
//! ```yaml
//! node_timeout_ms: 30000
//! max_depth: 64
//! max_node_executions: 10000
//! strict_data_requirements: false
//!
//! # batch evaluation
//! parallel: 4
//! fail_fast: false
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::loader::LoadError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound for each business logic, data fetch or validator call
    #[serde(default = "default_node_timeout_ms")]
    pub node_timeout_ms: u64,

    /// Maximum number of nodes on one branch before it is aborted
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Node executions allowed in one run, across all branches
    #[serde(default = "default_max_node_executions")]
    pub max_node_executions: usize,

    /// Refuse to execute when declared required input fields are missing
    #[serde(default)]
    pub strict_data_requirements: bool,

    /// Applications evaluated concurrently by the batch evaluator
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    /// Stop starting batch evaluations after the first one that is not fully decisioned
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_node_timeout_ms() -> u64 {
    30_000
}

fn default_max_depth() -> usize {
    64
}

fn default_max_node_executions() -> usize {
    10_000
}

fn default_parallel() -> usize {
    4
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_timeout_ms: default_node_timeout_ms(),
            max_depth: default_max_depth(),
            max_node_executions: default_max_node_executions(),
            strict_data_requirements: false,
            parallel: default_parallel(),
            fail_fast: false,
        }
    }
}

impl EngineConfig {
    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        // an empty file is a valid, all-defaults config
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content).map_err(|e| LoadError::Yaml {
            file: path.display().to_string(),
            error: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_yaml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.node_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_depth, 64);
        assert_eq!(config.max_node_executions, 10_000);
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_yaml_str(
            r#"
node_timeout_ms: 250
fail_fast: true
"#,
        )
        .unwrap();
        assert_eq!(config.node_timeout_ms, 250);
        assert!(config.fail_fast);
        assert_eq!(config.parallel, 4);
        assert!(!config.strict_data_requirements);
    }

    #[test]
    fn test_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        fs::write(&path, "max_depth: 8\nparallel: 2\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.parallel, 2);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        fs::write(&path, "max_depth: [not, a, number]\n").unwrap();

        assert!(matches!(
            EngineConfig::load(&path),
            Err(LoadError::Yaml { .. })
        ));
    }
}

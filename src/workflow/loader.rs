//! Workflow definition loader
//!
//! Load definitions from YAML or JSON files, singly or by directory, and
//! application records for batch evaluation.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::graph::DefinitionError;
use super::WorkflowDefinition;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },

    #[error("JSON parse error in {file}: {error}")]
    Json {
        file: String,
        error: serde_json::Error,
    },

    #[error("Invalid workflow in {file}: {error}")]
    Invalid {
        file: String,
        error: DefinitionError,
    },

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),
}

/// Files in a workflow directory that are configuration, not definitions
const RESERVED_FILES: &[&str] = &["engine.yaml", "engine.yml"];

pub struct WorkflowLoader;

impl WorkflowLoader {
    /// Load every definition in a directory, sorted by workflow id
    pub fn load_directory(dir: &Path) -> Result<Vec<WorkflowDefinition>, LoadError> {
        let mut definitions = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if RESERVED_FILES.contains(&filename) {
                continue;
            }

            if matches!(extension(&path), Some("yaml" | "yml" | "json")) {
                definitions.push(Self::load_file(&path)?);
            }
        }

        definitions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(definitions)
    }

    /// Load and validate a single definition
    pub fn load_file(path: &Path) -> Result<WorkflowDefinition, LoadError> {
        let definition: WorkflowDefinition = parse_file(path)?;
        definition.validate().map_err(|error| LoadError::Invalid {
            file: path.display().to_string(),
            error,
        })?;
        Ok(definition)
    }

    /// Parse a definition from a YAML (or JSON) string and validate it
    pub fn from_yaml_str(content: &str) -> Result<WorkflowDefinition, LoadError> {
        let definition: WorkflowDefinition =
            serde_yaml::from_str(content).map_err(|error| LoadError::Yaml {
                file: "<inline>".to_string(),
                error,
            })?;
        definition.validate().map_err(|error| LoadError::Invalid {
            file: "<inline>".to_string(),
            error,
        })?;
        Ok(definition)
    }

    /// Load one application record from a JSON or YAML file
    pub fn load_record(path: &Path) -> Result<Value, LoadError> {
        parse_file(path)
    }

    /// Load application records (`*.json`) from a directory, keyed by file stem
    pub fn load_records(dir: &Path) -> Result<Vec<(String, Value)>, LoadError> {
        let mut records = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || extension(&path) != Some("json") {
                continue;
            }
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            records.push((id, parse_file(&path)?));
        }

        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// Parse a YAML or JSON file, chosen by extension
pub(crate) fn parse_file<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let content = std::fs::read_to_string(path)?;
    match extension(path) {
        Some("json") => serde_json::from_str(&content).map_err(|error| LoadError::Json {
            file: path.display().to_string(),
            error,
        }),
        Some("yaml" | "yml") => serde_yaml::from_str(&content).map_err(|error| LoadError::Yaml {
            file: path.display().to_string(),
            error,
        }),
        _ => Err(LoadError::UnsupportedFormat(path.display().to_string())),
    }
}

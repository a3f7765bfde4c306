//! Fixture-backed data fetcher
//!
//! Answers `api` and `database` descriptors from canned responses and reads
//! `file` descriptors from disk. A fixtures file maps endpoints and queries to
//! JSON objects:
//!
//! ```json
//! {
//!   "api": { "/bureau/score": { "bureauScore": 720 } },
//!   "database": { "select * from accounts": { "accounts": 3 } }
//! }
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{DataFetcher, ServiceError};
use crate::engine::context::ExecutionContext;
use crate::workflow::loader::{parse_file, LoadError};
use crate::workflow::DataSource;

#[derive(Debug, Default, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    api: HashMap<String, Map<String, Value>>,
    #[serde(default)]
    database: HashMap<String, Map<String, Value>>,
}

/// Data fetcher with canned responses. Read-only once built, so it is
/// safe to call from concurrent branches.
#[derive(Debug, Default)]
pub struct FixtureDataFetcher {
    api: HashMap<String, Map<String, Value>>,
    database: HashMap<String, Map<String, Value>>,
    /// Relative `file` paths are resolved against this directory
    base_dir: Option<PathBuf>,
}

impl FixtureDataFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load fixtures from a JSON or YAML file
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let fixtures: FixtureFile = parse_file(path)?;
        Ok(Self {
            api: fixtures.api,
            database: fixtures.database,
            base_dir: path.parent().map(Path::to_path_buf),
        })
    }

    pub fn with_api(mut self, endpoint: &str, data: Map<String, Value>) -> Self {
        self.api.insert(endpoint.to_string(), data);
        self
    }

    pub fn with_query(mut self, query: &str, data: Map<String, Value>) -> Self {
        self.database.insert(query.to_string(), data);
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }
}

#[async_trait]
impl DataFetcher for FixtureDataFetcher {
    async fn fetch(
        &self,
        source: &DataSource,
        _context: &ExecutionContext,
    ) -> Result<Map<String, Value>, ServiceError> {
        match source {
            DataSource::Api { endpoint, .. } => self
                .api
                .get(endpoint)
                .cloned()
                .ok_or_else(|| ServiceError::NotRegistered(format!("api fixture '{}'", endpoint))),
            DataSource::Database { query, .. } => self
                .database
                .get(query)
                .cloned()
                .ok_or_else(|| ServiceError::NotRegistered(format!("query fixture '{}'", query))),
            DataSource::File { path } => {
                let path = self.resolve_path(path);
                debug!("Reading data file {}", path.display());
                let content = tokio::fs::read_to_string(&path).await?;
                match serde_json::from_str::<Value>(&content)? {
                    Value::Object(map) => Ok(map),
                    _ => Err(ServiceError::Failed(format!(
                        "{} does not contain a JSON object",
                        path.display()
                    ))),
                }
            }
            DataSource::Unknown => Err(ServiceError::Unsupported(source.type_name().to_string())),
        }
    }
}

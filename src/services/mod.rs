//! Collaborator capabilities used by node handlers
//!
//! The engine never talks to the outside world itself. Node handlers delegate
//! to three capabilities:
//! - [`BusinessLogicExecutor`] for action and decision nodes
//! - [`DataFetcher`] for data_source nodes
//! - [`Validator`] for validation nodes
//!
//! Built-in implementations (`registry`, `fixtures`, `schema`) make the engine
//! usable for dry runs and tests; production deployments plug in their own.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::engine::context::ExecutionContext;
use crate::workflow::{BusinessLogic, DataSource, ValidationRule};

pub mod fixtures;
pub mod registry;
pub mod schema;

pub use fixtures::FixtureDataFetcher;
pub use registry::LogicRegistry;
pub use schema::SchemaValidator;

/// Common error type for collaborator calls
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Not registered: {0}")]
    NotRegistered(String),

    #[error("Unsupported descriptor: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Failed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Runs `custom` and `service_call` business logic
///
/// Calls must be idempotent: a node reached by several paths runs once per path.
#[async_trait]
pub trait BusinessLogicExecutor: Send + Sync {
    async fn execute(
        &self,
        logic: &BusinessLogic,
        context: &ExecutionContext,
    ) -> Result<Value, ServiceError>;
}

/// Fetches key/value data for data_source nodes
///
/// Called concurrently from independent branches.
#[async_trait]
pub trait DataFetcher: Send + Sync {
    async fn fetch(
        &self,
        source: &DataSource,
        context: &ExecutionContext,
    ) -> Result<Map<String, Value>, ServiceError>;
}

/// Judges the execution context against a validation descriptor
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(
        &self,
        rule: &ValidationRule,
        context: &ExecutionContext,
    ) -> Result<bool, ServiceError>;
}

/// The set of collaborators an engine dispatches to
#[derive(Clone)]
pub struct Collaborators {
    pub logic: Arc<dyn BusinessLogicExecutor>,
    pub fetcher: Arc<dyn DataFetcher>,
    pub validator: Arc<dyn Validator>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            logic: Arc::new(LogicRegistry::new()),
            fetcher: Arc::new(FixtureDataFetcher::new()),
            validator: Arc::new(SchemaValidator::new()),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

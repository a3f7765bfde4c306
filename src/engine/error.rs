//! Engine error types

use crate::services::ServiceError;

/// Errors that can occur while executing a workflow
///
/// Everything except [`EngineError::NoStartNode`] and
/// [`EngineError::MissingRequiredData`] is fatal to one branch only: it is
/// recorded in the execution log and error list, and sibling branches keep
/// running.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Workflow '{0}' has no start node")]
    NoStartNode(String),

    #[error("Node '{node_id}' is missing its {field} configuration")]
    MissingConfiguration {
        node_id: String,
        field: &'static str,
    },

    #[error("Node '{node_id}' has invalid configuration: {reason}")]
    InvalidConfiguration { node_id: String, reason: String },

    #[error("Connection '{connection_id}' targets unknown node '{target}'")]
    TargetNodeNotFound {
        connection_id: String,
        target: String,
    },

    #[error("{source}")]
    Service {
        node_id: String,
        #[source]
        source: ServiceError,
    },

    #[error("Node '{node_id}' timed out after {timeout_ms}ms")]
    Timeout { node_id: String, timeout_ms: u64 },

    #[error("Node '{node_id}' exceeds the maximum branch depth of {max_depth}")]
    MaxDepthExceeded { node_id: String, max_depth: usize },

    #[error("Node '{node_id}' exceeds the run budget of {limit} node executions")]
    NodeBudgetExceeded { node_id: String, limit: usize },

    #[error("Missing required data: {}", .0.join(", "))]
    MissingRequiredData(Vec<String>),
}

impl EngineError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NoStartNode(_) => "no_start_node",
            EngineError::MissingConfiguration { .. } => "missing_configuration",
            EngineError::InvalidConfiguration { .. } => "invalid_configuration",
            EngineError::TargetNodeNotFound { .. } => "target_node_not_found",
            EngineError::Service { .. } => "service_error",
            EngineError::Timeout { .. } => "timeout",
            EngineError::MaxDepthExceeded { .. } => "max_depth_exceeded",
            EngineError::NodeBudgetExceeded { .. } => "node_budget_exceeded",
            EngineError::MissingRequiredData(_) => "missing_required_data",
        }
    }
}

//! Node handlers by kind
//!
//! Each submodule holds the handlers for a family of node kinds. Dispatch is
//! a single match on the typed node configuration, so a node can only ever
//! reach the handler for its own kind.

pub mod evaluation;
pub mod flow;
pub mod logic;
pub mod source;
pub mod validation;

use std::future::Future;
use std::time::Duration;

use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::engine::result::NodeResult;
use crate::services::{Collaborators, ServiceError};
use crate::workflow::{NodeConfig, WorkflowNode};

/// What a handler may use besides its own node
pub struct NodeRuntime<'a> {
    pub context: &'a ExecutionContext,
    pub collaborators: &'a Collaborators,
    pub timeout: Duration,
}

impl NodeRuntime<'_> {
    /// Run a collaborator call under the node timeout, tagging errors with the node id
    pub(crate) async fn call<T, F>(&self, node_id: &str, call: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(EngineError::Service {
                node_id: node_id.to_string(),
                source,
            }),
            Err(_) => Err(EngineError::Timeout {
                node_id: node_id.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

/// Execute a node with the handler for its kind
pub async fn execute_node(
    node: &WorkflowNode,
    runtime: &NodeRuntime<'_>,
) -> Result<NodeResult, EngineError> {
    match &node.config {
        NodeConfig::Start => Ok(flow::execute_start(runtime.context)),
        NodeConfig::End => Ok(flow::execute_end(runtime.context)),
        NodeConfig::Condition { conditions } => {
            Ok(evaluation::execute_condition(conditions, runtime.context))
        }
        NodeConfig::RuleSet { rules } => {
            evaluation::execute_rule_set(&node.id, rules, runtime.context)
        }
        NodeConfig::Action { business_logic } => {
            logic::execute_action(&node.id, business_logic.as_ref(), runtime).await
        }
        NodeConfig::Decision { business_logic } => {
            logic::execute_decision(&node.id, business_logic.as_ref(), runtime).await
        }
        NodeConfig::DataSource { data_source } => {
            source::execute_data_source(&node.id, data_source.as_ref(), runtime).await
        }
        NodeConfig::Validation { validation } => {
            validation::execute_validation(&node.id, validation.as_ref(), runtime).await
        }
    }
}

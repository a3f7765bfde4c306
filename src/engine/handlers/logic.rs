//! Action and decision nodes
//!
//! Both delegate to the business logic executor. A node without a descriptor
//! fails with `MissingConfiguration`; a descriptor of an unrecognized type
//! produces [`LogicOutcome::Unknown`] without calling the executor.
//!
//! Example:
//! ```yaml
//! - id: price
//!   type: action
//!   business_logic:
//!     type: custom
//!     function: risk_based_pricing
//!     params: { base_rate: 5.25 }
//!
//! - id: decide
//!   type: decision
//!   business_logic:
//!     type: service_call
//!     service: underwriting
//!     operation: decide
//! ```

use tracing::warn;

use super::NodeRuntime;
use crate::engine::error::EngineError;
use crate::engine::result::{LogicOutcome, NodeResult};
use crate::workflow::BusinessLogic;

pub async fn execute_action(
    node_id: &str,
    logic: Option<&BusinessLogic>,
    runtime: &NodeRuntime<'_>,
) -> Result<NodeResult, EngineError> {
    run_logic(node_id, logic, runtime).await.map(NodeResult::Action)
}

pub async fn execute_decision(
    node_id: &str,
    logic: Option<&BusinessLogic>,
    runtime: &NodeRuntime<'_>,
) -> Result<NodeResult, EngineError> {
    run_logic(node_id, logic, runtime).await.map(NodeResult::Decision)
}

async fn run_logic(
    node_id: &str,
    logic: Option<&BusinessLogic>,
    runtime: &NodeRuntime<'_>,
) -> Result<LogicOutcome, EngineError> {
    let logic = logic.ok_or_else(|| EngineError::MissingConfiguration {
        node_id: node_id.to_string(),
        field: "business_logic",
    })?;

    if let BusinessLogic::Unknown = logic {
        warn!("Node '{}' has an unrecognized business logic type", node_id);
        return Ok(LogicOutcome::Unknown);
    }

    let executor = &runtime.collaborators.logic;
    let value = runtime
        .call(node_id, executor.execute(logic, runtime.context))
        .await?;
    Ok(LogicOutcome::Completed(value))
}

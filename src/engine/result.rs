//! Execution result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::engine::metrics::ExecutionMetrics;
use crate::workflow::{NodeKind, Operator};

/// Result produced by a node handler, tagged with the node kind
///
/// Serializes as `{ "kind": "...", "payload": ... }`; the payload is also what
/// guard conditions on the node's outgoing connections are evaluated against.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "TaggedResult")]
pub enum NodeResult {
    Start(Value),
    End(Value),
    Condition(ConditionOutcome),
    Action(LogicOutcome),
    DataSource(DataOutcome),
    RuleSet(RuleSetOutcome),
    Decision(LogicOutcome),
    Validation(ValidationOutcome),
}

impl NodeResult {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeResult::Start(_) => NodeKind::Start,
            NodeResult::End(_) => NodeKind::End,
            NodeResult::Condition(_) => NodeKind::Condition,
            NodeResult::Action(_) => NodeKind::Action,
            NodeResult::DataSource(_) => NodeKind::DataSource,
            NodeResult::RuleSet(_) => NodeKind::RuleSet,
            NodeResult::Decision(_) => NodeKind::Decision,
            NodeResult::Validation(_) => NodeKind::Validation,
        }
    }

    /// The result as a plain JSON value
    pub fn payload(&self) -> Value {
        match self {
            NodeResult::Start(v) | NodeResult::End(v) => v.clone(),
            NodeResult::Action(outcome) | NodeResult::Decision(outcome) => outcome.to_value(),
            NodeResult::DataSource(outcome) => outcome.to_value(),
            NodeResult::Condition(outcome) => serde_json::to_value(outcome).unwrap_or_default(),
            NodeResult::RuleSet(outcome) => serde_json::to_value(outcome).unwrap_or_default(),
            NodeResult::Validation(outcome) => serde_json::to_value(outcome).unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct TaggedResult {
    kind: NodeKind,
    payload: Value,
}

impl From<NodeResult> for TaggedResult {
    fn from(result: NodeResult) -> Self {
        TaggedResult {
            kind: result.kind(),
            payload: result.payload(),
        }
    }
}

/// Outcome of a condition node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionOutcome {
    pub all_conditions_true: bool,
    pub any_condition_true: bool,
    pub results: Vec<ConditionCheck>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionCheck {
    pub field: String,
    pub operator: Operator,
    pub passed: bool,
}

/// Outcome of an action or decision node
#[derive(Debug, Clone, PartialEq)]
pub enum LogicOutcome {
    Completed(Value),
    /// The descriptor type was not recognized; no collaborator was called
    Unknown,
}

impl LogicOutcome {
    fn to_value(&self) -> Value {
        match self {
            LogicOutcome::Completed(value) => value.clone(),
            LogicOutcome::Unknown => unknown_payload(),
        }
    }
}

/// Outcome of a data_source node
#[derive(Debug, Clone, PartialEq)]
pub enum DataOutcome {
    Fetched(Map<String, Value>),
    /// The descriptor type was not recognized; nothing was fetched
    Unknown,
}

impl DataOutcome {
    fn to_value(&self) -> Value {
        match self {
            DataOutcome::Fetched(data) => Value::Object(data.clone()),
            DataOutcome::Unknown => unknown_payload(),
        }
    }
}

fn unknown_payload() -> Value {
    json!({ "status": "unknown" })
}

/// Outcome of a rule_set node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetOutcome {
    pub rules: Vec<RuleOutcome>,
    pub all_passed: bool,
    pub any_passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleOutcome {
    pub rule_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub passed: bool,
    /// The rule's configured outcome, present only when it passed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Value>,
}

/// Outcome of a validation node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub is_valid: bool,
}

// ============================================================================
// Execution log
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Started,
    Completed,
    Error,
}

/// One append-only entry of the execution log
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    pub node_id: String,
    pub node_kind: NodeKind,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub status: LogStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<NodeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An error recorded against a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFailure {
    pub node_id: String,
    pub code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Branch outcomes
// ============================================================================

/// What one branch of the traversal returned to its parent
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BranchOutcome {
    /// The branch reached an end node or a node without outgoing connections
    Completed { node_id: String, result: NodeResult },
    /// The node fanned out; one entry per connection whose guards held
    Forked {
        node_id: String,
        branches: Vec<BranchOutcome>,
    },
    /// The branch aborted at `node_id`
    Failed { node_id: String, error: String },
}

impl BranchOutcome {
    pub fn node_id(&self) -> &str {
        match self {
            BranchOutcome::Completed { node_id, .. }
            | BranchOutcome::Forked { node_id, .. }
            | BranchOutcome::Failed { node_id, .. } => node_id,
        }
    }

    /// Results of every completed leaf, depth first
    pub fn completed(&self) -> Vec<&NodeResult> {
        let mut leaves = Vec::new();
        self.collect_completed(&mut leaves);
        leaves
    }

    fn collect_completed<'a>(&'a self, leaves: &mut Vec<&'a NodeResult>) {
        match self {
            BranchOutcome::Completed { result, .. } => leaves.push(result),
            BranchOutcome::Forked { branches, .. } => {
                for branch in branches {
                    branch.collect_completed(leaves);
                }
            }
            BranchOutcome::Failed { .. } => {}
        }
    }

    pub fn has_failures(&self) -> bool {
        match self {
            BranchOutcome::Completed { .. } => false,
            BranchOutcome::Forked { branches, .. } => branches.iter().any(|b| b.has_failures()),
            BranchOutcome::Failed { .. } => true,
        }
    }
}

// ============================================================================
// Execution result
// ============================================================================

/// Lifecycle state of one execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    #[default]
    Pending,
    Running,
    /// Every branch completed without errors
    Completed,
    /// Some branches failed, at least one completed
    PartiallyCompleted,
    /// No branch completed
    Failed,
}

impl ExecutionState {
    /// Classify a finished run from its branch outcomes and error count
    pub fn classify(results: &[BranchOutcome], error_count: usize) -> Self {
        if error_count == 0 {
            ExecutionState::Completed
        } else if results.iter().any(|r| !r.completed().is_empty()) {
            ExecutionState::PartiallyCompleted
        } else {
            ExecutionState::Failed
        }
    }
}

/// Result of a workflow execution
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub execution_id: String,
    pub workflow_id: String,
    /// SHA-256 of the executed definition
    pub definition_digest: String,
    /// One outcome per start node, in declaration order
    pub results: Vec<BranchOutcome>,
    pub execution_log: Vec<ExecutionLogEntry>,
    pub errors: Vec<NodeFailure>,
    pub output: Map<String, Value>,
    pub node_results: BTreeMap<String, NodeResult>,
    pub metrics: ExecutionMetrics,
    pub status: ExecutionState,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    /// True when every branch completed without errors
    pub fn is_fully_decisioned(&self) -> bool {
        self.status == ExecutionState::Completed
    }

    /// Log entries for one node, in append order
    pub fn log_for<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a ExecutionLogEntry> {
        self.execution_log.iter().filter(move |e| e.node_id == node_id)
    }
}

//! Execution context for one workflow run
//!
//! The context is created for a single `execute` call and owned by it. The
//! input payload is read-only; everything the traversal writes (output data,
//! node results, errors, the execution log, metrics) sits behind one mutex
//! that is only ever held for the duration of a single read or write, never
//! across an await.

use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::engine::error::EngineError;
use crate::engine::metrics::ExecutionMetrics;
use crate::engine::result::{
    ExecutionLogEntry, ExecutionState, LogStatus, NodeFailure, NodeResult,
};
use crate::workflow::WorkflowNode;

/// Runtime state of one workflow execution
#[derive(Debug)]
pub struct ExecutionContext {
    execution_id: String,
    workflow_id: String,
    input: Value,
    state: Mutex<ContextState>,
}

#[derive(Debug, Default)]
pub(crate) struct ContextState {
    pub(crate) execution_state: ExecutionState,
    pub(crate) output: Map<String, Value>,
    pub(crate) node_results: BTreeMap<String, NodeResult>,
    pub(crate) errors: Vec<NodeFailure>,
    pub(crate) log: Vec<ExecutionLogEntry>,
    pub(crate) metrics: ExecutionMetrics,
}

impl ExecutionContext {
    /// Create a pending context with a generated execution id
    pub fn new(workflow_id: impl Into<String>, input: Value) -> Self {
        Self {
            execution_id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            input,
            state: Mutex::new(ContextState::default()),
        }
    }

    /// Use a caller supplied execution id (e.g. a request id)
    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = execution_id.into();
        self
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// The application payload
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Copy of the accumulated output data
    pub fn output(&self) -> Map<String, Value> {
        self.lock().output.clone()
    }

    /// Read the output data without copying it
    pub fn with_output<R>(&self, f: impl FnOnce(&Map<String, Value>) -> R) -> R {
        f(&self.lock().output)
    }

    /// Merge fetched data into the output. Existing keys are overwritten.
    pub fn merge_output(&self, data: &Map<String, Value>) {
        let mut state = self.lock();
        for (key, value) in data {
            state.output.insert(key.clone(), value.clone());
        }
    }

    pub fn node_result(&self, node_id: &str) -> Option<NodeResult> {
        self.lock().node_results.get(node_id).cloned()
    }

    /// JSON payload of an executed node's result
    pub fn node_payload(&self, node_id: &str) -> Option<Value> {
        self.lock().node_results.get(node_id).map(NodeResult::payload)
    }

    pub fn execution_state(&self) -> ExecutionState {
        self.lock().execution_state
    }

    pub fn errors(&self) -> Vec<NodeFailure> {
        self.lock().errors.clone()
    }

    pub fn log(&self) -> Vec<ExecutionLogEntry> {
        self.lock().log.clone()
    }

    pub fn metrics(&self) -> ExecutionMetrics {
        self.lock().metrics.clone()
    }

    // ------------------------------------------------------------------------
    // Recorders used by the traversal
    // ------------------------------------------------------------------------

    pub(crate) fn set_state(&self, execution_state: ExecutionState) {
        self.lock().execution_state = execution_state;
    }

    pub(crate) fn log_started(&self, node: &WorkflowNode) {
        let entry = log_entry(node, LogStatus::Started, None, None);
        self.lock().log.push(entry);
    }

    pub(crate) fn record_completion(
        &self,
        node: &WorkflowNode,
        result: &NodeResult,
        elapsed: Duration,
    ) {
        let mut state = self.lock();
        let entry = log_entry(node, LogStatus::Completed, Some(result.clone()), None);
        state.log.push(entry);
        state.node_results.insert(node.id.clone(), result.clone());
        state.metrics.record_node(&node.id, elapsed, false);
    }

    pub(crate) fn record_failure(
        &self,
        node: &WorkflowNode,
        error: &EngineError,
        elapsed: Duration,
    ) {
        let mut state = self.lock();
        let entry = log_entry(node, LogStatus::Error, None, Some(error.to_string()));
        state.log.push(entry);
        state.errors.push(failure(&node.id, error));
        state.metrics.record_node(&node.id, elapsed, true);
    }

    /// Record an error that has no node to log against
    pub(crate) fn record_error(&self, node_id: &str, error: &EngineError) {
        self.lock().errors.push(failure(node_id, error));
    }

    pub(crate) fn record_data_source_time(&self, node_id: &str, elapsed: Duration) {
        self.lock().metrics.record_data_source(node_id, elapsed);
    }

    /// Consume the context once traversal is over
    pub(crate) fn into_state(self) -> ContextState {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // A panicking collaborator must not take the whole record down with it
    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn log_entry(
    node: &WorkflowNode,
    status: LogStatus,
    result: Option<NodeResult>,
    error: Option<String>,
) -> ExecutionLogEntry {
    ExecutionLogEntry {
        node_id: node.id.clone(),
        node_kind: node.kind(),
        label: node.display_label().to_string(),
        timestamp: Utc::now(),
        status,
        result,
        error,
    }
}

fn failure(node_id: &str, error: &EngineError) -> NodeFailure {
    NodeFailure {
        node_id: node_id.to_string(),
        code: error.code().to_string(),
        message: error.to_string(),
        timestamp: Utc::now(),
    }
}

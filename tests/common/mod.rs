#![allow(dead_code)]

use async_trait::async_trait;
use decision_flow::prelude::*;
use decision_flow::workflow::{BusinessLogic, DataSource, ValidationRule};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

pub fn write_file(dir: &Path, filename: &str, content: &str) {
    fs::write(dir.join(filename), content).expect("Failed to write file");
}

// ============================================================================
// Definition builders
// ============================================================================

pub fn definition(
    id: &str,
    nodes: Vec<WorkflowNode>,
    connections: Vec<WorkflowConnection>,
) -> WorkflowDefinition {
    let mut def = WorkflowDefinition::new(id);
    def.nodes = nodes;
    def.connections = connections;
    def
}

pub fn start(id: &str) -> WorkflowNode {
    WorkflowNode::new(id, NodeConfig::Start)
}

pub fn end(id: &str) -> WorkflowNode {
    WorkflowNode::new(id, NodeConfig::End)
}

pub fn condition(id: &str, conditions: Vec<Condition>) -> WorkflowNode {
    WorkflowNode::new(id, NodeConfig::Condition { conditions })
}

pub fn action(id: &str, function: Option<&str>) -> WorkflowNode {
    WorkflowNode::new(
        id,
        NodeConfig::Action {
            business_logic: function.map(|f| BusinessLogic::Custom {
                function: f.to_string(),
                params: Map::new(),
            }),
        },
    )
}

pub fn data_source(id: &str, endpoint: &str) -> WorkflowNode {
    WorkflowNode::new(
        id,
        NodeConfig::DataSource {
            data_source: Some(DataSource::Api {
                endpoint: endpoint.to_string(),
                method: None,
                params: Map::new(),
            }),
        },
    )
}

pub fn connect(id: &str, source: &str, target: &str) -> WorkflowConnection {
    WorkflowConnection::new(id, source, target)
}

pub fn when(field: &str, operator: Operator, value: Value) -> Condition {
    Condition::new(field, operator, value)
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

/// start -> end, unguarded
pub fn simple_workflow_yaml(id: &str) -> String {
    format!(
        r#"
id: {}
version: "1.0.0"
status: active
nodes:
  - id: start
    type: start
  - id: end
    type: end
connections:
  - id: c1
    source: start
    target: end
"#,
        id
    )
}

/// Credit check: bureau lookup, then approve / refer / decline by score
pub fn credit_workflow_yaml() -> &'static str {
    r#"
id: credit-check
name: Credit check
version: "2.0.0"
status: active
data_requirements:
  required: [applicant.name, riskScore]
nodes:
  - id: start
    type: start
    label: Application received
  - id: kyc
    type: validation
    validation:
      type: schema
      schema:
        required: [applicant.name]
        fields:
          riskScore: { type: number, min: 300, max: 850 }
  - id: bureau
    type: data_source
    data_source:
      type: api
      endpoint: /bureau/score
  - id: policy
    type: rule_set
    rules:
      - id: prime
        outcome: approve
        conditions:
          - { field: output.bureauScore, operator: greater_than, value: 700 }
          - { field: input.riskScore, operator: greater_than, value: 700 }
      - id: thin-file
        match: any
        outcome: refer
        conditions:
          - { field: flags, operator: contains, value: thin_file }
  - id: decide
    type: decision
    business_logic:
      type: custom
      function: decide
  - id: approve
    type: end
    label: Approved
  - id: decline
    type: end
    label: Declined
connections:
  - id: c1
    source: start
    target: kyc
  - id: c2
    source: kyc
    target: bureau
    condition: { field: isValid, operator: equals, value: true }
  - id: c3
    source: bureau
    target: policy
  - id: c4
    source: policy
    target: decide
  - id: c5
    source: decide
    target: approve
    condition: { field: decision, operator: equals, value: approve }
  - id: c6
    source: decide
    target: decline
    condition: { field: decision, operator: not_equals, value: approve }
"#
}

/// Registry whose `decide` function approves when the prime rule passed
pub fn decision_registry() -> LogicRegistry {
    LogicRegistry::new().function("decide", "Final credit decision", |_params, ctx| {
        let prime = ctx
            .node_payload("policy")
            .and_then(|p| p["rules"][0]["passed"].as_bool())
            .unwrap_or(false);
        Ok(serde_json::json!({
            "decision": if prime { "approve" } else { "decline" }
        }))
    })
}

// ============================================================================
// Collaborator doubles
// ============================================================================

/// Fetcher that answers each endpoint after a configurable delay and counts calls
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: HashMap<String, (Duration, Map<String, Value>)>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, endpoint: &str, delay: Duration, data: Value) -> Self {
        self.responses
            .insert(endpoint.to_string(), (delay, object(data)));
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl DataFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        source: &DataSource,
        _context: &ExecutionContext,
    ) -> Result<Map<String, Value>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let endpoint = match source {
            DataSource::Api { endpoint, .. } => endpoint,
            other => return Err(ServiceError::Unsupported(other.type_name().to_string())),
        };
        let (delay, data) = self
            .responses
            .get(endpoint)
            .ok_or_else(|| ServiceError::NotRegistered(endpoint.clone()))?;
        tokio::time::sleep(*delay).await;
        Ok(data.clone())
    }
}

/// Business logic executor that always fails with the given message
pub struct FailingLogic(pub &'static str);

#[async_trait]
impl BusinessLogicExecutor for FailingLogic {
    async fn execute(
        &self,
        _logic: &BusinessLogic,
        _context: &ExecutionContext,
    ) -> Result<Value, ServiceError> {
        Err(ServiceError::Failed(self.0.to_string()))
    }
}

/// Validator that approves every descriptor it is handed
pub struct ApproveAll;

#[async_trait]
impl Validator for ApproveAll {
    async fn validate(
        &self,
        _rule: &ValidationRule,
        _context: &ExecutionContext,
    ) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

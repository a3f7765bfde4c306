//! Workflow definition types
//!
//! A definition is a graph of typed nodes joined by directed, optionally
//! guarded connections. Each node carries a configuration payload whose shape
//! is fixed by its kind; a payload that does not match its kind is rejected
//! when the definition is deserialized.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::condition::Condition;
use super::fields::resolve_in;
use super::graph::{DefinitionError, WorkflowGraph};

// ============================================================================
// Workflow
// ============================================================================

/// A complete decision workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow identity (required)
    pub id: String,

    /// Human readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub status: WorkflowStatus,

    /// Nodes, in declaration order. Start nodes are run in this order.
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,

    #[serde(default)]
    pub connections: Vec<WorkflowConnection>,

    /// Fields the workflow expects on the application payload
    #[serde(default, alias = "dataRequirements")]
    pub data_requirements: DataRequirements,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl WorkflowDefinition {
    /// Create an empty draft definition
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            version: default_version(),
            status: WorkflowStatus::default(),
            nodes: Vec::new(),
            connections: Vec::new(),
            data_requirements: DataRequirements::default(),
        }
    }

    /// Look up a node by id
    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Start nodes in declaration order
    pub fn start_nodes(&self) -> impl Iterator<Item = &WorkflowNode> {
        self.nodes.iter().filter(|n| n.kind() == NodeKind::Start)
    }

    /// Outgoing connections of a node in declaration order
    pub fn outgoing(&self, node_id: &str) -> impl Iterator<Item = &WorkflowConnection> + '_ {
        let node_id = node_id.to_string();
        self.connections.iter().filter(move |c| c.source == node_id)
    }

    /// Check the structural invariants of the definition
    pub fn validate(&self) -> Result<WorkflowGraph<'_>, DefinitionError> {
        WorkflowGraph::build(self)
    }

    /// SHA-256 digest of the canonical JSON form, hex encoded
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

/// Lifecycle status of a definition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Inactive,
    Deprecated,
    Archived,
}

/// Declared data requirements of a workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRequirements {
    /// Dotted paths that must be present on the application payload
    #[serde(default)]
    pub required: Vec<String>,

    #[serde(default)]
    pub optional: Vec<String>,

    /// Fields expected to be supplied by data_source nodes
    #[serde(default)]
    pub external: Vec<String>,
}

impl DataRequirements {
    /// Required paths that are absent or null in `input`
    pub fn missing_required(&self, input: &Value) -> Vec<String> {
        self.required
            .iter()
            .filter(|path| !matches!(resolve_in(input, path), Some(v) if !v.is_null()))
            .cloned()
            .collect()
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// The eight recognized node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    End,
    Condition,
    Action,
    DataSource,
    RuleSet,
    Decision,
    Validation,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::Condition => "condition",
            NodeKind::Action => "action",
            NodeKind::DataSource => "data_source",
            NodeKind::RuleSet => "rule_set",
            NodeKind::Decision => "decision",
            NodeKind::Validation => "validation",
        }
    }

    /// Whether traversal may continue past a node of this kind
    pub fn may_branch(&self) -> bool {
        !matches!(self, NodeKind::End)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(NodeKind::Start),
            "end" => Ok(NodeKind::End),
            "condition" => Ok(NodeKind::Condition),
            "action" => Ok(NodeKind::Action),
            "data_source" | "dataSource" => Ok(NodeKind::DataSource),
            "rule_set" | "ruleSet" => Ok(NodeKind::RuleSet),
            "decision" => Ok(NodeKind::Decision),
            "validation" => Ok(NodeKind::Validation),
            other => Err(other.to_string()),
        }
    }
}

/// Layout position in the builder canvas. Not used during execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A single unit of work in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct WorkflowNode {
    /// Unique within a definition
    pub id: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub position: Position,
    pub config: NodeConfig,
}

impl WorkflowNode {
    pub fn new(id: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id: id.into(),
            label: None,
            description: None,
            position: Position::default(),
            config,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }

    /// Label for logs, falling back to the node id
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

/// Kind-specific node configuration
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    Start,
    End,
    Condition { conditions: Vec<Condition> },
    Action { business_logic: Option<BusinessLogic> },
    DataSource { data_source: Option<DataSource> },
    RuleSet { rules: Vec<Rule> },
    Decision { business_logic: Option<BusinessLogic> },
    Validation { validation: Option<ValidationRule> },
}

impl NodeConfig {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeConfig::Start => NodeKind::Start,
            NodeConfig::End => NodeKind::End,
            NodeConfig::Condition { .. } => NodeKind::Condition,
            NodeConfig::Action { .. } => NodeKind::Action,
            NodeConfig::DataSource { .. } => NodeKind::DataSource,
            NodeConfig::RuleSet { .. } => NodeKind::RuleSet,
            NodeConfig::Decision { .. } => NodeKind::Decision,
            NodeConfig::Validation { .. } => NodeKind::Validation,
        }
    }

    /// Parse the payload for `kind`, rejecting fields that belong to other kinds
    fn from_payload(kind: NodeKind, payload: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            NodeKind::Start => {
                serde_json::from_value::<EmptyPayload>(payload)?;
                NodeConfig::Start
            }
            NodeKind::End => {
                serde_json::from_value::<EmptyPayload>(payload)?;
                NodeConfig::End
            }
            NodeKind::Condition => {
                let p: ConditionPayload = serde_json::from_value(payload)?;
                NodeConfig::Condition {
                    conditions: p.conditions,
                }
            }
            NodeKind::Action => {
                let p: LogicPayload = serde_json::from_value(payload)?;
                NodeConfig::Action {
                    business_logic: p.business_logic,
                }
            }
            NodeKind::Decision => {
                let p: LogicPayload = serde_json::from_value(payload)?;
                NodeConfig::Decision {
                    business_logic: p.business_logic,
                }
            }
            NodeKind::DataSource => {
                let p: DataSourcePayload = serde_json::from_value(payload)?;
                NodeConfig::DataSource {
                    data_source: p.data_source,
                }
            }
            NodeKind::RuleSet => {
                let p: RuleSetPayload = serde_json::from_value(payload)?;
                NodeConfig::RuleSet { rules: p.rules }
            }
            NodeKind::Validation => {
                let p: ValidationPayload = serde_json::from_value(payload)?;
                NodeConfig::Validation {
                    validation: p.validation,
                }
            }
        })
    }

    fn to_payload(&self) -> Map<String, Value> {
        let value = match self {
            NodeConfig::Start | NodeConfig::End => return Map::new(),
            NodeConfig::Condition { conditions } => serde_json::to_value(ConditionPayload {
                conditions: conditions.clone(),
            }),
            NodeConfig::Action { business_logic } | NodeConfig::Decision { business_logic } => {
                serde_json::to_value(LogicPayload {
                    business_logic: business_logic.clone(),
                })
            }
            NodeConfig::DataSource { data_source } => serde_json::to_value(DataSourcePayload {
                data_source: data_source.clone(),
            }),
            NodeConfig::RuleSet { rules } => serde_json::to_value(RuleSetPayload {
                rules: rules.clone(),
            }),
            NodeConfig::Validation { validation } => serde_json::to_value(ValidationPayload {
                validation: validation.clone(),
            }),
        };
        match value {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmptyPayload {}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConditionPayload {
    conditions: Vec<Condition>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogicPayload {
    #[serde(default, alias = "businessLogic", skip_serializing_if = "Option::is_none")]
    business_logic: Option<BusinessLogic>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DataSourcePayload {
    #[serde(default, alias = "dataSource", skip_serializing_if = "Option::is_none")]
    data_source: Option<DataSource>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSetPayload {
    rules: Vec<Rule>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ValidationPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    validation: Option<ValidationRule>,
}

/// Wire form of a node: common fields plus a free-form payload checked
/// against the node kind on conversion.
#[derive(Serialize, Deserialize)]
struct RawNode {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    position: Position,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

fn take_string(payload: &mut Map<String, Value>, key: &str) -> Option<String> {
    match payload.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

impl TryFrom<RawNode> for WorkflowNode {
    type Error = DefinitionError;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let kind: NodeKind = raw
            .kind
            .parse()
            .map_err(|kind| DefinitionError::UnknownNodeKind {
                node_id: raw.id.clone(),
                kind,
            })?;

        // The dashboard nests label and configuration under `data`
        let mut payload = raw.payload;
        if let Some(Value::Object(data)) = payload.remove("data") {
            for (key, value) in data {
                payload.entry(key).or_insert(value);
            }
        }
        let label = take_string(&mut payload, "label");
        let description = take_string(&mut payload, "description");

        let config = NodeConfig::from_payload(kind, Value::Object(payload)).map_err(|e| {
            DefinitionError::ConfigurationShape {
                node_id: raw.id.clone(),
                kind,
                reason: e.to_string(),
            }
        })?;

        Ok(WorkflowNode {
            id: raw.id,
            label: raw.label.or(label),
            description: raw.description.or(description),
            position: raw.position,
            config,
        })
    }
}

impl From<WorkflowNode> for RawNode {
    fn from(node: WorkflowNode) -> Self {
        RawNode {
            kind: node.kind().as_str().to_string(),
            payload: node.config.to_payload(),
            id: node.id,
            label: node.label,
            description: node.description,
            position: node.position,
        }
    }
}

// ============================================================================
// Descriptors
// ============================================================================

/// Business logic run by action and decision nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusinessLogic {
    /// A named function registered with the business logic executor
    Custom {
        function: String,
        #[serde(default)]
        params: Map<String, Value>,
    },
    /// A call to an external decisioning service
    ServiceCall {
        service: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
        #[serde(default)]
        params: Map<String, Value>,
    },
    #[serde(other)]
    Unknown,
}

impl BusinessLogic {
    pub fn type_name(&self) -> &'static str {
        match self {
            BusinessLogic::Custom { .. } => "custom",
            BusinessLogic::ServiceCall { .. } => "service_call",
            BusinessLogic::Unknown => "unknown",
        }
    }
}

/// Where a data_source node fetches its data from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataSource {
    Api {
        endpoint: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        #[serde(default)]
        params: Map<String, Value>,
    },
    Database {
        query: String,
        #[serde(default)]
        params: Map<String, Value>,
    },
    File {
        path: String,
    },
    #[serde(other)]
    Unknown,
}

impl DataSource {
    pub fn type_name(&self) -> &'static str {
        match self {
            DataSource::Api { .. } => "api",
            DataSource::Database { .. } => "database",
            DataSource::File { .. } => "file",
            DataSource::Unknown => "unknown",
        }
    }
}

/// Validation performed by a validation node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationRule {
    Schema {
        schema: FieldSchema,
    },
    /// A named predicate registered with the validator
    Custom {
        validator: String,
        #[serde(default)]
        params: Map<String, Value>,
    },
    #[serde(other)]
    Unknown,
}

/// Declarative schema over dotted field paths
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(default)]
    pub required: Vec<String>,

    /// Per-field rules, keyed by dotted path. Absent fields are skipped.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Regular expression the text form of the value must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ValueType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ValueType::String => value.is_string(),
            ValueType::Number => value.is_number(),
            ValueType::Integer => value.is_i64() || value.is_u64(),
            ValueType::Boolean => value.is_boolean(),
            ValueType::Object => value.is_object(),
            ValueType::Array => value.is_array(),
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

/// A single rule of a rule_set node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub conditions: Vec<Condition>,

    /// How the conditions combine into a pass/fail judgment
    #[serde(default, rename = "match")]
    pub mode: MatchMode,

    /// Reported when the rule passes, e.g. `approve`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Value>,
}

impl Rule {
    /// Structural check: a rule needs an id and at least one condition
    pub fn check(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("rule without an id".to_string());
        }
        if self.conditions.is_empty() {
            return Err(format!("rule '{}' has no conditions", self.id));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

// ============================================================================
// Connections
// ============================================================================

/// A directed, optionally guarded edge between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConnection {
    pub id: String,
    pub source: String,
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Single guard condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,

    /// Guard conditions, all of which must hold
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl WorkflowConnection {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            label: None,
            condition: None,
            conditions: Vec::new(),
        }
    }

    pub fn guarded(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// All guard conditions, single and listed
    pub fn guards(&self) -> impl Iterator<Item = &Condition> {
        self.condition.iter().chain(self.conditions.iter())
    }
}

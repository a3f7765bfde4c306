//! Workflow graph index
//!
//! Indexes a definition's nodes by id and its connections by source node, and
//! checks the structural invariants a definition must satisfy before it is
//! loaded.

use std::collections::{HashMap, HashSet};

use super::definition::{NodeConfig, NodeKind, WorkflowConnection, WorkflowDefinition, WorkflowNode};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DefinitionError {
    #[error("Node '{node_id}' has unknown node kind '{kind}'")]
    UnknownNodeKind { node_id: String, kind: String },

    #[error("Node '{node_id}' configuration does not match kind '{kind}': {reason}")]
    ConfigurationShape {
        node_id: String,
        kind: NodeKind,
        reason: String,
    },

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    #[error("Duplicate connection id: {0}")]
    DuplicateConnectionId(String),

    #[error("Connection '{connection}' references non-existent node '{node}'")]
    DanglingConnection { connection: String, node: String },

    #[error("Workflow '{0}' has no start node")]
    NoStartNode(String),
}

/// Lookup structure over a borrowed definition
#[derive(Debug)]
pub struct WorkflowGraph<'a> {
    nodes: HashMap<&'a str, &'a WorkflowNode>,
    outgoing: HashMap<&'a str, Vec<&'a WorkflowConnection>>,
    start_nodes: Vec<&'a WorkflowNode>,
}

impl<'a> WorkflowGraph<'a> {
    /// Index a definition without checking it. On duplicate node ids the
    /// first declaration wins.
    pub fn index(definition: &'a WorkflowDefinition) -> Self {
        let mut nodes = HashMap::new();
        for node in &definition.nodes {
            nodes.entry(node.id.as_str()).or_insert(node);
        }

        let mut outgoing: HashMap<&str, Vec<&WorkflowConnection>> = HashMap::new();
        for connection in &definition.connections {
            outgoing
                .entry(connection.source.as_str())
                .or_default()
                .push(connection);
        }

        let start_nodes = definition.start_nodes().collect();

        Self {
            nodes,
            outgoing,
            start_nodes,
        }
    }

    /// Index a definition and check its invariants
    pub fn build(definition: &'a WorkflowDefinition) -> Result<Self, DefinitionError> {
        let mut seen = HashSet::new();
        for node in &definition.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(DefinitionError::DuplicateNodeId(node.id.clone()));
            }
            if let NodeConfig::RuleSet { rules } = &node.config {
                for rule in rules {
                    rule.check()
                        .map_err(|reason| DefinitionError::ConfigurationShape {
                            node_id: node.id.clone(),
                            kind: NodeKind::RuleSet,
                            reason,
                        })?;
                }
            }
        }

        let mut connection_ids = HashSet::new();
        for connection in &definition.connections {
            if !connection_ids.insert(connection.id.as_str()) {
                return Err(DefinitionError::DuplicateConnectionId(connection.id.clone()));
            }
            for endpoint in [&connection.source, &connection.target] {
                if !seen.contains(endpoint.as_str()) {
                    return Err(DefinitionError::DanglingConnection {
                        connection: connection.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
        }

        let graph = Self::index(definition);
        if graph.start_nodes.is_empty() {
            return Err(DefinitionError::NoStartNode(definition.id.clone()));
        }
        Ok(graph)
    }

    pub fn node(&self, id: &str) -> Option<&'a WorkflowNode> {
        self.nodes.get(id).copied()
    }

    /// Outgoing connections of a node in declaration order
    pub fn outgoing(&self, node_id: &str) -> &[&'a WorkflowConnection] {
        self.outgoing
            .get(node_id)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// Start nodes in declaration order
    pub fn start_nodes(&self) -> &[&'a WorkflowNode] {
        &self.start_nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

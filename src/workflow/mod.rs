//! Workflow types and definitions
//!
//! This module contains all types for defining and parsing decision workflows:
//! - `definition` - WorkflowDefinition, typed node configurations, descriptors
//! - `condition` - Condition predicates and their evaluation
//! - `fields` - Dotted path resolution against the execution context
//! - `graph` - Node/connection index and structural validation
//! - `engine_config` - Engine settings loaded from `engine.yaml`
//! - `loader` - Load workflows from files and directories

pub mod condition;
pub mod definition;
pub mod engine_config;
pub mod fields;
pub mod graph;
pub mod loader;

// Re-export all public types for convenience
pub use condition::{compare, evaluate as evaluate_condition, evaluate_all, Condition, Operator};
pub use definition::{
    BusinessLogic, DataRequirements, DataSource, FieldRule, FieldSchema, MatchMode, NodeConfig,
    NodeKind, Position, Rule, ValidationRule, ValueType, WorkflowConnection, WorkflowDefinition,
    WorkflowNode, WorkflowStatus,
};
pub use engine_config::EngineConfig;
pub use fields::{resolve, resolve_in, EvaluationScope};
pub use graph::{DefinitionError, WorkflowGraph};
pub use loader::{LoadError, WorkflowLoader};

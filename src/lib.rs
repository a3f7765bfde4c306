//! # Decision Flow
//!
//! A graph-shaped decision workflow engine for credit and loan application
//! decisioning.
//!
//! ## Features
//!
//! - **Declarative workflows** - Nodes and guarded connections in YAML or JSON
//! - **Typed nodes** - Each node kind carries only the configuration it needs
//! - **Parallel branches** - Start nodes and passing connections run concurrently
//! - **Partial-success reporting** - A failed branch never hides the others
//! - **Audit trail** - Execution log, per-node timing and a definition digest
//!
//! ## Node kinds
//!
//! - **start** / **end**: Echo the application payload
//! - **condition**: Evaluate field conditions
//! - **rule_set**: Judge named rules independently
//! - **action** / **decision**: Run business logic
//! - **data_source**: Fetch data into the shared output
//! - **validation**: Validate the application
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use decision_flow::{WorkflowEngine, WorkflowLoader};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let definition = WorkflowLoader::from_yaml_str(r#"
//! id: credit-check
//! nodes:
//!   - id: start
//!     type: start
//!   - id: approve
//!     type: end
//! connections:
//!   - id: c1
//!     source: start
//!     target: approve
//!     condition: { field: riskScore, operator: greater_than, value: 700 }
//! "#)?;
//!
//!     let engine = WorkflowEngine::new();
//!     let result = engine.test(&definition, json!({ "riskScore": 847 })).await?;
//!
//!     println!("Workflow finished: status={:?}", result.status);
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod services;
pub mod workflow;

// Re-export main types
pub use engine::{
    BatchError, BatchEvaluator, BatchResult, BranchOutcome, EngineError, ExecutionContext,
    ExecutionLogEntry, ExecutionMetrics, ExecutionResult, ExecutionState, NodeResult,
    WorkflowEngine,
};
pub use services::{
    BusinessLogicExecutor, Collaborators, DataFetcher, FixtureDataFetcher, LogicRegistry,
    SchemaValidator, ServiceError, Validator,
};
pub use workflow::{
    Condition, DefinitionError, EngineConfig, LoadError, NodeConfig, NodeKind, Operator,
    WorkflowConnection, WorkflowDefinition, WorkflowLoader, WorkflowNode,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::engine::{
        BatchEvaluator, BranchOutcome, EngineError, ExecutionContext, ExecutionResult,
        ExecutionState, NodeResult, WorkflowEngine,
    };
    pub use crate::services::{
        BusinessLogicExecutor, DataFetcher, FixtureDataFetcher, LogicRegistry, SchemaValidator,
        ServiceError, Validator,
    };
    pub use crate::workflow::{
        Condition, EngineConfig, NodeConfig, Operator, WorkflowConnection, WorkflowDefinition,
        WorkflowLoader, WorkflowNode,
    };
}

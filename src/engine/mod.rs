//! Workflow execution engine module
//!
//! This module contains:
//! - `executor` - The graph traversal engine
//! - `handlers` - Node handlers, one per node kind
//! - `context` - Per-run execution context
//! - `error` - Engine error types
//! - `result` - Node results, branch outcomes, execution log and result
//! - `metrics` - Timing collected during a run
//! - `batch` - Evaluate one workflow against many applications

pub mod batch;
pub mod context;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod metrics;
pub mod result;

pub use batch::{BatchError, BatchEvaluator, BatchResult};
pub use context::ExecutionContext;
pub use error::EngineError;
pub use executor::WorkflowEngine;
pub use metrics::ExecutionMetrics;
pub use result::{
    BranchOutcome, ConditionCheck, ConditionOutcome, DataOutcome, ExecutionLogEntry,
    ExecutionResult, ExecutionState, LogStatus, LogicOutcome, NodeFailure, NodeResult,
    RuleOutcome, RuleSetOutcome, ValidationOutcome,
};

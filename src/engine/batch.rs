//! Batch evaluation
//!
//! Evaluate one workflow definition against many application records with
//! bounded parallelism. Every record gets its own [`ExecutionContext`];
//! contexts are never shared between records.
//!
//! ```yaml
//! # engine.yaml
//! parallel: 4
//! fail_fast: false
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use super::context::ExecutionContext;
use super::executor::WorkflowEngine;
use super::result::ExecutionResult;
use crate::workflow::{DefinitionError, WorkflowDefinition};

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Invalid workflow: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Evaluation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Every record was evaluated and fully decisioned
    pub success: bool,
    pub executions: HashMap<String, ExecutionResult>,
    /// Records whose execution could not start, with the reason
    pub rejected: HashMap<String, String>,
    /// Records not evaluated because of fail-fast
    pub skipped: Vec<String>,
}

impl BatchResult {
    /// Number of fully decisioned records
    pub fn decisioned(&self) -> usize {
        self.executions
            .values()
            .filter(|r| r.is_fully_decisioned())
            .count()
    }
}

enum RecordOutcome {
    Executed(ExecutionResult),
    Rejected(String),
    Skipped,
}

pub struct BatchEvaluator {
    engine: Arc<WorkflowEngine>,
    max_concurrent: usize,
    fail_fast: bool,
}

impl BatchEvaluator {
    /// Create an evaluator using the engine's batch settings
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        let config = engine.config();
        Self {
            max_concurrent: config.parallel,
            fail_fast: config.fail_fast,
            engine,
        }
    }

    pub fn parallel(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    /// Evaluate every record. The definition is validated once up front.
    #[instrument(skip_all, fields(workflow_id = %definition.id, records = records.len()))]
    pub async fn run(
        &self,
        definition: Arc<WorkflowDefinition>,
        records: Vec<(String, Value)>,
    ) -> Result<BatchResult, BatchError> {
        definition.validate()?;

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent.max(1)));
        let failed = Arc::new(AtomicBool::new(false));
        let fail_fast = self.fail_fast;

        info!(
            "Evaluating {} record(s) against {} (parallel: {})",
            records.len(),
            definition.id,
            self.max_concurrent
        );

        let handles: Vec<_> = records
            .into_iter()
            .map(|(record_id, input)| {
                let engine = Arc::clone(&self.engine);
                let definition = Arc::clone(&definition);
                let semaphore = Arc::clone(&semaphore);
                let failed = Arc::clone(&failed);

                tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return (record_id, RecordOutcome::Skipped),
                    };
                    if fail_fast && failed.load(Ordering::SeqCst) {
                        return (record_id, RecordOutcome::Skipped);
                    }

                    let context = ExecutionContext::new(definition.id.clone(), input);
                    let outcome = match engine.execute(&definition, context).await {
                        Ok(result) => {
                            if !result.is_fully_decisioned() {
                                failed.store(true, Ordering::SeqCst);
                            }
                            RecordOutcome::Executed(result)
                        }
                        Err(e) => {
                            warn!("Record {} rejected: {}", record_id, e);
                            failed.store(true, Ordering::SeqCst);
                            RecordOutcome::Rejected(e.to_string())
                        }
                    };
                    (record_id, outcome)
                })
            })
            .collect();

        let mut executions = HashMap::new();
        let mut rejected = HashMap::new();
        let mut skipped = Vec::new();

        for joined in join_all(handles).await {
            let (record_id, outcome) = joined?;
            match outcome {
                RecordOutcome::Executed(result) => {
                    executions.insert(record_id, result);
                }
                RecordOutcome::Rejected(reason) => {
                    rejected.insert(record_id, reason);
                }
                RecordOutcome::Skipped => skipped.push(record_id),
            }
        }
        skipped.sort();

        let success = rejected.is_empty()
            && skipped.is_empty()
            && executions.values().all(|r| r.is_fully_decisioned());

        info!(
            "Batch finished: {} executed, {} rejected, {} skipped",
            executions.len(),
            rejected.len(),
            skipped.len()
        );

        Ok(BatchResult {
            success,
            executions,
            rejected,
            skipped,
        })
    }
}

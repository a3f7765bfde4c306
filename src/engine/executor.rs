//! Workflow Engine - Walks a decision workflow graph against one application
//!
//! This is the main engine that:
//! 1. Finds the start nodes of a definition
//! 2. Runs one branch per start node concurrently
//! 3. Executes each node with the handler for its kind
//! 4. Follows outgoing connections whose guards hold, fanning out in parallel
//! 5. Collects branch outcomes, the execution log, errors and metrics

use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::engine::handlers::{self, NodeRuntime};
use crate::engine::metrics::millis;
use crate::engine::result::{BranchOutcome, ExecutionResult, ExecutionState};
use crate::services::{BusinessLogicExecutor, Collaborators, DataFetcher, Validator};
use crate::workflow::condition::evaluate_all;
use crate::workflow::{
    EngineConfig, EvaluationScope, WorkflowConnection, WorkflowDefinition, WorkflowGraph,
    WorkflowNode,
};

/// The decision workflow engine
///
/// An engine holds no per-run state and can execute any number of workflows
/// concurrently; each run gets its own [`ExecutionContext`].
#[derive(Debug, Clone, Default)]
pub struct WorkflowEngine {
    collaborators: Collaborators,
    config: EngineConfig,
}

impl WorkflowEngine {
    /// Create an engine with the built-in collaborators and default config
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    pub fn with_business_logic(mut self, logic: impl BusinessLogicExecutor + 'static) -> Self {
        self.collaborators.logic = Arc::new(logic);
        self
    }

    pub fn with_data_fetcher(mut self, fetcher: impl DataFetcher + 'static) -> Self {
        self.collaborators.fetcher = Arc::new(fetcher);
        self
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.collaborators.validator = Arc::new(validator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute a definition against the context's input data
    ///
    /// Fails only when the run cannot start: no start node, or required data
    /// missing under `strict_data_requirements`. Node failures abort their own
    /// branch and are reported in the returned result.
    #[instrument(
        skip(self, definition, context),
        fields(workflow_id = %definition.id, execution_id = %context.execution_id())
    )]
    pub async fn execute(
        &self,
        definition: &WorkflowDefinition,
        context: ExecutionContext,
    ) -> Result<ExecutionResult, EngineError> {
        let started = Instant::now();
        let graph = WorkflowGraph::index(definition);

        if graph.start_nodes().is_empty() {
            return Err(EngineError::NoStartNode(definition.id.clone()));
        }

        let missing = definition.data_requirements.missing_required(context.input());
        if !missing.is_empty() {
            if self.config.strict_data_requirements {
                return Err(EngineError::MissingRequiredData(missing));
            }
            warn!("Missing required data: {}", missing.join(", "));
        }

        info!(
            "Executing workflow: {} (version {}, {} start node(s))",
            definition.id,
            definition.version,
            graph.start_nodes().len()
        );
        context.set_state(ExecutionState::Running);

        let results = {
            let traversal = Traversal {
                graph: &graph,
                context: &context,
                runtime: NodeRuntime {
                    context: &context,
                    collaborators: &self.collaborators,
                    timeout: self.config.node_timeout(),
                },
                max_depth: self.config.max_depth,
                node_budget: self.config.max_node_executions,
                executed: AtomicUsize::new(0),
            };
            join_all(
                graph
                    .start_nodes()
                    .iter()
                    .copied()
                    .map(|node| traversal.enter(node, 1)),
            )
            .await
        };

        let execution_id = context.execution_id().to_string();
        let mut state = context.into_state();
        let status = ExecutionState::classify(&results, state.errors.len());
        state.metrics.total_duration_ms = millis(started.elapsed());

        match status {
            ExecutionState::Completed => info!("Workflow {} completed", definition.id),
            _ => warn!(
                "Workflow {} finished {:?} with {} error(s)",
                definition.id,
                status,
                state.errors.len()
            ),
        }

        Ok(ExecutionResult {
            execution_id,
            workflow_id: definition.id.clone(),
            definition_digest: definition.digest(),
            results,
            execution_log: state.log,
            errors: state.errors,
            output: state.output,
            node_results: state.node_results,
            metrics: state.metrics,
            status,
            timestamp: chrono::Utc::now(),
        })
    }

    /// Dry run a definition against test data with a fresh context
    #[instrument(skip(self, definition, test_data), fields(workflow_id = %definition.id))]
    pub async fn test(
        &self,
        definition: &WorkflowDefinition,
        test_data: Value,
    ) -> Result<ExecutionResult, EngineError> {
        let context = ExecutionContext::new(definition.id.clone(), test_data);
        self.execute(definition, context).await
    }
}

/// Borrowed state of one traversal
struct Traversal<'a> {
    graph: &'a WorkflowGraph<'a>,
    context: &'a ExecutionContext,
    runtime: NodeRuntime<'a>,
    max_depth: usize,
    node_budget: usize,
    /// Node executions started so far, across all branches
    executed: AtomicUsize,
}

impl<'a> Traversal<'a> {
    /// Run a branch from `node`, turning a failure into a `Failed` outcome
    async fn enter(&self, node: &'a WorkflowNode, depth: usize) -> BranchOutcome {
        match self.execute_from_node(node, depth).await {
            Ok(outcome) => outcome,
            Err(error) => BranchOutcome::Failed {
                node_id: node.id.clone(),
                error: error.to_string(),
            },
        }
    }

    fn execute_from_node<'s>(
        &'s self,
        node: &'a WorkflowNode,
        depth: usize,
    ) -> BoxFuture<'s, Result<BranchOutcome, EngineError>> {
        async move {
            self.context.log_started(node);
            debug!("Node started: {} ({})", node.id, node.kind());
            let started = Instant::now();

            let executed = self.executed.fetch_add(1, Ordering::SeqCst) + 1;
            let outcome = if executed > self.node_budget {
                Err(EngineError::NodeBudgetExceeded {
                    node_id: node.id.clone(),
                    limit: self.node_budget,
                })
            } else if depth > self.max_depth {
                Err(EngineError::MaxDepthExceeded {
                    node_id: node.id.clone(),
                    max_depth: self.max_depth,
                })
            } else {
                handlers::execute_node(node, &self.runtime).await
            };

            let result = match outcome {
                Ok(result) => {
                    self.context.record_completion(node, &result, started.elapsed());
                    debug!("Node completed: {}", node.id);
                    result
                }
                Err(e) => {
                    error!("Node {} failed: {}", node.id, e);
                    self.context.record_failure(node, &e, started.elapsed());
                    return Err(e);
                }
            };

            let connections = self.graph.outgoing(&node.id);
            if !node.kind().may_branch() || connections.is_empty() {
                return Ok(BranchOutcome::Completed {
                    node_id: node.id.clone(),
                    result,
                });
            }

            // guards see the node's own result first
            let payload = result.payload();
            let scope = EvaluationScope::with_result(self.context, &payload);
            let passing: Vec<&'a WorkflowConnection> = connections
                .iter()
                .copied()
                .filter(|connection| {
                    let pass = evaluate_all(connection.guards(), &scope);
                    if !pass {
                        debug!(
                            "Connection {} pruned: {} -> {}",
                            connection.id, connection.source, connection.target
                        );
                    }
                    pass
                })
                .collect();

            let branches = join_all(
                passing
                    .into_iter()
                    .map(|connection| self.follow(connection, depth + 1)),
            )
            .await;

            Ok(BranchOutcome::Forked {
                node_id: node.id.clone(),
                branches,
            })
        }
        .boxed()
    }

    async fn follow(&self, connection: &'a WorkflowConnection, depth: usize) -> BranchOutcome {
        match self.graph.node(&connection.target) {
            Some(target) => self.enter(target, depth).await,
            None => {
                let e = EngineError::TargetNodeNotFound {
                    connection_id: connection.id.clone(),
                    target: connection.target.clone(),
                };
                error!("Connection {} failed: {}", connection.id, e);
                self.context.record_error(&connection.source, &e);
                BranchOutcome::Failed {
                    node_id: connection.target.clone(),
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::result::{LogStatus, NodeResult};
    use crate::workflow::{Condition, NodeConfig, Operator};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn linear() -> WorkflowDefinition {
        let mut def = WorkflowDefinition::new("linear");
        def.nodes = vec![
            WorkflowNode::new("start", NodeConfig::Start),
            WorkflowNode::new("end", NodeConfig::End),
        ];
        def.connections = vec![WorkflowConnection::new("c1", "start", "end")];
        def
    }

    #[tokio::test]
    async fn test_start_to_end() {
        let engine = WorkflowEngine::new();
        let input = json!({ "riskScore": 847 });
        let result = assert_ok!(engine.test(&linear(), input.clone()).await);

        assert_eq!(result.status, ExecutionState::Completed);
        assert_eq!(result.results.len(), 1);
        let leaves = result.results[0].completed();
        assert_eq!(leaves, vec![&NodeResult::End(input)]);

        let completed: Vec<_> = result
            .execution_log
            .iter()
            .filter(|e| e.status == LogStatus::Completed)
            .map(|e| e.node_id.as_str())
            .collect();
        assert_eq!(completed, vec!["start", "end"]);
        assert_eq!(result.definition_digest, linear().digest());
    }

    #[tokio::test]
    async fn test_no_start_node() {
        let mut def = WorkflowDefinition::new("empty");
        def.nodes = vec![WorkflowNode::new("end", NodeConfig::End)];
        let err = assert_err!(WorkflowEngine::new().test(&def, json!({})).await);
        assert!(matches!(err, EngineError::NoStartNode(_)));
    }

    #[tokio::test]
    async fn test_strict_data_requirements() {
        let mut def = linear();
        def.data_requirements.required = vec!["income".to_string()];

        let lenient = WorkflowEngine::new();
        assert_ok!(lenient.test(&def, json!({})).await);

        let strict = WorkflowEngine::new().with_config(EngineConfig {
            strict_data_requirements: true,
            ..Default::default()
        });
        let err = assert_err!(strict.test(&def, json!({})).await);
        assert!(matches!(err, EngineError::MissingRequiredData(ref f) if f == &["income"]));
    }

    #[tokio::test]
    async fn test_end_node_stops_branch() {
        let mut def = linear();
        def.nodes.push(WorkflowNode::new("after", NodeConfig::End));
        def.connections.push(WorkflowConnection::new("c2", "end", "after"));

        let result = assert_ok!(WorkflowEngine::new().test(&def, json!({})).await);
        assert!(result.node_results.get("after").is_none());
    }

    #[tokio::test]
    async fn test_cycle_hits_max_depth() {
        let mut def = WorkflowDefinition::new("loop");
        def.nodes = vec![
            WorkflowNode::new("start", NodeConfig::Start),
            WorkflowNode::new(
                "check",
                NodeConfig::Condition {
                    conditions: vec![Condition::new("x", Operator::Exists, json!(null))],
                },
            ),
        ];
        def.connections = vec![
            WorkflowConnection::new("c1", "start", "check"),
            WorkflowConnection::new("c2", "check", "check"),
        ];

        let engine = WorkflowEngine::new().with_config(EngineConfig {
            max_depth: 5,
            ..Default::default()
        });
        let result = assert_ok!(engine.test(&def, json!({ "x": 1 })).await);

        assert_eq!(result.status, ExecutionState::Failed);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, "max_depth_exceeded");
        assert!(result.results[0].has_failures());
    }

    #[tokio::test]
    async fn test_fan_out_cycle_stops_at_node_budget() {
        let mut def = WorkflowDefinition::new("fan-loop");
        def.nodes = vec![
            WorkflowNode::new("start", NodeConfig::Start),
            WorkflowNode::new(
                "check",
                NodeConfig::Condition {
                    conditions: vec![Condition::new("x", Operator::Exists, json!(null))],
                },
            ),
        ];
        def.connections = vec![
            WorkflowConnection::new("c1", "start", "check"),
            WorkflowConnection::new("c2", "check", "check"),
            WorkflowConnection::new("c3", "check", "check"),
        ];
        assert_ok!(def.validate());

        let engine = WorkflowEngine::new().with_config(EngineConfig {
            max_node_executions: 50,
            ..Default::default()
        });
        let result = assert_ok!(engine.test(&def, json!({ "x": 1 })).await);

        let completed = result
            .execution_log
            .iter()
            .filter(|e| e.status == LogStatus::Completed)
            .count();
        assert_eq!(completed, 50);
        // every successful check forks twice: 1 + 1 + 2 * 49 attempts
        assert_eq!(result.metrics.nodes_executed, 100);
        assert_eq!(result.errors.len(), 50);
        assert!(result.errors.iter().all(|e| e.code == "node_budget_exceeded"));
        assert_eq!(result.status, ExecutionState::Failed);
    }
}

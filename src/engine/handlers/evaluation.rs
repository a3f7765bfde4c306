//! Condition and rule_set nodes
//!
//! Neither kind calls a collaborator; both are pure evaluations over the
//! execution context and never fail because a condition is false or its
//! operator is unknown.
//!
//! Example:
//! ```yaml
//! - id: score-check
//!   type: condition
//!   conditions:
//!     - field: riskScore
//!       operator: greater_than
//!       value: 700
//!
//! - id: policy
//!   type: rule_set
//!   rules:
//!     - id: prime
//!       match: all
//!       outcome: approve
//!       conditions:
//!         - { field: riskScore, operator: greater_than, value: 700 }
//!         - { field: bankruptcies, operator: equals, value: 0 }
//! ```

use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::engine::result::{
    ConditionCheck, ConditionOutcome, NodeResult, RuleOutcome, RuleSetOutcome,
};
use crate::workflow::condition::evaluate;
use crate::workflow::{Condition, EvaluationScope, MatchMode, Rule};

/// Evaluate every condition and report both aggregates
pub fn execute_condition(conditions: &[Condition], context: &ExecutionContext) -> NodeResult {
    let scope = EvaluationScope::new(context);
    let results: Vec<ConditionCheck> = conditions
        .iter()
        .map(|condition| ConditionCheck {
            field: condition.field.clone(),
            operator: condition.operator.clone(),
            passed: evaluate(condition, &scope),
        })
        .collect();

    NodeResult::Condition(ConditionOutcome {
        all_conditions_true: results.iter().all(|r| r.passed),
        any_condition_true: results.iter().any(|r| r.passed),
        results,
    })
}

/// Judge each rule independently. Only a malformed rule fails the node.
pub fn execute_rule_set(
    node_id: &str,
    rules: &[Rule],
    context: &ExecutionContext,
) -> Result<NodeResult, EngineError> {
    for rule in rules {
        rule.check()
            .map_err(|reason| EngineError::InvalidConfiguration {
                node_id: node_id.to_string(),
                reason,
            })?;
    }

    let scope = EvaluationScope::new(context);
    let outcomes: Vec<RuleOutcome> = rules
        .iter()
        .map(|rule| {
            let mut checks = rule.conditions.iter().map(|c| evaluate(c, &scope));
            let passed = match rule.mode {
                MatchMode::All => checks.all(|passed| passed),
                MatchMode::Any => checks.any(|passed| passed),
            };
            RuleOutcome {
                rule_id: rule.id.clone(),
                name: rule.name.clone(),
                passed,
                outcome: if passed { rule.outcome.clone() } else { None },
            }
        })
        .collect();

    Ok(NodeResult::RuleSet(RuleSetOutcome {
        all_passed: outcomes.iter().all(|r| r.passed),
        any_passed: outcomes.iter().any(|r| r.passed),
        rules: outcomes,
    }))
}

mod common;

use common::*;
use decision_flow::engine::LogStatus;
use decision_flow::prelude::*;
use decision_flow::workflow::ValidationRule;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn completed_order(result: &ExecutionResult) -> Vec<&str> {
    result
        .execution_log
        .iter()
        .filter(|e| e.status == LogStatus::Completed)
        .map(|e| e.node_id.as_str())
        .collect()
}

// ============================================================================
// Basic traversal
// ============================================================================

#[tokio::test]
async fn test_start_to_end_echoes_input() {
    let def = definition(
        "simple",
        vec![start("start"), end("end")],
        vec![connect("c1", "start", "end")],
    );
    let input = json!({ "applicant": { "name": "Ada" }, "riskScore": 847 });

    let result = assert_ok!(WorkflowEngine::new().test(&def, input.clone()).await);

    assert_eq!(result.status, ExecutionState::Completed);
    assert!(result.is_fully_decisioned());
    assert_eq!(result.workflow_id, "simple");
    assert_eq!(result.results[0].completed(), vec![&NodeResult::End(input)]);
    assert_eq!(completed_order(&result), vec!["start", "end"]);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_condition_node_reports_each_check() {
    let def = definition(
        "conditions",
        vec![
            start("start"),
            condition(
                "check",
                vec![
                    when("riskScore", Operator::GreaterThan, json!(700)),
                    when("loanType", Operator::Equals, json!("auto")),
                ],
            ),
            end("approve"),
        ],
        vec![
            connect("c1", "start", "check"),
            connect("c2", "check", "approve").guarded(when(
                "allConditionsTrue",
                Operator::Equals,
                json!(true),
            )),
        ],
    );

    let input = json!({ "riskScore": 847, "loanType": "mortgage" });
    let result = assert_ok!(WorkflowEngine::new().test(&def, input).await);

    let payload = result.node_results["check"].payload();
    assert_eq!(payload["anyConditionTrue"], json!(true));
    assert_eq!(payload["allConditionsTrue"], json!(false));
    assert_eq!(payload["results"][1]["passed"], json!(false));
    assert!(!result.node_results.contains_key("approve"));
    assert_eq!(result.status, ExecutionState::Completed);
}

#[tokio::test]
async fn test_failing_guard_prunes_connection() {
    let def = definition(
        "guarded",
        vec![start("start"), end("decline")],
        vec![connect("c1", "start", "decline").guarded(when(
            "riskScore",
            Operator::LessThan,
            json!(500),
        ))],
    );

    let result = assert_ok!(WorkflowEngine::new().test(&def, json!({ "riskScore": 847 })).await);

    assert!(result.log_for("decline").next().is_none());
    match &result.results[0] {
        BranchOutcome::Forked { node_id, branches } => {
            assert_eq!(node_id, "start");
            assert!(branches.is_empty());
        }
        other => panic!("expected a fork, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_operator_guard_never_passes() {
    let def = definition(
        "unknown-op",
        vec![start("start"), end("end")],
        vec![connect("c1", "start", "end").guarded(when(
            "riskScore",
            Operator::Unknown("greater_or_equal".to_string()),
            json!(0),
        ))],
    );

    let result = assert_ok!(WorkflowEngine::new().test(&def, json!({ "riskScore": 847 })).await);
    assert!(!result.node_results.contains_key("end"));
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_no_start_node_runs_nothing() {
    let fetcher = ScriptedFetcher::new().respond("/bureau", Duration::ZERO, json!({}));
    let calls = fetcher.calls();
    let engine = WorkflowEngine::new().with_data_fetcher(fetcher);

    let def = definition(
        "headless",
        vec![data_source("bureau", "/bureau"), end("end")],
        vec![connect("c1", "bureau", "end")],
    );

    let err = assert_err!(engine.test(&def, json!({})).await);
    assert!(matches!(err, EngineError::NoStartNode(ref id) if id == "headless"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_definition_is_not_mutated() {
    let def = definition(
        "immutable",
        vec![start("start"), end("end")],
        vec![connect("c1", "start", "end")],
    );
    let before = def.clone();

    assert_ok!(WorkflowEngine::new().test(&def, json!({ "a": 1 })).await);
    assert_ok!(WorkflowEngine::new().test(&def, json!({ "a": 2 })).await);

    assert_eq!(def, before);
}

// ============================================================================
// Parallel branches
// ============================================================================

#[tokio::test]
async fn test_start_branches_run_concurrently_in_declaration_order() {
    let fetcher = ScriptedFetcher::new()
        .respond("/slow", Duration::from_millis(150), json!({ "slow": true }))
        .respond("/fast", Duration::ZERO, json!({ "fast": true }));
    let engine = WorkflowEngine::new().with_data_fetcher(fetcher);

    let def = definition(
        "two-starts",
        vec![
            start("start1"),
            data_source("slow", "/slow"),
            end("end1"),
            start("start2"),
            data_source("fast", "/fast"),
            end("end2"),
        ],
        vec![
            connect("c1", "start1", "slow"),
            connect("c2", "slow", "end1"),
            connect("c3", "start2", "fast"),
            connect("c4", "fast", "end2"),
        ],
    );

    let result = assert_ok!(engine.test(&def, json!({})).await);

    assert_eq!(result.results.len(), 2);
    assert_eq!(result.results[0].node_id(), "start1");
    assert_eq!(result.results[1].node_id(), "start2");

    let order = completed_order(&result);
    let pos = |id: &str| order.iter().position(|n| *n == id).unwrap();
    assert!(pos("end2") < pos("end1"));

    assert_eq!(result.output["slow"], json!(true));
    assert_eq!(result.output["fast"], json!(true));
}

#[tokio::test]
async fn test_branch_failure_keeps_sibling_results() {
    let def = definition(
        "partial",
        vec![start("start"), action("score", None), end("end")],
        vec![
            connect("c1", "start", "score"),
            connect("c2", "start", "end"),
        ],
    );

    let result = assert_ok!(WorkflowEngine::new().test(&def, json!({ "riskScore": 610 })).await);

    assert_eq!(result.status, ExecutionState::PartiallyCompleted);
    assert!(!result.is_fully_decisioned());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].node_id, "score");
    assert_eq!(result.errors[0].code, "missing_configuration");
    assert!(result.node_results.contains_key("end"));

    let entries: Vec<_> = result.log_for("score").map(|e| e.status).collect();
    assert_eq!(entries, vec![LogStatus::Started, LogStatus::Error]);
}

#[tokio::test]
async fn test_diamond_runs_shared_node_once_per_path() {
    let def = definition(
        "diamond",
        vec![
            start("start"),
            condition("left", vec![when("a", Operator::Exists, json!(null))]),
            condition("right", vec![when("b", Operator::Exists, json!(null))]),
            end("join"),
        ],
        vec![
            connect("c1", "start", "left"),
            connect("c2", "start", "right"),
            connect("c3", "left", "join"),
            connect("c4", "right", "join"),
        ],
    );

    let result = assert_ok!(WorkflowEngine::new().test(&def, json!({ "a": 1, "b": 2 })).await);

    let completions = result
        .log_for("join")
        .filter(|e| e.status == LogStatus::Completed)
        .count();
    assert_eq!(completions, 2);
    assert_eq!(result.results[0].completed().len(), 2);
    assert_eq!(result.metrics.nodes_executed, 5);
}

#[tokio::test]
async fn test_concurrent_writes_to_same_key() {
    let fetcher = ScriptedFetcher::new()
        .respond("/a", Duration::from_millis(5), json!({ "score": 1 }))
        .respond("/b", Duration::from_millis(5), json!({ "score": 2 }));
    let engine = WorkflowEngine::new().with_data_fetcher(fetcher);

    let def = definition(
        "race",
        vec![
            start("start"),
            data_source("a", "/a"),
            data_source("b", "/b"),
        ],
        vec![connect("c1", "start", "a"), connect("c2", "start", "b")],
    );

    let result = assert_ok!(engine.test(&def, json!({})).await);
    let score = result.output["score"].as_i64().unwrap();
    assert!(score == 1 || score == 2);
    assert_eq!(result.status, ExecutionState::Completed);
}

// ============================================================================
// Data sources and collaborators
// ============================================================================

#[tokio::test]
async fn test_fetched_data_is_visible_to_later_guards() {
    let engine = WorkflowEngine::new().with_data_fetcher(
        FixtureDataFetcher::new().with_api("/bureau/score", object(json!({ "bureauScore": 745 }))),
    );

    let def = definition(
        "bureau",
        vec![
            start("start"),
            data_source("bureau", "/bureau/score"),
            end("approve"),
        ],
        vec![
            connect("c1", "start", "bureau"),
            connect("c2", "bureau", "approve").guarded(when(
                "output.bureauScore",
                Operator::GreaterThan,
                json!(700),
            )),
        ],
    );

    let result = assert_ok!(engine.test(&def, json!({ "riskScore": 610 })).await);

    assert_eq!(result.output["bureauScore"], json!(745));
    assert!(result.node_results.contains_key("approve"));
    assert!(result.metrics.data_source_response_ms.contains_key("bureau"));
}

#[tokio::test]
async fn test_slow_collaborator_times_out() {
    let engine = WorkflowEngine::new()
        .with_config(EngineConfig {
            node_timeout_ms: 20,
            ..Default::default()
        })
        .with_data_fetcher(ScriptedFetcher::new().respond(
            "/bureau",
            Duration::from_millis(500),
            json!({ "bureauScore": 745 }),
        ));

    let def = definition(
        "timeout",
        vec![start("start"), data_source("bureau", "/bureau"), end("end")],
        vec![
            connect("c1", "start", "bureau"),
            connect("c2", "bureau", "end"),
        ],
    );

    let result = assert_ok!(engine.test(&def, json!({})).await);

    assert_eq!(result.status, ExecutionState::Failed);
    assert_eq!(result.errors[0].node_id, "bureau");
    assert_eq!(result.errors[0].code, "timeout");
    assert!(result.output.is_empty());
    assert!(!result.node_results.contains_key("end"));
}

#[tokio::test]
async fn test_service_error_message_is_verbatim() {
    let engine = WorkflowEngine::new().with_business_logic(FailingLogic("bureau offline"));

    let def = definition(
        "service-error",
        vec![start("start"), action("score", Some("score"))],
        vec![connect("c1", "start", "score")],
    );

    let result = assert_ok!(engine.test(&def, json!({})).await);

    assert_eq!(result.status, ExecutionState::Failed);
    assert_eq!(result.errors[0].code, "service_error");
    assert_eq!(result.errors[0].message, "bureau offline");
    let entry = result
        .log_for("score")
        .find(|e| e.status == LogStatus::Error)
        .unwrap();
    assert_eq!(entry.error.as_deref(), Some("bureau offline"));
}

#[tokio::test]
async fn test_dangling_connection_is_reported_against_source() {
    let def = definition(
        "dangling",
        vec![start("start"), end("end")],
        vec![
            connect("c1", "start", "end"),
            connect("c2", "start", "ghost"),
        ],
    );

    let result = assert_ok!(WorkflowEngine::new().test(&def, json!({})).await);

    assert_eq!(result.status, ExecutionState::PartiallyCompleted);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].node_id, "start");
    assert_eq!(result.errors[0].code, "target_node_not_found");
    assert!(result.log_for("ghost").next().is_none());
    assert!(result.results[0].has_failures());
}

#[tokio::test]
async fn test_unknown_validation_fails_closed_with_any_validator() {
    let engine = WorkflowEngine::new().with_validator(ApproveAll);

    let def = definition(
        "kyc",
        vec![
            start("start"),
            WorkflowNode::new(
                "kyc",
                NodeConfig::Validation {
                    validation: Some(ValidationRule::Unknown),
                },
            ),
            end("approve"),
        ],
        vec![
            connect("c1", "start", "kyc"),
            connect("c2", "kyc", "approve").guarded(when(
                "isValid",
                Operator::Equals,
                json!(true),
            )),
        ],
    );

    let result = assert_ok!(engine.test(&def, json!({})).await);

    assert_eq!(result.node_results["kyc"].payload(), json!({ "isValid": false }));
    assert!(!result.node_results.contains_key("approve"));
}

#[tokio::test]
async fn test_payload_fields_named_like_resolver_roots() {
    let def = definition(
        "roots",
        vec![
            start("start"),
            condition(
                "check",
                vec![
                    when("result", Operator::Equals, json!("pass")),
                    when("nodes", Operator::Equals, json!(3)),
                ],
            ),
        ],
        vec![connect("c1", "start", "check")],
    );

    let input = json!({ "result": "pass", "nodes": 3 });
    let result = assert_ok!(WorkflowEngine::new().test(&def, input).await);

    let payload = result.node_results["check"].payload();
    assert_eq!(payload["allConditionsTrue"], json!(true));
}

// ============================================================================
// Full workflows
// ============================================================================

fn credit_engine() -> WorkflowEngine {
    WorkflowEngine::new()
        .with_business_logic(decision_registry())
        .with_data_fetcher(
            FixtureDataFetcher::new()
                .with_api("/bureau/score", object(json!({ "bureauScore": 745 }))),
        )
}

#[tokio::test]
async fn test_credit_workflow_approves_prime_applicant() {
    let def = assert_ok!(WorkflowLoader::from_yaml_str(credit_workflow_yaml()));
    let input = json!({ "applicant": { "name": "Ada" }, "riskScore": 780, "flags": [] });

    let result = assert_ok!(credit_engine().test(&def, input).await);

    assert_eq!(result.status, ExecutionState::Completed);
    assert!(result.node_results.contains_key("approve"));
    assert!(!result.node_results.contains_key("decline"));

    let policy = result.node_results["policy"].payload();
    assert_eq!(policy["rules"][0]["ruleId"], json!("prime"));
    assert_eq!(policy["rules"][0]["outcome"], json!("approve"));
    assert_eq!(policy["anyPassed"], json!(true));
    assert_eq!(policy["allPassed"], json!(false));

    assert_eq!(
        result.node_results["decide"].payload(),
        json!({ "decision": "approve" })
    );
    assert_eq!(
        completed_order(&result),
        vec!["start", "kyc", "bureau", "policy", "decide", "approve"]
    );
}

#[tokio::test]
async fn test_credit_workflow_declines_subprime_applicant() {
    let def = assert_ok!(WorkflowLoader::from_yaml_str(credit_workflow_yaml()));
    let input = json!({ "applicant": { "name": "Bob" }, "riskScore": 620, "flags": ["thin_file"] });

    let result = assert_ok!(credit_engine().test(&def, input).await);

    assert!(result.node_results.contains_key("decline"));
    let policy = result.node_results["policy"].payload();
    assert_eq!(policy["rules"][0]["passed"], json!(false));
    assert_eq!(policy["rules"][1]["outcome"], json!("refer"));
}

#[tokio::test]
async fn test_credit_workflow_stops_on_invalid_application() {
    let def = assert_ok!(WorkflowLoader::from_yaml_str(credit_workflow_yaml()));
    let input = json!({ "applicant": { "name": "Eve" }, "riskScore": 9000 });

    let result = assert_ok!(credit_engine().test(&def, input).await);

    assert_eq!(
        result.node_results["kyc"].payload(),
        json!({ "isValid": false })
    );
    assert!(!result.node_results.contains_key("bureau"));
    assert_eq!(result.status, ExecutionState::Completed);
}

#[tokio::test]
async fn test_result_serializes_as_audit_record() {
    let def = assert_ok!(WorkflowLoader::from_yaml_str(&simple_workflow_yaml("audit")));
    let result = assert_ok!(WorkflowEngine::new().test(&def, json!({ "id": 7 })).await);

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["status"], json!("completed"));
    assert_eq!(value["workflowId"], json!("audit"));
    assert_eq!(value["definitionDigest"], json!(def.digest()));
    assert_eq!(value["nodeResults"]["end"]["kind"], json!("end"));
    assert_eq!(value["results"][0]["outcome"], json!("forked"));
    assert_eq!(value["executionLog"][0]["status"], json!("started"));
}

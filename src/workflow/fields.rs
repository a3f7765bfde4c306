//! Field resolution for dotted paths
//!
//! Paths are split on `.` and walked through nested objects (and arrays, by
//! numeric index). Resolution stops with `None` as soon as a segment cannot be
//! followed; it never fails.
//!
//! The first segment may name an explicit root:
//!
//! - `input.` - the application payload
//! - `output.` - data accumulated by data_source nodes
//! - `nodes.<node_id>.` - the result of an already executed node
//! - `result.` - the result of the node whose connections are being guarded
//! - `execution.id` / `execution.workflow_id`
//!
//! Any other path, and any rooted path that finds nothing, is looked up in the
//! current node result first, then in the output data, then in the input data.

use serde_json::{Map, Value};

use crate::engine::context::ExecutionContext;

const INPUT: &str = "input";
const OUTPUT: &str = "output";
const NODES: &str = "nodes";
const RESULT: &str = "result";
const EXECUTION: &str = "execution";

/// What a condition is evaluated against
#[derive(Clone, Copy)]
pub struct EvaluationScope<'a> {
    context: &'a ExecutionContext,
    result: Option<&'a Value>,
}

impl<'a> EvaluationScope<'a> {
    pub fn new(context: &'a ExecutionContext) -> Self {
        Self {
            context,
            result: None,
        }
    }

    /// Scope for guard evaluation right after a node produced `result`
    pub fn with_result(context: &'a ExecutionContext, result: &'a Value) -> Self {
        Self {
            context,
            result: Some(result),
        }
    }

    pub fn context(&self) -> &'a ExecutionContext {
        self.context
    }
}

/// Resolve a dotted path in the scope. `None` means absent.
///
/// A rooted path that misses is retried as a bare path, so payload fields
/// named `result`, `nodes` and so on still resolve.
pub fn resolve(path: &str, scope: &EvaluationScope<'_>) -> Option<Value> {
    if path.is_empty() {
        return None;
    }
    resolve_rooted(path, scope).or_else(|| resolve_bare(path, scope))
}

fn resolve_rooted(path: &str, scope: &EvaluationScope<'_>) -> Option<Value> {
    let (root, rest) = match path.split_once('.') {
        Some((root, rest)) => (root, Some(rest)),
        None => (path, None),
    };
    let ctx = scope.context;

    match (root, rest) {
        (INPUT, None) => Some(ctx.input().clone()),
        (INPUT, Some(rest)) => resolve_in(ctx.input(), rest).cloned(),
        (OUTPUT, None) => Some(Value::Object(ctx.output())),
        (OUTPUT, Some(rest)) => ctx.with_output(|output| resolve_in_map(output, rest).cloned()),
        (NODES, Some(rest)) => {
            let (node_id, rest) = match rest.split_once('.') {
                Some((node_id, rest)) => (node_id, Some(rest)),
                None => (rest, None),
            };
            let payload = ctx.node_payload(node_id)?;
            match rest {
                Some(rest) => resolve_in(&payload, rest).cloned(),
                None => Some(payload),
            }
        }
        (RESULT, None) => scope.result.cloned(),
        (RESULT, Some(rest)) => scope.result.and_then(|r| resolve_in(r, rest)).cloned(),
        (EXECUTION, Some("id")) => Some(Value::String(ctx.execution_id().to_string())),
        (EXECUTION, Some("workflow_id")) => Some(Value::String(ctx.workflow_id().to_string())),
        _ => None,
    }
}

/// Current node result, then output data, then input data
fn resolve_bare(path: &str, scope: &EvaluationScope<'_>) -> Option<Value> {
    let ctx = scope.context;
    scope
        .result
        .and_then(|r| resolve_in(r, path))
        .cloned()
        .or_else(|| ctx.with_output(|output| resolve_in_map(output, path).cloned()))
        .or_else(|| resolve_in(ctx.input(), path).cloned())
}

/// Walk a dotted path inside a JSON value
pub fn resolve_in<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(root, step)
}

fn resolve_in_map<'v>(map: &'v Map<String, Value>, path: &str) -> Option<&'v Value> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let value = map.get(head)?;
    match rest {
        Some(rest) => resolve_in(value, rest),
        None => Some(value),
    }
}

fn step<'v>(current: &'v Value, segment: &str) -> Option<&'v Value> {
    match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

//! Schema and predicate validator

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{ServiceError, Validator};
use crate::engine::context::ExecutionContext;
use crate::workflow::condition::{compare, to_text};
use crate::workflow::{resolve, EvaluationScope, FieldRule, FieldSchema, Operator, ValidationRule};

/// Signature of a registered predicate: `(params, context) -> valid`
pub type PredicateFn =
    Arc<dyn Fn(&Map<String, Value>, &ExecutionContext) -> Result<bool, String> + Send + Sync>;

/// Validator for `schema` descriptors plus named `custom` predicates
///
/// Schema fields are resolved the same way condition fields are, so a schema
/// can check fetched output data as well as the application payload.
#[derive(Default)]
pub struct SchemaValidator {
    predicates: BTreeMap<String, PredicateFn>,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predicate<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&Map<String, Value>, &ExecutionContext) -> Result<bool, String>
            + Send
            + Sync
            + 'static,
    {
        self.predicates.insert(name.to_string(), Arc::new(f));
        self
    }

    fn check_schema(
        schema: &FieldSchema,
        context: &ExecutionContext,
    ) -> Result<bool, ServiceError> {
        let scope = EvaluationScope::new(context);

        for path in &schema.required {
            if !compare(resolve(path, &scope).as_ref(), &Operator::Exists, &Value::Null) {
                debug!("Required field '{}' is missing", path);
                return Ok(false);
            }
        }

        for (path, rule) in &schema.fields {
            // absent optional fields are not checked
            let Some(value) = resolve(path, &scope).filter(|v| !v.is_null()) else {
                continue;
            };
            if !check_field(rule, &value)? {
                debug!("Field '{}' fails its schema rule", path);
                return Ok(false);
            }
        }

        Ok(true)
    }
}

fn check_field(rule: &FieldRule, value: &Value) -> Result<bool, ServiceError> {
    if let Some(value_type) = rule.value_type {
        if !value_type.matches(value) {
            return Ok(false);
        }
    }
    if let Some(min) = rule.min {
        if !bound_holds(value, |n| n >= min) {
            return Ok(false);
        }
    }
    if let Some(max) = rule.max {
        if !bound_holds(value, |n| n <= max) {
            return Ok(false);
        }
    }
    if let Some(pattern) = &rule.pattern {
        if !Regex::new(pattern)?.is_match(&to_text(value)) {
            return Ok(false);
        }
    }
    if !rule.one_of.is_empty() && !rule.one_of.contains(value) {
        return Ok(false);
    }
    Ok(true)
}

/// Numbers are bounded by value, strings and arrays by length
fn bound_holds(value: &Value, holds: impl Fn(f64) -> bool) -> bool {
    match value {
        Value::Number(n) => n.as_f64().map(&holds).unwrap_or(false),
        Value::String(s) => holds(s.chars().count() as f64),
        Value::Array(items) => holds(items.len() as f64),
        _ => false,
    }
}

#[async_trait]
impl Validator for SchemaValidator {
    async fn validate(
        &self,
        rule: &ValidationRule,
        context: &ExecutionContext,
    ) -> Result<bool, ServiceError> {
        match rule {
            ValidationRule::Schema { schema } => Self::check_schema(schema, context),
            ValidationRule::Custom { validator, params } => {
                let predicate = self.predicates.get(validator).ok_or_else(|| {
                    ServiceError::NotRegistered(format!("validator '{}'", validator))
                })?;
                predicate(params, context).map_err(ServiceError::Failed)
            }
            // unknown validation never passes
            ValidationRule::Unknown => Ok(false),
        }
    }
}

//! In-process business logic registry

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{BusinessLogicExecutor, ServiceError};
use crate::engine::context::ExecutionContext;
use crate::workflow::BusinessLogic;

/// Signature of a registered function: `(params, context) -> result`
pub type LogicFn =
    Arc<dyn Fn(&Map<String, Value>, &ExecutionContext) -> Result<Value, String> + Send + Sync>;

/// Information about a registered function or service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub description: String,
}

impl FunctionInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

struct Entry {
    info: FunctionInfo,
    call: LogicFn,
}

/// Business logic executor backed by named Rust closures
///
/// ```
/// use decision_flow::services::LogicRegistry;
/// use serde_json::json;
///
/// let registry = LogicRegistry::new()
///     .function("approve", "Approve the application", |_params, _ctx| {
///         Ok(json!({ "decision": "approve" }))
///     });
/// assert_eq!(registry.list_functions().len(), 1);
/// ```
///
/// `custom` descriptors are looked up by `function`; `service_call`
/// descriptors by `service` or `service.operation`, the more specific name
/// winning.
#[derive(Default)]
pub struct LogicRegistry {
    functions: BTreeMap<String, Entry>,
    services: BTreeMap<String, Entry>,
}

impl LogicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function for `custom` descriptors
    pub fn function<F>(mut self, name: &str, description: &str, f: F) -> Self
    where
        F: Fn(&Map<String, Value>, &ExecutionContext) -> Result<Value, String>
            + Send
            + Sync
            + 'static,
    {
        self.functions.insert(
            name.to_string(),
            Entry {
                info: FunctionInfo::new(name, description),
                call: Arc::new(f),
            },
        );
        self
    }

    /// Register a handler for `service_call` descriptors
    pub fn service<F>(mut self, name: &str, description: &str, f: F) -> Self
    where
        F: Fn(&Map<String, Value>, &ExecutionContext) -> Result<Value, String>
            + Send
            + Sync
            + 'static,
    {
        self.services.insert(
            name.to_string(),
            Entry {
                info: FunctionInfo::new(name, description),
                call: Arc::new(f),
            },
        );
        self
    }

    pub fn list_functions(&self) -> Vec<FunctionInfo> {
        self.functions.values().map(|e| e.info.clone()).collect()
    }

    pub fn list_services(&self) -> Vec<FunctionInfo> {
        self.services.values().map(|e| e.info.clone()).collect()
    }

    fn lookup<'a>(
        &'a self,
        logic: &'a BusinessLogic,
    ) -> Result<(&'a Entry, &'a Map<String, Value>), ServiceError> {
        match logic {
            BusinessLogic::Custom { function, params } => self
                .functions
                .get(function)
                .map(|entry| (entry, params))
                .ok_or_else(|| ServiceError::NotRegistered(format!("function '{}'", function))),
            BusinessLogic::ServiceCall {
                service,
                operation,
                params,
            } => {
                let qualified = operation.as_ref().map(|op| format!("{}.{}", service, op));
                qualified
                    .as_deref()
                    .and_then(|name| self.services.get(name))
                    .or_else(|| self.services.get(service))
                    .map(|entry| (entry, params))
                    .ok_or_else(|| ServiceError::NotRegistered(format!("service '{}'", service)))
            }
            BusinessLogic::Unknown => Err(ServiceError::Unsupported(logic.type_name().to_string())),
        }
    }
}

#[async_trait]
impl BusinessLogicExecutor for LogicRegistry {
    async fn execute(
        &self,
        logic: &BusinessLogic,
        context: &ExecutionContext,
    ) -> Result<Value, ServiceError> {
        let (entry, params) = self.lookup(logic)?;
        (entry.call)(params, context).map_err(ServiceError::Failed)
    }
}

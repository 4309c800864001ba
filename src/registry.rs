//! Tool registration and dispatch.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{DuplicateToolError, ToolError};
use crate::schema::Schema;

/// The callable bound to a registered tool.
///
/// Implemented for any async closure taking the validated arguments, so
/// simple tools need no struct of their own.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Invoke the tool. Arguments have already been validated against the
    /// tool's schema.
    async fn call(&self, arguments: Value) -> Result<Value>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value>> + Send,
{
    async fn call(&self, arguments: Value) -> Result<Value> {
        (self)(arguments).await
    }
}

/// A tool that can be offered to the model. Immutable after registration.
pub struct Tool {
    pub name: String,
    pub description: String,
    pub schema: Schema,
    handler: Arc<dyn ToolHandler>,
}

impl Tool {
    pub fn new<N, D>(
        name: N,
        description: D,
        schema: Schema,
        handler: impl ToolHandler + 'static,
    ) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Arc::new(handler),
        }
    }

    /// The descriptor advertised to the model endpoint.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.schema.to_json_schema(),
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// The (name, description, parameters) triple sent to the endpoint as an
/// available function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Maps tool names to implementations.
///
/// Registration happens once at startup; afterwards the registry is
/// read-only and safe to share across concurrent `generate` calls.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. The first registration of a name wins; a second
    /// registration fails and leaves the registry unchanged.
    pub fn register(&mut self, tool: Tool) -> Result<(), DuplicateToolError> {
        if self.index.contains_key(&tool.name) {
            return Err(DuplicateToolError(tool.name.clone()));
        }
        self.index.insert(tool.name.clone(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors of all registered tools, in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = ToolDescriptor> + '_ {
        self.tools.iter().map(Tool::descriptor)
    }

    /// Validate arguments and invoke the named tool.
    ///
    /// A failing handler is reported as [`ToolError::Execution`] rather
    /// than propagated; a malfunctioning tool must not crash the
    /// conversation.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "requested tool is not registered");
            return Err(ToolError::NotFound(name.to_string()));
        };
        let validated = tool.schema.validate(&arguments)?;
        debug!(tool = name, "dispatching tool call");
        tool.handler
            .call(validated)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use anyhow::anyhow;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sum_tool() -> Tool {
        Tool::new(
            "sum_numbers",
            "Adds two numbers together",
            Schema::new()
                .field("num1", FieldType::integer(), "First number to add")
                .field("num2", FieldType::integer(), "Second number to add"),
            |arguments: Value| async move {
                let result = arguments["num1"].as_i64().unwrap_or(0)
                    + arguments["num2"].as_i64().unwrap_or(0);
                Ok(json!({ "result": result }))
            },
        )
    }

    #[tokio::test]
    async fn test_dispatch_returns_result_unchanged() {
        let mut registry = ToolRegistry::new();
        registry.register(sum_tool()).unwrap();

        let result = registry
            .dispatch("sum_numbers", json!({"num1": 1900, "num2": 191}))
            .await
            .unwrap();
        assert_eq!(result, json!({"result": 2091}));
    }

    #[tokio::test]
    async fn test_dispatch_invokes_callable_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = ToolRegistry::new();
        registry
            .register(Tool::new(
                "ping",
                "Counts invocations",
                Schema::new(),
                move |_arguments: Value| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(json!("pong"))
                    }
                },
            ))
            .unwrap();

        registry.dispatch("ping", json!({})).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_reach_callable() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = ToolRegistry::new();
        registry
            .register(Tool::new(
                "strict",
                "Requires a name",
                Schema::new().field("name", FieldType::string(), "Name"),
                move |_arguments: Value| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(json!(null))
                    }
                },
            ))
            .unwrap();

        let err = registry.dispatch("strict", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.to_string().contains("name"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.dispatch("missing", json!({})).await.unwrap_err();
        assert_eq!(err, ToolError::NotFound("missing".into()));
    }

    #[tokio::test]
    async fn test_handler_error_is_captured() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Tool::new(
                "flaky",
                "Always fails",
                Schema::new(),
                |_arguments: Value| async move { Err::<Value, _>(anyhow!("disk on fire")) },
            ))
            .unwrap();

        let err = registry.dispatch("flaky", json!({})).await.unwrap_err();
        assert_eq!(err, ToolError::Execution("disk on fire".into()));
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut registry = ToolRegistry::new();
        registry.register(sum_tool()).unwrap();

        let second = Tool::new("sum_numbers", "Impostor", Schema::new(), |_: Value| async {
            Ok(json!(null))
        });
        let err = registry.register(second).unwrap_err();
        assert_eq!(err, DuplicateToolError("sum_numbers".into()));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("sum_numbers").unwrap().description,
            "Adds two numbers together"
        );
    }

    #[test]
    fn test_descriptors_in_registration_order() {
        let mut registry = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .register(Tool::new(name, "A tool", Schema::new(), |_: Value| async {
                    Ok(json!(null))
                }))
                .unwrap();
        }
        let names: Vec<String> = registry.descriptors().map(|d| d.name).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);

        // pure read: a second pass sees the same thing
        let again: Vec<String> = registry.descriptors().map(|d| d.name).collect();
        assert_eq!(names, again);
    }

    #[test]
    fn test_descriptor_carries_json_schema() {
        let descriptor = sum_tool().descriptor();
        assert_eq!(descriptor.parameters["type"], "object");
        assert_eq!(
            descriptor.parameters["required"],
            json!(["num1", "num2"])
        );
    }
}

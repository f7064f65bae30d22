//! Runtime-dispatched connector proxies.
//!
//! The set of connectors and tools is only known once the registry is loaded,
//! so a proxy is a lookup table from tool name to registry entry with a
//! generic `call(name, params)` entry point. Invocation goes through an
//! injected function, which keeps proxies free of transport details:
//!
//! ```text
//! proxy.call("send_message", params)
//!     → resolve name (exact, then underscore-stripped)
//!     → pick connection id (call option > params key > bound)
//!     → invoker(InvocationRequest { action_id, params, connection_id, tenant_id })
//! ```

use crate::error::{FastnError, Result};
use crate::registry::{ConnectorEntry, ToolEntry};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Parameter key accepted as a per-call connection id. Never forwarded.
pub const CONNECTION_ID_PARAM: &str = "connection_id";

/// Everything needed to invoke one action.
#[derive(Clone, Debug, PartialEq)]
pub struct InvocationRequest {
    pub action_id: String,
    pub params: Map<String, Value>,
    pub connection_id: Option<String>,
    pub tenant_id: Option<String>,
}

/// Per-call overrides.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallOptions {
    pub connection_id: Option<String>,
    pub tenant_id: Option<String>,
}

impl CallOptions {
    pub fn connection(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: Some(connection_id.into()),
            tenant_id: None,
        }
    }

    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

pub type Invoker = Arc<dyn Fn(InvocationRequest) -> Result<Value> + Send + Sync>;
pub type AsyncInvoker =
    Arc<dyn Fn(InvocationRequest) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Resolution and request building shared by both proxies.
#[derive(Clone, Debug)]
struct Dispatch {
    connector: Arc<ConnectorEntry>,
    connection_id: Option<String>,
}

impl Dispatch {
    fn resolve(&self, name: &str) -> Result<&ToolEntry> {
        if name.starts_with('_') {
            return Err(FastnError::AttributeNotFound {
                connector: self.connector.name.clone(),
                name: name.to_string(),
            });
        }
        self.connector
            .resolve_tool(name)
            .ok_or_else(|| FastnError::ToolNotFound {
                connector: self.connector.name.clone(),
                tool: name.to_string(),
                has_tools: self.connector.has_tools(),
            })
    }

    fn request(
        &self,
        tool: &ToolEntry,
        params: Value,
        options: CallOptions,
    ) -> Result<InvocationRequest> {
        let mut params = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(FastnError::InvalidParams {
                    message: format!(
                        "parameters for '{}.{}' must be a JSON object, got {}",
                        self.connector.name,
                        tool.name,
                        type_name(&other)
                    ),
                })
            }
        };

        let from_params = params
            .remove(CONNECTION_ID_PARAM)
            .and_then(|v| v.as_str().map(str::to_string));
        let connection_id = options
            .connection_id
            .or(from_params)
            .or_else(|| self.connection_id.clone());

        debug!(
            connector = %self.connector.name,
            tool = %tool.name,
            action_id = %tool.action_id,
            connection_id = ?connection_id,
            "Dispatching tool call"
        );

        Ok(InvocationRequest {
            action_id: tool.action_id.clone(),
            params,
            connection_id,
            tenant_id: options.tenant_id,
        })
    }

    fn members(&self) -> Vec<&str> {
        self.connector.tools.iter().map(|t| t.name.as_str()).collect()
    }

    fn describe(&self, kind: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} {}: {} tools",
            kind,
            self.connector.name,
            self.connector.tools.len()
        )?;
        if let Some(id) = &self.connection_id {
            write!(f, ", connection_id={}", id)?;
        }
        f.write_str(">")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Blocking proxy over one connector.
#[derive(Clone)]
pub struct ConnectorProxy {
    dispatch: Dispatch,
    invoker: Invoker,
}

impl ConnectorProxy {
    pub fn new(connector: Arc<ConnectorEntry>, connection_id: Option<String>, invoker: Invoker) -> Self {
        Self {
            dispatch: Dispatch {
                connector,
                connection_id,
            },
            invoker,
        }
    }

    pub fn name(&self) -> &str {
        &self.dispatch.connector.name
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.dispatch.connection_id.as_deref()
    }

    /// Every tool name, in registry order.
    pub fn members(&self) -> Vec<&str> {
        self.dispatch.members()
    }

    /// Resolve a tool without calling it.
    pub fn tool(&self, name: &str) -> Result<BoundTool<'_>> {
        let tool = self.dispatch.resolve(name)?;
        Ok(BoundTool { proxy: self, tool })
    }

    pub fn call(&self, name: &str, params: Value) -> Result<Value> {
        self.call_with(name, params, CallOptions::default())
    }

    pub fn call_with(&self, name: &str, params: Value, options: CallOptions) -> Result<Value> {
        self.tool(name)?.call_with(params, options)
    }

    /// Same connector, bound to another connection.
    pub fn with_connection(&self, connection_id: impl Into<String>) -> Self {
        Self::new(
            Arc::clone(&self.dispatch.connector),
            Some(connection_id.into()),
            Arc::clone(&self.invoker),
        )
    }
}

impl fmt::Display for ConnectorProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.dispatch.describe("ConnectorProxy", f)
    }
}

impl fmt::Debug for ConnectorProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorProxy")
            .field("connector", &self.dispatch.connector.name)
            .field("connection_id", &self.dispatch.connection_id)
            .field("tools", &self.dispatch.members())
            .finish()
    }
}

/// A resolved tool of a [`ConnectorProxy`].
pub struct BoundTool<'a> {
    proxy: &'a ConnectorProxy,
    tool: &'a ToolEntry,
}

impl BoundTool<'_> {
    pub fn entry(&self) -> &ToolEntry {
        self.tool
    }

    pub fn action_id(&self) -> &str {
        &self.tool.action_id
    }

    pub fn call(&self, params: Value) -> Result<Value> {
        self.call_with(params, CallOptions::default())
    }

    pub fn call_with(&self, params: Value, options: CallOptions) -> Result<Value> {
        let request = self.proxy.dispatch.request(self.tool, params, options)?;
        (self.proxy.invoker)(request)
    }
}

/// Async proxy over one connector. Same resolution and override rules as
/// [`ConnectorProxy`]; the invocation function is awaited.
#[derive(Clone)]
pub struct AsyncConnectorProxy {
    dispatch: Dispatch,
    invoker: AsyncInvoker,
}

impl AsyncConnectorProxy {
    pub fn new(
        connector: Arc<ConnectorEntry>,
        connection_id: Option<String>,
        invoker: AsyncInvoker,
    ) -> Self {
        Self {
            dispatch: Dispatch {
                connector,
                connection_id,
            },
            invoker,
        }
    }

    pub fn name(&self) -> &str {
        &self.dispatch.connector.name
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.dispatch.connection_id.as_deref()
    }

    pub fn members(&self) -> Vec<&str> {
        self.dispatch.members()
    }

    pub fn tool(&self, name: &str) -> Result<AsyncBoundTool<'_>> {
        let tool = self.dispatch.resolve(name)?;
        Ok(AsyncBoundTool { proxy: self, tool })
    }

    pub async fn call(&self, name: &str, params: Value) -> Result<Value> {
        self.call_with(name, params, CallOptions::default()).await
    }

    pub async fn call_with(&self, name: &str, params: Value, options: CallOptions) -> Result<Value> {
        self.tool(name)?.call_with(params, options).await
    }

    pub fn with_connection(&self, connection_id: impl Into<String>) -> Self {
        Self::new(
            Arc::clone(&self.dispatch.connector),
            Some(connection_id.into()),
            Arc::clone(&self.invoker),
        )
    }
}

impl fmt::Display for AsyncConnectorProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.dispatch.describe("AsyncConnectorProxy", f)
    }
}

impl fmt::Debug for AsyncConnectorProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncConnectorProxy")
            .field("connector", &self.dispatch.connector.name)
            .field("connection_id", &self.dispatch.connection_id)
            .field("tools", &self.dispatch.members())
            .finish()
    }
}

pub struct AsyncBoundTool<'a> {
    proxy: &'a AsyncConnectorProxy,
    tool: &'a ToolEntry,
}

impl AsyncBoundTool<'_> {
    pub fn entry(&self) -> &ToolEntry {
        self.tool
    }

    pub fn action_id(&self) -> &str {
        &self.tool.action_id
    }

    pub async fn call(&self, params: Value) -> Result<Value> {
        self.call_with(params, CallOptions::default()).await
    }

    pub async fn call_with(&self, params: Value, options: CallOptions) -> Result<Value> {
        let request = self.proxy.dispatch.request(self.tool, params, options)?;
        (self.proxy.invoker)(request).await
    }
}

//! Error taxonomy shared by every part of the SDK.
//!
//! All failures surface as a single [`FastnError`]. Each variant renders a
//! human-readable message and can describe itself as structured JSON via
//! [`FastnError::details`], which the CLI prints in `--json` mode.

use serde_json::{json, Value};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FastnError>;

#[derive(Debug, Error)]
pub enum FastnError {
    /// Invalid or expired credential.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// Device-flow specific failure. Counts as an auth error.
    #[error("OAuth error ({code}): {message}")]
    OAuth { code: String, message: String },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        missing: Vec<String>,
    },

    /// Non-2xx HTTP response or GraphQL-level error.
    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    #[error("Flow not found: {message}")]
    FlowNotFound { message: String, body: Option<String> },

    #[error("Run not found: {message}")]
    RunNotFound { message: String, body: Option<String> },

    #[error("Connector '{connector}' not found in the registry. Run `fastn kit sync` to refresh it")]
    ConnectorNotFound { connector: String },

    #[error("{}", tool_not_found_message(.connector, .tool, .has_tools))]
    ToolNotFound {
        connector: String,
        tool: String,
        has_tools: bool,
    },

    #[error("{}", connection_not_found_message(.connector, .candidates))]
    ConnectionNotFound {
        connector: String,
        candidates: Vec<String>,
    },

    /// Local registry file missing, corrupt or never synced.
    #[error("Registry error: {message}")]
    Registry { message: String },

    /// Private (underscore-prefixed) names are never resolved as tools.
    #[error("'{connector}' has no attribute '{name}'")]
    AttributeNotFound { connector: String, name: String },

    /// Tool parameters that are not a JSON object.
    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    #[error("Client session has been closed")]
    ClientClosed,
}

fn tool_not_found_message(connector: &str, tool: &str, has_tools: &bool) -> String {
    if *has_tools {
        format!(
            "Tool '{}' not found in connector '{}'. Check the tool name or run `fastn kit sync` to refresh the registry",
            tool, connector
        )
    } else {
        format!(
            "Connector '{}' has no tools installed, so '{}' is unavailable. Install the connector with `fastn kit get {}`",
            connector, tool, connector
        )
    }
}

fn connection_not_found_message(connector: &str, candidates: &[String]) -> String {
    if candidates.is_empty() {
        format!("No connection configured for connector '{}'", connector)
    } else {
        format!(
            "Connector '{}' has {} connections ({}); pass a connection id to choose one",
            connector,
            candidates.len(),
            candidates.join(", ")
        )
    }
}

impl FastnError {
    pub fn auth(message: impl Into<String>) -> Self {
        FastnError::Auth {
            message: message.into(),
        }
    }

    pub fn oauth(code: impl Into<String>, message: impl Into<String>) -> Self {
        FastnError::OAuth {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        FastnError::Config {
            message: message.into(),
            missing: Vec::new(),
        }
    }

    pub fn api(message: impl Into<String>) -> Self {
        FastnError::Api {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    pub fn registry(message: impl Into<String>) -> Self {
        FastnError::Registry {
            message: message.into(),
        }
    }

    /// True for `Auth` and `OAuth`.
    pub fn is_auth(&self) -> bool {
        matches!(self, FastnError::Auth { .. } | FastnError::OAuth { .. })
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            FastnError::Auth { .. } => Some(401),
            FastnError::Api { status, .. } => *status,
            _ => None,
        }
    }

    /// Stable machine-readable kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            FastnError::Auth { .. } => "auth_error",
            FastnError::OAuth { .. } => "oauth_error",
            FastnError::Config { .. } => "config_error",
            FastnError::Api { .. } => "api_error",
            FastnError::FlowNotFound { .. } => "flow_not_found",
            FastnError::RunNotFound { .. } => "run_not_found",
            FastnError::ConnectorNotFound { .. } => "connector_not_found",
            FastnError::ToolNotFound { .. } => "tool_not_found",
            FastnError::ConnectionNotFound { .. } => "connection_not_found",
            FastnError::Registry { .. } => "registry_error",
            FastnError::AttributeNotFound { .. } => "attribute_not_found",
            FastnError::InvalidParams { .. } => "invalid_params",
            FastnError::ClientClosed => "client_closed",
        }
    }

    /// Structured details for programmatic handling.
    pub fn details(&self) -> Value {
        let extra = match self {
            FastnError::OAuth { code, .. } => json!({ "code": code }),
            FastnError::Config { missing, .. } => json!({ "missing": missing }),
            FastnError::Api { status, body, .. } => json!({ "status": status, "body": body }),
            FastnError::FlowNotFound { body, .. } | FastnError::RunNotFound { body, .. } => {
                json!({ "body": body })
            }
            FastnError::ConnectorNotFound { connector } => json!({ "connector": connector }),
            FastnError::ToolNotFound {
                connector,
                tool,
                has_tools,
            } => json!({ "connector": connector, "tool": tool, "has_tools": has_tools }),
            FastnError::ConnectionNotFound {
                connector,
                candidates,
            } => json!({ "connector": connector, "candidates": candidates }),
            FastnError::AttributeNotFound { connector, name } => {
                json!({ "connector": connector, "name": name })
            }
            _ => json!({}),
        };

        json!({
            "kind": self.kind(),
            "message": self.to_string(),
            "details": extra,
        })
    }
}

impl From<reqwest::Error> for FastnError {
    fn from(err: reqwest::Error) -> Self {
        FastnError::Api {
            message: format!("request failed: {}", err),
            status: err.status().map(|s| s.as_u16()),
            body: None,
        }
    }
}

//! Locally synced registry document.
//!
//! Layout on disk (`.fastn/registry.json`):
//!
//! ```text
//! {
//!   "version": ...,
//!   "connectors": {
//!     "<connector>": {
//!       "display_name": ..., "category": ...,
//!       "tools": { "<tool>": { "actionId", "description", "inputSchema", "outputSchema" } }
//!     }
//!   }
//! }
//! ```
//!
//! Connector and tool order follow the document.


use crate::error::{FastnError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const SYNC_HINT: &str = "run `fastn kit sync` to download it";

/// One callable action.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolEntry {
    pub name: String,
    pub action_id: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
}

/// One installed connector and its tools, in registry order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConnectorEntry {
    pub name: String,
    pub display_name: String,
    pub category: String,
    pub tools: Vec<ToolEntry>,
}

impl ConnectorEntry {
    /// Exact tool lookup.
    pub fn tool(&self, name: &str) -> Option<&ToolEntry> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Exact match first, then the first tool (in registry order) whose
    /// underscore-stripped name equals the stripped request.
    ///
    /// `send_message` therefore reaches a tool registered as `sendmessage`,
    /// and when both spellings exist the exact one wins.
    pub fn resolve_tool(&self, name: &str) -> Option<&ToolEntry> {
        if let Some(tool) = self.tool(name) {
            return Some(tool);
        }
        let wanted = strip_underscores(name);
        self.tools
            .iter()
            .find(|t| strip_underscores(&t.name) == wanted)
    }

    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}

fn strip_underscores(name: &str) -> String {
    name.chars().filter(|c| *c != '_').collect()
}

#[derive(Deserialize)]
struct RawConnector {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tools: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTool {
    action_id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    input_schema: Value,
    #[serde(default)]
    output_schema: Value,
}

/// Parsed registry. Immutable once loaded; shared through `Arc`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Registry {
    pub version: Value,
    pub connectors: Vec<Arc<ConnectorEntry>>,
}

impl Registry {
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| FastnError::registry(format!("registry is not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Build a registry from its JSON document.
    ///
    /// # Returns
    /// * `Err(Registry)` - Wrong shape, a tool without an action id, or an
    ///   action id used twice
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut doc) = value else {
            return Err(FastnError::registry("registry document must be a JSON object"));
        };

        let version = doc.remove("version").unwrap_or(Value::Null);
        let connectors = match doc.remove("connectors") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(FastnError::registry("'connectors' must be an object")),
        };

        let mut seen_actions = HashSet::new();
        let mut entries = Vec::with_capacity(connectors.len());

        for (name, raw) in connectors {
            let raw: RawConnector = serde_json::from_value(raw).map_err(|e| {
                FastnError::registry(format!("connector '{}' is malformed: {}", name, e))
            })?;

            let mut tools = Vec::with_capacity(raw.tools.len());
            for (tool_name, raw_tool) in raw.tools {
                let raw_tool: RawTool = serde_json::from_value(raw_tool).map_err(|e| {
                    FastnError::registry(format!(
                        "tool '{}.{}' is malformed: {}",
                        name, tool_name, e
                    ))
                })?;

                if !seen_actions.insert(raw_tool.action_id.clone()) {
                    return Err(FastnError::registry(format!(
                        "action id '{}' appears more than once (last seen on '{}.{}')",
                        raw_tool.action_id, name, tool_name
                    )));
                }

                tools.push(ToolEntry {
                    name: tool_name,
                    action_id: raw_tool.action_id,
                    description: raw_tool.description,
                    input_schema: raw_tool.input_schema,
                    output_schema: raw_tool.output_schema,
                });
            }

            entries.push(Arc::new(ConnectorEntry {
                display_name: raw.display_name.unwrap_or_else(|| name.clone()),
                category: raw.category.unwrap_or_default(),
                name,
                tools,
            }));
        }

        Ok(Self {
            version,
            connectors: entries,
        })
    }

    /// Load the registry file.
    ///
    /// Missing, unreadable and malformed files all fail with a registry error
    /// pointing at `fastn kit sync`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FastnError::registry(format!(
                    "no registry found at {}; {}",
                    path.display(),
                    SYNC_HINT
                )))
            }
            Err(e) => {
                return Err(FastnError::registry(format!(
                    "failed to read {}: {}; {}",
                    path.display(),
                    e,
                    SYNC_HINT
                )))
            }
        };

        let registry = Self::parse(&text).map_err(|e| match e {
            FastnError::Registry { message } => {
                FastnError::registry(format!("{} ({}); {}", message, path.display(), SYNC_HINT))
            }
            other => other,
        })?;

        debug!(
            path = %path.display(),
            connectors = registry.connectors.len(),
            "Registry loaded"
        );
        Ok(registry)
    }

    /// Validate `document` and write it to `path` atomically.
    ///
    /// Writes to a `.tmp` sibling, fsyncs, then renames over the target.
    pub fn save_atomic(path: &Path, document: &Value) -> Result<Self> {
        let registry = Self::from_value(document.clone())?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                FastnError::registry(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_string_pretty(document)
            .map_err(|e| FastnError::registry(format!("failed to encode registry: {}", e)))?;

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path).map_err(|e| {
                FastnError::registry(format!("failed to create {}: {}", tmp_path.display(), e))
            })?;
            file.write_all(json.as_bytes())
                .and_then(|_| file.sync_all())
                .map_err(|e| {
                    FastnError::registry(format!("failed to write {}: {}", tmp_path.display(), e))
                })?;
        }

        fs::rename(&tmp_path, path).map_err(|e| {
            FastnError::registry(format!("failed to replace {}: {}", path.display(), e))
        })?;

        info!(
            path = %path.display(),
            connectors = registry.connectors.len(),
            "Registry saved"
        );
        Ok(registry)
    }

    pub fn connector(&self, name: &str) -> Option<&Arc<ConnectorEntry>> {
        self.connectors.iter().find(|c| c.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

//! Tool descriptors for LLM providers.
//!
//! | Format    | Shape                                                         |
//! |-----------|---------------------------------------------------------------|
//! | OpenAI    | `{type: "function", function: {name, description, parameters}}` |
//! | Anthropic | `{name, description, input_schema}`                           |
//! | Gemini    | `{name, description, parameters}`                             |
//! | Bedrock   | `{toolSpec: {name, description, inputSchema: {json}}}`        |
//! | Raw       | `{name, description, actionId, connector, inputSchema}`       |
//!
//! Every format except Raw passes the input schema through [`unwrap_schema`].

use crate::catalog::ToolMatch;
use crate::error::{FastnError, Result};
use crate::registry::ToolEntry;
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ToolFormat {
    #[default]
    OpenAI,
    Anthropic,
    Gemini,
    Bedrock,
    Raw,
}

impl ToolFormat {
    pub const ALL: [ToolFormat; 5] = [
        ToolFormat::OpenAI,
        ToolFormat::Anthropic,
        ToolFormat::Gemini,
        ToolFormat::Bedrock,
        ToolFormat::Raw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolFormat::OpenAI => "openai",
            ToolFormat::Anthropic => "anthropic",
            ToolFormat::Gemini => "gemini",
            ToolFormat::Bedrock => "bedrock",
            ToolFormat::Raw => "raw",
        }
    }
}

impl fmt::Display for ToolFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolFormat {
    type Err = FastnError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        ToolFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| {
                FastnError::config(format!(
                    "unknown tool format '{}' (expected openai, anthropic, gemini, bedrock or raw)",
                    s
                ))
            })
    }
}

/// Generic tool description fed to the converters.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub action_id: String,
    pub connector: String,
}

impl ToolDefinition {
    pub fn from_entry(connector: &str, tool: &ToolEntry) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.input_schema.clone(),
            action_id: tool.action_id.clone(),
            connector: connector.to_string(),
        }
    }
}

impl From<&ToolMatch> for ToolDefinition {
    fn from(m: &ToolMatch) -> Self {
        Self::from_entry(&m.connector, &m.tool)
    }
}

fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// Strip a single synthetic container property.
///
/// When `properties` holds exactly one entry and that entry is an
/// object-typed schema, the result is that entry's `type`, `properties` and
/// `required`. Anything else is returned unchanged. A missing or non-object
/// schema becomes an empty object schema.
///
/// Only one level is removed per call. A schema wrapped twice keeps its
/// inner container, and unwrapping the result again removes that too.
pub fn unwrap_schema(schema: &Value) -> Value {
    let Some(outer) = schema.as_object() else {
        return empty_schema();
    };

    let inner = outer
        .get("properties")
        .and_then(Value::as_object)
        .filter(|props| props.len() == 1)
        .and_then(|props| props.values().next())
        .and_then(Value::as_object)
        .filter(|inner| inner.get("type").and_then(Value::as_str) == Some("object"));

    let Some(inner) = inner else {
        return schema.clone();
    };

    let mut flat = Map::new();
    flat.insert("type".to_string(), json!("object"));
    flat.insert(
        "properties".to_string(),
        inner.get("properties").cloned().unwrap_or_else(|| json!({})),
    );
    if let Some(required) = inner.get("required") {
        flat.insert("required".to_string(), required.clone());
    }
    Value::Object(flat)
}

pub fn to_openai(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": unwrap_schema(&tool.input_schema),
        }
    })
}

pub fn to_anthropic(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": unwrap_schema(&tool.input_schema),
    })
}

pub fn to_gemini(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "parameters": unwrap_schema(&tool.input_schema),
    })
}

pub fn to_bedrock(tool: &ToolDefinition) -> Value {
    json!({
        "toolSpec": {
            "name": tool.name,
            "description": tool.description,
            "inputSchema": { "json": unwrap_schema(&tool.input_schema) },
        }
    })
}

pub fn to_raw(tool: &ToolDefinition) -> Value {
    let schema = if tool.input_schema.is_object() {
        tool.input_schema.clone()
    } else {
        empty_schema()
    };
    json!({
        "name": tool.name,
        "description": tool.description,
        "actionId": tool.action_id,
        "connector": tool.connector,
        "inputSchema": schema,
    })
}

type Converter = fn(&ToolDefinition) -> Value;

const CONVERTERS: [(ToolFormat, Converter); 5] = [
    (ToolFormat::OpenAI, to_openai),
    (ToolFormat::Anthropic, to_anthropic),
    (ToolFormat::Gemini, to_gemini),
    (ToolFormat::Bedrock, to_bedrock),
    (ToolFormat::Raw, to_raw),
];

fn converter(format: ToolFormat) -> Converter {
    CONVERTERS
        .iter()
        .find(|(f, _)| *f == format)
        .map(|(_, c)| *c)
        .unwrap_or(to_raw)
}

/// Convert every tool into `format`.
pub fn convert(format: ToolFormat, tools: &[ToolDefinition]) -> Vec<Value> {
    let convert_one = converter(format);
    tools.iter().map(convert_one).collect()
}

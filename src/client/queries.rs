//! GraphQL documents and response types used by the client namespaces.

use crate::error::{FastnError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const LIST_PROJECTS: &str = r#"
query ListProjects {
  projects {
    id
    name
  }
}"#;

pub const LIST_SKILLS: &str = r#"
query ListSkills($projectId: String!) {
  skills(projectId: $projectId) {
    id
    name
    description
  }
}"#;

pub const LIST_CONNECTIONS: &str = r#"
query ListConnections($projectId: String!, $connectorId: String!) {
  connections(projectId: $projectId, connectorId: $connectorId) {
    id
    name
    status
  }
}"#;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// State of one skill run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRun {
    #[serde(default, alias = "id")]
    pub run_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// An authenticated account behind a connector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Decode `data[key]` of a GraphQL reply. A null or missing field decodes
/// from JSON `null` (an empty list for `Vec` targets).
pub(crate) fn field<T: DeserializeOwned>(data: &Value, key: &str) -> Result<T> {
    let value = match data.get(key) {
        None | Some(Value::Null) => Value::Array(Vec::new()),
        Some(v) => v.clone(),
    };
    serde_json::from_value(value)
        .map_err(|e| FastnError::api(format!("unexpected '{}' in GraphQL response: {}", key, e)))
}

pub(crate) fn decode_run(value: Value, fallback_id: &str) -> Result<SkillRun> {
    let mut run: SkillRun = serde_json::from_value(value)
        .map_err(|e| FastnError::api(format!("unexpected run response: {}", e)))?;
    if run.run_id.is_empty() {
        run.run_id = fallback_id.to_string();
    }
    Ok(run)
}

/// Pick a connection id for `connector`.
///
/// # Returns
/// * `Ok(id)` - The requested id, or the only candidate
/// * `Err(ConnectionNotFound)` - No candidates, or several and none requested
pub fn select_connection(
    connector: &str,
    requested: Option<&str>,
    candidates: &[Connection],
) -> Result<String> {
    if let Some(id) = requested {
        return Ok(id.to_string());
    }
    match candidates {
        [only] => Ok(only.id.clone()),
        _ => Err(FastnError::ConnectionNotFound {
            connector: connector.to_string(),
            candidates: candidates.iter().map(|c| c.id.clone()).collect(),
        }),
    }
}

//! Client facades.
//!
//! [`FastnClient`] blocks the calling thread on every network call;
//! [`AsyncFastnClient`] runs on tokio. Both are built by [`ClientBuilder`],
//! which resolves the configuration once:
//!
//! ```no_run
//! use fastn::{FastnClient, ToolFormat};
//! use serde_json::json;
//!
//! # fn main() -> fastn::Result<()> {
//! let client = FastnClient::builder().api_key("key").project_id("proj").build()?;
//! let slack = client.connector("slack")?;
//! slack.call("send_message", json!({"channel": "general", "text": "hi"}))?;
//!
//! let tools = client.get_tools_for("send message", None, ToolFormat::OpenAI)?;
//! # Ok(())
//! # }
//! ```

pub mod async_client;
pub mod blocking;
pub mod queries;

pub use async_client::{AsyncConnectionScope, AsyncFastnClient};
pub use blocking::{ConnectionScope, FastnClient};
pub use queries::{Connection, Project, Skill, SkillRun};

use crate::catalog::Catalog;
use crate::config::{
    config_path, registry_path, resolve, ConfigFile, FastnConfig, PartialConfig, Stage,
    ENV_VERBOSE,
};
use crate::convert::{convert, ToolDefinition, ToolFormat};
use crate::error::{FastnError, Result};
use crate::proxy::{InvocationRequest, CONNECTION_ID_PARAM};
use crate::registry::Registry;
use crate::transport::TransportOptions;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

pub const EXECUTE_PATH: &str = "/ucl/executeTool";
pub const REGISTRY_PATH: &str = "/ucl/registry";

pub(crate) fn flow_run_path(skill_id: &str) -> String {
    format!("/flows/{}/run", urlencoding::encode(skill_id))
}

pub(crate) fn run_status_path(run_id: &str) -> String {
    format!("/flows/runs/{}", urlencoding::encode(run_id))
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Collects constructor values and builds either client.
///
/// Unset values fall through to `FASTN_*` variables, then
/// `<project_dir>/.fastn/config.json`, then defaults.
#[derive(Default)]
pub struct ClientBuilder {
    values: PartialConfig,
    project_dir: Option<PathBuf>,
    env_lookup: Option<EnvLookup>,
    timeout: Option<Duration>,
    verbose: Option<bool>,
    registry: Option<Registry>,
}

macro_rules! setter {
    ($name:ident) => {
        pub fn $name(mut self, value: impl Into<String>) -> Self {
            self.values.$name = Some(value.into());
            self
        }
    };
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    setter!(api_key);
    setter!(project_id);
    setter!(auth_token);
    setter!(tenant_id);
    setter!(connection_id);
    setter!(base_url);
    setter!(auth_url);

    pub fn stage(mut self, stage: Stage) -> Self {
        self.values.stage = Some(stage.as_str().to_string());
        self
    }

    /// Directory holding `.fastn/`. Defaults to the working directory.
    pub fn project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    /// Replace the process environment as the source of `FASTN_*` values.
    pub fn env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env_lookup = Some(Box::new(lookup));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Log every request and response at info level.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    /// Use an in-memory registry instead of the registry file.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Resolve the configuration and build a blocking client.
    ///
    /// Only a credential is required here. Without a project id, and with no
    /// workspace id in the auth token, catalog operations still work but
    /// every network call fails with a config error naming `project_id`.
    pub fn build(self) -> Result<FastnClient> {
        FastnClient::from_parts(self.into_parts()?)
    }

    /// Async counterpart of [`build`](Self::build), with the same requirements.
    pub fn build_async(self) -> Result<AsyncFastnClient> {
        AsyncFastnClient::from_parts(self.into_parts()?)
    }

    fn env(&self, key: &str) -> Option<String> {
        match &self.env_lookup {
            Some(lookup) => lookup(key),
            None => std::env::var(key).ok(),
        }
    }

    fn into_parts(self) -> Result<ClientParts> {
        let project_dir = match &self.project_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()
                .map_err(|e| FastnError::config(format!("cannot determine working directory: {}", e)))?,
        };

        let env = PartialConfig::from_lookup(|key| self.env(key));
        let file = ConfigFile::load(config_path(&project_dir))?;
        let config = resolve(&self.values, &env, Some(&file))?;

        let verbose = self
            .verbose
            .or_else(|| self.env(ENV_VERBOSE).map(|v| is_truthy(&v)))
            .unwrap_or(false);
        let options = TransportOptions {
            timeout: self.timeout.unwrap_or(crate::transport::DEFAULT_TIMEOUT),
            verbose,
        };

        debug!(
            project_dir = %project_dir.display(),
            stage = %config.stage,
            bearer = config.uses_bearer(),
            "Client configuration resolved"
        );

        Ok(ClientParts {
            catalog: CatalogCell::new(registry_path(&project_dir), self.registry.map(Catalog::new)),
            config,
            options,
            project_dir,
        })
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub(crate) struct ClientParts {
    pub config: FastnConfig,
    pub options: TransportOptions,
    pub project_dir: PathBuf,
    pub catalog: CatalogCell,
}

/// Lazily loaded catalog, replaced wholesale after a sync.
pub(crate) struct CatalogCell {
    path: PathBuf,
    current: RwLock<Option<Catalog>>,
}

impl CatalogCell {
    fn new(path: PathBuf, seeded: Option<Catalog>) -> Self {
        Self {
            path,
            current: RwLock::new(seeded),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Result<Catalog> {
        if let Some(catalog) = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(catalog.clone());
        }

        let catalog = Catalog::load(&self.path)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(catalog.clone());
        Ok(catalog)
    }

    pub fn replace(&self, catalog: Catalog) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(catalog);
    }
}

/// Build the invocation for `execute`.
///
/// The explicit connection id wins, then a `connection_id` key in `params`,
/// then `default_connection`. The key is always removed from the parameters.
pub(crate) fn invocation(
    action_id: &str,
    params: Value,
    connection_id: Option<&str>,
    tenant_id: Option<&str>,
    default_connection: Option<&str>,
) -> Result<InvocationRequest> {
    let mut params = match params {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        _ => {
            return Err(FastnError::InvalidParams {
                message: format!("parameters for action '{}' must be a JSON object", action_id),
            })
        }
    };
    let from_params = params
        .remove(CONNECTION_ID_PARAM)
        .and_then(|v| v.as_str().map(str::to_string));

    Ok(InvocationRequest {
        action_id: action_id.to_string(),
        params,
        connection_id: connection_id
            .map(str::to_string)
            .or(from_params)
            .or_else(|| default_connection.map(str::to_string)),
        tenant_id: tenant_id.map(str::to_string),
    })
}

/// Request body of `POST /ucl/executeTool`.
pub(crate) fn execute_payload(request: &InvocationRequest) -> Value {
    let mut payload = json!({
        "actionId": request.action_id,
        "parameters": request.params,
    });
    if let Some(id) = &request.connection_id {
        payload["connectionId"] = json!(id);
    }
    payload
}

/// Search the catalog and convert the hits.
pub(crate) fn tools_for(
    catalog: &Catalog,
    query: &str,
    connector: Option<&str>,
    format: ToolFormat,
) -> Result<Vec<Value>> {
    let definitions: Vec<ToolDefinition> = catalog
        .search(query, connector)?
        .iter()
        .map(ToolDefinition::from)
        .collect();
    Ok(convert(format, &definitions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_invocation_connection_precedence() {
        let params = json!({"text": "hi", "connection_id": "from_params"});

        let req = invocation("a", params.clone(), Some("explicit"), None, Some("default")).unwrap();
        assert_eq!(req.connection_id.as_deref(), Some("explicit"));
        assert!(!req.params.contains_key("connection_id"));

        let req = invocation("a", params, None, None, Some("default")).unwrap();
        assert_eq!(req.connection_id.as_deref(), Some("from_params"));

        let req = invocation("a", json!({}), None, Some("acme"), Some("default")).unwrap();
        assert_eq!(req.connection_id.as_deref(), Some("default"));
        assert_eq!(req.tenant_id.as_deref(), Some("acme"));
    }

    #[test]
    fn test_invocation_rejects_non_object() {
        assert!(matches!(
            invocation("a", json!("text"), None, None, None),
            Err(FastnError::InvalidParams { .. })
        ));
    }

    #[test]
    fn test_execute_payload() {
        let req = invocation("act_1", json!({"x": 1}), Some("c1"), None, None).unwrap();
        assert_eq!(
            execute_payload(&req),
            json!({"actionId": "act_1", "parameters": {"x": 1}, "connectionId": "c1"})
        );

        let req = invocation("act_1", Value::Null, None, None, None).unwrap();
        assert_eq!(
            execute_payload(&req),
            json!({"actionId": "act_1", "parameters": {}})
        );
    }

    #[test]
    fn test_paths_are_encoded() {
        assert_eq!(flow_run_path("skill 1"), "/flows/skill%201/run");
        assert_eq!(run_status_path("r/1"), "/flows/runs/r%2F1");
    }

    #[test]
    fn test_builder_precedence_over_env_and_file() {
        let dir = TempDir::new().unwrap();
        let mut file = ConfigFile::load(config_path(dir.path())).unwrap();
        file.set_str("api_key", Some("file-key"));
        file.set_str("project_id", Some("file-proj"));
        file.set_str("stage", Some("DEV"));
        file.save().unwrap();

        let client = ClientBuilder::new()
            .project_dir(dir.path())
            .env_lookup(|key| (key == "FASTN_PROJECT_ID").then(|| "env-proj".to_string()))
            .api_key("ctor-key")
            .build()
            .unwrap();

        let config = client.config();
        assert_eq!(config.api_key.as_deref(), Some("ctor-key"));
        assert_eq!(config.project_id.as_deref(), Some("env-proj"));
        assert_eq!(config.stage, Stage::Dev);
    }

    #[test]
    fn test_api_key_without_project_fails_on_call() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::from_value(json!({
            "connectors": {"slack": {"tools": {"send_message": {"actionId": "act_1"}}}}
        }))
        .unwrap();
        let client = ClientBuilder::new()
            .project_dir(dir.path())
            .env_lookup(|_| None)
            .api_key("key")
            .base_url("http://127.0.0.1:9")
            .registry(registry)
            .build()
            .unwrap();

        assert_eq!(client.kit().list().unwrap().len(), 1);
        match client.execute("act_1", json!({}), None, None) {
            Err(FastnError::Config { missing, .. }) => assert_eq!(missing, vec!["project_id"]),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_without_credentials_fails() {
        let dir = TempDir::new().unwrap();
        let result = ClientBuilder::new()
            .project_dir(dir.path())
            .env_lookup(|_| None)
            .build();
        assert!(matches!(result, Err(FastnError::Config { .. })));
    }

    #[test]
    fn test_verbose_from_env() {
        assert!(is_truthy("1"));
        assert!(is_truthy("TRUE"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
    }
}

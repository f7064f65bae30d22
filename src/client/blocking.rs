//! Blocking client.

use super::queries::{
    decode_run, field, select_connection, Connection, Project, Skill, SkillRun, LIST_CONNECTIONS,
    LIST_PROJECTS, LIST_SKILLS,
};
use super::{
    execute_payload, flow_run_path, invocation, run_status_path, tools_for, CatalogCell,
    ClientBuilder, ClientParts, EXECUTE_PATH, REGISTRY_PATH,
};
use crate::catalog::{Catalog, ConnectorSummary};
use crate::config::FastnConfig;
use crate::convert::ToolFormat;
use crate::error::{FastnError, Result};
use crate::proxy::{ConnectorProxy, InvocationRequest, Invoker};
use crate::registry::{ConnectorEntry, Registry, ToolEntry};
use crate::transport::BlockingTransport;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

struct Inner {
    transport: BlockingTransport,
    catalog: CatalogCell,
    project_dir: PathBuf,
}

/// Blocking facade. Cheap to clone; clones share one transport.
#[derive(Clone)]
pub struct FastnClient {
    inner: Arc<Inner>,
}

impl FastnClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Client configured from the environment and `./.fastn/config.json`.
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    pub(crate) fn from_parts(parts: ClientParts) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                transport: BlockingTransport::new(parts.config, &parts.options)?,
                catalog: parts.catalog,
                project_dir: parts.project_dir,
            }),
        })
    }

    /// Current configuration, including any refreshed token.
    pub fn config(&self) -> FastnConfig {
        self.inner.transport.config()
    }

    pub fn project_dir(&self) -> &Path {
        &self.inner.project_dir
    }

    pub fn registry_path(&self) -> &Path {
        self.inner.catalog.path()
    }

    pub fn catalog(&self) -> Result<Catalog> {
        self.inner.catalog.get()
    }

    /// Proxy for `name`, bound to the configured connection id.
    pub fn connector(&self, name: &str) -> Result<ConnectorProxy> {
        self.proxy(name, self.config().connection_id)
    }

    /// Scope whose proxies and calls use `connection_id`.
    pub fn connect(&self, connection_id: impl Into<String>) -> ConnectionScope<'_> {
        ConnectionScope {
            client: self,
            connection_id: connection_id.into(),
        }
    }

    fn proxy(&self, name: &str, connection_id: Option<String>) -> Result<ConnectorProxy> {
        let entry = self.catalog()?.get(name)?;
        let client = self.clone();
        let invoker: Invoker = Arc::new(move |request: InvocationRequest| client.invoke(request));
        Ok(ConnectorProxy::new(entry, connection_id, invoker))
    }

    /// Invoke one action.
    ///
    /// # Arguments
    /// * `action_id` - Registry action identifier
    /// * `params` - JSON object of tool parameters (`null` for none)
    /// * `connection_id` - Overrides a `connection_id` key in `params` and the configured id
    /// * `tenant_id` - Replaces the `x-tenant` header for this call
    pub fn execute(
        &self,
        action_id: &str,
        params: Value,
        connection_id: Option<&str>,
        tenant_id: Option<&str>,
    ) -> Result<Value> {
        let config = self.config();
        let request = invocation(
            action_id,
            params,
            connection_id,
            tenant_id,
            config.connection_id.as_deref(),
        )?;
        self.invoke(request)
    }

    /// Send a prepared invocation. Proxies delegate here.
    pub fn invoke(&self, request: InvocationRequest) -> Result<Value> {
        self.inner.transport.post_as_tenant(
            EXECUTE_PATH,
            &execute_payload(&request),
            request.tenant_id.as_deref(),
        )
    }

    /// Search installed tools and convert them for an LLM provider.
    pub fn get_tools_for(
        &self,
        query: &str,
        connector: Option<&str>,
        format: ToolFormat,
    ) -> Result<Vec<Value>> {
        tools_for(&self.catalog()?, query, connector, format)
    }

    pub fn projects(&self) -> Projects<'_> {
        Projects { client: self }
    }

    pub fn skills(&self) -> Skills<'_> {
        Skills { client: self }
    }

    pub fn kit(&self) -> Kit<'_> {
        Kit { client: self }
    }

    fn space_id(&self) -> Result<String> {
        self.config().space_id().ok_or_else(|| FastnError::Config {
            message: "no project id configured".to_string(),
            missing: vec!["project_id".to_string()],
        })
    }
}

/// Calls bound to one connection id.
pub struct ConnectionScope<'a> {
    client: &'a FastnClient,
    connection_id: String,
}

impl ConnectionScope<'_> {
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn connector(&self, name: &str) -> Result<ConnectorProxy> {
        self.client.proxy(name, Some(self.connection_id.clone()))
    }

    pub fn execute(&self, action_id: &str, params: Value) -> Result<Value> {
        self.client
            .execute(action_id, params, Some(&self.connection_id), None)
    }
}

pub struct Projects<'a> {
    client: &'a FastnClient,
}

impl Projects<'_> {
    pub fn list(&self) -> Result<Vec<Project>> {
        let data = self.client.inner.transport.graphql(LIST_PROJECTS, json!({}))?;
        field(&data, "projects")
    }

    /// Configured project id, else the workspace id in the auth token.
    pub fn current(&self) -> Option<String> {
        self.client.config().space_id()
    }
}

pub struct Skills<'a> {
    client: &'a FastnClient,
}

impl Skills<'_> {
    pub fn list(&self) -> Result<Vec<Skill>> {
        let project_id = self.client.space_id()?;
        let data = self
            .client
            .inner
            .transport
            .graphql(LIST_SKILLS, json!({ "projectId": project_id }))?;
        field(&data, "skills")
    }

    /// Start a run of `skill_id`. Unknown skills fail with `FlowNotFound`.
    pub fn run(&self, skill_id: &str, input: Value) -> Result<SkillRun> {
        let response = self
            .client
            .inner
            .transport
            .post(&flow_run_path(skill_id), &json!({ "input": input }))?;
        let run = decode_run(response, "")?;
        info!(skill_id = %skill_id, run_id = %run.run_id, status = %run.status, "Skill run started");
        Ok(run)
    }

    /// Unknown runs fail with `RunNotFound`.
    pub fn get_run(&self, run_id: &str) -> Result<SkillRun> {
        let response = self.client.inner.transport.get(&run_status_path(run_id))?;
        decode_run(response, run_id)
    }
}

pub struct Kit<'a> {
    client: &'a FastnClient,
}

impl Kit<'_> {
    pub fn list(&self) -> Result<Vec<ConnectorSummary>> {
        Ok(self.client.catalog()?.list())
    }

    pub fn get(&self, connector: &str) -> Result<Arc<ConnectorEntry>> {
        self.client.catalog()?.get(connector)
    }

    pub fn tools(&self, connector: &str) -> Result<Vec<ToolEntry>> {
        self.client.catalog()?.get_tools(connector)
    }

    /// Download the registry, write it atomically and swap the catalog.
    pub fn sync(&self) -> Result<Vec<ConnectorSummary>> {
        let document = self.client.inner.transport.get(REGISTRY_PATH)?;
        let registry = Registry::save_atomic(self.client.registry_path(), &document)?;
        let catalog = Catalog::new(registry);
        let summary = catalog.list();
        self.client.inner.catalog.replace(catalog);
        info!(connectors = summary.len(), "Registry synced");
        Ok(summary)
    }

    pub fn connections(&self, connector: &str) -> Result<Vec<Connection>> {
        let project_id = self.client.space_id()?;
        let data = self.client.inner.transport.graphql(
            LIST_CONNECTIONS,
            json!({ "projectId": project_id, "connectorId": connector }),
        )?;
        field(&data, "connections")
    }

    /// `requested` when given, else the connector's only connection.
    pub fn resolve_connection(&self, connector: &str, requested: Option<&str>) -> Result<String> {
        if let Some(id) = requested {
            return Ok(id.to_string());
        }
        let candidates = self.connections(connector)?;
        select_connection(connector, None, &candidates)
    }
}

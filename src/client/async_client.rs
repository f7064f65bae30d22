//! Async client.

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
use crate::proxy::{AsyncConnectorProxy, AsyncInvoker, InvocationRequest};
use crate::registry::{ConnectorEntry, Registry, ToolEntry};
use crate::transport::AsyncTransport;
use futures::FutureExt;
use serde_json::{json, Value};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

struct Inner {
    transport: AsyncTransport,
    catalog: CatalogCell,
    project_dir: PathBuf,
}

/// Async facade. Clones share one transport; closing any clone closes all.
#[derive(Clone)]
pub struct AsyncFastnClient {
    inner: Arc<Inner>,
}

/// Closes the client when dropped, whichever way the session ends.
struct CloseGuard(AsyncFastnClient);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl AsyncFastnClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn new() -> Result<Self> {
        ClientBuilder::new().build_async()
    }

    pub(crate) fn from_parts(parts: ClientParts) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                transport: AsyncTransport::new(parts.config, &parts.options)?,
                catalog: parts.catalog,
                project_dir: parts.project_dir,
            }),
        })
    }

    /// Build a client, run `f` with it, and close it on every exit path:
    /// success, error, panic, or the session future being dropped.
    ///
    /// Closing only marks the client closed. The HTTP connection pool is
    /// released when the last clone of the client, including those held by
    /// proxies, is dropped.
    ///
    /// ```no_run
    /// # async fn demo() -> fastn::Result<()> {
    /// use fastn::AsyncFastnClient;
    /// use serde_json::json;
    ///
    /// let result = AsyncFastnClient::session(AsyncFastnClient::builder(), |client| async move {
    ///     let slack = client.connector("slack")?;
    ///     slack.call("send_message", json!({"channel": "general", "text": "hi"})).await
    /// })
    /// .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn session<F, Fut, T>(builder: ClientBuilder, f: F) -> Result<T>
    where
        F: FnOnce(AsyncFastnClient) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let client = builder.build_async()?;
        let _guard = CloseGuard(client.clone());
        f(client).await
    }

    /// Close the transport. Later network calls fail with `ClientClosed`.
    ///
    /// Idle connections stay pooled until every clone is dropped.
    pub fn close(&self) {
        self.inner.transport.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.transport.is_closed()
    }

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

    pub fn connector(&self, name: &str) -> Result<AsyncConnectorProxy> {
        self.proxy(name, self.config().connection_id)
    }

    pub fn connect(&self, connection_id: impl Into<String>) -> AsyncConnectionScope {
        AsyncConnectionScope {
            client: self.clone(),
            connection_id: connection_id.into(),
        }
    }

    fn proxy(&self, name: &str, connection_id: Option<String>) -> Result<AsyncConnectorProxy> {
        let entry = self.catalog()?.get(name)?;
        let client = self.clone();
        let invoker: AsyncInvoker = Arc::new(move |request: InvocationRequest| {
            let client = client.clone();
            async move { client.invoke(request).await }.boxed()
        });
        Ok(AsyncConnectorProxy::new(entry, connection_id, invoker))
    }

    /// Invoke one action. See [`FastnClient::execute`](super::FastnClient::execute).
    pub async fn execute(
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
        self.invoke(request).await
    }

    pub async fn invoke(&self, request: InvocationRequest) -> Result<Value> {
        debug!(action_id = %request.action_id, "Executing action");
        self.inner
            .transport
            .post_as_tenant(
                EXECUTE_PATH,
                &execute_payload(&request),
                request.tenant_id.as_deref(),
            )
            .await
    }

    pub fn get_tools_for(
        &self,
        query: &str,
        connector: Option<&str>,
        format: ToolFormat,
    ) -> Result<Vec<Value>> {
        tools_for(&self.catalog()?, query, connector, format)
    }

    pub fn projects(&self) -> AsyncProjects<'_> {
        AsyncProjects { client: self }
    }

    pub fn skills(&self) -> AsyncSkills<'_> {
        AsyncSkills { client: self }
    }

    pub fn kit(&self) -> AsyncKit<'_> {
        AsyncKit { client: self }
    }

    fn space_id(&self) -> Result<String> {
        self.config().space_id().ok_or_else(|| FastnError::Config {
            message: "no project id configured".to_string(),
            missing: vec!["project_id".to_string()],
        })
    }
}

/// Calls bound to one connection id. Owns a client handle so it can be
/// moved into spawned tasks.
#[derive(Clone)]
pub struct AsyncConnectionScope {
    client: AsyncFastnClient,
    connection_id: String,
}

impl AsyncConnectionScope {
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn connector(&self, name: &str) -> Result<AsyncConnectorProxy> {
        self.client.proxy(name, Some(self.connection_id.clone()))
    }

    pub async fn execute(&self, action_id: &str, params: Value) -> Result<Value> {
        self.client
            .execute(action_id, params, Some(&self.connection_id), None)
            .await
    }
}

pub struct AsyncProjects<'a> {
    client: &'a AsyncFastnClient,
}

impl AsyncProjects<'_> {
    pub async fn list(&self) -> Result<Vec<Project>> {
        let data = self
            .client
            .inner
            .transport
            .graphql(LIST_PROJECTS, json!({}))
            .await?;
        field(&data, "projects")
    }

    pub fn current(&self) -> Option<String> {
        self.client.config().space_id()
    }
}

pub struct AsyncSkills<'a> {
    client: &'a AsyncFastnClient,
}

impl AsyncSkills<'_> {
    pub async fn list(&self) -> Result<Vec<Skill>> {
        let project_id = self.client.space_id()?;
        let data = self
            .client
            .inner
            .transport
            .graphql(LIST_SKILLS, json!({ "projectId": project_id }))
            .await?;
        field(&data, "skills")
    }

    pub async fn run(&self, skill_id: &str, input: Value) -> Result<SkillRun> {
        let response = self
            .client
            .inner
            .transport
            .post(&flow_run_path(skill_id), &json!({ "input": input }))
            .await?;
        let run = decode_run(response, "")?;
        info!(skill_id = %skill_id, run_id = %run.run_id, status = %run.status, "Skill run started");
        Ok(run)
    }

    pub async fn get_run(&self, run_id: &str) -> Result<SkillRun> {
        let response = self
            .client
            .inner
            .transport
            .get(&run_status_path(run_id))
            .await?;
        decode_run(response, run_id)
    }
}

pub struct AsyncKit<'a> {
    client: &'a AsyncFastnClient,
}

impl AsyncKit<'_> {
    pub fn list(&self) -> Result<Vec<ConnectorSummary>> {
        Ok(self.client.catalog()?.list())
    }

    pub fn get(&self, connector: &str) -> Result<Arc<ConnectorEntry>> {
        self.client.catalog()?.get(connector)
    }

    pub fn tools(&self, connector: &str) -> Result<Vec<ToolEntry>> {
        self.client.catalog()?.get_tools(connector)
    }

    pub async fn sync(&self) -> Result<Vec<ConnectorSummary>> {
        let document = self.client.inner.transport.get(REGISTRY_PATH).await?;
        let path = self.client.registry_path().to_path_buf();
        let registry = tokio::task::spawn_blocking(move || Registry::save_atomic(&path, &document))
            .await
            .map_err(|e| FastnError::registry(format!("registry write task failed: {}", e)))??;

        let catalog = Catalog::new(registry);
        let summary = catalog.list();
        self.client.inner.catalog.replace(catalog);
        info!(connectors = summary.len(), "Registry synced");
        Ok(summary)
    }

    pub async fn connections(&self, connector: &str) -> Result<Vec<Connection>> {
        let project_id = self.client.space_id()?;
        let data = self
            .client
            .inner
            .transport
            .graphql(
                LIST_CONNECTIONS,
                json!({ "projectId": project_id, "connectorId": connector }),
            )
            .await?;
        field(&data, "connections")
    }

    pub async fn resolve_connection(
        &self,
        connector: &str,
        requested: Option<&str>,
    ) -> Result<String> {
        if let Some(id) = requested {
            return Ok(id.to_string());
        }
        let candidates = self.connections(connector).await?;
        select_connection(connector, None, &candidates)
    }
}

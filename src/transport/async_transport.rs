//! Async transport built on `reqwest` and tokio.

use super::blocking::{apply_tokens, persist_tokens};
use super::{
    classify_graphql, classify_response, log_request, log_response, GraphQLRequest,
    TransportOptions, GRAPHQL_PATH,
};
use crate::auth::{self, token_state, OAuthEndpoints, TokenState};
use crate::config::FastnConfig;
use crate::error::{FastnError, Result};
use crate::headers::{build_headers, override_tenant};
use chrono::Utc;
use reqwest::Method;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct AsyncTransport {
    http: reqwest::Client,
    config: RwLock<FastnConfig>,
    /// Serializes token refreshes across concurrent calls.
    refresh_gate: Mutex<()>,
    closed: AtomicBool,
    verbose: bool,
}

impl AsyncTransport {
    pub fn new(config: FastnConfig, options: &TransportOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("fastn-rust/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            config: RwLock::new(config),
            refresh_gate: Mutex::new(()),
            closed: AtomicBool::new(false),
            verbose: options.verbose,
        })
    }

    pub fn config(&self) -> FastnConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mark the transport closed. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Transport closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        let (status, body) = self.exchange(Method::GET, path, None, None).await?;
        classify_response(status, &body)
    }

    pub async fn post(&self, path: &str, payload: &Value) -> Result<Value> {
        self.post_as_tenant(path, payload, None).await
    }

    /// POST with the `x-tenant` header replaced for this call only.
    pub async fn post_as_tenant(
        &self,
        path: &str,
        payload: &Value,
        tenant_id: Option<&str>,
    ) -> Result<Value> {
        let (status, body) = self
            .exchange(Method::POST, path, Some(payload), tenant_id)
            .await?;
        classify_response(status, &body)
    }

    pub async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let payload = serde_json::to_value(GraphQLRequest { query, variables })
            .map_err(|e| FastnError::api(format!("failed to encode GraphQL request: {}", e)))?;
        let (status, body) = self
            .exchange(Method::POST, GRAPHQL_PATH, Some(&payload), None)
            .await?;
        classify_graphql(status, &body)
    }

    async fn exchange(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        tenant_id: Option<&str>,
    ) -> Result<(u16, String)> {
        if self.is_closed() {
            return Err(FastnError::ClientClosed);
        }
        self.ensure_fresh_token().await?;

        let config = self.config();
        let url = config.url(path);
        let mut headers = build_headers(&config)?;
        if let Some(tenant) = tenant_id {
            override_tenant(&mut headers, tenant)?;
        }

        if self.verbose {
            log_request(method.as_str(), &url, &headers, payload);
        }

        let mut request = self.http.request(method, &url).headers(headers);
        if let Some(body) = payload {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        if self.verbose {
            log_response(&url, status, &body);
        }
        debug!(url = %url, status = status, "Request completed");

        Ok((status, body))
    }

    /// Refresh the auth token when it is inside the refresh window.
    ///
    /// Concurrent callers queue on the refresh gate; whoever gets it second
    /// re-reads the config and skips the refresh if the first one already
    /// stored a fresh token.
    pub async fn ensure_fresh_token(&self) -> Result<()> {
        if !self.needs_refresh()? {
            return Ok(());
        }

        let _gate = self.refresh_gate.lock().await;
        if !self.needs_refresh()? {
            return Ok(());
        }

        let config = self.config();
        let Some(refresh) = config.refresh_token.clone() else {
            return Ok(());
        };

        let endpoints = OAuthEndpoints::from_auth_url(&config.auth_url);
        let tokens = auth::refresh_token(&self.http, &endpoints, &refresh).await?;

        let persist = {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            apply_tokens(&mut config, tokens);
            config.persist_path.clone().map(|p| (p, config.clone()))
        };

        if let Some((path, config)) = persist {
            if let Err(e) = persist_tokens(&path, &config) {
                warn!(path = %path.display(), error = %e, "Failed to persist refreshed token");
            }
        }
        Ok(())
    }

    /// True when a refresh should be attempted. Errors when the token has
    /// expired and there is nothing to refresh it with.
    fn needs_refresh(&self) -> Result<bool> {
        let config = self.config();
        if !config.uses_bearer() {
            return Ok(false);
        }
        match (token_state(config.token_expiry, Utc::now()), &config.refresh_token) {
            (TokenState::Fresh, _) => Ok(false),
            (TokenState::Expiring, None) => Ok(false),
            (TokenState::Expired, None) => Err(FastnError::auth(
                "auth token expired and no refresh token is available; run `fastn login`",
            )),
            (_, Some(_)) => Ok(true),
        }
    }
}

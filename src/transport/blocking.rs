//! Blocking transport built on `reqwest::blocking`.

use super::{
    classify_graphql, classify_response, log_request, log_response, GraphQLRequest,
    TransportOptions, GRAPHQL_PATH,
};
use crate::auth::{self, token_state, OAuthEndpoints, TokenSet, TokenState};
use crate::config::{ConfigFile, FastnConfig};
use crate::error::{FastnError, Result};
use crate::headers::{build_headers, override_tenant};
use chrono::Utc;
use reqwest::Method;
use serde_json::Value;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Owns one connection pool and the client's mutable configuration.
pub struct BlockingTransport {
    http: reqwest::blocking::Client,
    config: RwLock<FastnConfig>,
    verbose: bool,
}

impl BlockingTransport {
    pub fn new(config: FastnConfig, options: &TransportOptions) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("fastn-rust/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            config: RwLock::new(config),
            verbose: options.verbose,
        })
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> FastnConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, path: &str) -> Result<Value> {
        self.send(Method::GET, path, None, None)
    }

    pub fn post(&self, path: &str, payload: &Value) -> Result<Value> {
        self.send(Method::POST, path, Some(payload), None)
    }

    /// POST with the `x-tenant` header replaced for this call only.
    pub fn post_as_tenant(&self, path: &str, payload: &Value, tenant_id: Option<&str>) -> Result<Value> {
        self.send(Method::POST, path, Some(payload), tenant_id)
    }

    pub fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let payload = serde_json::to_value(GraphQLRequest { query, variables })
            .map_err(|e| FastnError::api(format!("failed to encode GraphQL request: {}", e)))?;
        let (status, body) = self.exchange(Method::POST, GRAPHQL_PATH, Some(&payload), None)?;
        classify_graphql(status, &body)
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        tenant_id: Option<&str>,
    ) -> Result<Value> {
        let (status, body) = self.exchange(method, path, payload, tenant_id)?;
        classify_response(status, &body)
    }

    /// Perform the call and return status and raw body.
    fn exchange(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        tenant_id: Option<&str>,
    ) -> Result<(u16, String)> {
        self.ensure_fresh_token()?;

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

        let response = request.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;

        if self.verbose {
            log_response(&url, status, &body);
        }
        debug!(url = %url, status = status, "Request completed");

        Ok((status, body))
    }

    /// Refresh the auth token when it is inside the refresh window.
    ///
    /// No-op for api-key auth. Fails with an auth error when the token has
    /// expired and cannot be refreshed, or the refresh itself fails.
    pub fn ensure_fresh_token(&self) -> Result<()> {
        let config = self.config();
        if !config.uses_bearer() {
            return Ok(());
        }

        let state = token_state(config.token_expiry, Utc::now());
        let refresh = match (state, config.refresh_token.as_deref()) {
            (TokenState::Fresh, _) => return Ok(()),
            (TokenState::Expiring, None) => return Ok(()),
            (TokenState::Expired, None) => {
                return Err(FastnError::auth(
                    "auth token expired and no refresh token is available; run `fastn login`",
                ))
            }
            (_, Some(refresh)) => refresh.to_string(),
        };

        let endpoints = OAuthEndpoints::from_auth_url(&config.auth_url);
        let tokens = auth::refresh_token_blocking(&self.http, &endpoints, &refresh)?;
        self.store_tokens(tokens);
        Ok(())
    }

    fn store_tokens(&self, tokens: TokenSet) {
        let persist_path = {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            apply_tokens(&mut config, tokens);
            config.persist_path.clone().map(|p| (p, config.clone()))
        };

        if let Some((path, config)) = persist_path {
            if let Err(e) = persist_tokens(&path, &config) {
                warn!(path = %path.display(), error = %e, "Failed to persist refreshed token");
            }
        }
    }
}

pub(crate) fn apply_tokens(config: &mut FastnConfig, tokens: TokenSet) {
    config.auth_token = Some(tokens.access_token);
    if tokens.refresh_token.is_some() {
        config.refresh_token = tokens.refresh_token;
    }
    config.token_expiry = tokens.expires_at;
    debug!(expires_at = ?config.token_expiry, "Auth token refreshed");
}

pub(crate) fn persist_tokens(path: &std::path::Path, config: &FastnConfig) -> Result<()> {
    let Some(token) = config.auth_token.as_deref() else {
        return Ok(());
    };
    let mut file = ConfigFile::load(path)?;
    file.set_tokens(
        token,
        config.refresh_token.as_deref(),
        config.token_expiry.map(|t| t.timestamp()),
    );
    file.save()
}

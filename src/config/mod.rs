//! Configuration resolution.
//!
//! Settings come from four layers, merged field by field in strict priority
//! order:
//!
//! ```text
//! constructor (ClientBuilder)  ─┐
//! environment (FASTN_*)        ─┤  first value wins
//! config file (.fastn/config)  ─┤
//! built-in defaults            ─┘
//! ```
//!
//! Each layer is a [`PartialConfig`]; [`merge_layers`] is a pure function over
//! them and [`resolve`] validates the result into a [`FastnConfig`].

pub mod file;

#[cfg(test)]
mod tests;

pub use file::ConfigFile;

use crate::error::{FastnError, Result};
use crate::jwt;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_BASE_URL: &str = "https://live.fastn.ai/api";
pub const DEFAULT_AUTH_URL: &str = "https://live.fastn.ai/auth";
pub const DEFAULT_TENANT_ID: &str = "organization";

/// Project-local directory holding the config and registry files.
pub const CONFIG_DIR: &str = ".fastn";
pub const CONFIG_FILE: &str = "config.json";
pub const REGISTRY_FILE: &str = "registry.json";

pub const ENV_API_KEY: &str = "FASTN_API_KEY";
pub const ENV_PROJECT_ID: &str = "FASTN_PROJECT_ID";
pub const ENV_AUTH_TOKEN: &str = "FASTN_AUTH_TOKEN";
pub const ENV_TENANT_ID: &str = "FASTN_TENANT_ID";
pub const ENV_STAGE: &str = "FASTN_STAGE";
pub const ENV_CONNECTION_ID: &str = "FASTN_CONNECTION_ID";
pub const ENV_API_URL: &str = "FASTN_API_URL";
pub const ENV_AUTH_URL: &str = "FASTN_AUTH_URL";
pub const ENV_VERBOSE: &str = "FASTN_VERBOSE";

/// Path of the config file beneath `project_dir`.
pub fn config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Path of the registry file beneath `project_dir`.
pub fn registry_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_DIR).join(REGISTRY_FILE)
}

/// Deployment environment, routed via the `stage` header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stage {
    #[default]
    Live,
    Staging,
    Dev,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Live => "LIVE",
            Stage::Staging => "STAGING",
            Stage::Dev => "DEV",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = FastnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LIVE" => Ok(Stage::Live),
            "STAGING" => Ok(Stage::Staging),
            "DEV" => Ok(Stage::Dev),
            other => Err(FastnError::Config {
                message: format!("unknown stage '{}' (expected LIVE, STAGING or DEV)", other),
                missing: Vec::new(),
            }),
        }
    }
}

/// One configuration layer. Every field is optional; `None` defers to the
/// next layer down.
///
/// `auth_token`, `refresh_token` and `token_expiry` form one session and
/// always come from the same layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartialConfig {
    pub api_key: Option<String>,
    pub project_id: Option<String>,
    pub auth_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Unix seconds.
    pub token_expiry: Option<i64>,
    pub stage: Option<String>,
    pub tenant_id: Option<String>,
    pub connection_id: Option<String>,
    pub base_url: Option<String>,
    pub auth_url: Option<String>,
}

impl PartialConfig {
    /// Layer built from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Layer built from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            api_key: get(ENV_API_KEY),
            project_id: get(ENV_PROJECT_ID),
            auth_token: get(ENV_AUTH_TOKEN),
            refresh_token: None,
            token_expiry: None,
            stage: get(ENV_STAGE),
            tenant_id: get(ENV_TENANT_ID),
            connection_id: get(ENV_CONNECTION_ID),
            base_url: get(ENV_API_URL),
            auth_url: get(ENV_AUTH_URL),
        }
    }

    /// Built-in defaults, the lowest layer.
    pub fn defaults() -> Self {
        Self {
            stage: Some(Stage::default().as_str().to_string()),
            tenant_id: Some(DEFAULT_TENANT_ID.to_string()),
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            auth_url: Some(DEFAULT_AUTH_URL.to_string()),
            ..Self::default()
        }
    }

    /// Fill every unset field of `self` from `lower`. The token fields are
    /// taken together from whichever layer has an auth token.
    pub fn or(self, lower: &PartialConfig) -> Self {
        fn pick<T: Clone>(upper: Option<T>, lower: &Option<T>) -> Option<T> {
            upper.or_else(|| lower.clone())
        }

        let (auth_token, refresh_token, token_expiry) = if self.auth_token.is_some() {
            (self.auth_token, self.refresh_token, self.token_expiry)
        } else {
            (
                lower.auth_token.clone(),
                lower.refresh_token.clone(),
                lower.token_expiry,
            )
        };

        Self {
            api_key: pick(self.api_key, &lower.api_key),
            project_id: pick(self.project_id, &lower.project_id),
            auth_token,
            refresh_token,
            token_expiry,
            stage: pick(self.stage, &lower.stage),
            tenant_id: pick(self.tenant_id, &lower.tenant_id),
            connection_id: pick(self.connection_id, &lower.connection_id),
            base_url: pick(self.base_url, &lower.base_url),
            auth_url: pick(self.auth_url, &lower.auth_url),
        }
    }
}

/// Ordered merge: constructor > environment > file > defaults.
pub fn merge_layers(
    constructor: &PartialConfig,
    env: &PartialConfig,
    file: &PartialConfig,
) -> PartialConfig {
    constructor
        .clone()
        .or(env)
        .or(file)
        .or(&PartialConfig::defaults())
}

/// Fully resolved configuration used by a client.
#[derive(Clone, Debug, PartialEq)]
pub struct FastnConfig {
    pub api_key: Option<String>,
    pub project_id: Option<String>,
    pub auth_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
    pub stage: Stage,
    pub tenant_id: String,
    pub connection_id: Option<String>,
    pub base_url: String,
    pub auth_url: String,
    /// Config file that supplied the auth token; refreshed tokens are written back here.
    pub persist_path: Option<PathBuf>,
}

/// Which credential a request authenticates with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Credential<'a> {
    ApiKey(&'a str),
    Bearer(&'a str),
}

impl FastnConfig {
    /// Validate a merged layer into a usable configuration.
    pub fn from_partial(merged: PartialConfig, persist_path: Option<PathBuf>) -> Result<Self> {
        let stage = match merged.stage.as_deref() {
            Some(s) => s.parse()?,
            None => Stage::default(),
        };

        let token_expiry = merged
            .token_expiry
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        let config = Self {
            api_key: merged.api_key,
            project_id: merged.project_id,
            auth_token: merged.auth_token,
            refresh_token: merged.refresh_token,
            token_expiry,
            stage,
            tenant_id: merged
                .tenant_id
                .unwrap_or_else(|| DEFAULT_TENANT_ID.to_string()),
            connection_id: merged.connection_id,
            base_url: merged
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            auth_url: merged
                .auth_url
                .unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            persist_path,
        };

        config.validate()?;
        Ok(config)
    }

    /// Fails when neither an api key nor an auth token is present.
    pub fn validate(&self) -> Result<()> {
        self.credential().map(|_| ())
    }

    /// The credential requests authenticate with. The api key wins when both are set.
    pub fn credential(&self) -> Result<Credential<'_>> {
        match (self.api_key.as_deref(), self.auth_token.as_deref()) {
            (Some(key), _) => Ok(Credential::ApiKey(key)),
            (None, Some(token)) => Ok(Credential::Bearer(token)),
            (None, None) => Err(FastnError::Config {
                message: format!(
                    "no credentials found: set {} or {}, pass them to the client, or run `fastn login`",
                    ENV_API_KEY, ENV_AUTH_TOKEN
                ),
                missing: vec!["api_key".to_string(), "auth_token".to_string()],
            }),
        }
    }

    /// Project id, else the workspace id carried in the auth token.
    pub fn space_id(&self) -> Option<String> {
        if let Some(project) = &self.project_id {
            return Some(project.clone());
        }
        self.auth_token
            .as_deref()
            .and_then(|token| jwt::decode_claims(token).ok())
            .and_then(|claims| claims.workspace_id().map(str::to_string))
    }

    /// True when requests use the bearer token rather than an api key.
    pub fn uses_bearer(&self) -> bool {
        self.api_key.is_none() && self.auth_token.is_some()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Resolve the four layers into a validated configuration.
///
/// # Arguments
/// * `constructor` - Values passed explicitly to the client
/// * `env` - Layer read from `FASTN_*` variables
/// * `file` - Contents of the on-disk config file, if one was read
pub fn resolve(
    constructor: &PartialConfig,
    env: &PartialConfig,
    file: Option<&ConfigFile>,
) -> Result<FastnConfig> {
    let file_layer = file.map(ConfigFile::partial).unwrap_or_default();
    let merged = merge_layers(constructor, env, &file_layer);

    // Tokens read from the file are written back there after a refresh.
    let token_from_file = constructor.auth_token.is_none()
        && env.auth_token.is_none()
        && file_layer.auth_token.is_some();
    let persist_path = if token_from_file {
        file.map(|f| f.path().to_path_buf())
    } else {
        None
    };

    FastnConfig::from_partial(merged, persist_path)
}

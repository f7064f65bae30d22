//! Request headers derived from a resolved configuration.

use crate::config::{Credential, FastnConfig};
use crate::error::{FastnError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

pub const REALM: &str = "fastn";
pub const HEADER_REALM: &str = "realm";
pub const HEADER_STAGE: &str = "stage";
pub const HEADER_CUSTOM_AUTH: &str = "x-fastn-custom-auth";
pub const HEADER_SPACE_ID: &str = "x-fastn-space-id";
pub const HEADER_TENANT: &str = "x-tenant";
pub const HEADER_API_KEY: &str = "x-fastn-api-key";

/// Values longer than this are cut when logged.
const REDACT_KEEP: usize = 20;

/// Build the fixed header set for `config`.
///
/// Always carries content type, realm, stage, the custom-auth flag, space id
/// and tenant id, plus exactly one credential header.
pub fn build_headers(config: &FastnConfig) -> Result<HeaderMap> {
    let credential = config.credential()?;
    let space_id = config.space_id().ok_or_else(|| FastnError::Config {
        message: "no project id configured and none could be derived from the auth token"
            .to_string(),
        missing: vec!["project_id".to_string()],
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(HEADER_REALM, HeaderValue::from_static(REALM));
    headers.insert(HEADER_STAGE, HeaderValue::from_static(config.stage.as_str()));
    headers.insert(HEADER_CUSTOM_AUTH, HeaderValue::from_static("true"));
    headers.insert(HEADER_SPACE_ID, value(HEADER_SPACE_ID, &space_id)?);
    headers.insert(HEADER_TENANT, value(HEADER_TENANT, &config.tenant_id)?);

    match credential {
        Credential::ApiKey(key) => {
            headers.insert(HEADER_API_KEY, value(HEADER_API_KEY, key)?);
        }
        Credential::Bearer(token) => {
            headers.insert(AUTHORIZATION, value("authorization", &format!("Bearer {}", token))?);
        }
    }

    Ok(headers)
}

/// Replace the tenant header for a single call.
pub fn override_tenant(headers: &mut HeaderMap, tenant_id: &str) -> Result<()> {
    headers.insert(HEADER_TENANT, value(HEADER_TENANT, tenant_id)?);
    Ok(())
}

fn value(name: &str, raw: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(raw).map_err(|_| {
        FastnError::config(format!("value for header '{}' contains invalid characters", name))
    })
}

fn is_secret(name: &HeaderName) -> bool {
    let name = name.as_str();
    name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) || name.eq_ignore_ascii_case(HEADER_API_KEY)
}

/// Header pairs safe for logging. Secret headers longer than 20 characters
/// keep only their first 20 characters followed by `...`.
pub fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let text = value.to_str().unwrap_or("<binary>");
            let shown = if is_secret(name) && text.chars().count() > REDACT_KEEP {
                format!("{}...", text.chars().take(REDACT_KEEP).collect::<String>())
            } else {
                text.to_string()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}

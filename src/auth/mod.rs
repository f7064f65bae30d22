//! OAuth against the platform's identity provider.
//!
//! - [`device`] - device-code login used by `fastn login`
//! - [`refresh_token`] / [`refresh_token_blocking`] - refresh-token grant used
//!   by the transports before each call

pub mod device;

pub use device::{DeviceAuthorization, DeviceFlow};

use crate::error::{FastnError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;

pub const CLIENT_ID: &str = "fastn-cli";
pub const REALM: &str = "fastn";

/// Tokens expiring within this window are refreshed before use.
pub const REFRESH_SKEW_SECS: i64 = 60;

/// Device and token endpoints of the realm.
#[derive(Clone, Debug, PartialEq)]
pub struct OAuthEndpoints {
    pub device_url: String,
    pub token_url: String,
}

impl OAuthEndpoints {
    pub fn from_auth_url(auth_url: &str) -> Self {
        let base = format!(
            "{}/realms/{}/protocol/openid-connect",
            auth_url.trim_end_matches('/'),
            REALM
        );
        Self {
            device_url: format!("{}/auth/device", base),
            token_url: format!("{}/token", base),
        }
    }
}

/// Standard OAuth 2.0 token response.
#[derive(Deserialize, Debug)]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// OAuth 2.0 error response.
#[derive(Deserialize, Debug)]
pub(crate) struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl OAuthErrorResponse {
    pub fn message(&self) -> String {
        self.error_description
            .clone()
            .unwrap_or_else(|| self.error.clone())
    }
}

/// Tokens obtained from login or refresh.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    pub(crate) fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response
                .expires_in
                .map(|seconds| now + Duration::seconds(seconds)),
        }
    }
}

/// Freshness of the stored auth token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenState {
    /// No expiry known, or expiry beyond the refresh window.
    Fresh,
    /// Still valid but inside the refresh window.
    Expiring,
    Expired,
}

pub fn token_state(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> TokenState {
    match expires_at {
        None => TokenState::Fresh,
        Some(exp) if exp <= now => TokenState::Expired,
        Some(exp) if exp - now <= Duration::seconds(REFRESH_SKEW_SECS) => TokenState::Expiring,
        Some(_) => TokenState::Fresh,
    }
}

fn refresh_form<'a>(refresh_token: &'a str) -> [(&'static str, &'a str); 3] {
    [
        ("grant_type", "refresh_token"),
        ("client_id", CLIENT_ID),
        ("refresh_token", refresh_token),
    ]
}

/// Turn a token endpoint reply into a token set, or an auth error.
fn parse_refresh(status: u16, body: &str) -> Result<TokenSet> {
    if !(200..300).contains(&status) {
        let reason = serde_json::from_str::<OAuthErrorResponse>(body)
            .map(|e| e.message())
            .unwrap_or_else(|_| format!("HTTP {}", status));
        return Err(FastnError::auth(format!("token refresh failed: {}", reason)));
    }

    let response: TokenResponse = serde_json::from_str(body)
        .map_err(|e| FastnError::auth(format!("token refresh failed: invalid response: {}", e)))?;
    Ok(TokenSet::from_response(response, Utc::now()))
}

/// Exchange a refresh token for a new token set.
pub async fn refresh_token(
    http: &reqwest::Client,
    endpoints: &OAuthEndpoints,
    refresh_token: &str,
) -> Result<TokenSet> {
    debug!(token_url = %endpoints.token_url, "Refreshing auth token");

    let response = http
        .post(&endpoints.token_url)
        .header("Accept", "application/json")
        .form(&refresh_form(refresh_token))
        .send()
        .await
        .map_err(|e| FastnError::auth(format!("token refresh failed: {}", e)))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| FastnError::auth(format!("token refresh failed: {}", e)))?;
    parse_refresh(status, &body)
}

/// Blocking variant of [`refresh_token`].
pub fn refresh_token_blocking(
    http: &reqwest::blocking::Client,
    endpoints: &OAuthEndpoints,
    refresh_token: &str,
) -> Result<TokenSet> {
    debug!(token_url = %endpoints.token_url, "Refreshing auth token");

    let response = http
        .post(&endpoints.token_url)
        .header("Accept", "application/json")
        .form(&refresh_form(refresh_token))
        .send()
        .map_err(|e| FastnError::auth(format!("token refresh failed: {}", e)))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .map_err(|e| FastnError::auth(format!("token refresh failed: {}", e)))?;
    parse_refresh(status, &body)
}

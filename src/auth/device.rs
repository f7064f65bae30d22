//! Device-code login (RFC 8628).
//!
//! 1. `start()` requests a device code and a short user code
//! 2. The user opens the verification URL and enters the code
//! 3. `poll()` hits the token endpoint every `interval` seconds until the
//!    user approves, denies, or the code expires

use super::{OAuthEndpoints, OAuthErrorResponse, TokenResponse, TokenSet, CLIENT_ID};
use crate::error::{FastnError, Result};
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

const DEVICE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

fn default_interval() -> u64 {
    5
}

/// Device authorization response.
#[derive(Clone, Debug, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

impl DeviceAuthorization {
    /// URL to show the user, preferring the one with the code pre-filled.
    pub fn browser_url(&self) -> &str {
        self.verification_uri_complete
            .as_deref()
            .unwrap_or(&self.verification_uri)
    }
}

/// Result of a single poll of the token endpoint.
#[derive(Debug, PartialEq)]
pub enum PollOutcome {
    Pending,
    SlowDown,
    Complete(TokenSet),
}

pub struct DeviceFlow {
    http: reqwest::Client,
    endpoints: OAuthEndpoints,
}

impl DeviceFlow {
    pub fn new(auth_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoints: OAuthEndpoints::from_auth_url(auth_url),
        }
    }

    pub fn endpoints(&self) -> &OAuthEndpoints {
        &self.endpoints
    }

    /// Request a device code.
    pub async fn start(&self) -> Result<DeviceAuthorization> {
        debug!(device_url = %self.endpoints.device_url, "Requesting device code");

        let response = self
            .http
            .post(&self.endpoints.device_url)
            .header("Accept", "application/json")
            .form(&[("client_id", CLIENT_ID), ("scope", "openid")])
            .send()
            .await
            .map_err(|e| FastnError::oauth("request_failed", e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FastnError::oauth("request_failed", e.to_string()))?;

        if !status.is_success() {
            return Err(oauth_error(&body, status.as_u16()));
        }

        serde_json::from_str(&body)
            .map_err(|e| FastnError::oauth("invalid_response", format!("device code response: {}", e)))
    }

    /// Poll the token endpoint once.
    pub async fn poll_once(&self, device_code: &str) -> Result<PollOutcome> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", DEVICE_GRANT),
                ("client_id", CLIENT_ID),
                ("device_code", device_code),
            ])
            .send()
            .await
            .map_err(|e| FastnError::oauth("request_failed", e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FastnError::oauth("request_failed", e.to_string()))?;

        if status.is_success() {
            let tokens: TokenResponse = serde_json::from_str(&body)
                .map_err(|e| FastnError::oauth("invalid_response", format!("token response: {}", e)))?;
            return Ok(PollOutcome::Complete(TokenSet::from_response(tokens, Utc::now())));
        }

        match serde_json::from_str::<OAuthErrorResponse>(&body) {
            Ok(err) if err.error == "authorization_pending" => Ok(PollOutcome::Pending),
            Ok(err) if err.error == "slow_down" => Ok(PollOutcome::SlowDown),
            _ => Err(oauth_error(&body, status.as_u16())),
        }
    }

    /// Poll until the user finishes, the provider rejects, or the code expires.
    pub async fn poll(&self, authorization: &DeviceAuthorization) -> Result<TokenSet> {
        let deadline = Instant::now() + Duration::from_secs(authorization.expires_in);
        let mut interval = Duration::from_secs(authorization.interval);

        loop {
            if Instant::now() >= deadline {
                return Err(FastnError::oauth(
                    "expired_token",
                    "device code expired before authorization completed",
                ));
            }

            match self.poll_once(&authorization.device_code).await? {
                PollOutcome::Complete(tokens) => {
                    info!("Device authorization completed");
                    return Ok(tokens);
                }
                PollOutcome::Pending => {}
                PollOutcome::SlowDown => {
                    interval += SLOW_DOWN_STEP;
                    debug!(interval_secs = interval.as_secs(), "Provider asked to slow down");
                }
            }

            tokio::time::sleep(interval).await;
        }
    }
}

fn oauth_error(body: &str, status: u16) -> FastnError {
    match serde_json::from_str::<OAuthErrorResponse>(body) {
        Ok(err) => {
            let message = err.message();
            FastnError::oauth(err.error, message)
        }
        Err(_) => FastnError::oauth("http_error", format!("HTTP {}: {}", status, body)),
    }
}

//! JWT payload decoding.
//!
//! Only the claims segment is read; signatures are verified server-side and
//! never here. Used for project discovery (the workspace id in the token) and
//! for `whoami`.

use crate::error::{FastnError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// Claim names checked, in order, for the workspace id.
const WORKSPACE_CLAIMS: &[&str] = &["workspaceId", "workspace_id", "spaceId", "projectId"];

/// Decoded JWT claims.
#[derive(Clone, Debug, PartialEq)]
pub struct Claims {
    raw: Map<String, Value>,
}

impl Claims {
    fn string(&self, key: &str) -> Option<&str> {
        self.raw.get(key).and_then(Value::as_str)
    }

    pub fn subject(&self) -> Option<&str> {
        self.string("sub")
    }

    pub fn email(&self) -> Option<&str> {
        self.string("email")
    }

    pub fn name(&self) -> Option<&str> {
        self.string("name")
    }

    pub fn username(&self) -> Option<&str> {
        self.string("preferred_username")
    }

    pub fn workspace_id(&self) -> Option<&str> {
        WORKSPACE_CLAIMS.iter().find_map(|claim| self.string(claim))
    }

    /// `exp` claim as a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.raw
            .get("exp")
            .and_then(Value::as_f64)
            .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.raw
    }
}

/// Decode the payload segment of `token`.
///
/// Fails with an auth error when the token is not three dot-separated
/// segments or the payload is not base64url-encoded JSON.
pub fn decode_claims(token: &str) -> Result<Claims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(FastnError::auth("malformed token: expected three segments")),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| FastnError::auth(format!("malformed token payload: {}", e)))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(raw)) => Ok(Claims { raw }),
        Ok(_) => Err(FastnError::auth("malformed token payload: not a JSON object")),
        Err(e) => Err(FastnError::auth(format!("malformed token payload: {}", e))),
    }
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

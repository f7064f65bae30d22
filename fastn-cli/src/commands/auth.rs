use super::Context;
use crate::output;
use anyhow::{Context as _, Result};
use fastn::auth::DeviceFlow;
use fastn::config::{merge_layers, PartialConfig, DEFAULT_AUTH_URL};
use fastn::jwt::decode_claims;
use serde_json::json;
use tracing::info;

/// Device-code login. Tokens (and `--project`) are written to the config file.
pub async fn login(ctx: &Context, project: Option<String>) -> Result<String> {
    let mut file = ctx.config_file()?;

    // Only the auth URL is needed here; credentials may not exist yet.
    let layers = merge_layers(&PartialConfig::default(), &PartialConfig::from_env(), &file.partial());
    let auth_url = layers.auth_url.unwrap_or_else(|| DEFAULT_AUTH_URL.to_string());

    let flow = DeviceFlow::new(&auth_url);
    let authorization = flow.start().await.context("Failed to start login")?;

    eprintln!("Open this URL in your browser to log in:\n\n  {}\n", authorization.browser_url());
    eprintln!("Confirm the code: {}\n", authorization.user_code);
    eprintln!("Waiting for approval...");

    let tokens = flow.poll(&authorization).await?;

    file.set_tokens(
        &tokens.access_token,
        tokens.refresh_token.as_deref(),
        tokens.expires_at.map(|t| t.timestamp()),
    );
    if let Some(project) = &project {
        file.set_str("project_id", Some(project));
    }
    file.save()?;
    info!(path = %file.path().display(), "Tokens saved");

    let claims = decode_claims(&tokens.access_token).ok();
    let who = claims
        .as_ref()
        .and_then(|c| c.email().or(c.username()).or(c.subject()))
        .unwrap_or("unknown user")
        .to_string();

    if ctx.json {
        return output::json(&json!({
            "logged_in": true,
            "user": who,
            "project_id": project.or_else(|| claims.as_ref().and_then(|c| c.workspace_id().map(str::to_string))),
            "expires_at": tokens.expires_at,
        }));
    }
    Ok(format!("Logged in as {}", who))
}

pub fn logout(ctx: &Context) -> Result<String> {
    let mut file = ctx.config_file()?;
    let removed = file.clear_tokens();
    if removed {
        file.save()?;
    }

    if ctx.json {
        return output::json(&json!({ "logged_out": removed }));
    }
    Ok(if removed {
        "Logged out".to_string()
    } else {
        "Not logged in".to_string()
    })
}

pub fn whoami(ctx: &Context) -> Result<String> {
    // Resolution only; no network call is made.
    let config = ctx.builder().build_async()?.config();

    let claims = match (&config.api_key, &config.auth_token) {
        (None, Some(token)) => Some(decode_claims(token)?),
        _ => None,
    };

    let identity = json!({
        "auth": if config.uses_bearer() { "token" } else { "api_key" },
        "user": claims.as_ref().and_then(|c| c.name().or(c.username())),
        "email": claims.as_ref().and_then(|c| c.email()),
        "subject": claims.as_ref().and_then(|c| c.subject()),
        "project_id": config.space_id(),
        "stage": config.stage.as_str(),
        "tenant_id": config.tenant_id,
        "token_expiry": config.token_expiry,
    });

    if ctx.json {
        return output::json(&identity);
    }

    let mut lines = Vec::new();
    match &claims {
        Some(c) => {
            let user = c.name().or(c.username()).unwrap_or("unknown");
            match c.email() {
                Some(email) => lines.push(format!("user: {} <{}>", user, email)),
                None => lines.push(format!("user: {}", user)),
            }
        }
        None => lines.push("user: (api key)".to_string()),
    }
    lines.push(format!(
        "project: {}",
        config.space_id().unwrap_or_else(|| "(none)".to_string())
    ));
    lines.push(format!("stage: {}", config.stage));
    lines.push(format!("tenant: {}", config.tenant_id));
    if let Some(expiry) = config.token_expiry {
        lines.push(format!("token expires: {}", expiry.to_rfc3339()));
    }
    Ok(lines.join("\n"))
}

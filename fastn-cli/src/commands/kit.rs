use super::Context;
use crate::cli::KitCommand;
use crate::output;
use anyhow::Result;
use fastn::config::{ConfigFile, Stage};
use fastn::AsyncFastnClient;
use serde_json::{Map, Value};
use tracing::info;

/// Keys masked when the config file is printed.
const SECRET_KEYS: &[&str] = &["api_key", "auth_token", "refresh_token"];

pub async fn run(ctx: &Context, command: KitCommand) -> Result<String> {
    match command {
        KitCommand::Ls => {
            let list =
                AsyncFastnClient::session(ctx.builder(), |c| async move { c.kit().list() }).await?;
            if ctx.json {
                return output::json(&list);
            }
            Ok(output::connectors(&list))
        }
        KitCommand::Get { connector } => {
            let entry =
                AsyncFastnClient::session(ctx.builder(), |c| async move { c.kit().get(&connector) })
                    .await?;
            if ctx.json {
                return output::json(entry.as_ref());
            }
            Ok(output::connector(&entry))
        }
        KitCommand::Tools { connector } => {
            let tools =
                AsyncFastnClient::session(ctx.builder(), |c| async move { c.kit().tools(&connector) })
                    .await?;
            if ctx.json {
                return output::json(&tools);
            }
            Ok(output::tools(&tools))
        }
        KitCommand::Sync => {
            let list =
                AsyncFastnClient::session(ctx.builder(), |c| async move { c.kit().sync().await })
                    .await?;
            if ctx.json {
                return output::json(&list);
            }
            Ok(format!(
                "Synced {} connectors\n\n{}",
                list.len(),
                output::connectors(&list)
            ))
        }
        KitCommand::Connections { connector } => {
            let list = AsyncFastnClient::session(ctx.builder(), |c| async move {
                c.kit().connections(&connector).await
            })
            .await?;
            if ctx.json {
                return output::json(&list);
            }
            Ok(output::connections(&list))
        }
        KitCommand::Config {
            project,
            stage,
            tenant,
            api_key,
        } => config(ctx, project, stage, tenant, api_key),
    }
}

/// Print the config file, or update it when any flag is given.
fn config(
    ctx: &Context,
    project: Option<String>,
    stage: Option<String>,
    tenant: Option<String>,
    api_key: Option<String>,
) -> Result<String> {
    let mut file = ctx.config_file()?;

    let stage = stage.map(|s| s.parse::<Stage>()).transpose()?;
    let updates = [
        ("project_id", project),
        ("stage", stage.map(|s| s.as_str().to_string())),
        ("tenant_id", tenant),
        ("api_key", api_key),
    ];

    let mut changed = Vec::new();
    for (key, value) in updates {
        if let Some(value) = value {
            file.set_str(key, Some(&value));
            changed.push(key);
        }
    }

    if !changed.is_empty() {
        file.save()?;
        info!(path = %file.path().display(), keys = ?changed, "Config updated");
    }

    let shown = masked(&file);
    if ctx.json {
        return output::json(&shown);
    }

    let mut lines = vec![format!("# {}", file.path().display())];
    if shown.is_empty() {
        lines.push("(empty)".to_string());
    }
    for (key, value) in &shown {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        lines.push(format!("{} = {}", key, text));
    }
    Ok(lines.join("\n"))
}

fn masked(file: &ConfigFile) -> Map<String, Value> {
    file.values()
        .iter()
        .map(|(key, value)| {
            let shown = match value.as_str() {
                Some(secret) if SECRET_KEYS.contains(&key.as_str()) => Value::String(mask(secret)),
                _ => value.clone(),
            };
            (key.clone(), shown)
        })
        .collect()
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask("abc"), "****");
        assert_eq!(mask("sk-123456"), "sk-1****");
    }
}

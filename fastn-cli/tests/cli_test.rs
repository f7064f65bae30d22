// Integration tests for the fastn CLI commands

use clap::Parser;
use fastn::config::{config_path, registry_path, ConfigFile};
use fastn_cli::{run, Cli};
use mockito::{Matcher, Server};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

fn cli(dir: &TempDir, args: &[&str]) -> Cli {
    let mut argv = vec!["fastn", "--dir", dir.path().to_str().unwrap()];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

fn project(server_url: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    let mut file = ConfigFile::load(config_path(dir.path())).unwrap();
    file.set_str("api_key", Some("test-key-123456"));
    file.set_str("project_id", Some("proj-1"));
    file.set_str("base_url", Some(server_url));
    file.set_str("auth_url", Some(server_url));
    file.save().unwrap();

    let registry = json!({
        "version": "1",
        "connectors": {
            "slack": {
                "display_name": "Slack",
                "category": "communication",
                "tools": {
                    "send_message": {
                        "actionId": "act_slack_send_message",
                        "description": "Send a message",
                        "inputSchema": {"type": "object", "properties": {"text": {"type": "string"}}}
                    }
                }
            }
        }
    });
    fs::write(registry_path(dir.path()), registry.to_string()).unwrap();
    dir
}

#[test]
fn test_parse_global_flags_after_subcommand() {
    let dir = TempDir::new().unwrap();
    let parsed = cli(&dir, &["kit", "ls", "--json", "--verbose"]);
    assert!(parsed.json);
    assert!(parsed.verbose);
}

#[test]
fn test_parse_rejects_unknown_command() {
    assert!(Cli::try_parse_from(["fastn", "deploy"]).is_err());
}

#[tokio::test]
async fn test_kit_ls_table_and_json() {
    let server = Server::new_async().await;
    let dir = project(&server.url());

    let text = run(cli(&dir, &["kit", "ls"])).await.unwrap();
    assert!(text.starts_with("NAME"));
    assert!(text.contains("slack"));
    assert!(text.contains("communication"));

    let out = run(cli(&dir, &["--json", "kit", "ls"])).await.unwrap();
    let list: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(list[0]["name"], "slack");
    assert_eq!(list[0]["tool_count"], 1);
}

#[tokio::test]
async fn test_kit_get_unknown_connector_fails() {
    let server = Server::new_async().await;
    let dir = project(&server.url());

    let err = run(cli(&dir, &["kit", "get", "jira"])).await.unwrap_err();
    assert!(err.downcast_ref::<fastn::FastnError>().is_some());
    assert!(err.to_string().contains("jira"));
}

#[tokio::test]
async fn test_kit_config_updates_and_masks() {
    let server = Server::new_async().await;
    let dir = project(&server.url());

    let out = run(cli(&dir, &["kit", "config", "--stage", "dev", "--tenant", "acme"]))
        .await
        .unwrap();
    assert!(out.contains("stage = DEV"));
    assert!(out.contains("tenant_id = acme"));
    assert!(out.contains("api_key = test****"));

    let saved = ConfigFile::load(config_path(dir.path())).unwrap();
    assert_eq!(saved.get("stage"), Some(&json!("DEV")));
    assert_eq!(saved.get("api_key"), Some(&json!("test-key-123456")));

    assert!(run(cli(&dir, &["kit", "config", "--stage", "prod"])).await.is_err());
}

#[tokio::test]
async fn test_agent_tools_formats() {
    let server = Server::new_async().await;
    let dir = project(&server.url());

    let out = run(cli(&dir, &["agent", "tools", "--format", "anthropic"]))
        .await
        .unwrap();
    let tools: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(tools[0]["name"], "send_message");
    assert!(tools[0]["input_schema"].is_object());

    let err = run(cli(&dir, &["agent", "tools", "--format", "llama"]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unknown tool format"));
}

#[tokio::test]
async fn test_agent_call_hits_execute() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/ucl/executeTool")
        .match_body(Matcher::Json(json!({
            "actionId": "act_slack_send_message",
            "parameters": {"text": "hi"},
            "connectionId": "conn_7"
        })))
        .with_status(200)
        .with_body(r#"{"body": {"ts": "1"}}"#)
        .create_async()
        .await;
    let dir = project(&server.url());

    let out = run(cli(
        &dir,
        &[
            "agent",
            "call",
            "slack",
            "sendmessage",
            "--params",
            r#"{"text": "hi"}"#,
            "--connection",
            "conn_7",
        ],
    ))
    .await
    .unwrap();

    assert_eq!(serde_json::from_str::<Value>(&out).unwrap(), json!({"ts": "1"}));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_skill_status_not_found() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/flows/runs/r-404")
        .with_status(404)
        .with_body(r#"{"code": "RUN_NOT_FOUND"}"#)
        .create_async()
        .await;
    let dir = project(&server.url());

    let err = run(cli(&dir, &["skill", "status", "r-404"])).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<fastn::FastnError>(),
        Some(fastn::FastnError::RunNotFound { .. })
    ));
}

#[tokio::test]
async fn test_login_then_logout() {
    let mut server = Server::new_async().await;
    let _device = server
        .mock("POST", "/realms/fastn/protocol/openid-connect/auth/device")
        .with_status(200)
        .with_body(
            r#"{"device_code": "dc", "user_code": "AB-CD", "verification_uri": "https://example.com/d", "expires_in": 60, "interval": 0}"#,
        )
        .create_async()
        .await;
    let _token = server
        .mock("POST", "/realms/fastn/protocol/openid-connect/token")
        .match_body(Matcher::UrlEncoded("device_code".into(), "dc".into()))
        .with_status(200)
        .with_body(r#"{"access_token": "not.a.jwt", "refresh_token": "r1", "expires_in": 300}"#)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let mut file = ConfigFile::load(config_path(dir.path())).unwrap();
    file.set_str("auth_url", Some(&server.url()));
    file.save().unwrap();

    let out = run(cli(&dir, &["login", "--project", "proj-9"])).await.unwrap();
    assert!(out.starts_with("Logged in"));

    let saved = ConfigFile::load(config_path(dir.path())).unwrap().partial();
    assert_eq!(saved.auth_token.as_deref(), Some("not.a.jwt"));
    assert_eq!(saved.refresh_token.as_deref(), Some("r1"));
    assert_eq!(saved.project_id.as_deref(), Some("proj-9"));
    assert!(saved.token_expiry.is_some());

    assert_eq!(run(cli(&dir, &["logout"])).await.unwrap(), "Logged out");
    let saved = ConfigFile::load(config_path(dir.path())).unwrap().partial();
    assert!(saved.auth_token.is_none());
    assert_eq!(saved.project_id.as_deref(), Some("proj-9"));

    assert_eq!(run(cli(&dir, &["logout"])).await.unwrap(), "Not logged in");
}

#[tokio::test]
async fn test_whoami_with_api_key() {
    let server = Server::new_async().await;
    let dir = project(&server.url());

    let out = run(cli(&dir, &["--json", "whoami"])).await.unwrap();
    let who: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(who["auth"], "api_key");
    assert_eq!(who["project_id"], "proj-1");
    assert_eq!(who["stage"], "LIVE");
}

#[tokio::test]
async fn test_project_ls() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/graphql")
        .match_body(Matcher::Regex("projects".to_string()))
        .with_status(200)
        .with_body(r#"{"data": {"projects": [{"id": "proj-1", "name": "Main"}, {"id": "proj-2", "name": "Side"}]}}"#)
        .expect(2)
        .create_async()
        .await;
    let dir = project(&server.url());

    let text = run(cli(&dir, &["project", "ls"])).await.unwrap();
    assert!(text.contains("proj-1  Main  *"));
    assert!(text.contains("proj-2  Side"));

    let out = run(cli(&dir, &["--json", "project", "ls"])).await.unwrap();
    let listed: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(listed["current"], "proj-1");
    assert_eq!(listed["projects"][1]["name"], "Side");
    mock.assert_async().await;
}


// Integration tests for the blocking client against a mock API

use fastn::config::{config_path, registry_path, ConfigFile};
use fastn::{FastnClient, FastnError, ToolFormat};
use mockito::{Matcher, Server};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

fn registry_document() -> Value {
    json!({
        "version": "1",
        "connectors": {
            "slack": {
                "display_name": "Slack",
                "category": "communication",
                "tools": {
                    "send_message": {
                        "actionId": "act_slack_send_message",
                        "description": "Send a message to a channel",
                        "inputSchema": {
                            "type": "object",
                            "properties": {
                                "body": {
                                    "type": "object",
                                    "properties": {
                                        "channel": {"type": "string"},
                                        "text": {"type": "string"}
                                    },
                                    "required": ["channel", "text"]
                                }
                            }
                        }
                    }
                }
            },
            "notion": {"display_name": "Notion", "category": "productivity", "tools": {}}
        }
    })
}

/// Project dir with an api-key config pointing at `server`, optionally with a registry.
fn project(server: &Server, with_registry: bool) -> TempDir {
    let dir = TempDir::new().unwrap();

    let mut file = ConfigFile::load(config_path(dir.path())).unwrap();
    file.set_str("api_key", Some("test-key"));
    file.set_str("project_id", Some("proj-1"));
    file.set_str("base_url", Some(&server.url()));
    file.save().unwrap();

    if with_registry {
        fs::write(
            registry_path(dir.path()),
            serde_json::to_string(&registry_document()).unwrap(),
        )
        .unwrap();
    }
    dir
}

fn client(dir: &TempDir) -> FastnClient {
    FastnClient::builder()
        .project_dir(dir.path())
        .env_lookup(|_| None)
        .build()
        .unwrap()
}

#[test]
fn test_slack_send_message_dispatches_action() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/ucl/executeTool")
        .match_header("x-fastn-api-key", "test-key")
        .match_header("x-fastn-space-id", "proj-1")
        .match_body(Matcher::Json(json!({
            "actionId": "act_slack_send_message",
            "parameters": {"channel": "general", "text": "hi"}
        })))
        .with_status(200)
        .with_body(r#"{"body": {"ok": true}}"#)
        .create();

    let dir = project(&server, true);
    let slack = client(&dir).connector("slack").unwrap();
    let result = slack
        .call("send_message", json!({"channel": "general", "text": "hi"}))
        .unwrap();

    assert_eq!(result, json!({"ok": true}));
    mock.assert();
}

#[test]
fn test_connect_binds_connection_id() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/ucl/executeTool")
        .match_body(Matcher::PartialJson(json!({
            "connectionId": "conn_1",
            "parameters": {"text": "hi"}
        })))
        .with_status(200)
        .with_body("{}")
        .create();

    let dir = project(&server, true);
    let client = client(&dir);
    let scope = client.connect("conn_1");
    let slack = scope.connector("slack").unwrap();

    assert_eq!(slack.connection_id(), Some("conn_1"));
    slack.call("send_message", json!({"text": "hi"})).unwrap();
    mock.assert();
}

#[test]
fn test_execute_with_tenant_override() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/ucl/executeTool")
        .match_header("x-tenant", "acme")
        .match_body(Matcher::PartialJson(json!({"actionId": "act_raw"})))
        .with_status(200)
        .with_body(r#"{"done": true}"#)
        .create();

    let dir = project(&server, false);
    let result = client(&dir)
        .execute("act_raw", json!({}), None, Some("acme"))
        .unwrap();

    assert_eq!(result, json!({"done": true}));
    mock.assert();
}

#[test]
fn test_graphql_error_with_200_is_api_error() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_body(r#"{"errors":[{"message":"Unauthorized access"}]}"#)
        .create();

    let dir = project(&server, false);
    let err = client(&dir).projects().list().unwrap_err();

    assert!(matches!(err, FastnError::Api { .. }));
    assert!(err.to_string().contains("Unauthorized access"));
}

#[test]
fn test_projects_list() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/graphql")
        .match_body(Matcher::Regex("projects".to_string()))
        .with_status(200)
        .with_body(r#"{"data": {"projects": [{"id": "p1", "name": "Main"}]}}"#)
        .create();

    let dir = project(&server, false);
    let client = client(&dir);
    let projects = client.projects().list().unwrap();

    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].name, "Main");
    assert_eq!(client.projects().current().as_deref(), Some("proj-1"));
}

#[test]
fn test_missing_registry_then_sync() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/ucl/registry")
        .with_status(200)
        .with_body(json!({ "body": registry_document() }).to_string())
        .create();

    let dir = project(&server, false);
    let client = client(&dir);

    let err = client.connector("slack").unwrap_err();
    assert!(matches!(err, FastnError::Registry { .. }));

    let synced = client.kit().sync().unwrap();
    mock.assert();
    assert_eq!(synced.len(), 2);
    assert!(registry_path(dir.path()).exists());

    // The new catalog is visible without rebuilding the client.
    assert_eq!(client.kit().tools("slack").unwrap().len(), 1);
    assert!(client.connector("slack").is_ok());
}

#[test]
fn test_unknown_tool_guidance_differs() {
    let server = Server::new();
    let dir = project(&server, true);
    let client = client(&dir);

    let stale = client
        .connector("slack")
        .unwrap()
        .call("archive_channel", json!({}))
        .unwrap_err();
    let empty = client
        .connector("notion")
        .unwrap()
        .call("create_page", json!({}))
        .unwrap_err();

    assert!(stale.to_string().contains("kit sync"));
    assert!(empty.to_string().contains("fastn kit get notion"));
}

#[test]
fn test_unknown_connector() {
    let server = Server::new();
    let dir = project(&server, true);

    match client(&dir).connector("jira") {
        Err(FastnError::ConnectorNotFound { connector }) => assert_eq!(connector, "jira"),
        other => panic!("expected connector not found, got {:?}", other.map(|p| p.to_string())),
    }
}

#[test]
fn test_skill_run_and_missing_run() {
    let mut server = Server::new();
    let _run = server
        .mock("POST", "/flows/skill-1/run")
        .match_body(Matcher::Json(json!({"input": {"x": 1}})))
        .with_status(200)
        .with_body(r#"{"runId": "run-9", "status": "RUNNING"}"#)
        .create();
    let _status = server
        .mock("GET", "/flows/runs/missing")
        .with_status(404)
        .with_body(r#"{"code": "RUN_NOT_FOUND", "message": "no such run"}"#)
        .create();
    let _flow = server
        .mock("POST", "/flows/nope/run")
        .with_status(404)
        .with_body(r#"{"errorCode": "FLOW_NOT_FOUND"}"#)
        .create();

    let dir = project(&server, false);
    let client = client(&dir);

    let run = client.skills().run("skill-1", json!({"x": 1})).unwrap();
    assert_eq!(run.run_id, "run-9");
    assert_eq!(run.status, "RUNNING");

    assert!(matches!(
        client.skills().get_run("missing"),
        Err(FastnError::RunNotFound { .. })
    ));
    assert!(matches!(
        client.skills().run("nope", json!({})),
        Err(FastnError::FlowNotFound { .. })
    ));
}

#[test]
fn test_get_tools_for_formats() {
    let server = Server::new();
    let dir = project(&server, true);
    let client = client(&dir);

    let openai = client
        .get_tools_for("send", None, ToolFormat::OpenAI)
        .unwrap();
    assert_eq!(openai.len(), 1);
    assert_eq!(openai[0]["function"]["name"], "send_message");
    assert_eq!(
        openai[0]["function"]["parameters"]["required"],
        json!(["channel", "text"])
    );

    let raw = client
        .get_tools_for("", Some("slack"), ToolFormat::Raw)
        .unwrap();
    assert_eq!(raw[0]["actionId"], "act_slack_send_message");
    assert!(raw[0]["inputSchema"]["properties"]["body"].is_object());
}

#[test]
fn test_resolve_connection_ambiguous() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_body(r#"{"data": {"connections": [{"id": "a"}, {"id": "b"}]}}"#)
        .create();

    let dir = project(&server, false);
    let client = client(&dir);

    assert_eq!(
        client.kit().resolve_connection("slack", Some("chosen")).unwrap(),
        "chosen"
    );
    match client.kit().resolve_connection("slack", None) {
        Err(FastnError::ConnectionNotFound { candidates, .. }) => {
            assert_eq!(candidates, vec!["a", "b"])
        }
        other => panic!("expected connection not found, got {:?}", other),
    }
}

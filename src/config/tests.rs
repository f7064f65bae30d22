use super::*;
use serde_json::json;
use std::collections::HashMap;
use tempfile::TempDir;

fn env_layer(vars: &[(&str, &str)]) -> PartialConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    PartialConfig::from_lookup(|key| vars.get(key).cloned())
}

fn write_config(dir: &TempDir, value: serde_json::Value) -> ConfigFile {
    let path = config_path(dir.path());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, value.to_string()).unwrap();
    ConfigFile::load(&path).unwrap()
}

fn constructor(api_key: Option<&str>, project_id: Option<&str>, stage: Option<&str>) -> PartialConfig {
    PartialConfig {
        api_key: api_key.map(str::to_string),
        project_id: project_id.map(str::to_string),
        stage: stage.map(str::to_string),
        ..PartialConfig::default()
    }
}

#[test]
fn test_defaults() {
    let ctor = constructor(Some("key"), None, None);
    let config = resolve(&ctor, &PartialConfig::default(), None).unwrap();

    assert_eq!(config.stage, Stage::Live);
    assert_eq!(config.tenant_id, "organization");
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.auth_url, DEFAULT_AUTH_URL);
    assert!(config.persist_path.is_none());
}

#[test]
fn test_api_key_precedence() {
    let dir = TempDir::new().unwrap();
    let file = write_config(&dir, json!({"api_key": "file-key"}));
    let env = env_layer(&[("FASTN_API_KEY", "env-key")]);

    let all = resolve(&constructor(Some("ctor-key"), None, None), &env, Some(&file)).unwrap();
    assert_eq!(all.api_key.as_deref(), Some("ctor-key"));

    let no_ctor = resolve(&PartialConfig::default(), &env, Some(&file)).unwrap();
    assert_eq!(no_ctor.api_key.as_deref(), Some("env-key"));

    let file_only = resolve(&PartialConfig::default(), &PartialConfig::default(), Some(&file)).unwrap();
    assert_eq!(file_only.api_key.as_deref(), Some("file-key"));
}

#[test]
fn test_project_id_precedence() {
    let dir = TempDir::new().unwrap();
    let file = write_config(&dir, json!({"api_key": "k", "project_id": "file-proj"}));
    let env = env_layer(&[("FASTN_PROJECT_ID", "env-proj")]);

    let all = resolve(&constructor(None, Some("ctor-proj"), None), &env, Some(&file)).unwrap();
    assert_eq!(all.project_id.as_deref(), Some("ctor-proj"));

    let no_ctor = resolve(&PartialConfig::default(), &env, Some(&file)).unwrap();
    assert_eq!(no_ctor.project_id.as_deref(), Some("env-proj"));

    let file_only = resolve(&PartialConfig::default(), &PartialConfig::default(), Some(&file)).unwrap();
    assert_eq!(file_only.project_id.as_deref(), Some("file-proj"));

    let none = resolve(&constructor(Some("k"), None, None), &PartialConfig::default(), None).unwrap();
    assert_eq!(none.project_id, None);
}

#[test]
fn test_stage_precedence() {
    let dir = TempDir::new().unwrap();
    let file = write_config(&dir, json!({"api_key": "k", "stage": "DEV"}));
    let env = env_layer(&[("FASTN_STAGE", "staging")]);

    let all = resolve(&constructor(None, None, Some("live")), &env, Some(&file)).unwrap();
    assert_eq!(all.stage, Stage::Live);

    let no_ctor = resolve(&PartialConfig::default(), &env, Some(&file)).unwrap();
    assert_eq!(no_ctor.stage, Stage::Staging);

    let file_only = resolve(&PartialConfig::default(), &PartialConfig::default(), Some(&file)).unwrap();
    assert_eq!(file_only.stage, Stage::Dev);
}

#[test]
fn test_missing_credentials_is_config_error() {
    let result = resolve(&PartialConfig::default(), &PartialConfig::default(), None);
    match result {
        Err(FastnError::Config { missing, .. }) => {
            assert!(missing.contains(&"api_key".to_string()));
            assert!(missing.contains(&"auth_token".to_string()));
        }
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
fn test_unknown_stage_rejected() {
    let result = resolve(
        &constructor(Some("k"), None, Some("prod")),
        &PartialConfig::default(),
        None,
    );
    assert!(matches!(result, Err(FastnError::Config { .. })));
}

#[test]
fn test_empty_env_values_ignored() {
    let env = env_layer(&[("FASTN_API_KEY", ""), ("FASTN_STAGE", "  ")]);
    assert_eq!(env.api_key, None);
    assert_eq!(env.stage, None);
}

#[test]
fn test_token_from_file_sets_persist_path() {
    let dir = TempDir::new().unwrap();
    let file = write_config(
        &dir,
        json!({"auth_token": "tok", "refresh_token": "ref", "token_expiry": 1700000000.75}),
    );

    let config = resolve(&PartialConfig::default(), &PartialConfig::default(), Some(&file)).unwrap();
    assert_eq!(config.persist_path.as_deref(), Some(file.path()));
    assert_eq!(config.token_expiry.unwrap().timestamp(), 1_700_000_000);
    assert_eq!(config.refresh_token.as_deref(), Some("ref"));

    // A token from the environment must not be written into the file.
    let env = env_layer(&[("FASTN_AUTH_TOKEN", "env-tok")]);
    let config = resolve(&PartialConfig::default(), &env, Some(&file)).unwrap();
    assert_eq!(config.auth_token.as_deref(), Some("env-tok"));
    assert!(config.persist_path.is_none());
}

#[test]
fn test_explicit_token_does_not_inherit_file_session() {
    let dir = TempDir::new().unwrap();
    let file = write_config(
        &dir,
        json!({"auth_token": "old-file-token", "refresh_token": "old-refresh", "token_expiry": 1000}),
    );

    let ctor = PartialConfig {
        auth_token: Some("fresh-explicit-token".to_string()),
        ..PartialConfig::default()
    };
    let config = resolve(&ctor, &PartialConfig::default(), Some(&file)).unwrap();
    assert_eq!(config.auth_token.as_deref(), Some("fresh-explicit-token"));
    assert!(config.refresh_token.is_none());
    assert!(config.token_expiry.is_none());
    assert!(config.persist_path.is_none());

    // Same for a token from the environment.
    let env = env_layer(&[("FASTN_AUTH_TOKEN", "env-tok")]);
    let config = resolve(&PartialConfig::default(), &env, Some(&file)).unwrap();
    assert!(config.refresh_token.is_none());
    assert!(config.token_expiry.is_none());
}

#[test]
fn test_token_fields_merge_as_one_session() {
    let upper = PartialConfig {
        auth_token: Some("a".to_string()),
        ..PartialConfig::default()
    };
    let lower = PartialConfig {
        auth_token: Some("b".to_string()),
        refresh_token: Some("rb".to_string()),
        token_expiry: Some(5),
        api_key: Some("key".to_string()),
        ..PartialConfig::default()
    };

    let merged = upper.or(&lower);
    assert_eq!(merged.auth_token.as_deref(), Some("a"));
    assert!(merged.refresh_token.is_none());
    assert!(merged.token_expiry.is_none());
    assert_eq!(merged.api_key.as_deref(), Some("key"));

    let merged = PartialConfig::default().or(&lower);
    assert_eq!(merged.auth_token.as_deref(), Some("b"));
    assert_eq!(merged.refresh_token.as_deref(), Some("rb"));
    assert_eq!(merged.token_expiry, Some(5));
}

#[test]
fn test_api_key_wins_credential() {
    let ctor = PartialConfig {
        api_key: Some("key".to_string()),
        auth_token: Some("token".to_string()),
        ..PartialConfig::default()
    };
    let config = resolve(&ctor, &PartialConfig::default(), None).unwrap();
    assert_eq!(config.credential().unwrap(), Credential::ApiKey("key"));
    assert!(!config.uses_bearer());
}

#[test]
fn test_config_file_roundtrip_preserves_unknown_keys() {
    let dir = TempDir::new().unwrap();
    let mut file = write_config(&dir, json!({"api_key": "k", "editor": "vim"}));

    file.set_tokens("tok", Some("ref"), Some(42));
    file.save().unwrap();

    let reloaded = ConfigFile::load(file.path()).unwrap();
    assert_eq!(reloaded.get("editor"), Some(&json!("vim")));
    assert_eq!(reloaded.partial().auth_token.as_deref(), Some("tok"));
    assert_eq!(reloaded.partial().token_expiry, Some(42));

    let mut reloaded = reloaded;
    assert!(reloaded.clear_tokens());
    assert!(!reloaded.clear_tokens());
    assert_eq!(reloaded.partial().auth_token, None);
}

#[test]
fn test_missing_file_is_empty_layer() {
    let dir = TempDir::new().unwrap();
    let file = ConfigFile::load(config_path(dir.path())).unwrap();
    assert!(!file.exists());
    assert_eq!(file.partial(), PartialConfig::default());
}

#[test]
fn test_corrupt_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = config_path(dir.path());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{not json").unwrap();

    assert!(matches!(ConfigFile::load(&path), Err(FastnError::Config { .. })));
}

#[test]
fn test_stage_parsing() {
    assert_eq!("live".parse::<Stage>().unwrap(), Stage::Live);
    assert_eq!("Staging".parse::<Stage>().unwrap(), Stage::Staging);
    assert_eq!("DEV".parse::<Stage>().unwrap(), Stage::Dev);
    assert_eq!(Stage::Staging.to_string(), "STAGING");
}

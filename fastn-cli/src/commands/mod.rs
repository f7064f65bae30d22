//! Command handlers. Each returns the text to print on stdout.

pub mod agent;
pub mod auth;
pub mod kit;
pub mod project;
pub mod skill;

use crate::cli::{Cli, Command};
use anyhow::{Context as _, Result};
use fastn::config::{config_path, ConfigFile};
use fastn::{AsyncFastnClient, ClientBuilder};
use serde_json::Value;
use std::path::PathBuf;

/// Global flags shared by every command.
#[derive(Clone, Debug)]
pub struct Context {
    pub dir: PathBuf,
    pub json: bool,
    pub verbose: bool,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            dir: cli.dir.clone(),
            json: cli.json,
            verbose: cli.verbose,
        }
    }

    /// Client builder rooted at the project directory.
    pub fn builder(&self) -> ClientBuilder {
        let builder = AsyncFastnClient::builder().project_dir(&self.dir);
        if self.verbose {
            builder.verbose(true)
        } else {
            builder
        }
    }

    pub fn config_file(&self) -> Result<ConfigFile> {
        let path = config_path(&self.dir);
        ConfigFile::load(&path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

/// Parse an optional JSON object argument. Absent means `{}`.
pub(crate) fn parse_object(raw: Option<&str>, flag: &str) -> Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Object(Default::default()));
    };
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("{} is not valid JSON", flag))?;
    anyhow::ensure!(value.is_object(), "{} must be a JSON object", flag);
    Ok(value)
}

pub async fn run(cli: Cli) -> Result<String> {
    let ctx = Context::from_cli(&cli);
    match cli.command {
        Command::Login { project } => auth::login(&ctx, project).await,
        Command::Logout => auth::logout(&ctx),
        Command::Whoami => auth::whoami(&ctx),
        Command::Kit { command } => kit::run(&ctx, command).await,
        Command::Project { command } => project::run(&ctx, command).await,
        Command::Skill { command } => skill::run(&ctx, command).await,
        Command::Agent { command } => agent::run(&ctx, command).await,
    }
}

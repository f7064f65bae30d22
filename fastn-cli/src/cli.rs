use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fastn")]
#[command(version, about = "Fastn command-line tool: login, manage connectors, run skills")]
pub struct Cli {
    /// Project directory holding `.fastn/`.
    #[arg(long, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// Log every request and response.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// JSON output.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in with the device-code flow and store the tokens.
    Login {
        /// Project to use after login.
        #[arg(long)]
        project: Option<String>,
    },
    /// Remove stored tokens.
    Logout,
    /// Show the authenticated identity and project.
    Whoami,
    /// Manage installed connectors.
    Kit {
        #[command(subcommand)]
        command: KitCommand,
    },
    /// List the projects visible to the current credentials.
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    /// List and run skills.
    Skill {
        #[command(subcommand)]
        command: SkillCommand,
    },
    /// Tool descriptors and direct calls for agents.
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum KitCommand {
    /// List installed connectors.
    Ls,
    /// Show one connector.
    Get { connector: String },
    /// List a connector's tools.
    Tools { connector: String },
    /// Download the registry.
    Sync,
    /// List a connector's connections.
    Connections { connector: String },
    /// Show or update `.fastn/config.json`.
    Config {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        stage: Option<String>,
        #[arg(long)]
        tenant: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// List projects; the configured one is marked.
    Ls,
}

#[derive(Subcommand, Debug)]
pub enum SkillCommand {
    /// List the project's skills.
    Ls,
    /// Start a skill run.
    Run {
        skill_id: String,
        /// Input as a JSON object.
        #[arg(long)]
        input: Option<String>,
    },
    /// Show a run's status.
    Status { run_id: String },
}

#[derive(Subcommand, Debug)]
pub enum AgentCommand {
    /// Print tool descriptors for an LLM provider.
    Tools {
        /// Free-text search; empty lists every tool.
        query: Option<String>,
        #[arg(long)]
        connector: Option<String>,
        /// openai, anthropic, gemini, bedrock or raw.
        #[arg(long, default_value = "openai")]
        format: String,
    },
    /// Call one tool.
    Call {
        connector: String,
        tool: String,
        /// Parameters as a JSON object.
        #[arg(long)]
        params: Option<String>,
        #[arg(long)]
        connection: Option<String>,
    },
}

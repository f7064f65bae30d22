use super::Context;
use crate::cli::ProjectCommand;
use crate::output;
use anyhow::Result;
use fastn::AsyncFastnClient;
use serde_json::json;

pub async fn run(ctx: &Context, command: ProjectCommand) -> Result<String> {
    match command {
        ProjectCommand::Ls => {
            let (projects, current) = AsyncFastnClient::session(ctx.builder(), |c| async move {
                let projects = c.projects().list().await?;
                Ok((projects, c.projects().current()))
            })
            .await?;
            if ctx.json {
                return output::json(&json!({ "current": current, "projects": projects }));
            }
            Ok(output::projects(&projects, current.as_deref()))
        }
    }
}

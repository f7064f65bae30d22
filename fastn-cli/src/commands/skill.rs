use super::{parse_object, Context};
use crate::cli::SkillCommand;
use crate::output;
use anyhow::Result;
use fastn::AsyncFastnClient;

pub async fn run(ctx: &Context, command: SkillCommand) -> Result<String> {
    match command {
        SkillCommand::Ls => {
            let skills =
                AsyncFastnClient::session(ctx.builder(), |c| async move { c.skills().list().await })
                    .await?;
            if ctx.json {
                return output::json(&skills);
            }
            Ok(output::skills(&skills))
        }
        SkillCommand::Run { skill_id, input } => {
            let input = parse_object(input.as_deref(), "--input")?;
            let run = AsyncFastnClient::session(ctx.builder(), |c| async move {
                c.skills().run(&skill_id, input).await
            })
            .await?;
            if ctx.json {
                return output::json(&run);
            }
            Ok(output::run(&run))
        }
        SkillCommand::Status { run_id } => {
            let run = AsyncFastnClient::session(ctx.builder(), |c| async move {
                c.skills().get_run(&run_id).await
            })
            .await?;
            if ctx.json {
                return output::json(&run);
            }
            Ok(output::run(&run))
        }
    }
}

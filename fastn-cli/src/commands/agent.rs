use super::{parse_object, Context};
use crate::cli::AgentCommand;
use crate::output;
use anyhow::Result;
use fastn::{AsyncFastnClient, CallOptions, ToolFormat};

pub async fn run(ctx: &Context, command: AgentCommand) -> Result<String> {
    match command {
        AgentCommand::Tools {
            query,
            connector,
            format,
        } => {
            let format: ToolFormat = format.parse()?;
            let query = query.unwrap_or_default();
            let tools = AsyncFastnClient::session(ctx.builder(), |c| async move {
                c.get_tools_for(&query, connector.as_deref(), format)
            })
            .await?;
            // Descriptors are always JSON.
            output::json(&tools)
        }
        AgentCommand::Call {
            connector,
            tool,
            params,
            connection,
        } => {
            let params = parse_object(params.as_deref(), "--params")?;
            let options = CallOptions {
                connection_id: connection,
                tenant_id: None,
            };
            let result = AsyncFastnClient::session(ctx.builder(), |c| async move {
                let proxy = c.connector(&connector)?;
                proxy.call_with(&tool, params, options).await
            })
            .await?;
            output::json(&result)
        }
    }
}

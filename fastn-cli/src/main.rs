use clap::Parser;
use fastn_cli::{log_filter, output, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter(cli.verbose).into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json;
    match fastn_cli::run(cli).await {
        Ok(text) => {
            if !text.is_empty() {
                println!("{}", text);
            }
        }
        Err(e) => {
            eprintln!("{}", output::error(&e, json));
            std::process::exit(1);
        }
    }
}

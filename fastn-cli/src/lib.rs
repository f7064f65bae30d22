//! `fastn` command-line tool built on the async SDK client.

pub mod cli;
pub mod commands;
pub mod output;

pub use cli::Cli;
pub use commands::run;

/// Default log filter; `--verbose` raises the SDK to info so request logs show.
pub fn log_filter(verbose: bool) -> &'static str {
    if verbose {
        "fastn=info,fastn_cli=info"
    } else {
        "fastn=warn,fastn_cli=info"
    }
}

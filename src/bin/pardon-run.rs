//! `pardon-run`: the CLI binary that drives a single ask through a
//! filesystem collection end to end.

use clap::Parser;

use pardon::cmd::{exit_code_for, run_ask, Cli};
use pardon::log::init_tracing_with;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing_with(cli.log_level.as_deref(), cli.log_json);

    match run_ask(&cli).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome.rendered_request).unwrap());
            if let Some(response) = &outcome.response {
                println!("{}", serde_json::to_string_pretty(response).unwrap());
            }
            std::process::exit(outcome.exit_code);
        }
        Err(err) => {
            eprintln!("pardon-run: {err}");
            std::process::exit(exit_code_for(&err));
        }
    }
}

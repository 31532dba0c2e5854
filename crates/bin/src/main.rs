use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use liftcash_session::{Error, Result, SessionController, SessionStore, backend::LoopbackProvider};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so JSON output stays parseable
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("liftcash_session=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::debug!(module = err.module(), "Command failed");
            eprintln!("Error: {err}");
            ExitCode::from(exit_status(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.config.to_config()?;

    if let Commands::Health(args) = &cli.command {
        let healthy = commands::health::run(&config, args).await?;
        return Ok(if healthy {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let provider = LoopbackProvider::new(config.callback_port).with_launcher(|url| {
        eprintln!("Open this URL in a browser to log in:\n\n  {url}\n");
    });
    let controller =
        SessionController::from_config_with_provider(&config, SessionStore::new(), Arc::new(provider))?;
    tracing::debug!(mode = %controller.mode(), "Session controller ready");

    match cli.command {
        Commands::Status => commands::status::run(&controller, cli.format).await?,
        Commands::Login => commands::login::run(&controller, cli.format).await?,
        Commands::Logout => commands::logout::run(&controller, cli.format).await?,
        Commands::Watch => commands::watch::run(&controller, cli.format).await?,
        Commands::Health(_) => {}
    }
    Ok(ExitCode::SUCCESS)
}

/// Process exit status for a failed command.
fn exit_status(err: &Error) -> u8 {
    if err.is_configuration_error() {
        2
    } else if err.is_login_failure() {
        3
    } else if err.is_io_error() || err.is_backend_error() {
        4
    } else {
        1
    }
}

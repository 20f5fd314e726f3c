//! calexport CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use calexport_client::cli::{Cli, Command, ConfigAction, PrefsAction};
use calexport_client::commands;
use calexport_client::config::ClientConfig;
use calexport_client::error::ClientResult;
use calexport_client::socket::SocketClient;
use calexport_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let tracing_config = if cli.debug || config.debug {
        TracingConfig::cli_debug()
    } else if matches!(cli.command, Command::Serve) {
        TracingConfig::daemon()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Loads the configuration and applies command-line overrides.
fn load_config(cli: &Cli) -> ClientResult<ClientConfig> {
    let mut config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };

    if let Some(ref socket_path) = cli.socket_path {
        config.server.socket_path = Some(socket_path.clone());
    }
    if let Some(timeout) = cli.timeout {
        config.server.timeout = timeout;
    }
    Ok(config)
}

async fn run(command: Command, config: ClientConfig) -> ClientResult<()> {
    let client = SocketClient::new(config.socket_path(), config.timeout());

    match command {
        Command::Serve => commands::serve::run(&config).await,
        Command::Draft(arg) => commands::plugin::draft(&client, &arg.program).await,
        Command::Menu(arg) => commands::plugin::menu(&client, &arg.program).await,
        Command::Export(arg) => commands::plugin::export(&client, &arg.program).await,
        Command::Unmark(arg) => commands::plugin::unmark(&client, &arg.program).await,
        Command::Marked => commands::plugin::marked(&client).await,
        Command::Prune {
            first_known_id,
            persist,
        } => commands::plugin::prune(&client, first_known_id, persist).await,
        Command::Info => commands::plugin::info(&client).await,
        Command::Ping => commands::plugin::ping(&client).await,
        Command::Stop => commands::plugin::stop(&client).await,
        Command::Prefs { action } => match action {
            PrefsAction::Show => commands::prefs::show(&config),
            PrefsAction::Set(update) => commands::prefs::set(&config, &update),
        },
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Path => commands::config::path(&config),
        },
    }
}

//! sqlsession binary entry point.

use std::process::ExitCode;

use sqlsession::api::{serve_with_state, AppState};
use sqlsession::cli;
use sqlsession::config::Config;
use sqlsession::{logging, SqlStore};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run with --help for usage");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(config.log_filter());
    info!("sqlsession v{}", env!("CARGO_PKG_VERSION"));

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let server = config.to_server_config()?;
    let options = config.store_options()?;

    let store = SqlStore::open(&config.store.database_url, options).await?;
    let cleanup = store.cleanup(config.cleanup_interval());

    let state = AppState::new(store.clone(), config.session_name.as_str());
    let served = serve_with_state(server, state, shutdown_signal()).await;

    store.stop_cleanup(cleanup).await;
    store.close().await;

    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

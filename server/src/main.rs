mod api;
mod cli;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use docverify::config::LogSettings;
use docverify::{logging, ApiClient, AppContext, Settings};

use api::{build_router, AppState};
use error::ServerError;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/v1";

#[derive(Parser)]
#[command(name = "docverify")]
#[command(about = "Document verification service and review client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ClientArgs {
    /// Base URL of the API, including the prefix
    #[arg(long, env = "DOCVERIFY_API", default_value = DEFAULT_API_URL)]
    api: String,

    /// Seconds between status polls
    #[arg(long, default_value_t = 5)]
    interval: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server (configured through the environment)
    Serve {
        /// Overrides SERVER_PORT
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Upload PDF or ZIP files as a new session
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Keep polling until every document is processed
        #[arg(long)]
        watch: bool,

        #[command(flatten)]
        client: ClientArgs,
    },
    /// Poll a session until all of its documents are processed
    Watch {
        session_id: i64,

        #[command(flatten)]
        client: ClientArgs,
    },
    /// Show a document's markers and analysis
    Show {
        session_id: i64,
        document_id: i64,

        /// Only show these categories, e.g. `qr,stamp`
        #[arg(long)]
        only: Option<String>,

        #[command(flatten)]
        client: ClientArgs,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<(), ServerError> {
    match command {
        Commands::Serve { port } => {
            let mut settings = Settings::from_env()?;
            if let Some(port) = port {
                settings.server.port = port;
            }
            logging::init(&settings.logging)?;
            serve(settings).await
        }
        Commands::Upload {
            files,
            watch,
            client,
        } => {
            init_client_logging()?;
            let api = ApiClient::new(&client.api)?;
            let session_id = cli::upload(&api, &files).await?;
            if watch {
                cli::watch(&api, session_id, Duration::from_secs(client.interval)).await?;
            }
            Ok(())
        }
        Commands::Watch { session_id, client } => {
            init_client_logging()?;
            let api = ApiClient::new(&client.api)?;
            cli::watch(&api, session_id, Duration::from_secs(client.interval)).await
        }
        Commands::Show {
            session_id,
            document_id,
            only,
            client,
        } => {
            init_client_logging()?;
            let api = ApiClient::new(&client.api)?;
            cli::show(
                &api,
                session_id,
                document_id,
                only.as_deref(),
                Duration::from_secs(client.interval),
            )
            .await
        }
    }
}

fn init_client_logging() -> Result<(), ServerError> {
    let settings = LogSettings {
        level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()),
        ..LogSettings::default()
    };
    logging::init(&settings)?;
    Ok(())
}

async fn serve(settings: Settings) -> Result<(), ServerError> {
    tracing::info!(
        name = %settings.app_name,
        address = %settings.bind_address(),
        prefix = %settings.api_prefix,
        "starting docverify"
    );

    let ctx = AppContext::from_settings(&settings)?;
    let state = AppState {
        ctx,
        app_name: settings.app_name.clone(),
    };
    let app = build_router(state, &settings.api_prefix, &settings.server);

    let listener = TcpListener::bind(settings.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

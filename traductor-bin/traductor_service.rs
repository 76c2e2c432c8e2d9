use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use tokio::{net::TcpListener, sync::watch, try_join};
use tracing::{error, info};
use traductor_inference::{device, Translator};
use traductor_service::{
    run_server, spawn_with_shutdown,
    telemetry::{self, LOGS},
    AppState, TraductorServiceConfig,
};

/// Command line arguments for the translation service
#[derive(Parser)]
struct Args {
    /// Path to the configuration file, defaults and environment variables are used otherwise
    #[arg(short, long)]
    config_path: Option<String>,

    /// Index of the CUDA or Metal device to run the model on
    #[arg(short, long, default_value_t = 0)]
    device_id: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG may come from .env, so load it before building the filter
    dotenv().ok();
    // Keep the guard alive so buffered logs are flushed on exit
    let _log_guard = telemetry::setup_logging(LOGS).context("Failed to setup logging")?;

    let args = Args::parse();
    let config = TraductorServiceConfig::from_file_path(args.config_path.as_ref())
        .context("Failed to load configuration")?;

    info!(
        target = "traductor-service",
        event = "model-load",
        vectorizer_path = %config.vectorizer_path.display(),
        model_path = %config.model_path.display(),
        "Loading translation model"
    );
    let device = device(args.device_id).context("Failed to select device")?;
    let translator = Translator::load(&config.vectorizer_path, &config.model_path, &device)
        .context("Failed to load translation model")?;
    let app_state = AppState {
        translator: Arc::new(translator),
    };

    let tcp_listener = TcpListener::bind(&config.service_bind_address)
        .await
        .context("Failed to bind TCP listener")?;

    info!(
        target = "traductor-service",
        event = "service-start",
        bind_address = %config.service_bind_address,
        "Starting translation service"
    );

    let (shutdown_sender, mut shutdown_receiver) = watch::channel(false);
    let server_handle = spawn_with_shutdown(
        run_server(app_state, tcp_listener, shutdown_receiver.clone()),
        shutdown_sender.clone(),
    );

    let ctrl_c = tokio::task::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                info!(
                    target = "traductor-service",
                    event = "service-stop",
                    "ctrl-c received, sending shutdown signal"
                );
                shutdown_sender
                    .send(true)
                    .context("Failed to send shutdown signal")?;
                result.map_err(anyhow::Error::from)
            }
            _ = shutdown_receiver.changed() => {
                Ok(())
            }
        }
    });

    let (server_result, ctrl_c_result) = try_join!(server_handle, ctrl_c)?;
    if let Err(e) = &server_result {
        error!(
            target = "traductor-service",
            event = "service-stop",
            error = ?e,
            "Server terminated abruptly"
        );
    }
    ctrl_c_result?;

    info!(
        target = "traductor-service",
        event = "service-stop",
        "Translation service shut down gracefully"
    );
    server_result
}

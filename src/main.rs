use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onetimeshare::api::{self, AppState};
use onetimeshare::cli::{Cli, Commands};
use onetimeshare::config::{self, Config};
use onetimeshare::crypto::KEY_LENGTH;
use onetimeshare::keygen;
use onetimeshare::vault::SecretStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Export spans over OTLP only when an endpoint is configured.
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "onetimeshare"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "onetimeshare=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Keygen) => {
            println!("{}", keygen::generate(KEY_LENGTH));
            Ok(())
        }
        Some(Commands::Serve { port, json }) => serve(port, json).await,
        None => serve(None, false).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    opentelemetry::global::shutdown_tracer_provider();
    result
}

async fn serve(port: Option<u16>, json: bool) -> anyhow::Result<()> {
    let mut cfg = config::load()?;
    if let Some(port) = port {
        cfg.port = port;
    }
    if json {
        cfg.storage = "json".into();
    }
    run_server(cfg).await
}

async fn run_server(cfg: Config) -> anyhow::Result<()> {
    if cfg.generated_key {
        println!(
            "Generated encryption key is: {} (set env variable OTS_ENCRYPTION_KEY to use custom key)",
            cfg.encryption_key
        );
        tracing::warn!("OTS_ENCRYPTION_KEY not set; secrets stored now are unreadable after restart");
    }

    let backend = cfg.backend()?;
    tracing::info!(?backend, "Opening secret store...");
    let store = SecretStore::open(&cfg.encryption_key, &backend)
        .await
        .context("failed to open secret store")?;

    let port = cfg.port;
    let state = Arc::new(AppState { store, config: cfg });
    let app = api::router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("onetimeshare listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.store.close().await?;
    tracing::info!("Server exited properly");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

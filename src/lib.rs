pub mod api;
pub mod config;
pub mod db;
pub mod entities;
pub mod services;

use anyhow::Context;
pub use config::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None | Some("serve" | "-s" | "--serve") => run_server(config).await,

        Some("init" | "--init") => {
            Config::create_default_if_missing()?;
            println!("✓ Config file created. Edit config.toml and run again.");
            Ok(())
        }

        Some("help" | "-h" | "--help") => {
            print_help();
            Ok(())
        }

        Some(other) => {
            println!("Unknown command: {}", other);
            println!();
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("Rosterd - User Management API");
    println!("Token-authenticated CRUD over a user directory");
    println!();
    println!("USAGE:");
    println!("  rosterd [COMMAND]");
    println!();
    println!("COMMANDS:");
    println!("  serve             Run the HTTP API server (default)");
    println!("  init              Create default config file");
    println!("  help              Show this help message");
    println!();
    println!("CONFIG:");
    println!("  Edit config.toml to configure the port, database, and argon2 costs.");
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    info!("Rosterd v{} starting...", env!("CARGO_PKG_VERSION"));

    let port = config.server.port;
    let state = api::create_app_state(config).await?;
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("API listening at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }
}

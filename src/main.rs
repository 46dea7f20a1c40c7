mod config;
mod converters;
mod engine;
mod errors;
mod logging;
mod models;
mod request_id;
mod router;
mod state;

use clap::Parser;
use config::Config;
use engine::{UpstreamEngine, load_token_counter};
use notify::{EventKind, RecursiveMode, Watcher};
use state::AppState;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "vlm-chat-gateway")]
#[command(about = "OpenAI-compatible chat completion gateway for vision-language models")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    ip: String,

    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Path to config file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<String>,

    /// socks and http proxy for the engine connection, example: socks5://192.168.0.2:10080
    #[arg(long)]
    proxy: Option<String>,
}

async fn watch_config_file(config_path: &str, state: &AppState) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel(100);

    let mut watcher = notify::recommended_watcher(move |res| {
        if let Ok(event) = res {
            if let Err(e) = tx.blocking_send(event) {
                eprintln!("Failed to send event: {}", e);
            }
        }
    })?;

    watcher.watch(Path::new(config_path), RecursiveMode::NonRecursive)?;

    while let Some(event) = rx.recv().await {
        if let EventKind::Modify(_) = event.kind {
            info!("Config file modified, attempting to reload");
            match Config::from_file(config_path) {
                Ok(new_config) => {
                    let current = state.settings().await;
                    if current.engine.api_base != new_config.engine.api_base
                        || current.engine.model != new_config.engine.model
                    {
                        warn!("Engine connection settings changed; restart to apply them");
                    }
                    state.update_settings(new_config).await;
                    info!("Configuration reloaded successfully");
                }
                Err(e) => {
                    error!("Failed to reload configuration: {}", e);
                }
            }
        }
    }

    Ok(())
}

fn build_http_client(proxy: Option<&str>) -> anyhow::Result<reqwest::Client> {
    let client_builder = reqwest::Client::builder();
    let client_builder = match proxy {
        Some(proxy) => {
            debug!("Using proxy: {}", proxy);
            client_builder.proxy(reqwest::Proxy::all(proxy)?)
        }
        None => client_builder,
    };
    Ok(client_builder.build()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = Level::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {}. Using INFO level.", args.log_level);
        Level::INFO
    });
    logging::init_logging(log_level, args.log_file.as_deref());

    let config_path = args.config.clone();
    let config = Config::from_file(&config_path)?;
    info!("Configuration loaded successfully from: {}", config_path);

    let http_client = Arc::new(build_http_client(args.proxy.as_deref())?);
    let engine = Arc::new(UpstreamEngine::new(http_client, config.engine.clone()));
    let token_counter = load_token_counter(&config.tokenizer)?;

    let app_state = AppState::new(config, engine, token_counter);

    let config_path_for_watcher = config_path.clone();
    let state_for_watcher = app_state.clone();
    tokio::spawn(async move {
        if let Err(e) = watch_config_file(&config_path_for_watcher, &state_for_watcher).await {
            warn!("Config file watcher error: {}", e);
        }
    });

    let app = router::app(app_state);

    let bind_address = format!("{}:{}", args.ip, args.port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server started on http://{}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}

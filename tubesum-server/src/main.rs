use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};
use tubesum_core::generator::{GeminiSummaryClient, GeneratorConfig, SummaryGenerator};
use tubesum_core::store::SummaryStore;
use tubesum_core::TubesumConfig;

use tubesum_server::router::RouterState;
use tubesum_server::server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "tubesum.toml")]
    config: String,

    /// Check the storage backend and exit
    #[arg(long)]
    health: bool,
}

/// `RUST_LOG` wins when set; otherwise `[service] log_level`, then `info`.
fn log_filter(rust_log: Option<&str>, log_level: &str) -> EnvFilter {
    if let Some(directives) = rust_log.map(str::trim).filter(|d| !d.is_empty()) {
        match EnvFilter::try_new(directives) {
            Ok(filter) => return filter,
            Err(e) => eprintln!("Ignoring invalid RUST_LOG '{}': {}", directives, e),
        }
    }
    EnvFilter::try_new(log_level).unwrap_or_else(|e| {
        eprintln!("Ignoring invalid log_level '{}': {}", log_level, e);
        EnvFilter::new("info")
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match TubesumConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging
    let rust_log = std::env::var("RUST_LOG").ok();
    fmt()
        .with_env_filter(log_filter(rust_log.as_deref(), &config.service.log_level))
        .init();

    // Storage backend
    let kv = match tubesum_core::kv::create_backend(&config).await {
        Ok(kv) => kv,
        Err(e) => {
            eprintln!("Failed to open storage backend '{}': {}", config.storage.backend, e);
            std::process::exit(1);
        }
    };
    let store = Arc::new(SummaryStore::with_history_limit(kv, config.storage.history_limit));

    if args.health {
        match store.get_usage().await {
            Ok(usage) => {
                println!("✅ Storage backend '{}' reachable", store.backend_name());
                println!(
                    "✅ {} videos summarized, {}s saved",
                    usage.videos_summarized, usage.time_saved
                );
            }
            Err(e) => {
                println!("❌ Storage check failed: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let generator: Arc<dyn SummaryGenerator> =
        Arc::new(GeminiSummaryClient::new(GeneratorConfig::from(&config.generator))?);

    let state = RouterState::new(store, generator, config.clone())
        .with_fallback_api_key(std::env::var("GOOGLE_API_KEY").ok());

    tracing::info!(
        backend = state.store.backend_name(),
        history_limit = state.store.history_limit(),
        model = %config.generator.model,
        "Tubesum starting"
    );

    // Shutdown signal
    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // HTTP API alongside the IPC socket, if enabled
    if config.http.enabled {
        let http_state = state.clone();
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = tubesum_server::http::start_http_server(http_state, http_shutdown).await {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    let socket_path = config.service.socket_path.clone();
    server::run_unix_server(&socket_path, state, tx.subscribe()).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_rust_log_can_lower_config_level() {
        let filter = log_filter(Some("warn"), "debug");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_config_level_used_without_rust_log() {
        assert_eq!(log_filter(None, "debug").max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter(Some("  "), "error").max_level_hint(), Some(LevelFilter::ERROR));
    }

    #[test]
    fn test_invalid_levels_fall_back_to_info() {
        assert_eq!(log_filter(None, "tubesum=verbose").max_level_hint(), Some(LevelFilter::INFO));
    }
}

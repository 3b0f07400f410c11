use clap::{Parser, Subcommand};
use std::sync::Arc;
use storelink_config::{AppConfig, LoggingConfig};
use storelink_core::{ConnectionManager, Error, Registry, StoreClient, StoreKind};
use storelink_mongo::MongoConnectorFactory;
use storelink_pinecone::PineconeConnectorFactory;
use storelink_redis::RedisConnectorFactory;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "storelink")]
#[command(about = "Connect to and health-check the project's external stores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to each configured store, verify it answers, then close
    Check {
        /// Path to configuration directory
        #[arg(short, long, default_value = "config")]
        config_dir: String,

        /// Only check these stores (document, vector_index, cache)
        #[arg(short, long = "store")]
        stores: Vec<StoreKind>,
    },

    /// Print the resolved configuration without connecting
    Validate {
        /// Path to configuration directory
        #[arg(short, long, default_value = "config")]
        config_dir: String,
    },
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(Arc::new(MongoConnectorFactory));
    registry.register(Arc::new(PineconeConnectorFactory));
    registry.register(Arc::new(RedisConnectorFactory));
    registry
}

fn failure_line(kind: StoreKind, err: &Error) -> String {
    format!("✗ {}: {}", kind, err)
}

async fn check(app_config: &AppConfig, stores: Vec<StoreKind>) -> anyhow::Result<()> {
    let manager = ConnectionManager::new(Arc::new(registry()));
    info!("Available stores: {:?}", manager.registry().list());

    let kinds = if stores.is_empty() {
        app_config.configured_stores()
    } else {
        stores
    };

    let mut failures = 0;
    let mut configs = Vec::new();
    for kind in kinds {
        match app_config.store_config(kind) {
            Ok(config) => configs.push(config),
            Err(e) => {
                println!("{}", failure_line(kind, &e));
                failures += 1;
            }
        }
    }

    let outcomes = tokio::select! {
        outcomes = manager.connect_all(&configs) => outcomes,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted before all stores answered");
            anyhow::bail!("interrupted");
        }
    };

    for outcome in outcomes {
        match outcome.result {
            Ok(handle) => {
                println!(
                    "✓ {} ready ({}), verified at {}",
                    outcome.kind,
                    handle.client().endpoint(),
                    handle.verified_at().to_rfc3339()
                );
                if let Err(e) = handle.close().await {
                    error!("Failed to close {}: {}", outcome.kind, e);
                    failures += 1;
                }
            }
            Err(e) => {
                println!("{}", failure_line(outcome.kind, &e));
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} store(s) failed the connectivity check", failures);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config_dir, stores } => {
            let app_config = AppConfig::load(&config_dir)?;
            init_tracing(&app_config.logging)?;

            info!("Checking stores with config directory: {}", config_dir);
            check(&app_config, stores).await?;
            info!("All stores answered");
        }

        Commands::Validate { config_dir } => {
            let app_config = AppConfig::load(&config_dir)?;

            println!("✓ Configuration is valid");
            println!("\n📦 Stores: {}", app_config.configured_stores().len());
            for kind in app_config.configured_stores() {
                println!("  • {}", kind);
            }
            println!("\n{}", app_config.to_yaml()?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_line_shows_error_message() {
        let err = Error::Liveness("PING returned LOADING".to_string());
        let line = failure_line(StoreKind::Cache, &err);

        assert!(line.starts_with("✗ "));
        assert!(line.contains("PING returned LOADING"));
        assert!(!line.contains("Failed("));
    }

    #[test]
    fn test_failure_line_for_missing_setting() {
        let config = AppConfig::from_raw(Default::default()).unwrap();
        let err = config.store_config(StoreKind::Document).unwrap_err();
        let line = failure_line(StoreKind::Document, &err);

        assert!(line.contains("MONGO_LOCAL_URI is not set"));
    }
}

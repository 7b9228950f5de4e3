//! Repository garbage-collection worker.
//!
//! Consumes "language analyzed" events from the durable `gc` queue, records
//! per-(repository, language) completion in Postgres, and deletes a
//! repository's on-disk clone once every present language has been analyzed.

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;

use gc_core::{Backoff, Error};
use postgres_store::PostgresConfig;
use rabbitmq::{QueueClient, RabbitMqConfig};
use telemetry::init_tracing_from_env;
use worker::{GcSupervisor, Reaper, SupervisorConfig};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    /// Base path under which repository clones live
    #[serde(default = "default_repos_path")]
    repos_path: String,

    /// Seconds between connection retries
    #[serde(default = "default_reconnect_delay_secs")]
    reconnect_delay_secs: u64,

    #[serde(default)]
    rabbitmq: RabbitMqConfig,

    #[serde(default)]
    postgres: PostgresConfig,
}

fn default_repos_path() -> String {
    "/repositories".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repos_path: default_repos_path(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            rabbitmq: RabbitMqConfig::default(),
            postgres: PostgresConfig::default(),
        }
    }
}

impl Config {
    /// Rejects startup when a required value is missing.
    fn validate(&self) -> gc_core::Result<()> {
        if self.rabbitmq.host.is_empty() {
            return Err(Error::config("GC_RABBITMQ_HOST must be provided"));
        }
        if self.postgres.host.is_empty() {
            return Err(Error::config("GC_POSTGRES_HOST must be provided"));
        }
        if self.postgres.database.is_empty() {
            return Err(Error::config("GC_POSTGRES_DATABASE must be provided"));
        }
        if self.postgres.username.is_empty() {
            return Err(Error::config("GC_POSTGRES_USERNAME must be provided"));
        }
        if self.postgres.password.is_empty() {
            return Err(Error::config("GC_POSTGRES_PASSWORD must be provided"));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    info!("Starting gc worker v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration; a missing required value terminates the process
    // with a descriptive message and a non-zero status.
    let config = load_config()?;
    config.validate()?;

    info!(
        rabbitmq_host = %config.rabbitmq.host,
        rabbitmq_port = config.rabbitmq.port,
        queue = %config.rabbitmq.queue,
        postgres_host = %config.postgres.host,
        postgres_database = %config.postgres.database,
        repos_path = %config.repos_path,
        "Loaded configuration"
    );

    let supervisor = GcSupervisor::new(
        QueueClient::new(config.rabbitmq.clone()),
        config.postgres.clone(),
        Reaper::new(&config.repos_path),
        SupervisorConfig {
            backoff: Backoff::fixed(std::time::Duration::from_secs(
                config.reconnect_delay_secs,
            )),
        },
    );

    // The supervisor only returns on a fatal error; the shutdown signal
    // cancels it, which drops and closes the broker connection.
    tokio::select! {
        result = supervisor.run() => {
            result.context("gc worker terminated")?;
        }
        _ = shutdown_signal() => {
            info!("Exiting...");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("GC")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Manual overrides for nested config from environment
    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(host) = std::env::var("GC_RABBITMQ_HOST") {
        config.rabbitmq.host = host;
    }
    if let Ok(port) = std::env::var("GC_RABBITMQ_PORT") {
        config.rabbitmq.port = port.parse().context("GC_RABBITMQ_PORT must be a port number")?;
    }
    if let Ok(username) = std::env::var("GC_RABBITMQ_USERNAME") {
        config.rabbitmq.username = Some(username);
    }
    if let Ok(password) = std::env::var("GC_RABBITMQ_PASSWORD") {
        config.rabbitmq.password = Some(password);
    }
    if let Ok(queue) = std::env::var("GC_RABBITMQ_QUEUE") {
        config.rabbitmq.queue = queue;
    }

    if let Ok(host) = std::env::var("GC_POSTGRES_HOST") {
        config.postgres.host = host;
    }
    if let Ok(port) = std::env::var("GC_POSTGRES_PORT") {
        config.postgres.port = port.parse().context("GC_POSTGRES_PORT must be a port number")?;
    }
    if let Ok(database) = std::env::var("GC_POSTGRES_DATABASE") {
        config.postgres.database = database;
    }
    if let Ok(username) = std::env::var("GC_POSTGRES_USERNAME") {
        config.postgres.username = username;
    }
    if let Ok(password) = std::env::var("GC_POSTGRES_PASSWORD") {
        config.postgres.password = password;
    }

    if let Ok(path) = std::env::var("GC_REPOS_PATH") {
        config.repos_path = path;
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}

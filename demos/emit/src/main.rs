//! Logmet Emit Example
//!
//! Connects with credentials from the environment, sends one metric to the
//! metrics endpoint and one log entry to the logs endpoint, and closes.
//!
//! Environment variables:
//! - LOGMET_HOST: Ingestion host
//! - LOGMET_PORT: Metrics port (default 9095)
//! - LOGMET_LOGS_PORT: Logs port (default 9091)
//! - LOGMET_SPACE_ID: Tenant space id
//! - LOGMET_TOKEN: Logging token
//! - LOGMET_TIMEOUT_SECS: Per-operation timeout (default 20)
//! - LOGMET_TLS: verify | verify-or-insecure | insecure
//! - RUST_LOG: tracing filter (default info)
//!
//! Usage: `logmet-emit [metric-name] [value] [message...]`

use logmet_protocol::core::constants::DEFAULT_LOGS_PORT;
use logmet_protocol::{ClientConfig, ClientError, LogEntry, LogmetClient};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    if let Err(e) = run().await {
        error!(error = %e, "emit failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ClientError> {
    let mut args = std::env::args().skip(1);
    let name = args.next().unwrap_or_else(|| "logmet.test.1".to_string());
    let value = match args.next() {
        Some(raw) => raw
            .parse::<f64>()
            .map_err(|e| ClientError::Config(format!("invalid metric value {raw:?}: {e}")))?,
        None => 1.0,
    };
    let message: Vec<String> = args.collect();
    let message = if message.is_empty() {
        "This is a log message".to_string()
    } else {
        message.join(" ")
    };

    let metrics_config = ClientConfig::from_env()?;
    let mut logs_config = metrics_config.clone();
    logs_config.port = match std::env::var("LOGMET_LOGS_PORT") {
        Ok(raw) => raw
            .parse()
            .map_err(|e| ClientError::Config(format!("LOGMET_LOGS_PORT={raw}: {e}")))?,
        Err(_) => DEFAULT_LOGS_PORT,
    };

    info!(host = %metrics_config.host, port = metrics_config.port, "connecting to metrics endpoint");
    let mut metrics = LogmetClient::connect(metrics_config).await?;
    metrics.emit_metric(&name, value, None).await?;
    info!(%name, value, "metric acknowledged");
    metrics.close().await;

    info!(host = %logs_config.host, port = logs_config.port, "connecting to logs endpoint");
    let mut logs = LogmetClient::connect(logs_config).await?;
    let entry = LogEntry::message(message).with("app_name", "logmet-emit");
    logs.emit_log(entry).await?;
    info!("log entry acknowledged");
    logs.close().await;

    Ok(())
}

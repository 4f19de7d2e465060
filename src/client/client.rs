//! High-level Logmet client API.
//!
//! Provides [`LogmetClient`] for shipping metrics and log entries to a Logmet
//! ingestion endpoint.

use std::env;
use std::time::Duration;

use crate::codec::{LogEntry, MetricSample, Payload};
use crate::core::constants::{CLOSE_DRAIN_DELAY, DEFAULT_IO_TIMEOUT, DEFAULT_METRICS_PORT};
use crate::core::Credential;
use crate::transport::{SessionConfig, SessionState, TlsVerification, TransportSession};

use super::error::ClientError;
use super::pipeline::DeliveryPipeline;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Ingestion host.
    pub host: String,

    /// Ingestion port (9095 for metrics, 9091 for logs).
    pub port: u16,

    /// Tenant id and logging token.
    pub credential: Credential,

    /// Limit for every network operation.
    pub io_timeout: Duration,

    /// Server certificate verification.
    pub tls: TlsVerification,

    /// Grace period for in-flight acks on close.
    pub close_drain: Duration,
}

impl ClientConfig {
    /// Create a configuration with default timeouts and TLS verification.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        space_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        LogmetClientBuilder::new(host, port)
            .credentials(space_id, token)
            .build()
    }

    /// Read configuration from the environment.
    ///
    /// - `LOGMET_HOST` (required)
    /// - `LOGMET_PORT` (default 9095)
    /// - `LOGMET_SPACE_ID`, `LOGMET_TOKEN` (required)
    /// - `LOGMET_TIMEOUT_SECS` (default 20)
    /// - `LOGMET_TLS`: `verify`, `verify-or-insecure` (default) or `insecure`
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ClientError::Config(format!("{key} is not set")))
        };

        let host = required("LOGMET_HOST")?;
        let port = match lookup("LOGMET_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| ClientError::Config(format!("LOGMET_PORT={raw}: {e}")))?,
            None => DEFAULT_METRICS_PORT,
        };

        let mut builder = LogmetClientBuilder::new(host, port)
            .credentials(required("LOGMET_SPACE_ID")?, required("LOGMET_TOKEN")?);

        if let Some(raw) = lookup("LOGMET_TIMEOUT_SECS") {
            let secs: u64 = raw
                .parse()
                .map_err(|e| ClientError::Config(format!("LOGMET_TIMEOUT_SECS={raw}: {e}")))?;
            builder = builder.io_timeout(Duration::from_secs(secs));
        }
        if let Some(raw) = lookup("LOGMET_TLS") {
            builder = builder.tls_verification(parse_tls_mode(&raw)?);
        }

        builder.build()
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            host: self.host.clone(),
            port: self.port,
            io_timeout: self.io_timeout,
            tls: self.tls.clone(),
            close_drain: self.close_drain,
        }
    }
}

fn parse_tls_mode(raw: &str) -> Result<TlsVerification, ClientError> {
    match raw {
        "verify" => Ok(TlsVerification::SystemRoots {
            allow_insecure_fallback: false,
        }),
        "verify-or-insecure" => Ok(TlsVerification::default()),
        "insecure" => Ok(TlsVerification::Insecure),
        other => Err(ClientError::Config(format!(
            "LOGMET_TLS={other}: expected verify, verify-or-insecure or insecure"
        ))),
    }
}

/// Builder for creating a [`ClientConfig`].
#[derive(Debug)]
pub struct LogmetClientBuilder {
    host: String,
    port: u16,
    space_id: Option<String>,
    token: Option<String>,
    io_timeout: Duration,
    tls: TlsVerification,
    close_drain: Duration,
}

impl LogmetClientBuilder {
    /// Create a builder for the given endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            space_id: None,
            token: None,
            io_timeout: DEFAULT_IO_TIMEOUT,
            tls: TlsVerification::default(),
            close_drain: CLOSE_DRAIN_DELAY,
        }
    }

    /// Set the tenant id and logging token.
    pub fn credentials(mut self, space_id: impl Into<String>, token: impl Into<String>) -> Self {
        self.space_id = Some(space_id.into());
        self.token = Some(token.into());
        self
    }

    /// Set the I/O timeout.
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Set certificate verification.
    pub fn tls_verification(mut self, tls: TlsVerification) -> Self {
        self.tls = tls;
        self
    }

    /// Set the drain period used on close.
    pub fn close_drain(mut self, drain: Duration) -> Self {
        self.close_drain = drain;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<ClientConfig, ClientError> {
        if self.host.is_empty() {
            return Err(ClientError::Config("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(ClientError::Config("port must not be 0".into()));
        }
        if self.io_timeout.is_zero() {
            return Err(ClientError::Config("I/O timeout must be positive".into()));
        }
        let (Some(space_id), Some(token)) = (self.space_id, self.token) else {
            return Err(ClientError::Config("credentials are required".into()));
        };

        Ok(ClientConfig {
            host: self.host,
            port: self.port,
            credential: Credential::new(space_id, token)?,
            io_timeout: self.io_timeout,
            tls: self.tls,
            close_drain: self.close_drain,
        })
    }

    /// Build the configuration and connect.
    pub async fn connect(self) -> Result<LogmetClient, ClientError> {
        LogmetClient::connect(self.build()?).await
    }
}

/// A Logmet ingestion client.
///
/// Holds one authenticated session. Every emit call awaits the service's
/// acknowledgment before returning, reconnecting first if the service
/// dropped the idle connection. Methods take `&mut self`; share a client
/// between tasks behind a mutex.
///
/// # Example
///
/// ```ignore
/// use logmet_protocol::client::LogmetClientBuilder;
///
/// let mut client = LogmetClientBuilder::new("metrics.opvis.bluemix.net", 9095)
///     .credentials(space_id, token)
///     .connect()
///     .await?;
///
/// client.emit_metric("logmet.test.1", 1.0, None).await?;
/// client.emit_log("This is a log message").await?;
/// client.close().await;
/// ```
#[derive(Debug)]
pub struct LogmetClient {
    pipeline: DeliveryPipeline,
}

impl LogmetClient {
    /// Connect and authenticate.
    ///
    /// Fails with [`ClientError::Connection`] or
    /// [`ClientError::AuthenticationFailed`]; nothing is retried here.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let session = TransportSession::new(config.session_config(), config.credential)?;
        let mut pipeline = DeliveryPipeline::new(session);
        pipeline.establish().await?;
        Ok(Self { pipeline })
    }

    /// Send a metric; `timestamp` defaults to now (seconds since the epoch).
    pub async fn emit_metric(
        &mut self,
        name: &str,
        value: f64,
        timestamp: Option<u64>,
    ) -> Result<(), ClientError> {
        let sample = match timestamp {
            Some(ts) => MetricSample::at(name, value, ts),
            None => MetricSample::new(name, value),
        };
        self.emit_sample(sample).await
    }

    /// Send a prepared metric sample.
    pub async fn emit_sample(&mut self, sample: MetricSample) -> Result<(), ClientError> {
        self.emit(Payload::Metric(sample)).await
    }

    /// Send a log entry. Plain text becomes the `message` field.
    pub async fn emit_log(&mut self, entry: impl Into<LogEntry>) -> Result<(), ClientError> {
        self.emit(Payload::Log(entry.into())).await
    }

    /// Send any payload.
    pub async fn emit(&mut self, payload: Payload) -> Result<(), ClientError> {
        self.pipeline.emit(&payload).await
    }

    /// Close the connection, giving in-flight acks a moment to arrive.
    pub async fn close(&mut self) {
        self.pipeline.close().await;
    }

    /// Session lifecycle state.
    pub fn state(&self) -> SessionState {
        self.pipeline.session().state()
    }

    /// Tenant id this client submits for.
    pub fn space_id(&self) -> &str {
        self.pipeline.session().credential().space_id()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_builder_defaults() {
        let config = LogmetClientBuilder::new("metrics.example", 9095)
            .credentials("space", "token")
            .build()
            .unwrap();

        assert_eq!(config.host, "metrics.example");
        assert_eq!(config.port, 9095);
        assert_eq!(config.credential.space_id(), "space");
        assert_eq!(config.io_timeout, DEFAULT_IO_TIMEOUT);
        assert_eq!(config.close_drain, CLOSE_DRAIN_DELAY);
        assert_eq!(config.tls, TlsVerification::default());
    }

    #[test]
    fn test_builder_overrides() {
        let config = LogmetClientBuilder::new("logs.example", 9091)
            .credentials("space", "token")
            .io_timeout(Duration::from_secs(5))
            .tls_verification(TlsVerification::Insecure)
            .close_drain(Duration::ZERO)
            .build()
            .unwrap();

        assert_eq!(config.io_timeout, Duration::from_secs(5));
        assert_eq!(config.tls, TlsVerification::Insecure);
        assert_eq!(config.close_drain, Duration::ZERO);

        let session = config.session_config();
        assert_eq!(session.host, "logs.example");
        assert_eq!(session.port, 9091);
    }

    #[test]
    fn test_builder_rejects_invalid() {
        assert!(matches!(
            LogmetClientBuilder::new("h", 1).build(),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            LogmetClientBuilder::new("", 1).credentials("s", "t").build(),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            LogmetClientBuilder::new("h", 1)
                .credentials("s", "t")
                .io_timeout(Duration::ZERO)
                .build(),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            LogmetClientBuilder::new("h", 1).credentials("s", "").build(),
            Err(ClientError::Frame(_))
        ));
    }

    #[test]
    fn test_config_debug_hides_token() {
        let config = ClientConfig::new("h", 9095, "space", "very-secret").unwrap();
        assert!(!format!("{config:?}").contains("very-secret"));
    }

    #[test]
    fn test_from_env() {
        let config = ClientConfig::from_lookup(env_from(&[
            ("LOGMET_HOST", "logs.opvis.bluemix.net"),
            ("LOGMET_PORT", "9091"),
            ("LOGMET_SPACE_ID", "deadbeef"),
            ("LOGMET_TOKEN", "tok"),
            ("LOGMET_TIMEOUT_SECS", "3"),
            ("LOGMET_TLS", "insecure"),
        ]))
        .unwrap();

        assert_eq!(config.host, "logs.opvis.bluemix.net");
        assert_eq!(config.port, 9091);
        assert_eq!(config.credential.space_id(), "deadbeef");
        assert_eq!(config.io_timeout, Duration::from_secs(3));
        assert_eq!(config.tls, TlsVerification::Insecure);
    }

    #[test]
    fn test_from_env_defaults_and_errors() {
        let config = ClientConfig::from_lookup(env_from(&[
            ("LOGMET_HOST", "h"),
            ("LOGMET_SPACE_ID", "s"),
            ("LOGMET_TOKEN", "t"),
        ]))
        .unwrap();
        assert_eq!(config.port, DEFAULT_METRICS_PORT);

        let missing = ClientConfig::from_lookup(env_from(&[("LOGMET_HOST", "h")]));
        assert!(matches!(missing, Err(ClientError::Config(msg)) if msg.contains("LOGMET_SPACE_ID")));

        let bad_tls = ClientConfig::from_lookup(env_from(&[
            ("LOGMET_HOST", "h"),
            ("LOGMET_SPACE_ID", "s"),
            ("LOGMET_TOKEN", "t"),
            ("LOGMET_TLS", "maybe"),
        ]));
        assert!(matches!(bad_tls, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_parse_tls_mode() {
        assert_eq!(
            parse_tls_mode("verify").unwrap(),
            TlsVerification::SystemRoots {
                allow_insecure_fallback: false
            }
        );
        assert_eq!(parse_tls_mode("verify-or-insecure").unwrap(), TlsVerification::default());
    }
}

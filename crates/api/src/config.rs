use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;

/// A configuration variable that is present but unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: IpAddr,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<HeaderValue>,
    /// PostgreSQL URL. Unset disables snapshot persistence.
    pub database_url: Option<String>,
    /// Upper bound on a single WebSocket send, in milliseconds.
    pub send_timeout_ms: u64,
    /// Outbound queue length per connection.
    pub connection_queue_capacity: usize,
    /// Snapshots that may wait for the store before new ones are dropped.
    pub persistence_queue_capacity: usize,
    pub heartbeat_interval_secs: u64,
    /// How long shutdown waits for the persistence worker to flush.
    pub shutdown_timeout_secs: u64,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 8000,
            cors_origins: vec![HeaderValue::from_static("http://localhost:5173")],
            database_url: None,
            send_timeout_ms: 5_000,
            connection_queue_capacity: 64,
            persistence_queue_capacity: 1024,
            heartbeat_interval_secs: 30,
            shutdown_timeout_secs: 5,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                 |
    /// |------------------------------|-------------------------|
    /// | `HOST`                       | `0.0.0.0`               |
    /// | `PORT`                       | `8000`                  |
    /// | `CORS_ORIGINS`               | `http://localhost:5173` |
    /// | `DATABASE_URL`               | unset                   |
    /// | `SEND_TIMEOUT_MS`            | `5000`                  |
    /// | `CONNECTION_QUEUE_CAPACITY`  | `64`                    |
    /// | `PERSISTENCE_QUEUE_CAPACITY` | `1024`                  |
    /// | `HEARTBEAT_INTERVAL_SECS`    | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`      | `5`                     |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(raw) => parse_origins(&raw)?,
            None => defaults.cors_origins,
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        Ok(Self {
            host: parse_var(&lookup, "HOST", defaults.host, "an IP address")?,
            port: parse_var(&lookup, "PORT", defaults.port, "a valid u16")?,
            cors_origins,
            database_url,
            send_timeout_ms: parse_positive(
                &lookup,
                "SEND_TIMEOUT_MS",
                defaults.send_timeout_ms,
            )?,
            connection_queue_capacity: parse_positive(
                &lookup,
                "CONNECTION_QUEUE_CAPACITY",
                defaults.connection_queue_capacity,
            )?,
            persistence_queue_capacity: parse_positive(
                &lookup,
                "PERSISTENCE_QUEUE_CAPACITY",
                defaults.persistence_queue_capacity,
            )?,
            heartbeat_interval_secs: parse_positive(
                &lookup,
                "HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval_secs,
            )?,
            shutdown_timeout_secs: parse_var(
                &lookup,
                "SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout_secs,
                "a valid u64",
            )?,
            request_timeout_secs: parse_var(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
                "a valid u64",
            )?,
        })
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

fn parse_var<F, T>(
    lookup: &F,
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            value,
            expected,
        }),
    }
}

/// Like [`parse_var`], but zero is rejected: it would disable a timeout or
/// create a zero-length queue.
fn parse_positive<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Default + PartialEq + ToString,
{
    let value = parse_var(lookup, var, default, "a positive integer")?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            expected: "a positive integer",
        });
    }
    Ok(value)
}

fn parse_origins(raw: &str) -> Result<Vec<HeaderValue>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|_| ConfigError::Invalid {
                var: "CORS_ORIGINS",
                value: origin.to_string(),
                expected: "a comma-separated list of origins",
            })
        })
        .collect()
}

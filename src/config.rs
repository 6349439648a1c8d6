use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::DEFAULT_CURRENCY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'text' or 'json', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub upi_gateway_url: String,
    pub upi_callback_url: String,
    pub upi_webhook_secret: Option<String>,
    pub gateway_timeout: Duration,
    pub publish_timeout: Duration,
    pub event_stream_prefix: String,
    pub default_currency: String,
    /// `None` disables the background reconciliation poller.
    pub reconcile_interval: Option<Duration>,
    pub reconcile_stale_after: Duration,
    pub cors_allowed_origins: Option<String>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let reconcile_secs: u64 = parse_var(&lookup, "RECONCILE_INTERVAL_SECS", 0)?;

        Ok(Config {
            server_port: parse_var(&lookup, "SERVER_PORT", 8080)?,
            database_url: lookup("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: get("REDIS_URL", "redis://127.0.0.1:6379"),
            upi_gateway_url: get("UPI_GATEWAY_URL", "http://localhost:8090"),
            upi_callback_url: get(
                "UPI_CALLBACK_URL",
                "http://localhost:8080/webhook/upi-callback",
            ),
            upi_webhook_secret: lookup("UPI_WEBHOOK_SECRET").filter(|s| !s.is_empty()),
            gateway_timeout: Duration::from_secs(parse_var(&lookup, "GATEWAY_TIMEOUT_SECS", 30)?),
            publish_timeout: Duration::from_secs(parse_var(&lookup, "PUBLISH_TIMEOUT_SECS", 5)?),
            event_stream_prefix: get("EVENT_STREAM_PREFIX", ""),
            default_currency: get("DEFAULT_CURRENCY", DEFAULT_CURRENCY),
            reconcile_interval: (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs)),
            reconcile_stale_after: Duration::from_secs(parse_var(
                &lookup,
                "RECONCILE_STALE_AFTER_SECS",
                300,
            )?),
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS").filter(|s| !s.is_empty()),
            log_format: get("LOG_FORMAT", "text").parse()?,
        })
    }

    /// Checks the values that can only be wrong in shape, not reachability.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }
        if self.server_port == 0 {
            anyhow::bail!("SERVER_PORT must be greater than 0");
        }
        if self.gateway_timeout.is_zero() || self.publish_timeout.is_zero() {
            anyhow::bail!("GATEWAY_TIMEOUT_SECS and PUBLISH_TIMEOUT_SECS must be positive");
        }

        url::Url::parse(&self.upi_gateway_url).context("UPI_GATEWAY_URL is not a valid URL")?;
        url::Url::parse(&self.upi_callback_url).context("UPI_CALLBACK_URL is not a valid URL")?;
        url::Url::parse(&self.redis_url).context("REDIS_URL is not a valid URL")?;
        crate::validation::validate_currency(&self.default_currency)?;

        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        _ => Ok(default),
    }
}

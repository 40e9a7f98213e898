use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub messaging: MessagingConfig,
    pub sweep: SweepConfig,
    /// Actor-to-role assignments, e.g. `ana:reviewer,agency-014:agency`.
    pub roles_spec: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let roles_spec = env::var("APP_ROLES").unwrap_or_default();

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            messaging: MessagingConfig::from_env()?,
            sweep: SweepConfig::from_env()?,
            roles_spec,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Outbound messaging settings shared by the WhatsApp and email channels.
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    /// Country calling code prepended to recipient numbers that lack it.
    pub country_prefix: String,
    /// Suffix appended to the normalized number to form a channel address.
    pub address_domain: String,
    /// Base URL of the messaging provider API.
    pub api_url: String,
    /// Upper bound for a single provider call.
    pub timeout: Duration,
}

impl MessagingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let country_prefix = env::var("MSG_COUNTRY_PREFIX").unwrap_or_else(|_| "55".to_string());
        let address_domain = env::var("MSG_ADDRESS_DOMAIN").unwrap_or_else(|_| "@c.us".to_string());
        let api_url =
            env::var("MSG_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
        let timeout_secs = env::var("MSG_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        Ok(Self {
            country_prefix,
            address_domain,
            api_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            country_prefix: "55".to_string(),
            address_domain: "@c.us".to_string(),
            api_url: "http://127.0.0.1:8080".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Reminder sweep pacing and staleness thresholds.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Proposals pending longer than this are eligible for a reminder.
    pub staleness_hours: i64,
    /// Delay between consecutive reminder sends.
    pub pace: Duration,
}

impl SweepConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let staleness_hours = env::var("SWEEP_STALENESS_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidStaleness)?;
        let pace_ms = env::var("SWEEP_PACE_MS")
            .unwrap_or_else(|_| "1500".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidPace)?;

        Ok(Self {
            staleness_hours,
            pace: Duration::from_millis(pace_ms),
        })
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            staleness_hours: 24,
            pace: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
    InvalidStaleness,
    InvalidPace,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout => write!(f, "MSG_TIMEOUT_SECS must be a valid u64"),
            ConfigError::InvalidStaleness => {
                write!(f, "SWEEP_STALENESS_HOURS must be a valid i64")
            }
            ConfigError::InvalidPace => write!(f, "SWEEP_PACE_MS must be a valid u64"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

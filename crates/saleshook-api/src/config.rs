//! Configuration management for the saleshook service.

use std::{collections::BTreeMap, env, fmt, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use saleshook_core::storage::{
    engine::mask_password, Candidate, CandidateSource, PoolSettings,
};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.toml";

/// Keys whose environment values are taken verbatim. Figment would otherwise
/// read `API_KEY=123456` as an integer and `API_KEY=00123` as `123`.
const STRING_KEYS: &[&str] =
    &["database_url", "database_url_mysql", "api_key", "host", "rust_log"];

/// Complete service configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`config.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// Every value is resolved once at startup. `API_KEY` has no default and
/// loading fails without it.
///
/// # Example
///
/// ```no_run
/// use saleshook_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
///
/// println!("Server will bind to {}:{}", config.host, config.port);
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    // Storage candidates
    /// Primary connection URL, probed first. May be empty.
    ///
    /// Environment variable: `DATABASE_URL`
    #[serde(default, alias = "DATABASE_URL")]
    pub database_url: String,
    /// Secondary connection URL, probed if the primary is unreachable.
    /// Legacy driver-qualified schemes such as `mysql+pymysql://` are
    /// accepted. May be empty.
    ///
    /// Environment variable: `DATABASE_URL_MYSQL`
    #[serde(default, alias = "DATABASE_URL_MYSQL")]
    pub database_url_mysql: String,

    // Pool
    /// Maximum number of database connections in the pool.
    ///
    /// Environment variable: `DATABASE_MAX_CONNECTIONS`
    #[serde(default = "default_max_connections", alias = "DATABASE_MAX_CONNECTIONS")]
    pub database_max_connections: u32,
    /// Minimum number of connections to maintain in the pool.
    ///
    /// Environment variable: `DATABASE_MIN_CONNECTIONS`
    #[serde(default = "default_min_connections", alias = "DATABASE_MIN_CONNECTIONS")]
    pub database_min_connections: u32,
    /// Connect and liveness-probe timeout in seconds.
    ///
    /// Environment variable: `DATABASE_CONNECT_TIMEOUT`
    #[serde(default = "default_connect_timeout", alias = "DATABASE_CONNECT_TIMEOUT")]
    pub database_connect_timeout: u64,
    /// Database connection idle timeout in seconds.
    ///
    /// Environment variable: `DATABASE_IDLE_TIMEOUT`
    #[serde(default = "default_idle_timeout", alias = "DATABASE_IDLE_TIMEOUT")]
    pub database_idle_timeout: u64,
    /// Maximum lifetime of database connections in seconds.
    ///
    /// Environment variable: `DATABASE_MAX_LIFETIME`
    #[serde(default = "default_max_lifetime", alias = "DATABASE_MAX_LIFETIME")]
    pub database_max_lifetime: u64,

    // Auth
    /// Shared secret expected in `X-API-Key`. Never serialized.
    ///
    /// Environment variable: `API_KEY`
    #[serde(default, skip_serializing, alias = "API_KEY")]
    pub api_key: String,

    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout", alias = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    // Logging
    /// Log level configuration.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, config file, and environment variable
    /// overrides.
    ///
    /// String values are trimmed before validation.
    ///
    /// # Errors
    ///
    /// Returns error if a value has the wrong type, `API_KEY` is missing or
    /// blank, or a numeric setting is out of range.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("").ignore(STRING_KEYS))
            .merge(Serialized::defaults(raw_string_env()));

        let mut config: Self = figment.extract().context("Failed to load configuration")?;
        config.trim();
        config.validate()?;
        Ok(config)
    }

    /// Storage candidates in probe order: primary, then legacy.
    ///
    /// Blank entries are kept; the selector skips them.
    pub fn to_candidates(&self) -> Vec<Candidate> {
        vec![
            Candidate::new(CandidateSource::Primary, self.database_url.clone()),
            Candidate::new(CandidateSource::Legacy, self.database_url_mysql.clone()),
        ]
    }

    /// Convert to pool settings for the engine selector.
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.database_max_connections,
            min_connections: self.database_min_connections,
            connect_timeout: Duration::from_secs(self.database_connect_timeout),
            idle_timeout: Some(Duration::from_secs(self.database_idle_timeout)),
            max_lifetime: Some(Duration::from_secs(self.database_max_lifetime)),
        }
    }

    /// HTTP request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Parse server socket address from host and port configuration.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Get database URL with password masked for logging.
    pub fn database_url_masked(&self) -> String {
        mask_password(&self.database_url)
    }

    /// Get secondary database URL with password masked for logging.
    pub fn database_url_mysql_masked(&self) -> String {
        mask_password(&self.database_url_mysql)
    }

    fn trim(&mut self) {
        for value in [
            &mut self.database_url,
            &mut self.database_url_mysql,
            &mut self.api_key,
            &mut self.host,
            &mut self.rust_log,
        ] {
            let trimmed = value.trim();
            if trimmed.len() != value.len() {
                *value = trimmed.to_string();
            }
        }
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            anyhow::bail!("API_KEY must be set");
        }

        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.database_max_connections == 0 {
            anyhow::bail!("database max_connections must be greater than 0");
        }

        if self.database_min_connections > self.database_max_connections {
            anyhow::bail!("database min_connections cannot exceed max_connections");
        }

        if self.database_connect_timeout == 0 {
            anyhow::bail!("database connect_timeout must be greater than 0");
        }

        if self.request_timeout == 0 {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url_masked())
            .field("database_url_mysql", &self.database_url_mysql_masked())
            .field("database_max_connections", &self.database_max_connections)
            .field("database_min_connections", &self.database_min_connections)
            .field("database_connect_timeout", &self.database_connect_timeout)
            .field("database_idle_timeout", &self.database_idle_timeout)
            .field("database_max_lifetime", &self.database_max_lifetime)
            .field("api_key", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("request_timeout", &self.request_timeout)
            .field("rust_log", &self.rust_log)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            database_url_mysql: String::new(),
            database_max_connections: default_max_connections(),
            database_min_connections: default_min_connections(),
            database_connect_timeout: default_connect_timeout(),
            database_idle_timeout: default_idle_timeout(),
            database_max_lifetime: default_max_lifetime(),
            api_key: String::new(),
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            rust_log: default_log_level(),
        }
    }
}

/// String-typed keys as set in the environment, unparsed.
fn raw_string_env() -> BTreeMap<String, String> {
    STRING_KEYS
        .iter()
        .filter_map(|key| {
            env::var(key.to_ascii_uppercase()).ok().map(|value| ((*key).to_string(), value))
        })
        .collect()
}

// Pool of 5 plus 10 overflow connections.
fn default_max_connections() -> u32 {
    15
}

fn default_min_connections() -> u32 {
    0
}

fn default_connect_timeout() -> u64 {
    3
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_max_lifetime() -> u64 {
    1800
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

//! Startup storage-engine selection.
//!
//! Candidates are probed in order with a `SELECT 1` round trip. The first
//! live one is bound for the lifetime of the process. When none answers,
//! an in-memory SQLite database is bound instead so the service still starts.
//! There is no re-probing after startup.

use std::{fmt, time::Duration};

use sqlx::{any::AnyPoolOptions, AnyPool};
use tracing::{debug, info, warn};

use crate::error::Result;

/// URL of the ephemeral fallback database.
pub const EPHEMERAL_URL: &str = "sqlite::memory:";

/// SQL dialect of a bound engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// PostgreSQL.
    Postgres,
    /// MySQL or MariaDB.
    MySql,
    /// SQLite, file-backed or in memory.
    Sqlite,
}

impl Backend {
    /// Detects the backend from a normalized connection URL.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split_once(':').map(|(scheme, _)| scheme)?;
        match scheme {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" => Some(Self::MySql),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Short lowercase name used in logs and health responses.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a candidate URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateSource {
    /// `DATABASE_URL`.
    Primary,
    /// `DATABASE_URL_MYSQL`.
    Legacy,
    /// The in-memory fallback.
    Ephemeral,
}

impl CandidateSource {
    /// Short lowercase name used in logs and health responses.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Legacy => "legacy",
            Self::Ephemeral => "ephemeral",
        }
    }
}

/// A connection target to probe.
#[derive(Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Origin of the URL.
    pub source: CandidateSource,
    /// Connection URL as configured, possibly blank.
    pub url: String,
}

impl Candidate {
    /// Creates a candidate.
    pub fn new(source: CandidateSource, url: impl Into<String>) -> Self {
        Self { source, url: url.into() }
    }

    /// Returns true if the URL is empty after trimming.
    pub fn is_blank(&self) -> bool {
        self.url.trim().is_empty()
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("source", &self.source)
            .field("url", &mask_password(&self.url))
            .finish()
    }
}

/// Pool sizing and timeouts applied to every probed candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Upper bound on open connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// Bound on connecting and on the liveness probe.
    pub connect_timeout: Duration,
    /// Idle connections older than this are closed.
    pub idle_timeout: Option<Duration>,
    /// Connections older than this are recycled.
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 15,
            min_connections: 0,
            connect_timeout: Duration::from_secs(3),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

/// Result of probing one candidate.
///
/// Callers inspect it and move on; an unreachable candidate is never an
/// error.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The candidate answered the liveness query.
    Live(BoundEngine),
    /// The candidate could not be used.
    Unreachable(String),
}

/// The storage engine bound for the process lifetime.
#[derive(Clone)]
pub struct BoundEngine {
    pool: AnyPool,
    backend: Backend,
    source: CandidateSource,
    masked_url: String,
}

impl BoundEngine {
    /// Connection pool shared by all requests.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// SQL dialect of the bound engine.
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Which candidate was bound.
    pub fn source(&self) -> CandidateSource {
        self.source
    }

    /// Bound URL with any password masked.
    pub fn masked_url(&self) -> &str {
        &self.masked_url
    }

    /// Returns true if the in-memory fallback is bound.
    pub fn is_ephemeral(&self) -> bool {
        self.source == CandidateSource::Ephemeral
    }
}

impl fmt::Debug for BoundEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundEngine")
            .field("backend", &self.backend)
            .field("source", &self.source)
            .field("url", &self.masked_url)
            .finish_non_exhaustive()
    }
}

/// Probes candidates in order and binds the first live one.
///
/// # Example
///
/// ```no_run
/// use saleshook_core::storage::engine::{Candidate, CandidateSource, EngineSelector, PoolSettings};
///
/// # async fn run() -> saleshook_core::Result<()> {
/// let selector = EngineSelector::new(
///     vec![Candidate::new(CandidateSource::Primary, "postgres://localhost/sales")],
///     PoolSettings::default(),
/// );
/// let engine = selector.select().await?;
/// println!("bound {}", engine.backend());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EngineSelector {
    candidates: Vec<Candidate>,
    settings: PoolSettings,
}

impl EngineSelector {
    /// Creates a selector over the given candidates, probed in order.
    pub fn new(candidates: Vec<Candidate>, settings: PoolSettings) -> Self {
        sqlx::any::install_default_drivers();
        Self { candidates, settings }
    }

    /// Candidates in probe order.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Binds the first live candidate, or the ephemeral fallback.
    ///
    /// Blank candidates are skipped without probing. Probe failures are
    /// logged and never abort selection.
    ///
    /// # Errors
    ///
    /// Only fails if the constant fallback URL cannot be parsed by the
    /// SQLite driver.
    pub async fn select(self) -> Result<BoundEngine> {
        for candidate in &self.candidates {
            if candidate.is_blank() {
                debug!(source = candidate.source.as_str(), "skipping blank storage candidate");
                continue;
            }

            match self.probe(candidate).await {
                ProbeOutcome::Live(engine) => {
                    info!(
                        source = engine.source.as_str(),
                        backend = engine.backend.as_str(),
                        url = %engine.masked_url,
                        "bound storage engine"
                    );
                    return Ok(engine);
                },
                ProbeOutcome::Unreachable(reason) => {
                    warn!(
                        source = candidate.source.as_str(),
                        url = %mask_password(&candidate.url),
                        reason = %reason,
                        "storage candidate unreachable"
                    );
                },
            }
        }

        warn!("no storage candidate reachable, falling back to ephemeral in-memory database");
        Self::ephemeral()
    }

    /// Probes a single candidate.
    ///
    /// Builds a pool with the configured settings and runs `SELECT 1`
    /// within the connect timeout. On failure the pool is closed.
    pub async fn probe(&self, candidate: &Candidate) -> ProbeOutcome {
        let url = normalize_url(&candidate.url);
        let Some(backend) = Backend::from_url(&url) else {
            return ProbeOutcome::Unreachable(format!(
                "unsupported database scheme in {}",
                mask_password(&url)
            ));
        };

        let options = if is_in_memory_sqlite(&url) {
            single_connection_options()
        } else {
            self.pool_options()
        };

        let pool = match options.connect_lazy(&url) {
            Ok(pool) => pool,
            Err(e) => return ProbeOutcome::Unreachable(e.to_string()),
        };

        let check = sqlx::query("SELECT 1").execute(&pool);
        let failure = match tokio::time::timeout(self.settings.connect_timeout, check).await {
            Ok(Ok(_)) => {
                return ProbeOutcome::Live(BoundEngine {
                    pool,
                    backend,
                    source: candidate.source,
                    masked_url: mask_password(&url),
                });
            },
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("no answer within {:?}", self.settings.connect_timeout),
        };

        pool.close().await;
        ProbeOutcome::Unreachable(failure)
    }

    /// Binds a fresh in-memory SQLite database.
    ///
    /// Every connection to `sqlite::memory:` opens its own database, so the
    /// pool holds exactly one connection that is never recycled.
    ///
    /// # Errors
    ///
    /// Fails only if the driver rejects the constant URL.
    pub fn ephemeral() -> Result<BoundEngine> {
        sqlx::any::install_default_drivers();
        let pool = single_connection_options().connect_lazy(EPHEMERAL_URL)?;

        Ok(BoundEngine {
            pool,
            backend: Backend::Sqlite,
            source: CandidateSource::Ephemeral,
            masked_url: EPHEMERAL_URL.to_string(),
        })
    }

    fn pool_options(&self) -> AnyPoolOptions {
        AnyPoolOptions::new()
            .max_connections(self.settings.max_connections)
            .min_connections(self.settings.min_connections)
            .acquire_timeout(self.settings.connect_timeout)
            .idle_timeout(self.settings.idle_timeout)
            .max_lifetime(self.settings.max_lifetime)
            .test_before_acquire(true)
    }
}

fn single_connection_options() -> AnyPoolOptions {
    AnyPoolOptions::new()
        .max_connections(1)
        .min_connections(0)
        .idle_timeout(None)
        .max_lifetime(None)
        .test_before_acquire(true)
}

fn is_in_memory_sqlite(url: &str) -> bool {
    url.starts_with("sqlite:") && (url.contains(":memory:") || url.contains("mode=memory"))
}

/// Rewrites legacy driver-qualified schemes to the ones sqlx understands.
///
/// `mysql+pymysql://`, `mysql+mysqldb://` and `mariadb://` become
/// `mysql://`; `postgresql+psycopg2://` and similar become `postgres://`;
/// `sqlite:///:memory:` becomes `sqlite::memory:`. Surrounding whitespace is
/// removed.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();

    if matches!(url, "sqlite:///:memory:" | "sqlite://:memory:" | "sqlite:memory:") {
        return EPHEMERAL_URL.to_string();
    }

    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };

    let dialect = scheme.split_once('+').map_or(scheme, |(dialect, _driver)| dialect);
    let canonical = match dialect.to_ascii_lowercase().as_str() {
        "mysql" | "mariadb" => "mysql",
        "postgres" | "postgresql" => "postgres",
        "sqlite" => "sqlite",
        _ => return url.to_string(),
    };

    format!("{canonical}://{rest}")
}

/// Replaces the password in a connection URL with `***`.
pub fn mask_password(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };

    match userinfo.split_once(':') {
        Some((user, _password)) => format!("{scheme}://{user}:***@{host}"),
        None => url.to_string(),
    }
}

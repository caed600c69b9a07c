use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BusinessUnit, Month};
use crate::goals::{GoalBook, GoalSet};
use crate::service::FetchPolicy;

const MAX_FRESHNESS_SECS: u64 = 86_400;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub goals: GoalBook,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub freshness_secs: u64,
    pub fetch_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub freshness_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://goalboard.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            cache: CacheConfig { freshness_secs: 300, fetch_retries: 2, retry_backoff_ms: 200 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            goals: GoalBook::new(),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl CacheConfig {
    pub fn freshness(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.freshness_secs.min(MAX_FRESHNESS_SECS) as i64)
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            retries: self.fetch_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("goalboard.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(freshness_secs) = cache.freshness_secs {
                self.cache.freshness_secs = freshness_secs;
            }
            if let Some(fetch_retries) = cache.fetch_retries {
                self.cache.fetch_retries = fetch_retries;
            }
            if let Some(retry_backoff_ms) = cache.retry_backoff_ms {
                self.cache.retry_backoff_ms = retry_backoff_ms;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(goals) = patch.goals {
            self.goals = goal_book_from_patch(goals)?;
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("GOALBOARD_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("GOALBOARD_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("GOALBOARD_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("GOALBOARD_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("GOALBOARD_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GOALBOARD_CACHE_FRESHNESS_SECS") {
            self.cache.freshness_secs = parse_u64("GOALBOARD_CACHE_FRESHNESS_SECS", &value)?;
        }
        if let Some(value) = read_env("GOALBOARD_CACHE_FETCH_RETRIES") {
            self.cache.fetch_retries = parse_u32("GOALBOARD_CACHE_FETCH_RETRIES", &value)?;
        }
        if let Some(value) = read_env("GOALBOARD_CACHE_RETRY_BACKOFF_MS") {
            self.cache.retry_backoff_ms = parse_u64("GOALBOARD_CACHE_RETRY_BACKOFF_MS", &value)?;
        }

        let log_level =
            read_env("GOALBOARD_LOGGING_LEVEL").or_else(|| read_env("GOALBOARD_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GOALBOARD_LOGGING_FORMAT").or_else(|| read_env("GOALBOARD_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(freshness_secs) = overrides.freshness_secs {
            self.cache.freshness_secs = freshness_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_cache(&self.cache)?;
        validate_logging(&self.logging)?;
        validate_goals(&self.goals)?;
        Ok(())
    }
}

/// First of `goalboard.toml` or `config/goalboard.toml` that exists.
pub fn default_config_path() -> Option<PathBuf> {
    resolve_config_path(None)
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("goalboard.toml"), PathBuf::from("config/goalboard.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn goal_book_from_patch(patch: BTreeMap<String, GoalPatch>) -> Result<GoalBook, ConfigError> {
    let mut book = GoalBook::new();

    for (bu_key, goal) in patch {
        let bu = bu_key.parse::<BusinessUnit>().map_err(|_| {
            ConfigError::Validation(format!(
                "goals.{bu_key} is not a known business unit (expected one of {})",
                BusinessUnit::ALL.map(BusinessUnit::as_str).join("|")
            ))
        })?;

        let mut goals = GoalSet::annual(goal.annual.unwrap_or(Decimal::ZERO));
        for (month_key, value) in goal.monthly.unwrap_or_default() {
            let month = month_key.parse::<Month>().map_err(|_| {
                ConfigError::Validation(format!(
                    "goals.{bu_key}.monthly.{month_key} is not a known month"
                ))
            })?;
            goals = goals.with_month(month, value);
        }
        book.set(bu, goals);
    }

    Ok(book)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    if cache.freshness_secs == 0 || cache.freshness_secs > MAX_FRESHNESS_SECS {
        return Err(ConfigError::Validation(format!(
            "cache.freshness_secs must be in range 1..={MAX_FRESHNESS_SECS}"
        )));
    }

    if cache.fetch_retries > 5 {
        return Err(ConfigError::Validation(
            "cache.fetch_retries must be in range 0..=5".to_string(),
        ));
    }

    if cache.retry_backoff_ms > 60_000 {
        return Err(ConfigError::Validation(
            "cache.retry_backoff_ms must not exceed 60000".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_goals(goals: &GoalBook) -> Result<(), ConfigError> {
    for bu in BusinessUnit::ALL {
        let Some(set) = goals.get(bu) else {
            continue;
        };
        if set.annual < Decimal::ZERO {
            return Err(ConfigError::Validation(format!(
                "goals.{bu}.annual must not be negative"
            )));
        }
        if let Some((month, _)) = set.monthly.iter().find(|(_, value)| **value < Decimal::ZERO) {
            return Err(ConfigError::Validation(format!(
                "goals.{bu}.monthly.{month} must not be negative"
            )));
        }
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    cache: Option<CachePatch>,
    logging: Option<LoggingPatch>,
    goals: Option<BTreeMap<String, GoalPatch>>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    freshness_secs: Option<u64>,
    fetch_retries: Option<u32>,
    retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct GoalPatch {
    annual: Option<Decimal>,
    monthly: Option<BTreeMap<String, Decimal>>,
}

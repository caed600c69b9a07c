use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use goalboard_core::config::{default_config_path, AppConfig, LogFormat};
use goalboard_core::BusinessUnit;
use toml::Value;

use crate::commands::{load_config, CommandResult};

struct ConfigField {
    key_path: String,
    value: String,
    env_keys: &'static [&'static str],
}

impl ConfigField {
    fn new(key_path: &str, value: impl ToString, env_keys: &'static [&'static str]) -> Self {
        Self { key_path: key_path.to_string(), value: value.to_string(), env_keys }
    }
}

fn effective_fields(config: &AppConfig) -> Vec<ConfigField> {
    let mut fields = vec![
        ConfigField::new("database.url", &config.database.url, &["GOALBOARD_DATABASE_URL"]),
        ConfigField::new(
            "database.max_connections",
            config.database.max_connections,
            &["GOALBOARD_DATABASE_MAX_CONNECTIONS"],
        ),
        ConfigField::new(
            "database.timeout_secs",
            config.database.timeout_secs,
            &["GOALBOARD_DATABASE_TIMEOUT_SECS"],
        ),
        ConfigField::new(
            "cache.freshness_secs",
            config.cache.freshness_secs,
            &["GOALBOARD_CACHE_FRESHNESS_SECS"],
        ),
        ConfigField::new(
            "cache.fetch_retries",
            config.cache.fetch_retries,
            &["GOALBOARD_CACHE_FETCH_RETRIES"],
        ),
        ConfigField::new(
            "cache.retry_backoff_ms",
            config.cache.retry_backoff_ms,
            &["GOALBOARD_CACHE_RETRY_BACKOFF_MS"],
        ),
        ConfigField::new(
            "logging.level",
            &config.logging.level,
            &["GOALBOARD_LOGGING_LEVEL", "GOALBOARD_LOG_LEVEL"],
        ),
        ConfigField::new(
            "logging.format",
            log_format_name(config.logging.format),
            &["GOALBOARD_LOGGING_FORMAT", "GOALBOARD_LOG_FORMAT"],
        ),
    ];

    for bu in BusinessUnit::ALL {
        let key_path = format!("goals.{}.annual", bu.as_str());
        fields.push(ConfigField::new(&key_path, config.goals.annual_for(bu), &[]));
    }

    fields
}

fn log_format_name(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    }
}

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = default_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            &field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(&field.key_path, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

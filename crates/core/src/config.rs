use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::AuthorizationPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub policy: AuthorizationPolicy,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
    /// Required for platform-admin revocations over HTTP; unset disables them.
    pub admin_token: Option<SecretString>,
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
    pub admin_token: Option<String>,
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
                url: "sqlite://listgate.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
                admin_token: None,
            },
            policy: AuthorizationPolicy::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("listgate.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
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

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(admin_token_value) = server.admin_token {
                self.server.admin_token = Some(admin_token_value.into());
            }
        }

        if let Some(policy) = patch.policy {
            if let Some(max_approved_per_seller) = policy.max_approved_per_seller {
                self.policy.max_approved_per_seller = max_approved_per_seller;
            }
            if let Some(reject_cooldown_days) = policy.reject_cooldown_days {
                self.policy.reject_cooldown_days = reject_cooldown_days;
            }
            if let Some(revoke_cooldown_days) = policy.revoke_cooldown_days {
                self.policy.revoke_cooldown_days = revoke_cooldown_days;
            }
            if let Some(cooldown_min_days) = policy.cooldown_min_days {
                self.policy.cooldown_min_days = cooldown_min_days;
            }
            if let Some(cooldown_max_days) = policy.cooldown_max_days {
                self.policy.cooldown_max_days = cooldown_max_days;
            }
            if let Some(min_reason_chars) = policy.min_reason_chars {
                self.policy.min_reason_chars = min_reason_chars;
            }
            if let Some(check_slots_on_request) = policy.check_slots_on_request {
                self.policy.check_slots_on_request = check_slots_on_request;
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
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LISTGATE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LISTGATE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("LISTGATE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LISTGATE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("LISTGATE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LISTGATE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LISTGATE_SERVER_PORT") {
            self.server.port = parse_u16("LISTGATE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("LISTGATE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("LISTGATE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("LISTGATE_SERVER_ADMIN_TOKEN") {
            self.server.admin_token = Some(value.into());
        }

        if let Some(value) = read_env("LISTGATE_POLICY_MAX_APPROVED_PER_SELLER") {
            self.policy.max_approved_per_seller =
                parse_u32("LISTGATE_POLICY_MAX_APPROVED_PER_SELLER", &value)?;
        }
        if let Some(value) = read_env("LISTGATE_POLICY_REJECT_COOLDOWN_DAYS") {
            self.policy.reject_cooldown_days =
                parse_u16("LISTGATE_POLICY_REJECT_COOLDOWN_DAYS", &value)?;
        }
        if let Some(value) = read_env("LISTGATE_POLICY_REVOKE_COOLDOWN_DAYS") {
            self.policy.revoke_cooldown_days =
                parse_u16("LISTGATE_POLICY_REVOKE_COOLDOWN_DAYS", &value)?;
        }
        if let Some(value) = read_env("LISTGATE_POLICY_COOLDOWN_MIN_DAYS") {
            self.policy.cooldown_min_days =
                parse_u16("LISTGATE_POLICY_COOLDOWN_MIN_DAYS", &value)?;
        }
        if let Some(value) = read_env("LISTGATE_POLICY_COOLDOWN_MAX_DAYS") {
            self.policy.cooldown_max_days =
                parse_u16("LISTGATE_POLICY_COOLDOWN_MAX_DAYS", &value)?;
        }
        if let Some(value) = read_env("LISTGATE_POLICY_MIN_REASON_CHARS") {
            self.policy.min_reason_chars =
                parse_usize("LISTGATE_POLICY_MIN_REASON_CHARS", &value)?;
        }
        if let Some(value) = read_env("LISTGATE_POLICY_CHECK_SLOTS_ON_REQUEST") {
            self.policy.check_slots_on_request =
                parse_bool("LISTGATE_POLICY_CHECK_SLOTS_ON_REQUEST", &value)?;
        }

        let log_level =
            read_env("LISTGATE_LOGGING_LEVEL").or_else(|| read_env("LISTGATE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LISTGATE_LOGGING_FORMAT").or_else(|| read_env("LISTGATE_LOG_FORMAT"));
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
        if let Some(admin_token) = overrides.admin_token {
            self.server.admin_token = Some(admin_token.into());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_policy(&self.policy)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("listgate.toml"), PathBuf::from("config/listgate.toml")]
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

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    if let Some(token) = &server.admin_token {
        if token.expose_secret().trim().len() < 16 {
            return Err(ConfigError::Validation(
                "server.admin_token must be at least 16 characters when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_policy(policy: &AuthorizationPolicy) -> Result<(), ConfigError> {
    if policy.max_approved_per_seller == 0 {
        return Err(ConfigError::Validation(
            "policy.max_approved_per_seller must be greater than zero".to_string(),
        ));
    }

    if policy.cooldown_min_days == 0
        || policy.cooldown_max_days > 365
        || policy.cooldown_min_days > policy.cooldown_max_days
    {
        return Err(ConfigError::Validation(
            "policy cooldown bounds must satisfy 1 <= cooldown_min_days <= cooldown_max_days <= 365"
                .to_string(),
        ));
    }

    for (key, days) in [
        ("policy.reject_cooldown_days", policy.reject_cooldown_days),
        ("policy.revoke_cooldown_days", policy.revoke_cooldown_days),
    ] {
        if days < policy.cooldown_min_days || days > policy.cooldown_max_days {
            return Err(ConfigError::Validation(format!(
                "{key} must be within the configured cooldown bounds"
            )));
        }
    }

    if policy.min_reason_chars == 0 || policy.min_reason_chars > 500 {
        return Err(ConfigError::Validation(
            "policy.min_reason_chars must be in range 1..=500".to_string(),
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

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
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

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    policy: Option<PolicyPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    admin_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PolicyPatch {
    max_approved_per_seller: Option<u32>,
    reject_cooldown_days: Option<u16>,
    revoke_cooldown_days: Option<u16>,
    cooldown_min_days: Option<u16>,
    cooldown_max_days: Option<u16>,
    min_reason_chars: Option<usize>,
    check_slots_on_request: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use listgate_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let mut line = |key_path: &str, value: String, env_key: &str| {
        lines.push(render_line(
            key_path,
            &value,
            field_source(
                key_path,
                Some(env_key),
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        ));
    };

    line("database.url", config.database.url.clone(), "LISTGATE_DATABASE_URL");
    line(
        "database.max_connections",
        config.database.max_connections.to_string(),
        "LISTGATE_DATABASE_MAX_CONNECTIONS",
    );
    line(
        "database.timeout_secs",
        config.database.timeout_secs.to_string(),
        "LISTGATE_DATABASE_TIMEOUT_SECS",
    );

    line("server.bind_address", config.server.bind_address.clone(), "LISTGATE_SERVER_BIND_ADDRESS");
    line("server.port", config.server.port.to_string(), "LISTGATE_SERVER_PORT");
    let admin_token =
        if config.server.admin_token.is_some() { "<redacted>" } else { "<unset>" }.to_string();
    line("server.admin_token", admin_token, "LISTGATE_SERVER_ADMIN_TOKEN");

    line(
        "policy.max_approved_per_seller",
        config.policy.max_approved_per_seller.to_string(),
        "LISTGATE_POLICY_MAX_APPROVED_PER_SELLER",
    );
    line(
        "policy.reject_cooldown_days",
        config.policy.reject_cooldown_days.to_string(),
        "LISTGATE_POLICY_REJECT_COOLDOWN_DAYS",
    );
    line(
        "policy.revoke_cooldown_days",
        config.policy.revoke_cooldown_days.to_string(),
        "LISTGATE_POLICY_REVOKE_COOLDOWN_DAYS",
    );
    line(
        "policy.check_slots_on_request",
        config.policy.check_slots_on_request.to_string(),
        "LISTGATE_POLICY_CHECK_SLOTS_ON_REQUEST",
    );

    line("logging.level", config.logging.level.clone(), "LISTGATE_LOGGING_LEVEL");
    line("logging.format", format!("{:?}", config.logging.format), "LISTGATE_LOGGING_FORMAT");

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("listgate.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/listgate.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
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

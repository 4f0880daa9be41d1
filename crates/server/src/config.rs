use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

pub const DEV_SESSION_SECRET: &str = "dev-session-secret";
const MEMORY_URL: &str = "sqlite::memory:";

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub session_secret: String,
    pub session_ttl_seconds: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/kanban.db".into(),
            session_secret: DEV_SESSION_SECRET.into(),
            session_ttl_seconds: 7 * 24 * 3600,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        apply_file_overrides(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Ok(v) = std::env::var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Ok(v) = std::env::var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Ok(v) = std::env::var("APP__SESSION_SECRET") {
        settings.session_secret = v;
    }

    if let Ok(v) = std::env::var("APP__SESSION_TTL_SECONDS") {
        if let Ok(parsed) = v.parse::<i64>() {
            settings.session_ttl_seconds = parsed;
        }
    }

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("bind_addr").and_then(toml::Value::as_str) {
        settings.server_bind = v.to_string();
    }
    if let Some(v) = file_cfg.get("database_url").and_then(toml::Value::as_str) {
        settings.database_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("session_secret").and_then(toml::Value::as_str) {
        settings.session_secret = v.to_string();
    }
    if let Some(v) = file_cfg
        .get("session_ttl_seconds")
        .and_then(toml::Value::as_integer)
    {
        settings.session_ttl_seconds = v;
    }
}

/// Normalizes the configured url and makes sure a file database can be created.
pub fn prepare_database_url(configured: &str) -> anyhow::Result<String> {
    let url = normalize_database_url(configured);
    if let Some(dir) = sqlite_file_path(&url).as_deref().and_then(Path::parent) {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).with_context(|| {
                format!("creating database directory {} for {url}", dir.display())
            })?;
        }
    }
    Ok(url)
}

/// Bare paths and `sqlite:path` become `sqlite://path`; anything with a scheme
/// is passed through.
fn normalize_database_url(configured: &str) -> String {
    let configured = configured.trim();
    if configured.is_empty() {
        return Settings::default().database_url;
    }
    if configured.starts_with(MEMORY_URL) || configured.contains("://") {
        return configured.to_string();
    }
    let path = configured.strip_prefix("sqlite:").unwrap_or(configured);
    format!("sqlite://{}", path.replace('\\', "/"))
}

fn sqlite_file_path(url: &str) -> Option<PathBuf> {
    if url.starts_with(MEMORY_URL) {
        return None;
    }
    let rest = url.strip_prefix("sqlite://")?;
    let file = rest.split_once('?').map_or(rest, |(file, _)| file);
    (!file.is_empty()).then(|| PathBuf::from(file))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

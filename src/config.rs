use crate::api::routes::DEFAULT_BASE_URL;
use crate::auth::{SessionContext, Tokens, UserProfile};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const APP_DIR: &str = "lecture-player";
const CONFIG_FILE: &str = "config.json";
const PROGRESS_FILE: &str = "progress.json";
const LOG_DIR: &str = "logs";
const TOKEN_XOR_KEY: &[u8] = b"lecture-player-local-key-v1";

pub const HOME_ENV: &str = "LECTURE_PLAYER_HOME";
pub const API_URL_ENV: &str = "LECTURE_PLAYER_API_URL";
pub const LOG_ENV: &str = "LECTURE_PLAYER_LOG";

pub const DEFAULT_LOG_FILTER: &str = "info";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CATALOG_MAX_RETRIES: u8 = 2;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 250;
pub const DEFAULT_FLUSH_FAILURE_THRESHOLD: u8 = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No config directory available on this platform; set LECTURE_PLAYER_HOME")]
    NoConfigDir,

    #[error("Failed to create {path}: {message}")]
    CreateDir { path: String, message: String },

    #[error("Failed to read config: {0}")]
    Read(String),

    #[error("Failed to save config: {0}")]
    Write(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub catalog_max_retries: u8,
    pub tick_interval_ms: u64,
    pub flush_failure_threshold: u8,
    pub log_filter: String,
    pub log_to_file: bool,
    pub session: Option<StoredSession>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            catalog_max_retries: DEFAULT_CATALOG_MAX_RETRIES,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            flush_failure_threshold: DEFAULT_FLUSH_FAILURE_THRESHOLD,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_to_file: false,
            session: None,
        }
    }
}

/// Login kept between runs. Tokens are obfuscated, never written in clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub user: UserProfile,
    pub access_token_obfuscated: String,
    #[serde(default)]
    pub refresh_token_obfuscated: Option<String>,
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Copy with `LECTURE_PLAYER_API_URL` / `LECTURE_PLAYER_LOG` applied. The
    /// overrides are never written back to disk.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(API_URL_ENV).ok(),
            std::env::var(LOG_ENV).ok(),
        )
    }

    pub fn with_overrides(mut self, api_base_url: Option<String>, log_filter: Option<String>) -> Self {
        if let Some(url) = api_base_url.filter(|value| !value.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(filter) = log_filter.filter(|value| !value.trim().is_empty()) {
            self.log_filter = filter;
        }
        normalize_config(&mut self);
        self
    }
}

/// `$LECTURE_PLAYER_HOME`, else `<platform config dir>/lecture-player`.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(home) = home_override() {
        return Ok(home);
    }
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or(ConfigError::NoConfigDir)
}

/// `$LECTURE_PLAYER_HOME`, else `<platform data dir>/lecture-player`.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    if let Some(home) = home_override() {
        return Ok(home);
    }
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or(ConfigError::NoConfigDir)
}

pub fn progress_path(data_dir: &Path) -> PathBuf {
    data_dir.join(PROGRESS_FILE)
}

pub fn log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(LOG_DIR)
}

pub fn load_or_create(dir: &Path) -> Result<AppConfig, ConfigError> {
    let path = config_path(dir)?;
    if !path.exists() {
        let config = AppConfig::default();
        save_raw(&path, &config)?;
        tracing::info!("Created default config at {}", path.display());
        return Ok(config);
    }

    let raw = fs::read_to_string(&path).map_err(|e| ConfigError::Read(e.to_string()))?;
    match serde_json::from_str::<AppConfig>(&raw) {
        Ok(mut config) => {
            normalize_config(&mut config);
            Ok(config)
        }
        Err(e) => {
            tracing::warn!("Config at {} is corrupt ({}), resetting", path.display(), e);
            let backup = path.with_extension("json.bak");
            let _ = fs::copy(&path, backup);
            let config = AppConfig::default();
            save_raw(&path, &config)?;
            Ok(config)
        }
    }
}

pub fn save(dir: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let path = config_path(dir)?;
    save_raw(&path, config)
}

pub fn remember_session(config: &mut AppConfig, user: &UserProfile, tokens: &Tokens) {
    config.session = Some(StoredSession {
        user: user.clone(),
        access_token_obfuscated: obfuscate_token(&tokens.access_token),
        refresh_token_obfuscated: tokens.refresh_token.as_deref().map(obfuscate_token),
    });
}

pub fn forget_session(config: &mut AppConfig) {
    config.session = None;
}

/// Rebuild the signed-in context. Anything undecodable means signed out.
pub fn decode_session(config: &AppConfig) -> SessionContext {
    let Some(stored) = config.session.as_ref() else {
        return SessionContext::anonymous();
    };

    let Some(access_token) = deobfuscate_token(&stored.access_token_obfuscated) else {
        tracing::warn!("Stored session is unreadable, signing out");
        return SessionContext::anonymous();
    };
    let refresh_token = stored
        .refresh_token_obfuscated
        .as_deref()
        .and_then(deobfuscate_token);

    SessionContext::authenticated(
        stored.user.clone(),
        Tokens {
            access_token,
            refresh_token,
        },
    )
}

pub fn mask_token(token: &str) -> String {
    if token.len() <= 10 {
        return "******".to_string();
    }

    let prefix = &token[..6];
    let suffix = &token[token.len().saturating_sub(4)..];
    format!("{}********{}", prefix, suffix)
}

fn home_override() -> Option<PathBuf> {
    std::env::var_os(HOME_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn config_path(dir: &Path) -> Result<PathBuf, ConfigError> {
    fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(dir.join(CONFIG_FILE))
}

fn save_raw(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let json =
        serde_json::to_string_pretty(config).map_err(|e| ConfigError::Write(e.to_string()))?;
    fs::write(path, json).map_err(|e| ConfigError::Write(e.to_string()))
}

fn normalize_config(config: &mut AppConfig) {
    let trimmed = config.api_base_url.trim();
    config.api_base_url = if trimmed.is_empty() {
        DEFAULT_BASE_URL.to_string()
    } else if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    if config.log_filter.trim().is_empty() {
        config.log_filter = DEFAULT_LOG_FILTER.to_string();
    }
    if config.request_timeout_secs == 0 {
        config.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
    }
    if config.tick_interval_ms == 0 {
        config.tick_interval_ms = DEFAULT_TICK_INTERVAL_MS;
    }
    if config.flush_failure_threshold == 0 {
        config.flush_failure_threshold = DEFAULT_FLUSH_FAILURE_THRESHOLD;
    }
}

fn obfuscate_token(token: &str) -> String {
    let mut bytes = token.as_bytes().to_vec();
    for (idx, byte) in bytes.iter_mut().enumerate() {
        *byte ^= TOKEN_XOR_KEY[idx % TOKEN_XOR_KEY.len()];
    }
    BASE64_STANDARD.encode(bytes)
}

fn deobfuscate_token(obfuscated: &str) -> Option<String> {
    let mut bytes = BASE64_STANDARD.decode(obfuscated).ok()?;
    for (idx, byte) in bytes.iter_mut().enumerate() {
        *byte ^= TOKEN_XOR_KEY[idx % TOKEN_XOR_KEY.len()];
    }
    String::from_utf8(bytes).ok()
}

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::session::Session;

pub const BACKEND_ENV_VAR: &str = "FIME_BACKEND";
pub const BACKEND_URL_ENV_VAR: &str = "FIME_BACKEND_URL";
pub const ANON_KEY_ENV_VAR: &str = "FIME_ANON_KEY";
pub const ACCESS_TOKEN_ENV_VAR: &str = "FIME_ACCESS_TOKEN";
pub const USER_ID_ENV_VAR: &str = "FIME_USER_ID";
pub const USER_EMAIL_ENV_VAR: &str = "FIME_USER_EMAIL";
pub const IMAGE_TIMEOUT_ENV_VAR: &str = "FIME_IMAGE_TIMEOUT_MS";
pub const REQUEST_TIMEOUT_ENV_VAR: &str = "FIME_REQUEST_TIMEOUT_SECS";
pub const HANDOFF_DELAY_ENV_VAR: &str = "FIME_HANDOFF_DELAY_MS";
pub const FAVORITES_CACHE_ENV_VAR: &str = "FIME_FAVORITES_CACHE";

const DEFAULT_IMAGE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_HANDOFF_DELAY_MS: u64 = 1_500;
const DEFAULT_FAVORITES_CACHE: &str = ".fime/favorites.json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown backend '{0}', expected 'remote' or 'fake'")]
    UnknownBackend(String),
    #[error("Invalid value for {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Remote,
    Fake,
}

/// Bounds applied to the cooking time the wizard accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationConfig {
    pub min_minutes: u32,
    pub max_minutes: u32,
    pub default_minutes: u32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            min_minutes: 5,
            max_minutes: 180,
            default_minutes: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendMode,
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    pub session: Option<Session>,
    pub request_timeout: Duration,
    pub image_timeout: Duration,
    pub handoff_delay: Duration,
    pub favorites_cache: PathBuf,
    pub conversation: ConversationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendMode::Remote,
            backend_url: None,
            anon_key: None,
            session: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            image_timeout: Duration::from_millis(DEFAULT_IMAGE_TIMEOUT_MS),
            handoff_delay: Duration::from_millis(DEFAULT_HANDOFF_DELAY_MS),
            favorites_cache: PathBuf::from(DEFAULT_FAVORITES_CACHE),
            conversation: ConversationConfig::default(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn number_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match non_empty_var(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var: name, value }),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Reads configuration from the environment after loading any `.env`
    /// file. Backend URL and key are only checked when a client is built.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let backend = match non_empty_var(BACKEND_ENV_VAR).as_deref() {
            None | Some("remote") => BackendMode::Remote,
            Some("fake") => BackendMode::Fake,
            Some(other) => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let session = match (non_empty_var(ACCESS_TOKEN_ENV_VAR), non_empty_var(USER_ID_ENV_VAR)) {
            (Some(access_token), Some(user_id)) => Some(Session {
                access_token,
                user_id,
                email: non_empty_var(USER_EMAIL_ENV_VAR),
            }),
            _ => None,
        };

        Ok(Self {
            backend,
            backend_url: non_empty_var(BACKEND_URL_ENV_VAR)
                .map(|url| url.trim_end_matches('/').to_string()),
            anon_key: non_empty_var(ANON_KEY_ENV_VAR),
            session,
            request_timeout: Duration::from_secs(number_var(
                REQUEST_TIMEOUT_ENV_VAR,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            image_timeout: Duration::from_millis(number_var(
                IMAGE_TIMEOUT_ENV_VAR,
                DEFAULT_IMAGE_TIMEOUT_MS,
            )?),
            handoff_delay: Duration::from_millis(number_var(
                HANDOFF_DELAY_ENV_VAR,
                DEFAULT_HANDOFF_DELAY_MS,
            )?),
            favorites_cache: non_empty_var(FAVORITES_CACHE_ENV_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FAVORITES_CACHE)),
            conversation: ConversationConfig::default(),
        })
    }
}

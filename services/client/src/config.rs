use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// Raised when an environment variable holds an unusable value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is invalid: {1}")]
    InvalidValue(String, String),
}

pub const MAX_QUESTION_COUNT: u32 = 20;

/// Client settings, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub auth_url: String,
    pub cache_dir: PathBuf,
    pub question_count: u32,
    pub request_timeout: Duration,
    pub log_level: Level,
}

fn parse_base_url(var: &str, value: &str) -> Result<String, ConfigError> {
    let value = value.trim().trim_end_matches('/');
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(value.to_string())
    } else {
        Err(ConfigError::InvalidValue(
            var.to_string(),
            format!("'{}' must start with http:// or https://", value),
        ))
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mockprep")
}

impl Config {
    /// Reads every setting from the environment, applying defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A stray .env would leak into the env-var tests.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let api_url_str = std::env::var("MOCKPREP_API_URL")
            .unwrap_or_else(|_| "http://localhost:5000".to_string());
        let api_url = parse_base_url("MOCKPREP_API_URL", &api_url_str)?;

        let auth_url = match std::env::var("MOCKPREP_AUTH_URL") {
            Ok(value) => parse_base_url("MOCKPREP_AUTH_URL", &value)?,
            Err(_) => api_url.clone(),
        };

        let cache_dir = std::env::var("MOCKPREP_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_cache_dir());

        let question_count_str =
            std::env::var("MOCKPREP_QUESTION_COUNT").unwrap_or_else(|_| "5".to_string());
        let question_count = question_count_str
            .parse::<u32>()
            .ok()
            .filter(|n| (1..=MAX_QUESTION_COUNT).contains(n))
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "MOCKPREP_QUESTION_COUNT".to_string(),
                    format!(
                        "'{}' is not a number between 1 and {}",
                        question_count_str, MAX_QUESTION_COUNT
                    ),
                )
            })?;

        let timeout_str =
            std::env::var("MOCKPREP_REQUEST_TIMEOUT_SECS").unwrap_or_else(|_| "30".to_string());
        let request_timeout = timeout_str
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "MOCKPREP_REQUEST_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                )
            })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            api_url,
            auth_url,
            cache_dir,
            question_count,
            request_timeout,
            log_level,
        })
    }
}

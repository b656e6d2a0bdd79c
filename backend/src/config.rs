use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::enrichment::{DEFAULT_LOOKUP_TIMEOUT, EnrichmentSettings};
use crate::imaging::DEFAULT_MAX_UPLOAD_BYTES;
use crate::model::{DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_TOP_K, ModelSettings, ModelSource};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("Invalid URL in {key}: {source}")]
    Url {
        key: &'static str,
        source: url::ParseError,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub model: ModelSettings,
    pub preprocessing_path: PathBuf,
    pub preload_model: bool,
    pub enrichment: EnrichmentSettings,
    pub max_upload_bytes: usize,
    pub session_idle: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source; unset keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let model_source = var("MODEL_SOURCE").unwrap_or_else(|| "models/mobilenet_v2.pt".to_string());
        let source = ModelSource::parse(&model_source, var("MODEL_SHA256")).map_err(|source| {
            ConfigError::Url {
                key: "MODEL_SOURCE",
                source,
            }
        })?;

        let top_k: usize = parse_or(&var, "TOP_K", DEFAULT_TOP_K)?;
        if top_k == 0 {
            return Err(ConfigError::Invalid {
                key: "TOP_K",
                value: "0".to_string(),
            });
        }

        let lookup_timeout = secs_or(&var, "ENRICHMENT_TIMEOUT_SECS", DEFAULT_LOOKUP_TIMEOUT)?;
        let download_timeout = secs_or(&var, "MODEL_DOWNLOAD_TIMEOUT_SECS", DEFAULT_DOWNLOAD_TIMEOUT)?;
        let idle_secs = secs_or(&var, "SESSION_IDLE_SECS", Duration::from_secs(30 * 60))?.as_secs();
        let session_idle = i64::try_from(idle_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or(ConfigError::Invalid {
                key: "SESSION_IDLE_SECS",
                value: idle_secs.to_string(),
            })?;

        Ok(Self {
            port: parse_or(&var, "PORT", 8081)?,
            model: ModelSettings {
                source,
                labels_path: path_or(&var, "LABELS_PATH", "models/labels.txt"),
                cache_dir: path_or(&var, "MODEL_CACHE_DIR", "models/cache"),
                top_k,
                download_timeout,
            },
            preprocessing_path: path_or(&var, "PREPROCESSING_CONFIG", "config/preprocessing.yaml"),
            preload_model: parse_or(&var, "PRELOAD_MODEL", true)?,
            enrichment: EnrichmentSettings {
                unsplash_access_key: var("UNSPLASH_ACCESS_KEY"),
                unsplash_api_url: url_or(&var, "UNSPLASH_API_URL", "https://api.unsplash.com")?,
                wikipedia_api_url: url_or(
                    &var,
                    "WIKIPEDIA_API_URL",
                    "https://en.wikipedia.org/api/rest_v1",
                )?,
                timeout: lookup_timeout,
            },
            max_upload_bytes: parse_or(&var, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            session_idle,
        })
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// Whole seconds, at least one.
fn secs_or(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match parse_or(var, key, default.as_secs())? {
        0 => Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn path_or(var: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> PathBuf {
    PathBuf::from(var(key).unwrap_or_else(|| default.to_string()))
}

fn url_or(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<Url, ConfigError> {
    let raw = var(key).unwrap_or_else(|| default.to_string());
    Url::parse(raw.trim()).map_err(|source| ConfigError::Url { key, source })
}

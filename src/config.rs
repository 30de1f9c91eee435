//! Startup configuration.
//!
//! Settings come from an INI file (`config.ini` by default) with a `[Gemini]`
//! section holding the API key, plus a few environment overrides. The result
//! is immutable and handed to the components that need it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{File, FileFormat};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config.ini";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 25;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },

    #[error("Gemini API key not found (set [Gemini] API_KEY or GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Everything the Gemini client needs.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Config with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into().trim().to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Full `generateContent` URL, key included as a query parameter.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base.trim_end_matches('/'),
            self.model,
            self.api_key
        )
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub bind_addr: String,
    pub max_upload_bytes: usize,
}

/// Section name -> key -> value, both lowercased.
type Sections = HashMap<String, HashMap<String, String>>;

impl Config {
    /// Loads settings from the file named by `LEARNING_CONFIG` (or
    /// `config.ini`) and applies `GEMINI_API_KEY` / `BIND_ADDR` overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("LEARNING_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        Self::from_sources(
            &path,
            std::env::var("GEMINI_API_KEY").ok(),
            std::env::var("BIND_ADDR").ok(),
        )
    }

    /// Builds the config from an optional settings file and explicit
    /// overrides. A missing file is fine as long as a key is supplied.
    pub fn from_sources(
        path: &Path,
        api_key_override: Option<String>,
        bind_addr_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let sections = read_sections(path)?;
        let lookup = |section: &str, key: &str| {
            sections
                .get(section)
                .and_then(|values| values.get(key))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = api_key_override
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .or_else(|| lookup("gemini", "api_key"))
            .ok_or(ConfigError::MissingApiKey)?;

        let mut gemini = GeminiConfig::new(api_key);
        if let Some(base) = lookup("gemini", "api_base") {
            gemini.api_base = base;
        }
        if let Some(model) = lookup("gemini", "model") {
            gemini.model = model;
        }
        if let Some(secs) = lookup("gemini", "timeout_secs") {
            gemini.timeout = Duration::from_secs(parse_number("TIMEOUT_SECS", secs)?);
        }

        let bind_addr = bind_addr_override
            .filter(|addr| !addr.trim().is_empty())
            .or_else(|| lookup("server", "bind_addr"))
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let max_upload_bytes = match lookup("server", "max_upload_mb") {
            Some(mb) => upload_limit_bytes(mb)?,
            None => DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        };

        Ok(Self {
            gemini,
            bind_addr,
            max_upload_bytes,
        })
    }
}

fn read_sections(path: &Path) -> Result<Sections, ConfigError> {
    let settings = config::Config::builder()
        .add_source(File::from(path).format(FileFormat::Ini).required(false))
        .build()
        .and_then(|settings| settings.try_deserialize::<Sections>())
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(settings
        .into_iter()
        .map(|(section, values)| {
            let values = values
                .into_iter()
                .map(|(key, value)| (key.to_lowercase(), value))
                .collect();
            (section.to_lowercase(), values)
        })
        .collect())
}

fn upload_limit_bytes(mb: String) -> Result<usize, ConfigError> {
    usize::try_from(parse_number("MAX_UPLOAD_MB", mb.clone())?)
        .ok()
        .and_then(|mb| mb.checked_mul(1024 * 1024))
        .ok_or(ConfigError::InvalidValue {
            key: "MAX_UPLOAD_MB",
            value: mb,
        })
}

fn parse_number(key: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

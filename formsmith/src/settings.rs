//! Process configuration from `FS_*` environment variables (`.env` honored by the binary).

use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_SCHEMA_URL: &str = "http://localhost:7050/api";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5480";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Base URL of the schema service (`getAllEntities`, `GetEntityMetadata/...`).
    pub schema_url: String,
    /// Base URL of the dynamic row endpoints; defaults to `{schema_url}/Dynamic`.
    pub dynamic_url: String,
    pub bind_addr: String,
    pub http_timeout_secs: u64,
    pub cors_allowed_origins: Vec<String>,
    /// Static admin UI served for unmatched paths, if set.
    pub ui_dir: Option<PathBuf>,
}

#[derive(Debug, PartialEq)]
pub enum SettingsError {
    InvalidValue { key: &'static str, value: String },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::InvalidValue { key, value } => {
                write!(f, "Invalid value for {key}: '{value}'")
            }
        }
    }
}

impl std::error::Error for SettingsError {}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset and blank values take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let schema_url = get("FS_SCHEMA_URL")
            .unwrap_or_else(|| DEFAULT_SCHEMA_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let dynamic_url = get("FS_DYNAMIC_URL").unwrap_or_else(|| format!("{schema_url}/Dynamic"));

        let http_timeout_secs = match get("FS_HTTP_TIMEOUT_SECS") {
            None => DEFAULT_HTTP_TIMEOUT_SECS,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(SettingsError::InvalidValue {
                        key: "FS_HTTP_TIMEOUT_SECS",
                        value: raw,
                    });
                }
            },
        };

        let cors_allowed_origins = get("FS_CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            schema_url,
            dynamic_url,
            bind_addr: get("FS_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            http_timeout_secs,
            cors_allowed_origins,
            ui_dir: get("FS_UI_DIR").map(PathBuf::from),
        })
    }
}

//! Runtime settings for the harvester.
//!
//! Settings come from built-in defaults, an optional TOML file and finally
//! environment variables (a `.env` file is loaded by the binary first).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::DEFAULT_RUN_LOG_RETENTION;

/// Archive origin serving `/doc/decret-{year}-{index}/download`.
pub const DEFAULT_BASE_URL: &str = "https://sgg.gouv.bj";

/// OCR.space parsing endpoint.
pub const DEFAULT_OCR_ENDPOINT: &str = "https://api.ocr.space/parse/image";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; decrets-crawler/0.1)";

/// Environment variable holding one or more OCR API keys.
pub const OCR_API_KEY_ENV: &str = "OCR_API_KEY";

/// Environment variable pointing at a TOML settings file.
pub const CONFIG_PATH_ENV: &str = "DECREES_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No OCR API key configured (set OCR_API_KEY)")]
    MissingApiKey,

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database URL: a SQLite path (optionally `sqlite:`-prefixed) or a
    /// `postgres://` URL when built with the `postgres` feature.
    pub database_url: String,
    /// Origin of the decree archive.
    pub base_url: String,
    /// OCR provider endpoint.
    pub ocr_endpoint: String,
    /// User agent for archive requests.
    pub user_agent: String,
    /// Fixed delay after each archive request, in milliseconds.
    pub request_delay_ms: u64,
    /// Run logs kept per job after pruning; 0 falls back to the default.
    pub run_log_retention: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite:decrees.db".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            ocr_endpoint: DEFAULT_OCR_ENDPOINT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_delay_ms: 0,
            run_log_retention: DEFAULT_RUN_LOG_RETENTION,
        }
    }
}

impl Settings {
    /// Load settings from `path` (or `$DECREES_CONFIG`) and apply env overrides.
    ///
    /// A missing default config file is not an error; an explicit path that
    /// can't be read is.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut settings = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => {
                let default_path = Path::new("decrees.toml");
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        settings.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(url) = non_empty("DECREES_BASE_URL") {
            self.base_url = url;
        }
        if let Some(url) = non_empty("OCR_ENDPOINT") {
            self.ocr_endpoint = url;
        }
        if let Some(ua) = non_empty("DECREES_USER_AGENT") {
            self.user_agent = ua;
        }
        if let Some(delay) = non_empty("DECREES_REQUEST_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.request_delay_ms = delay;
        }
        if let Some(keep) = non_empty("DECREES_RUN_LOG_RETENTION").and_then(|v| v.parse().ok()) {
            self.run_log_retention = keep;
        }
    }
}

/// Split a credential string on `;` or `,`, trimming and dropping empties.
pub fn parse_api_keys(raw: &str) -> Vec<String> {
    raw.split([';', ','])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// OCR API keys from the environment. Empty when none are configured.
pub fn ocr_api_keys() -> Vec<String> {
    std::env::var(OCR_API_KEY_ENV)
        .map(|raw| parse_api_keys(&raw))
        .unwrap_or_default()
}

/// OCR API keys, or [`ConfigError::MissingApiKey`] when none are usable.
pub fn require_ocr_api_keys() -> Result<Vec<String>, ConfigError> {
    let keys = ocr_api_keys();
    if keys.is_empty() {
        return Err(ConfigError::MissingApiKey);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_api_keys() {
        assert_eq!(
            parse_api_keys(" K1 ;K2,, ;K3 "),
            vec!["K1".to_string(), "K2".to_string(), "K3".to_string()]
        );
        assert!(parse_api_keys(" ; , ").is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite:/tmp/x.db"),
            ("DECREES_BASE_URL", "http://localhost:9000"),
            ("DECREES_RUN_LOG_RETENTION", "8"),
            ("DECREES_USER_AGENT", "  "),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.database_url, "sqlite:/tmp/x.db");
        assert_eq!(settings.base_url, "http://localhost:9000");
        assert_eq!(settings.run_log_retention, 8);
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decrees.toml");
        std::fs::write(&path, "base_url = \"http://mirror.local\"\nrequest_delay_ms = 250\n").unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.base_url, "http://mirror.local");
        assert_eq!(settings.request_delay_ms, 250);
        assert_eq!(settings.ocr_endpoint, DEFAULT_OCR_ENDPOINT);
    }

    #[test]
    fn test_from_file_missing() {
        let err = Settings::from_file(Path::new("/nonexistent/decrees.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

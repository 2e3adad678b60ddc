// Application settings
// Loaded from ~/.config/explorium/config.toml, then overridden by EXPLORIUM_* env vars

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.explorium.ai/v1";

/// Largest ID list the bulk-enrich endpoints accept in one request.
pub const MAX_CHUNK_SIZE: usize = 50;

/// Environment variable → settings key. Empty values are ignored.
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("EXPLORIUM_API_KEY", "api_key"),
    ("EXPLORIUM_BASE_URL", "base_url"),
    ("EXPLORIUM_DEFAULT_OUTPUT", "default_output"),
    ("EXPLORIUM_PAGE_SIZE", "default_page_size"),
    ("EXPLORIUM_CONCURRENCY", "concurrency"),
];

/// Every key `config get` / `config set` accept.
pub const KEYS: &[&str] = &[
    "api_key",
    "base_url",
    "default_output",
    "default_page_size",
    "concurrency",
    "timeout_secs",
    "chunk_size",
    "min_confidence",
    "retry.max_attempts",
    "retry.base_delay_ms",
    "retry.multiplier",
    "retry.jitter_ms",
    "retry.max_delay_ms",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("cannot write {}: {source}", .path.display())]
    Write { path: PathBuf, source: std::io::Error },
    #[error("invalid config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("unknown config key '{0}'")]
    UnknownKey(String),
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue { key: String, value: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, value: impl fmt::Display, reason: &str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
    Csv,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Table => "table",
            OutputFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "table" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(ConfigError::invalid("default_output", s, "expected json, table or csv")),
        }
    }
}

/// Backoff for remote calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per call, first one included
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    /// Upper bound of random extra delay per retry (0 = none)
    pub jitter_ms: u64,
    /// Longest single wait, `Retry-After` included
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 5000,
            multiplier: 2.0,
            jitter_ms: 0,
            max_delay_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: String,
    pub base_url: String,
    pub default_output: OutputFormat,
    pub default_page_size: u32,

    // Pipeline
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub chunk_size: usize,
    pub min_confidence: f64,

    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_output: OutputFormat::Json,
            default_page_size: 100,
            concurrency: 5,
            timeout_secs: 30,
            chunk_size: 50,
            min_confidence: 0.8,
            retry: RetrySettings::default(),
        }
    }
}

impl Settings {
    /// Default config file location
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("explorium")
            .join("config.toml")
    }

    /// File only, no environment. A missing file yields defaults.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Defaults < file < process environment, validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    /// Like [`Settings::load`] with an injectable environment lookup.
    pub fn load_with_env<F>(path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        let mut settings = Self::load_file(&path)?;

        for (var, key) in ENV_OVERRIDES {
            if let Some(value) = env(var).filter(|v| !v.trim().is_empty()) {
                debug!("{var} overrides {key}");
                settings.set_value(key, &value)?;
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Write as TOML, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 {
            return Err(ConfigError::invalid("default_page_size", 0, "must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::invalid("concurrency", 0, "must be at least 1"));
        }
        if !(1..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(ConfigError::invalid(
                "chunk_size",
                self.chunk_size,
                "must be between 1 and 50",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::invalid(
                "min_confidence",
                self.min_confidence,
                "must be between 0 and 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", 0, "must be at least 1"));
        }
        if !(self.retry.multiplier.is_finite() && self.retry.multiplier >= 1.0) {
            return Err(ConfigError::invalid(
                "retry.multiplier",
                self.retry.multiplier,
                "must be a number >= 1",
            ));
        }
        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Result<String, ConfigError> {
        Ok(match key {
            "api_key" => self.api_key.clone(),
            "base_url" => self.base_url.clone(),
            "default_output" => self.default_output.to_string(),
            "default_page_size" => self.default_page_size.to_string(),
            "concurrency" => self.concurrency.to_string(),
            "timeout_secs" => self.timeout_secs.to_string(),
            "chunk_size" => self.chunk_size.to_string(),
            "min_confidence" => self.min_confidence.to_string(),
            "retry.max_attempts" => self.retry.max_attempts.to_string(),
            "retry.base_delay_ms" => self.retry.base_delay_ms.to_string(),
            "retry.multiplier" => self.retry.multiplier.to_string(),
            "retry.jitter_ms" => self.retry.jitter_ms.to_string(),
            "retry.max_delay_ms" => self.retry.max_delay_ms.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        })
    }

    /// Parse `value` for `key` and store it. Range checks happen in
    /// [`Settings::validate`].
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match key {
            "api_key" => self.api_key = value.to_string(),
            "base_url" => self.base_url = value.trim_end_matches('/').to_string(),
            "default_output" => self.default_output = value.parse()?,
            "default_page_size" => self.default_page_size = parse(key, value)?,
            "concurrency" => self.concurrency = parse(key, value)?,
            "timeout_secs" => self.timeout_secs = parse(key, value)?,
            "chunk_size" => self.chunk_size = parse(key, value)?,
            "min_confidence" => self.min_confidence = parse(key, value)?,
            "retry.max_attempts" => self.retry.max_attempts = parse(key, value)?,
            "retry.base_delay_ms" => self.retry.base_delay_ms = parse(key, value)?,
            "retry.multiplier" => self.retry.multiplier = parse(key, value)?,
            "retry.jitter_ms" => self.retry.jitter_ms = parse(key, value)?,
            "retry.max_delay_ms" => self.retry.max_delay_ms = parse(key, value)?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// API key shortened for display: first and last four characters.
    pub fn masked_api_key(&self) -> String {
        let key = &self.api_key;
        let chars: Vec<char> = key.chars().collect();
        if key.is_empty() {
            String::new()
        } else if chars.len() > 8 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{head}...{tail}")
        } else {
            "***".to_string()
        }
    }

    /// Copy safe to print.
    pub fn redacted(&self) -> Self {
        Self {
            api_key: self.masked_api_key(),
            ..self.clone()
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::invalid(key, value, "not a valid number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load_with_env(Some(&dir.path().join("none.toml")), env(&[])).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.retry.base_delay_ms, 5000);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_key = \"abc\"\n\n[retry]\nmax_attempts = 5\n").unwrap();

        let s = Settings::load_with_env(Some(&path), env(&[])).unwrap();
        assert_eq!(s.api_key, "abc");
        assert_eq!(s.retry.max_attempts, 5);
        assert_eq!(s.retry.multiplier, 2.0);
        assert_eq!(s.default_page_size, 100);
    }

    #[test]
    fn test_env_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_key = \"file\"\nconcurrency = 2\n").unwrap();

        let s = Settings::load_with_env(
            Some(&path),
            env(&[
                ("EXPLORIUM_API_KEY", "env"),
                ("EXPLORIUM_PAGE_SIZE", "25"),
                ("EXPLORIUM_CONCURRENCY", ""),
                ("EXPLORIUM_DEFAULT_OUTPUT", "CSV"),
            ]),
        )
        .unwrap();
        assert_eq!(s.api_key, "env");
        assert_eq!(s.default_page_size, 25);
        assert_eq!(s.concurrency, 2);
        assert_eq!(s.default_output, OutputFormat::Csv);
    }

    #[test]
    fn test_bad_env_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let err = Settings::load_with_env(Some(&path), env(&[("EXPLORIUM_PAGE_SIZE", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "default_page_size"));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "concurrency = \"many\"").unwrap();
        let err = Settings::load_with_env(Some(&path), env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_validation() {
        let mut s = Settings::default();
        s.min_confidence = 1.5;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.set_value("concurrency", "0").unwrap();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_chunk_size_capped_at_bulk_limit() {
        let mut s = Settings::default();
        s.chunk_size = 200;
        let err = s.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "chunk_size"));
        assert!(err.to_string().contains("between 1 and 50"));

        s.chunk_size = MAX_CHUNK_SIZE;
        assert!(s.validate().is_ok());
        s.chunk_size = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_oversized_chunk_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "chunk_size = 120\n").unwrap();
        assert!(Settings::load_with_env(Some(&path), env(&[])).is_err());
    }

    #[test]
    fn test_set_get_round_trip_every_key() {
        let mut s = Settings::default();
        for key in KEYS {
            let current = s.get_value(key).unwrap();
            s.set_value(key, &current).unwrap();
        }
        assert_eq!(s, Settings::default());
        assert!(matches!(s.set_value("nope", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(s.get_value("retry.nope").is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut s = Settings::default();
        s.set_value("api_key", "k").unwrap();
        s.set_value("retry.base_delay_ms", "0").unwrap();
        s.save(&path).unwrap();

        assert_eq!(Settings::load_file(&path).unwrap(), s);
    }

    #[test]
    fn test_masked_api_key() {
        let mut s = Settings::default();
        assert_eq!(s.masked_api_key(), "");
        s.api_key = "short".into();
        assert_eq!(s.masked_api_key(), "***");
        s.api_key = "abcd1234efgh5678".into();
        assert_eq!(s.redacted().api_key, "abcd...5678");
    }
}

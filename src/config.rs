//! Engine configuration.
//!
//! Layering: built-in defaults, then an optional YAML file, then
//! `OB_FORMS_*` environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{FormError, Result};

const DEFAULT_DEBOUNCE_MS: u64 = 1500;
const DEFAULT_INIT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_TEMPLATE_ATTEMPTS: u32 = 3;
const DEFAULT_MAX_INIT_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

/// Tunables for initialization, autosave, and the HTTP backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormEngineConfig {
    /// Quiet period after the last edit before an autosave fires
    pub debounce_ms: u64,
    /// Upper bound on a single service initialization attempt
    pub init_timeout_ms: u64,
    pub max_template_attempts: u32,
    pub max_init_attempts: u32,
    /// Delay between failed attempts
    pub retry_backoff_ms: u64,
    /// Forwarded to save/submit calls
    pub include_metadata: bool,
    pub backend_url: Option<String>,
    pub http_timeout_ms: u64,
}

impl Default for FormEngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            init_timeout_ms: DEFAULT_INIT_TIMEOUT_MS,
            max_template_attempts: DEFAULT_MAX_TEMPLATE_ATTEMPTS,
            max_init_attempts: DEFAULT_MAX_INIT_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            include_metadata: true,
            backend_url: None,
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
        }
    }
}

impl FormEngineConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load a YAML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| FormError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(raw).map_err(|e| FormError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Split out so tests don't touch
    /// the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("OB_FORMS_DEBOUNCE_MS") {
            self.debounce_ms = parse_var("OB_FORMS_DEBOUNCE_MS", &v)?;
        }
        if let Some(v) = lookup("OB_FORMS_INIT_TIMEOUT_MS") {
            self.init_timeout_ms = parse_var("OB_FORMS_INIT_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("OB_FORMS_MAX_TEMPLATE_ATTEMPTS") {
            self.max_template_attempts = parse_var("OB_FORMS_MAX_TEMPLATE_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("OB_FORMS_MAX_INIT_ATTEMPTS") {
            self.max_init_attempts = parse_var("OB_FORMS_MAX_INIT_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("OB_FORMS_RETRY_BACKOFF_MS") {
            self.retry_backoff_ms = parse_var("OB_FORMS_RETRY_BACKOFF_MS", &v)?;
        }
        if let Some(v) = lookup("OB_FORMS_BACKEND_URL") {
            self.backend_url = Some(v);
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 {
            return Err(FormError::Config("debounce_ms must be positive".into()));
        }
        if self.init_timeout_ms == 0 {
            return Err(FormError::Config("init_timeout_ms must be positive".into()));
        }
        if self.max_template_attempts == 0 || self.max_init_attempts == 0 {
            return Err(FormError::Config("attempt counts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| FormError::Config(format!("{} has invalid value '{}'", name, raw)))
}

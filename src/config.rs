//! Application configuration management.
//!
//! Settings are merged from, lowest to highest priority:
//!
//! 1. Built-in defaults
//! 2. A TOML config file (platform config dir, or `--config PATH`)
//! 3. Environment variables prefixed with `CAPSEARCH_` (e.g. `CAPSEARCH_JOBS=8`)
//! 4. CLI flags (applied by the caller via [`Config::apply_overrides`])
//!
//! A missing config file is fine; a malformed one is logged and skipped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::caption::client::DEFAULT_MAX_ATTEMPTS;
use crate::caption::ollama::{DEFAULT_HOST, DEFAULT_MODEL, DEFAULT_PROMPT};
use crate::caption::OllamaConfig;
use crate::fetch::coordinator::DEFAULT_JOBS;
use crate::scanner::{ScanConfig, DEFAULT_EXTENSIONS};
use crate::search::ResultOrder;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "CAPSEARCH_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the files to search.
    pub data_dir: PathBuf,
    /// Location of the description cache.
    pub cache_path: PathBuf,
    /// Accepted file extensions.
    pub extensions: Vec<String>,
    /// Descend into subdirectories of `data_dir`.
    pub recursive: bool,
    /// Ollama server URL.
    pub host: String,
    /// Vision model tag.
    pub model: String,
    /// Instruction sent with each image.
    pub prompt: String,
    /// Caption attempts per file.
    pub max_attempts: u32,
    /// Concurrent caption workers.
    pub jobs: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Result ordering.
    pub order: ResultOrder,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            cache_path: PathBuf::from("./descriptions_cache.json"),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            recursive: false,
            host: DEFAULT_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            jobs: DEFAULT_JOBS,
            request_timeout_secs: 120,
            order: ResultOrder::Key,
        }
    }
}

/// CLI-level overrides. `None` leaves the configured value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--dir`
    pub data_dir: Option<PathBuf>,
    /// `--cache`
    pub cache_path: Option<PathBuf>,
    /// `--recursive`
    pub recursive: Option<bool>,
    /// `--host`
    pub host: Option<String>,
    /// `--model`
    pub model: Option<String>,
    /// `--max-attempts`
    pub max_attempts: Option<u32>,
    /// `--jobs`
    pub jobs: Option<usize>,
    /// `--order`
    pub order: Option<ResultOrder>,
}

impl Config {
    /// Load from the default config file location and the environment.
    #[must_use]
    pub fn load() -> Self {
        match Self::default_path() {
            Ok(path) => Self::load_from_path(path),
            Err(e) => {
                log::debug!("No config directory available, skipping file: {}", e);
                Self::extract(Self::defaults().merge(Env::prefixed(ENV_PREFIX)))
            }
        }
    }

    /// Load from `path` and the environment.
    #[must_use]
    pub fn load_from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.exists() {
            log::debug!("Loading config from {}", path.display());
            let figment = Self::defaults()
                .merge(Toml::file(path))
                .merge(Env::prefixed(ENV_PREFIX));
            match figment.extract::<Config>() {
                Ok(config) => return config.normalized(),
                Err(e) => log::warn!("Ignoring config file {}: {}", path.display(), e),
            }
        }
        Self::extract(Self::defaults().merge(Env::prefixed(ENV_PREFIX)))
    }

    fn defaults() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    fn extract(figment: Figment) -> Self {
        match figment.extract::<Config>() {
            Ok(config) => config.normalized(),
            Err(e) => {
                log::warn!("Invalid configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Clamp values that must be at least one.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.max_attempts = self.max_attempts.max(1);
        self.jobs = self.jobs.max(1);
        self
    }

    /// Apply CLI flags on top of the loaded configuration.
    #[must_use]
    pub fn apply_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(v) = overrides.data_dir {
            self.data_dir = v;
        }
        if let Some(v) = overrides.cache_path {
            self.cache_path = v;
        }
        if let Some(v) = overrides.recursive {
            self.recursive = v;
        }
        if let Some(v) = overrides.host {
            self.host = v;
        }
        if let Some(v) = overrides.model {
            self.model = v;
        }
        if let Some(v) = overrides.max_attempts {
            self.max_attempts = v;
        }
        if let Some(v) = overrides.jobs {
            self.jobs = v;
        }
        if let Some(v) = overrides.order {
            self.order = v;
        }
        self.normalized()
    }

    /// Settings for the Ollama backend.
    #[must_use]
    pub fn ollama(&self) -> OllamaConfig {
        OllamaConfig {
            host: self.host.clone(),
            model: self.model.clone(),
            prompt: self.prompt.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }

    /// Settings for input discovery.
    #[must_use]
    pub fn scan(&self) -> ScanConfig {
        ScanConfig {
            extensions: self.extensions.clone(),
            recursive: self.recursive,
            follow_symlinks: false,
        }
    }

    /// Get the default platform-specific configuration path.
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "capsearch", "capsearch")
            .ok_or_else(|| anyhow::anyhow!("Failed to determine project directories"))?;
        Ok(project_dirs.config_dir().join("config.toml"))
    }
}

// src/core/config_manager.rs
//! Runtime configuration: optional YAML file, environment, defaults

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::core::FsOps;

const DEFAULT_CONFIG_FILE: &str = "config.yaml";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub paths: PathsConfig,
    pub provider: ProviderConfig,
    pub wave: WaveConfig,
    pub scraper: ScraperConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub ledger_file: PathBuf,
    pub batch_request_dir: PathBuf,
    pub batch_object_dir: PathBuf,
    pub batch_response_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::under(Path::new(".data"), Path::new("results/jobs"))
    }
}

impl PathsConfig {
    /// Standard layout below a data directory and a results directory
    pub fn under(data_dir: &Path, results_dir: &Path) -> Self {
        let batch_dir = data_dir.join("batch");
        Self {
            ledger_file: data_dir.join("memory").join("analyzed_uris.txt"),
            batch_request_dir: batch_dir.join("request"),
            batch_object_dir: batch_dir.join("object"),
            batch_response_dir: batch_dir.join("response"),
            results_dir: results_dir.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub completion_window: String,
    pub timeout_seconds: u64,
    /// Only ever read from the environment
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 16000,
            completion_window: "24h".to_string(),
            timeout_seconds: 120,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    pub wave_size: usize,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
}

impl Default for WaveConfig {
    fn default() -> Self {
        // 1440 polls a minute apart covers the 24h completion window
        Self {
            wave_size: 10,
            poll_interval_secs: 60,
            max_poll_attempts: 1440,
        }
    }
}

impl WaveConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub timeout_seconds: u64,
    pub retries: u32,
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retries: 3,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    paths: PathsConfig,
    provider: ProviderConfig,
    wave: WaveConfig,
    scraper: ScraperConfig,
}

impl ConfigManager {
    /// Load configuration.
    ///
    /// `explicit_path` (from `--config` or `JOB_ANALYZER_CONFIG`) must exist;
    /// otherwise `config.yaml` in the working directory is used when present.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                info!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                Self::from_yaml_str("")?
            }
        };

        config.apply_env();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        info!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse a YAML document; every section and key is optional
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = if content.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(content).context("Invalid YAML configuration")?
        };

        if file.wave.wave_size == 0 {
            anyhow::bail!("wave.wave_size must be at least 1");
        }
        if file.wave.max_poll_attempts == 0 {
            anyhow::bail!("wave.max_poll_attempts must be at least 1");
        }

        Ok(Self {
            paths: file.paths,
            provider: file.provider,
            wave: file.wave,
            scraper: file.scraper,
        })
    }

    fn apply_env(&mut self) {
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            if !api_key.trim().is_empty() {
                self.provider.api_key = Some(api_key);
            }
        }
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            if !base_url.trim().is_empty() {
                self.provider.base_url = base_url;
            }
        }
    }

    /// Ensure all working directories and the ledger file exist
    pub async fn ensure_directories(&self) -> Result<()> {
        FsOps::ensure_dir_exists(&self.paths.batch_request_dir).await?;
        FsOps::ensure_dir_exists(&self.paths.batch_object_dir).await?;
        FsOps::ensure_dir_exists(&self.paths.batch_response_dir).await?;
        FsOps::ensure_dir_exists(&self.paths.results_dir).await?;
        FsOps::touch_file(&self.paths.ledger_file).await?;

        info!("All configured directories ensured to exist");
        Ok(())
    }
}

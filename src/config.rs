use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::semantic::{RetryPolicy, DEFAULT_SNAPSHOT, DEFAULT_TOP_K};
use crate::storage::{BackendLocal, StorageManager};

const CONFIG_FILE: &str = "config.yaml";

/// Default embedding model (the one the survey corpus was embedded with)
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Dimensions of the default embedding model
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const DEFAULT_BATCH_SIZE: usize = 32;
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderProvider {
    /// Deterministic hash vectors, for tests and offline demos
    Hash,
    /// Local fastembed model
    Fastembed,
    /// OpenAI-compatible embeddings endpoint
    #[default]
    Openai,
}

/// Which embedder to build and how to reach it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbedderConfig {
    #[serde(default)]
    pub provider: EmbedderProvider,

    /// Model name (e.g., "text-embedding-3-small" or "bge-base-en-v1.5")
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector length; measured from the model for fastembed
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,

    /// Override for OpenAI-compatible servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Texts per request when building a corpus
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: EmbedderProvider::default(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            base_url: None,
            api_key_env: default_api_key_env(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimensions() -> usize {
    DEFAULT_EMBEDDING_DIMENSIONS
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Corpus snapshot; relative paths resolve against the base path
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default)]
    pub embedder: EmbedderConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            top_k: default_top_k(),
            listen_addr: default_listen_addr(),
            embedder: EmbedderConfig::default(),
            retry: RetryPolicy::default(),
            base_path: PathBuf::new(),
        }
    }
}

fn default_snapshot_path() -> String {
    DEFAULT_SNAPSHOT.to_string()
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

/// `TASTETWIN_BASE_PATH`, or `~/.local/share/tastetwin`.
pub fn base_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("TASTETWIN_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home = homedir::my_home()
        .map_err(|err| anyhow::anyhow!("could not determine home directory: {err:?}"))?
        .context("home directory path is empty")?;

    Ok(home.join(".local/share/tastetwin"))
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if self.top_k == 0 {
            bail!("top_k must be at least 1");
        }

        if self.snapshot_path.trim().is_empty() {
            bail!("snapshot_path must not be empty");
        }

        let embedder = &self.embedder;
        if embedder.provider != EmbedderProvider::Fastembed && embedder.dimensions == 0 {
            bail!("embedder.dimensions must be greater than 0");
        }
        if embedder.timeout_secs == 0 {
            bail!("embedder.timeout_secs must be greater than 0");
        }
        if embedder.download_timeout_secs == 0 {
            bail!("embedder.download_timeout_secs must be greater than 0");
        }
        if embedder.batch_size == 0 {
            bail!("embedder.batch_size must be greater than 0");
        }

        if let Err(msg) = self.retry.validate() {
            bail!(msg);
        }

        Ok(())
    }

    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        let store = BackendLocal::new(base_path)
            .with_context(|| format!("failed to create {}", base_path.display()))?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            let default = serde_yml::to_string(&Self::default())?;
            store
                .write(CONFIG_FILE, default.as_bytes())
                .context("failed to write default config")?;
        }

        let config_str = String::from_utf8(store.read(CONFIG_FILE)?)
            .context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_path_buf();
        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = BackendLocal::new(&self.base_path)?;
        let config_str = serde_yml::to_string(&self)?;
        store
            .write(CONFIG_FILE, config_str.as_bytes())
            .context("failed to save config")
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn snapshot_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.snapshot_path);
        if path.is_absolute() {
            path
        } else {
            self.base_path.join(path)
        }
    }
}

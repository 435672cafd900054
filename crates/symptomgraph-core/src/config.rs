use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config as cfg;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::SIGN_OR_SYMPTOM;

/// Remote ontology (UMLS REST) access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UmlsSettings {
    #[serde(default = "UmlsSettings::default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,
    /// Vocabulary (`sabs`) the root search is restricted to.
    #[serde(default = "UmlsSettings::default_search_vocabulary")]
    pub search_vocabulary: String,
    /// Relations are fetched as a single page of this size.
    #[serde(default = "UmlsSettings::default_relations_page_size")]
    pub relations_page_size: u32,
    #[serde(default = "UmlsSettings::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl UmlsSettings {
    fn default_base_url() -> String {
        "https://uts-ws.nlm.nih.gov/rest".to_string()
    }

    fn default_search_vocabulary() -> String {
        "ICD10".to_string()
    }

    fn default_relations_page_size() -> u32 {
        10_000
    }

    fn default_timeout_secs() -> u64 {
        30
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(|k| k.expose_secret())
    }
}

impl Default for UmlsSettings {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            api_key: None,
            search_vocabulary: Self::default_search_vocabulary(),
            relations_page_size: Self::default_relations_page_size(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "CacheSettings::default_enabled")]
    pub enabled: bool,
    #[serde(default = "CacheSettings::default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "CacheSettings::default_max_entries")]
    pub max_entries: usize,
}

impl CacheSettings {
    fn default_enabled() -> bool {
        true
    }

    fn default_ttl_secs() -> u64 {
        86_400 // 1 day
    }

    fn default_max_entries() -> usize {
        100_000
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            ttl_secs: Self::default_ttl_secs(),
            max_entries: Self::default_max_entries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Buffer size of every stage channel.
    #[serde(default = "PipelineSettings::default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "PipelineSettings::default_symptom_semantic_type")]
    pub symptom_semantic_type: String,
}

impl PipelineSettings {
    fn default_channel_capacity() -> usize {
        100
    }

    fn default_symptom_semantic_type() -> String {
        SIGN_OR_SYMPTOM.to_string()
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            channel_capacity: Self::default_channel_capacity(),
            symptom_semantic_type: Self::default_symptom_semantic_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        3030
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "LoggingSettings::default_level")]
    pub level: String,
}

impl LoggingSettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub umls: UmlsSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub debug: bool,
}

/// Flat variables understood by earlier deployments, mapped onto settings keys.
const LEGACY_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("UMLS_URL", "umls.base_url"),
    ("UMLS_KEY", "umls.api_key"),
    ("CACHE_TTL_SEC", "cache.ttl_secs"),
    ("SERVER_PORT", "server.port"),
    ("DEBUG", "debug"),
];

impl Settings {
    pub fn default_env() -> String {
        env::var("APP_ENV")
            .ok()
            .or_else(|| env::var("RUST_ENV").ok())
            .unwrap_or_else(|| "development".to_string())
    }

    pub fn default_config_dir() -> PathBuf {
        env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("config")
    }

    /// Loads `.env`, then layered config files and environment variables.
    pub fn load() -> Result<Self> {
        if let Err(e) = dotenv::dotenv() {
            warn!("No .env file loaded: {}", e);
        }
        let config_dir = Self::default_config_dir();
        info!("Using config directory: {:?}", config_dir);
        Self::load_from_sources(&config_dir, &Self::default_env())
    }

    /// Precedence (lowest first): `default.toml`, `{env}.toml`, `local.toml`,
    /// `SYMPTOMGRAPH__*` variables, legacy flat variables.
    pub fn load_from_sources(config_dir: &Path, env_name: &str) -> Result<Self> {
        let mut builder = cfg::Config::builder()
            .add_source(cfg::File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                cfg::File::from(config_dir.join(format!("{}.toml", env_name))).required(false),
            )
            .add_source(cfg::File::from(config_dir.join("local.toml")).required(false))
            .add_source(cfg::Environment::with_prefix("SYMPTOMGRAPH").separator("__"));

        for (var, key) in LEGACY_ENV_OVERRIDES {
            builder = builder
                .set_override_option(*key, env::var(var).ok())
                .with_context(|| format!("applying {} override", var))?;
        }

        let settings: Settings = builder
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("deserializing configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.umls.api_key().is_some_and(|k| !k.trim().is_empty()),
            "umls.api_key is required (set UMLS_KEY or SYMPTOMGRAPH__UMLS__API_KEY)"
        );
        anyhow::ensure!(
            !self.umls.base_url.trim().is_empty(),
            "umls.base_url cannot be empty"
        );
        anyhow::ensure!(
            self.umls.relations_page_size > 0,
            "umls.relations_page_size must be > 0"
        );
        anyhow::ensure!(self.umls.timeout_secs > 0, "umls.timeout_secs must be > 0");
        anyhow::ensure!(
            self.pipeline.channel_capacity > 0,
            "pipeline.channel_capacity must be > 0"
        );
        anyhow::ensure!(self.server.port > 0, "server.port must be > 0");
        Ok(())
    }

    /// Filter directive used when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> String {
        if self.debug {
            "debug".to_string()
        } else {
            self.logging.level.clone()
        }
    }
}

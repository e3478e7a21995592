use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub mode: OperationMode,
    pub llm: LlmConfig,
    pub embeddings: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub web_search: WebSearchConfig,
    pub workflow: WorkflowSettings,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub store: StoreConfig,
    pub policy_file: Option<PathBuf>,
    pub translate: bool,
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Fast,      // Short timeouts, few retries, aggressive caching
    Accurate,  // Long timeouts, more retries, no caching
    Balanced,  // Default
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub url: String,
    pub policy_collection: String,
    pub response_collection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSettings {
    pub top_k: usize,
    pub max_retries: usize,
    pub stage_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Qdrant,
    File,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for OperationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(OperationMode::Fast),
            "accurate" => Ok(OperationMode::Accurate),
            "balanced" => Ok(OperationMode::Balanced),
            other => Err(format!("unknown mode '{other}' (expected fast, accurate or balanced)")),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "qdrant" => Ok(StoreBackend::Qdrant),
            "file" => Ok(StoreBackend::File),
            "none" | "off" => Ok(StoreBackend::None),
            other => Err(format!("unknown store '{other}' (expected qdrant, file or none)")),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperationMode::Balanced,
            llm: LlmConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "llama3".to_string(),
                request_timeout_secs: 60,
            },
            embeddings: EmbeddingConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "nomic-embed-text".to_string(),
            },
            vector_store: VectorStoreConfig {
                url: "http://localhost:6333".to_string(),
                policy_collection: "policy_chunks".to_string(),
                response_collection: "claim_responses".to_string(),
            },
            web_search: WebSearchConfig { api_key: None },
            workflow: WorkflowSettings {
                top_k: 5,
                max_retries: 2,
                stage_timeout_secs: 30,
            },
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 500,
                max_backoff_ms: 5000,
            },
            cache: CacheConfig {
                enabled: true,
                max_entries: 10000,
            },
            store: StoreConfig {
                backend: StoreBackend::File,
                dir: PathBuf::from("data/responses"),
            },
            policy_file: None,
            translate: false,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    pub fn fast_mode() -> Self {
        let mut config = Self::default();
        config.mode = OperationMode::Fast;
        config.llm.request_timeout_secs = 30;
        config.workflow.stage_timeout_secs = 15;
        config.retry = RetryConfig {
            max_retries: 1,
            initial_backoff_ms: 250,
            max_backoff_ms: 1000,
        };
        config.cache.max_entries = 50000;
        config
    }

    pub fn accurate_mode() -> Self {
        let mut config = Self::default();
        config.mode = OperationMode::Accurate;
        config.llm.request_timeout_secs = 120;
        config.workflow.stage_timeout_secs = 90;
        config.retry = RetryConfig {
            max_retries: 4,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10000,
        };
        config.cache = CacheConfig {
            enabled: false,
            max_entries: 0,
        };
        config
    }

    /// Load configuration from the environment.
    /// Loads `.env` file if present, then reads `CLAIMS_*` variables.
    pub fn from_env() -> Result<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a variable lookup. `CLAIMS_MODE` picks the preset, the
    /// remaining variables override it. Unparsable values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mode: OperationMode = parse_var(&var, "CLAIMS_MODE")?.unwrap_or(OperationMode::Balanced);
        let mut config = match mode {
            OperationMode::Fast => Self::fast_mode(),
            OperationMode::Accurate => Self::accurate_mode(),
            OperationMode::Balanced => Self::default(),
        };

        if let Some(url) = var("CLAIMS_OLLAMA_URL") {
            config.llm.base_url = url.clone();
            config.embeddings.base_url = url;
        }
        if let Some(model) = var("CLAIMS_LLM_MODEL") {
            config.llm.model = model;
        }
        if let Some(model) = var("CLAIMS_EMBEDDING_MODEL") {
            config.embeddings.model = model;
        }
        if let Some(secs) = parse_var(&var, "CLAIMS_LLM_TIMEOUT_SECS")? {
            config.llm.request_timeout_secs = secs;
        }
        if let Some(url) = var("CLAIMS_QDRANT_URL") {
            config.vector_store.url = url;
        }
        if let Some(name) = var("CLAIMS_POLICY_COLLECTION") {
            config.vector_store.policy_collection = name;
        }
        if let Some(name) = var("CLAIMS_RESPONSE_COLLECTION") {
            config.vector_store.response_collection = name;
        }
        config.web_search.api_key = var("CLAIMS_SERPAPI_KEY").or_else(|| var("SERPAPI_API_KEY"));

        if let Some(top_k) = parse_var(&var, "CLAIMS_TOP_K")? {
            config.workflow.top_k = top_k;
        }
        if let Some(retries) = parse_var(&var, "CLAIMS_MAX_RETRIES")? {
            config.workflow.max_retries = retries;
        }
        if let Some(secs) = parse_var(&var, "CLAIMS_STAGE_TIMEOUT_SECS")? {
            config.workflow.stage_timeout_secs = secs;
        }
        if let Some(entries) = parse_var(&var, "CLAIMS_CACHE_ENTRIES")? {
            config.cache.max_entries = entries;
            config.cache.enabled = entries > 0;
        }
        if let Some(backend) = parse_var(&var, "CLAIMS_STORE")? {
            config.store.backend = backend;
        }
        if let Some(dir) = var("CLAIMS_STORE_DIR") {
            config.store.dir = PathBuf::from(dir);
        }
        config.policy_file = var("CLAIMS_POLICY_FILE").map(PathBuf::from);
        if let Some(translate) = parse_var(&var, "CLAIMS_TRANSLATE")? {
            config.translate = translate;
        }
        if let Some(level) = var("LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(format) = parse_var(&var, "CLAIMS_LOG_FORMAT")? {
            config.log_format = format;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workflow.top_k == 0 {
            anyhow::bail!("CLAIMS_TOP_K must be at least 1");
        }
        if self.workflow.max_retries > workflow::MAX_RETRIES {
            anyhow::bail!(
                "CLAIMS_MAX_RETRIES must be at most {}, got {}",
                workflow::MAX_RETRIES,
                self.workflow.max_retries
            );
        }
        if self.workflow.stage_timeout_secs == 0 || self.llm.request_timeout_secs == 0 {
            anyhow::bail!("timeouts must be at least one second");
        }
        Ok(())
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| anyhow::anyhow!("{e}"))
                .with_context(|| format!("invalid {key}: '{raw}'"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.mode, OperationMode::Balanced);
        assert_eq!(config.workflow.top_k, 5);
        assert_eq!(config.workflow.max_retries, 2);
        assert_eq!(config.store.backend, StoreBackend::File);
        assert!(config.web_search.api_key.is_none());
    }

    #[test]
    fn test_overrides_apply_on_top_of_mode() {
        let config = AppConfig::from_lookup(lookup(&[
            ("CLAIMS_MODE", "accurate"),
            ("CLAIMS_TOP_K", "8"),
            ("CLAIMS_STORE", "none"),
            ("SERPAPI_API_KEY", "secret"),
            ("CLAIMS_TRANSLATE", "true"),
        ]))
        .unwrap();

        assert_eq!(config.mode, OperationMode::Accurate);
        assert!(!config.cache.enabled);
        assert_eq!(config.workflow.top_k, 8);
        assert_eq!(config.store.backend, StoreBackend::None);
        assert_eq!(config.web_search.api_key.as_deref(), Some("secret"));
        assert!(config.translate);
    }

    #[test]
    fn test_invalid_values_are_startup_errors() {
        let err = AppConfig::from_lookup(lookup(&[("CLAIMS_TOP_K", "many")])).unwrap_err();
        assert!(err.to_string().contains("invalid CLAIMS_TOP_K"));

        assert!(AppConfig::from_lookup(lookup(&[("CLAIMS_MAX_RETRIES", "5")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("CLAIMS_MODE", "turbo")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("CLAIMS_TOP_K", "0")])).is_err());
    }

    #[test]
    fn test_api_key_is_never_serialized() {
        let mut config = AppConfig::default();
        config.web_search.api_key = Some("secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::ranking::{FusionWeights, TrustTiers};
use crate::store::DistanceMetric;

pub const DEFAULT_FALLBACK: &str = "Sorry, I couldn't find a specific answer for that topic.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub table: String,
    pub snapshot_path: Option<PathBuf>,
    pub metric: DistanceMetric,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            backend: StoreBackend::Postgres,
            database_url: None,
            table: "talk".to_string(),
            snapshot_path: None,
            metric: DistanceMetric::Cosine,
            max_connections: 5,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        EmbeddingSettings {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-ada-002".to_string(),
            dimensions: 1536,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        GenerationSettings {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            max_tokens: None,
            api_key: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Records requested from the store per query.
    pub candidate_pool: usize,
    /// Documents kept after ranking.
    pub max_documents: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        RetrievalSettings {
            candidate_pool: 20,
            max_documents: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingSettings {
    pub weights: FusionWeights,
    pub trust: TrustTiers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderSettings {
    /// Reply used when no retrieved document fits a small-talk topic.
    /// Without one (or with an empty string), such queries fall through to
    /// generation.
    pub fallback: Option<String>,
}

impl Default for ResponderSettings {
    fn default() -> Self {
        ResponderSettings {
            fallback: Some(DEFAULT_FALLBACK.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub batch_size: usize,
    pub insert_batch_size: usize,
    pub workers: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        IngestSettings {
            batch_size: 100,
            insert_batch_size: 100,
            workers: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub retrieval: RetrievalSettings,
    pub ranking: RankingSettings,
    pub responder: ResponderSettings,
    pub ingest: IngestSettings,
}

impl Settings {
    /// Load settings from `path` and the environment. A given `path` must
    /// exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix("ASKTHERA")
                .prefix_separator("__")
                .separator("__"),
        );

        let mut settings: Settings = builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| RagError::Config(e.to_string()))?;

        settings.apply_env_api_key(std::env::var("OPENAI_API_KEY").ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a TOML string, without consulting the environment.
    pub fn from_toml(source: &str) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| RagError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// `<config dir>/askthera-rag/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("askthera-rag").join("config.toml"))
    }

    fn apply_env_api_key(&mut self, key: Option<String>) {
        let Some(key) = key.filter(|k| !k.is_empty()) else {
            return;
        };
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = Some(key.clone());
        }
        if self.generation.api_key.is_none() {
            self.generation.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.ranking.weights.validate()?;
        self.ranking.trust.validate()?;

        let retrieval = &self.retrieval;
        if retrieval.max_documents == 0 {
            return Err(RagError::Config("retrieval.max_documents must be at least 1".to_string()));
        }
        if retrieval.candidate_pool < retrieval.max_documents {
            return Err(RagError::Config(format!(
                "retrieval.candidate_pool ({}) must not be smaller than retrieval.max_documents ({})",
                retrieval.candidate_pool, retrieval.max_documents
            )));
        }
        if self.embedding.dimensions == 0 {
            return Err(RagError::Config("embedding.dimensions must be positive".to_string()));
        }
        if self.ingest.batch_size == 0 || self.ingest.insert_batch_size == 0 || self.ingest.workers == 0 {
            return Err(RagError::Config(
                "ingest batch sizes and worker count must be positive".to_string(),
            ));
        }
        if self.store.backend == StoreBackend::Memory && self.store.snapshot_path.is_none() {
            return Err(RagError::Config(
                "store.snapshot_path is required for the memory backend".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.retrieval.candidate_pool, 20);
        assert_eq!(settings.retrieval.max_documents, 10);
        assert_eq!(settings.embedding.dimensions, 1536);
        assert_eq!(settings.store.table, "talk");
        assert_eq!(settings.store.metric, DistanceMetric::Cosine);
        assert_eq!(settings.responder.fallback.as_deref(), Some(DEFAULT_FALLBACK));
    }

    #[test]
    fn test_from_toml_overrides() -> anyhow::Result<()> {
        let settings = Settings::from_toml(
            r#"
            [store]
            backend = "memory"
            snapshot_path = "records.json"
            metric = "euclidean"

            [retrieval]
            max_documents = 5

            [ranking.trust]
            default = 0.9
            sources = [{ source = "Counsel Chat", score = 0.6 }]
            "#,
        )?;
        assert_eq!(settings.store.backend, StoreBackend::Memory);
        assert_eq!(settings.store.metric, DistanceMetric::Euclidean);
        assert_eq!(settings.retrieval.max_documents, 5);
        assert_eq!(settings.retrieval.candidate_pool, 20);
        assert_eq!(settings.ranking.trust.score("Counsel Chat"), 0.6);
        assert_eq!(settings.ranking.trust.score("Elsewhere"), 0.9);
        Ok(())
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = Settings::load(Some(dir.path().join("confg.toml").as_path()));
        assert!(matches!(result, Err(RagError::Config(_))));
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let result = Settings::from_toml(
            r#"
            [ranking.weights]
            document = 0.6
            answer = 0.4
            trust = 0.2
            "#,
        );
        assert!(matches!(result, Err(RagError::Config(_))));
    }

    #[test]
    fn test_pool_smaller_than_output_rejected() {
        let mut settings = Settings::default();
        settings.retrieval.candidate_pool = 4;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_memory_backend_needs_snapshot() {
        let mut settings = Settings::default();
        settings.store.backend = StoreBackend::Memory;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_env_api_key_fills_missing_keys_only() {
        let mut settings = Settings::default();
        settings.generation.api_key = Some("gen-key".to_string());
        settings.apply_env_api_key(Some("env-key".to_string()));
        assert_eq!(settings.embedding.api_key.as_deref(), Some("env-key"));
        assert_eq!(settings.generation.api_key.as_deref(), Some("gen-key"));
    }
}

//! Configuration surface, loaded from `~/.megabrain/config.toml` (created
//! with defaults if absent) plus `MEGABRAIN_*` environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{BoostConfiguration, DomainError, FacetConfig, HybridWeights, TransitiveConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchBoostConfig {
    pub content: f32,
    pub entity_name: f32,
    pub doc_summary: f32,
}

impl Default for SearchBoostConfig {
    fn default() -> Self {
        let defaults = BoostConfiguration::default();
        Self {
            content: defaults.content,
            entity_name: defaults.entity_name,
            doc_summary: defaults.doc_summary,
        }
    }
}

impl SearchBoostConfig {
    pub fn into_domain(self) -> BoostConfiguration {
        BoostConfiguration {
            content: self.content,
            entity_name: self.entity_name,
            doc_summary: self.doc_summary,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchHybridConfig {
    #[serde(rename = "keyword-weight")]
    pub keyword_weight: f32,
    #[serde(rename = "vector-weight")]
    pub vector_weight: f32,
}

impl Default for SearchHybridConfig {
    fn default() -> Self {
        let defaults = HybridWeights::default();
        Self {
            keyword_weight: defaults.keyword_weight,
            vector_weight: defaults.vector_weight,
        }
    }
}

impl SearchHybridConfig {
    pub fn into_domain(self) -> Result<HybridWeights, DomainError> {
        HybridWeights::new(self.keyword_weight, self.vector_weight)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFacetsConfig {
    pub limit: usize,
}

impl Default for SearchFacetsConfig {
    fn default() -> Self {
        Self { limit: 10 }
    }
}

impl SearchFacetsConfig {
    pub fn into_domain(self) -> FacetConfig {
        FacetConfig { limit: self.limit }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTransitiveConfig {
    #[serde(rename = "default-depth")]
    pub default_depth: u32,
    #[serde(rename = "max-depth")]
    pub max_depth: u32,
}

impl Default for SearchTransitiveConfig {
    fn default() -> Self {
        Self {
            default_depth: 5,
            max_depth: 10,
        }
    }
}

impl SearchTransitiveConfig {
    pub fn into_domain(self) -> Result<TransitiveConfig, DomainError> {
        let config = TransitiveConfig {
            default_depth: self.default_depth,
            max_depth: self.max_depth,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub boost: SearchBoostConfig,
    pub hybrid: SearchHybridConfig,
    pub facets: SearchFacetsConfig,
    pub transitive: SearchTransitiveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexBatchConfig {
    pub size: usize,
}

impl Default for IndexBatchConfig {
    fn default() -> Self {
        Self { size: 1000 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub batch: IndexBatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    #[serde(rename = "temp-dir")]
    pub temp_dir: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_data_dir()
                .join("clones")
                .to_string_lossy()
                .to_string(),
        }
    }
}

/// Root configuration, mirrors the TOML layout `[search.boost]`,
/// `[search.hybrid]`, `[search.facets]`, `[search.transitive]`,
/// `[index.batch]`, `[ingestion]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MegabrainConfig {
    pub search: SearchConfig,
    pub index: IndexConfig,
    pub ingestion: IngestionConfig,
    /// Directory holding the lexical index, vector store, and state store.
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Vector dimension the embedder and vector index must agree on.
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,
    #[serde(default)]
    pub mock_embeddings: bool,
}

fn default_embedding_dimensions() -> usize {
    384
}

fn default_data_dir() -> PathBuf {
    dirs_home().join(".megabrain")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

impl MegabrainConfig {
    /// Loads `~/.megabrain/config.toml`, writing out the defaults if the
    /// file does not exist yet, then layers `MEGABRAIN_*` environment
    /// variables on top.
    pub fn load() -> Result<Self, DomainError> {
        Self::load_from(&default_data_dir())
    }

    pub fn load_from(data_dir: &Path) -> Result<Self, DomainError> {
        std::fs::create_dir_all(data_dir).map_err(DomainError::Io)?;
        let config_path = data_dir.join("config.toml");

        let mut config: Self = if config_path.exists() {
            let raw = std::fs::read_to_string(&config_path).map_err(DomainError::Io)?;
            toml::from_str(&raw).map_err(|e| DomainError::validation(format!("invalid config.toml: {e}")))?
        } else {
            debug!("no config.toml found at {:?}, writing defaults", config_path);
            let defaults = Self::default();
            let serialized = toml::to_string_pretty(&defaults)
                .map_err(|e| DomainError::internal(format!("failed to serialize default config: {e}")))?;
            std::fs::write(&config_path, serialized).map_err(DomainError::Io)?;
            defaults
        };

        config.data_dir = data_dir.to_path_buf();
        config.apply_env_overrides();
        info!("loaded configuration from {:?}", config_path);
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_f32("MEGABRAIN_SEARCH_BOOST_CONTENT") {
            self.search.boost.content = v;
        }
        if let Some(v) = env_f32("MEGABRAIN_SEARCH_BOOST_ENTITY_NAME") {
            self.search.boost.entity_name = v;
        }
        if let Some(v) = env_f32("MEGABRAIN_SEARCH_BOOST_DOC_SUMMARY") {
            self.search.boost.doc_summary = v;
        }
        if let Some(v) = env_f32("MEGABRAIN_SEARCH_HYBRID_KEYWORD_WEIGHT") {
            self.search.hybrid.keyword_weight = v;
        }
        if let Some(v) = env_f32("MEGABRAIN_SEARCH_HYBRID_VECTOR_WEIGHT") {
            self.search.hybrid.vector_weight = v;
        }
        if let Some(v) = env_usize("MEGABRAIN_SEARCH_FACETS_LIMIT") {
            self.search.facets.limit = v;
        }
        if let Some(v) = env_u32("MEGABRAIN_SEARCH_TRANSITIVE_DEFAULT_DEPTH") {
            self.search.transitive.default_depth = v;
        }
        if let Some(v) = env_u32("MEGABRAIN_SEARCH_TRANSITIVE_MAX_DEPTH") {
            self.search.transitive.max_depth = v;
        }
        if let Some(v) = env_usize("MEGABRAIN_INDEX_BATCH_SIZE") {
            self.index.batch.size = v;
        }
        if let Ok(v) = std::env::var("MEGABRAIN_INGESTION_TEMP_DIR") {
            self.ingestion.temp_dir = v;
        }
        if let Some(v) = env_usize("MEGABRAIN_EMBEDDING_DIMENSIONS") {
            self.embedding_dimensions = v;
        }
        if let Ok(v) = std::env::var("MEGABRAIN_MOCK_EMBEDDINGS") {
            self.mock_embeddings = v == "1" || v.eq_ignore_ascii_case("true");
        }

        if let Err(e) = self.validate() {
            warn!("configuration failed validation after env overrides: {e}");
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.search.boost.clone().into_domain().validate()?;
        self.search.hybrid.clone().into_domain()?;
        self.search.transitive.clone().into_domain()?;
        Ok(())
    }

    pub fn lexical_index_dir(&self) -> PathBuf {
        self.data_dir.join("lexical")
    }

    pub fn vector_db_path(&self) -> PathBuf {
        self.data_dir.join("megabrain.duckdb")
    }

    pub fn clone_root(&self) -> PathBuf {
        PathBuf::from(&self.ingestion.temp_dir)
    }
}

fn env_f32(key: &str) -> Option<f32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_domain_defaults() {
        let config = MegabrainConfig::default();
        assert_eq!(config.search.boost.entity_name, 3.0);
        assert_eq!(config.search.hybrid.keyword_weight, 0.6);
        assert_eq!(config.embedding_dimensions, 384);
    }

    #[test]
    fn load_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = MegabrainConfig::load_from(dir.path()).unwrap();
        assert!(dir.path().join("config.toml").exists());
        assert_eq!(config.index.batch.size, 1000);
    }

    #[test]
    fn invalid_transitive_depth_fails_validation() {
        let mut config = MegabrainConfig::default();
        config.search.transitive.default_depth = 0;
        assert!(config.validate().is_err());
    }
}

//! Engine and table configuration
//!
//! `EngineConfig` carries process-wide defaults; `TableOptions` is given at
//! table creation and inherits any unset field from the engine defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::error::{VectorDbError, VectorDbResult};

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// HNSW construction and search parameters, fixed per index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswParams {
    /// Max neighbors per node on layers above 0
    pub m: usize,
    /// Max neighbors per node on layer 0
    pub m_max0: usize,
    /// Candidate list width during insert
    pub ef_construction: usize,
    /// Default candidate list width during search
    pub ef_search: usize,
    /// Hard cap on the sampled top layer
    pub max_level: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            m_max0: 32,
            ef_construction: 200,
            ef_search: 64,
            max_level: 16,
        }
    }
}

impl HnswParams {
    /// Parameters with `Mmax0 = 2 * M` and the remaining defaults
    pub fn with_m(m: usize) -> Self {
        Self {
            m,
            m_max0: m * 2,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> VectorDbResult<()> {
        if self.m < 2 {
            return Err(VectorDbError::schema(format!("hnsw m must be >= 2, got {}", self.m)));
        }
        if self.m_max0 < self.m {
            return Err(VectorDbError::schema(format!(
                "hnsw m_max0 ({}) must be >= m ({})",
                self.m_max0, self.m
            )));
        }
        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err(VectorDbError::schema("hnsw ef_construction and ef_search must be > 0"));
        }
        Ok(())
    }

    /// Level multiplier `1 / ln(M)`
    pub fn level_multiplier(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }
}

/// Process-wide engine defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// HNSW parameters for tables that don't override them
    pub hnsw: HnswParams,
    /// Default duplicate policy for new tables
    pub allow_duplicates: bool,
    /// Threads used to fan out batched query vectors (0 = rayon default)
    pub search_threads: usize,
    /// Base seed for HNSW level sampling; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hnsw: HnswParams::default(),
            allow_duplicates: true,
            search_threads: 0,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(input: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(input)?;
        config
            .hnsw
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }
}

/// Per-table options supplied at creation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Overrides `EngineConfig::allow_duplicates`
    pub allow_duplicates: Option<bool>,
    /// Key column for the overwrite policy; defaults to the first scalar column
    pub key_column: Option<String>,
    /// Overrides `EngineConfig::hnsw`
    pub hnsw: Option<HnswParams>,
    /// Overrides `EngineConfig::seed`
    pub seed: Option<u64>,
}

impl TableOptions {
    pub fn allow_duplicates(mut self, allow: bool) -> Self {
        self.allow_duplicates = Some(allow);
        self
    }

    pub fn key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = Some(column.into());
        self
    }

    pub fn hnsw(mut self, params: HnswParams) -> Self {
        self.hnsw = Some(params);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Table options with engine defaults applied
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedOptions {
    pub allow_duplicates: bool,
    pub key_column: Option<String>,
    pub hnsw: HnswParams,
    pub seed: Option<u64>,
}

impl ResolvedOptions {
    pub fn resolve(engine: &EngineConfig, options: &TableOptions) -> VectorDbResult<Self> {
        let hnsw = options.hnsw.unwrap_or(engine.hnsw);
        hnsw.validate()?;
        Ok(Self {
            allow_duplicates: options.allow_duplicates.unwrap_or(engine.allow_duplicates),
            key_column: options.key_column.clone(),
            hnsw,
            seed: options.seed.or(engine.seed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_params() {
        let params = HnswParams::default();
        assert_eq!(params.m_max0, 2 * params.m);
        assert!(params.validate().is_ok());
        assert!((params.level_multiplier() - 1.0 / 16f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_params() {
        let mut params = HnswParams::with_m(1);
        assert!(params.validate().is_err());

        params = HnswParams::with_m(8);
        params.m_max0 = 4;
        assert!(params.validate().is_err());

        params = HnswParams::with_m(8);
        params.ef_search = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_yaml_partial_config() {
        let yaml = "allow_duplicates: false\nseed: 42\nhnsw:\n  m: 8\n  m_max0: 16\n";
        let config = EngineConfig::from_yaml_str(yaml).unwrap();
        assert!(!config.allow_duplicates);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.hnsw.m, 8);
        assert_eq!(config.hnsw.ef_construction, 200);
    }

    #[test]
    fn test_yaml_rejects_bad_params() {
        let yaml = "hnsw:\n  m: 16\n  m_max0: 4\n";
        assert!(matches!(EngineConfig::from_yaml_str(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "search_threads: 2").unwrap();
        let config = EngineConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.search_threads, 2);
        assert!(config.allow_duplicates);
    }

    #[test]
    fn test_resolve_options() {
        let engine = EngineConfig {
            seed: Some(7),
            ..EngineConfig::default()
        };
        let resolved = ResolvedOptions::resolve(&engine, &TableOptions::default().allow_duplicates(false)).unwrap();
        assert!(!resolved.allow_duplicates);
        assert_eq!(resolved.seed, Some(7));
        assert_eq!(resolved.hnsw, HnswParams::default());
    }
}

//! Process-wide configuration.
//!
//! Loaded once at process start from TOML (or JSON, via `serde_json`) and
//! treated as immutable thereafter (§5 shared-resource policy: "process-wide,
//! immutable after startup"). Every key enumerated in spec §6 has a field
//! here and a documented default; unknown keys in the source file are
//! rejected by `serde`'s default (strict) deny-unknown-fields is deliberately
//! *not* set so forward-compatible adapters can carry extra keys, but the
//! core never reads anything outside this struct.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LmProviderKind {
    Claude,
    Mock,
    Openai,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    pub provider: LmProviderKind,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            provider: LmProviderKind::Mock,
            model: "mock-1".to_string(),
            max_tokens: 4096,
            temperature: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub version: u32,
    pub pattern_timeout_seconds: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            version: 1,
            pattern_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
    pub wal: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "contractos.db".to_string(),
            wal: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model_id: String,
    pub dim: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: "contractos-embed-v1".to_string(),
            dim: 384,
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub history_limit: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self { history_limit: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub pattern_confidence_floor: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            pattern_confidence_floor: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    pub max_chain_depth: usize,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self { max_chain_depth: 8 }
    }
}

/// Every recognized configuration key from spec §6, grouped by component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub lm: LmConfig,
    pub extraction: ExtractionConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub workspace: WorkspaceConfig,
    pub retrieval: RetrievalConfig,
    pub classifier: ClassifierConfig,
    pub binding: BindingConfig,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_section_6() {
        let cfg = Config::default();
        assert_eq!(cfg.lm.max_tokens, 4096);
        assert!((cfg.lm.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(cfg.workspace.history_limit, 10);
        assert_eq!(cfg.retrieval.top_k, 30);
        assert!((cfg.classifier.pattern_confidence_floor - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.binding.max_chain_depth, 8);
        assert_eq!(cfg.embedding.dim, 384);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg = Config::from_toml_str("[lm]\nprovider = \"openai\"\nmodel = \"gpt-test\"\n").unwrap();
        assert_eq!(cfg.lm.model, "gpt-test");
        assert_eq!(cfg.retrieval.top_k, 30);
    }
}

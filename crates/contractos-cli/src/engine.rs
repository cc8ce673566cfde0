//! Wires the three library crates into one handle the CLI commands share:
//! a `TrustGraphStore` backend, an `EmbeddingIndexRegistry` backed by a
//! companion directory of flat per-document files (spec §6 "Persisted
//! state layout"), and an `LmProvider`.
//!
//! Grounded on the teacher's `legalis-cli` pattern of a single context
//! struct threaded through every command handler
//! (`legalis-cli/src/commands.rs`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use contractos_core::config::{Config, LmProviderKind};
use contractos_llm::embedding_index::{DocumentIndex, EmbeddingIndexRegistry};
use contractos_llm::provider::{LmProvider, MockProvider, RemoteProvider};
use contractos_store::backend::TrustGraphStore;
use contractos_store::memory::MemoryBackend;
use contractos_store::sqlite::SqliteBackend;

/// The CLI's runtime context: one store, one provider, one config, for the
/// lifetime of a single process invocation.
pub struct Engine {
    pub store: Arc<dyn TrustGraphStore>,
    pub provider: Arc<dyn LmProvider>,
    pub config: Config,
    index_dir: PathBuf,
}

impl Engine {
    pub fn open(config: Config) -> Result<Self> {
        let provider: Arc<dyn LmProvider> = match config.lm.provider {
            LmProviderKind::Mock => Arc::new(MockProvider::new()),
            LmProviderKind::Claude | LmProviderKind::Openai | LmProviderKind::Local => {
                match crate::config::lm_api_key() {
                    Some(key) => Arc::new(RemoteProvider::new(key, config.lm.model.clone())),
                    None => Arc::new(MockProvider::new()),
                }
            }
        };
        Self::with_provider(config, provider)
    }

    /// Same as [`Engine::open`] but with an explicit provider, bypassing the
    /// config-driven selection. Used by tests that need a scripted
    /// [`MockProvider`] instead of the unscripted default.
    pub fn with_provider(config: Config, provider: Arc<dyn LmProvider>) -> Result<Self> {
        let store: Arc<dyn TrustGraphStore> = if config.storage.path == ":memory:" {
            Arc::new(MemoryBackend::new())
        } else {
            Arc::new(
                SqliteBackend::open(&config.storage.path, config.storage.wal)
                    .with_context(|| format!("failed to open store at {}", config.storage.path))?,
            )
        };

        let index_dir = index_dir_for(&config.storage.path);
        std::fs::create_dir_all(&index_dir)
            .with_context(|| format!("failed to create embedding index directory {}", index_dir.display()))?;

        Ok(Self { store, provider, config, index_dir })
    }

    fn index_path(&self, document_id: &str) -> PathBuf {
        self.index_dir.join(format!("{document_id}.idx"))
    }

    /// Persists a document's embedding index as a standalone flat-binary
    /// file (spec §6: "a companion directory holding per-document
    /// embedding indexes").
    pub fn save_index(&self, document_id: &str, index: &DocumentIndex) -> Result<()> {
        let bytes = index.to_flat_bytes()?;
        std::fs::write(self.index_path(document_id), bytes)
            .with_context(|| format!("failed to write embedding index for {document_id}"))?;
        Ok(())
    }

    pub fn load_index(&self, document_id: &str) -> Result<Option<DocumentIndex>> {
        let path = self.index_path(document_id);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).with_context(|| format!("failed to read embedding index for {document_id}"))?;
        Ok(Some(DocumentIndex::from_flat_bytes(&bytes)?))
    }

    /// Removes a document's index file (cascade-delete target of spec §6:
    /// "cascade-delete must remove both" database row and index file).
    pub fn delete_index(&self, document_id: &str) -> Result<()> {
        let path = self.index_path(document_id);
        if path.is_file() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Loads every target document's index into a fresh in-memory registry
    /// for one `ask`/`discover` call.
    pub fn load_registry(&self, document_ids: &[String]) -> Result<EmbeddingIndexRegistry> {
        let mut registry = EmbeddingIndexRegistry::new();
        for id in document_ids {
            if let Some(index) = self.load_index(id)? {
                registry.insert(id.clone(), index);
            }
        }
        Ok(registry)
    }
}

fn index_dir_for(storage_path: &str) -> PathBuf {
    if storage_path == ":memory:" {
        return std::env::temp_dir().join("contractos-embeddings-mem");
    }
    let path = Path::new(storage_path);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("contractos");
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    match parent {
        Some(parent) => parent.join(format!("{stem}.embeddings")),
        None => PathBuf::from(format!("{stem}.embeddings")),
    }
}

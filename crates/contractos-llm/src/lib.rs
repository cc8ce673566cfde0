//! LM provider boundary (C9), embedding index (C6), document agent (C7),
//! and discovery subsystem (C10) for ContractOS.
//!
//! This crate owns everything downstream of persistence: turning a
//! document's extraction result into a searchable chunk index, retrieving
//! and enriching evidence for a query, calling out to a language model under
//! a strict citation discipline, and the separate discovery pass that
//! surfaces implicit risk as inferences. `contractos-core` owns the typed
//! model; `contractos-store` owns durability; this crate is the only one
//! that talks to a language model.

pub mod agent;
pub mod cancellation;
pub mod conversation;
pub mod discovery;
pub mod embedding_index;
pub mod provider;

pub use agent::{AnswerRequest, DocumentAgent};
pub use cancellation::{run_with_deadline, CancellationContext};
pub use discovery::{discover, DiscoveryCategory, DiscoveryResult};
pub use embedding_index::{build_chunks, index_document, search, Chunk, ChunkType, DocumentIndex, EmbeddingIndexRegistry, SearchHit};
pub use provider::{CompletionRequest, CompletionResult, LmProvider, Message, MockProvider, RemoteProvider, Role};

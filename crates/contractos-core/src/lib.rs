//! ContractOS Core: the typed knowledge model and deterministic extraction
//! pipeline behind the contract intelligence engine.
//!
//! This crate owns everything upstream of persistence: the four truth-model
//! variants (fact, binding, inference, opinion), the document-source trait
//! boundary (C1), the pattern extractor (C2), the clause classifier (C3),
//! and the binding resolver (C4). Storage lives in `contractos-store`;
//! retrieval, the document agent, and the LM provider boundary live in
//! `contractos-llm`.
//!
//! ## Truth-model discipline
//!
//! Every operation that crosses a component boundary returns one of four
//! typed variants — never an untyped blob:
//!
//! - [`fact::Fact`]: immutable, source-addressable.
//! - [`binding::Binding`]: explicit, no confidence.
//! - [`inference::Inference`]: derived, must cite facts/bindings, carries a
//!   calibrated confidence.
//! - [`inference::Opinion`]: on-demand only, never persisted.

pub mod binding;
pub mod classifier;
pub mod clause;
pub mod config;
pub mod contract;
pub mod cross_reference;
pub mod document_source;
pub mod error;
pub mod extractor;
pub mod fact;
pub mod inference;
pub mod session;

pub use binding::{Binding, BindingScope, BindingType, ResolvedTerm};
pub use clause::{Clause, ClauseFactSlot, ClauseType, ClauseTypeRegistry, ClauseTypeSpec};
pub use config::Config;
pub use contract::{Contract, FileFormat};
pub use cross_reference::CrossReference;
pub use document_source::{DocumentSource, ParsedDocument};
pub use error::{CoreError, CoreResult};
pub use extractor::{extract, ExtractionResult};
pub use fact::{EntityType, Evidence, Fact, FactType};
pub use inference::{Inference, Opinion, ProvenanceChain};
pub use session::{QueryScope, ReasoningSession, SessionStatus, Workspace};

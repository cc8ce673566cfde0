//! The `TrustGraphStore` trait: a typed, pluggable
//! persistence boundary over facts, clauses, bindings, cross-references,
//! slots, contracts, workspaces, and reasoning sessions.
//!
//! Grounded on the teacher's `AuditStorage` trait
//! (`legalis-audit/src/storage.rs`): a small `Send + Sync` trait with one
//! method per read/write shape, implemented by an in-memory backend and a
//! SQLite backend so callers can swap durability without touching the
//! rest of the pipeline.

use contractos_core::clause::ClauseFactSlot;
use contractos_core::{Binding, Clause, ClauseType, Contract, CrossReference, EntityType, ExtractionResult, Fact, FactType, ReasoningSession, Workspace};

use crate::error::StoreResult;

/// Filters accepted by [`TrustGraphStore::get_facts`] (spec §6 `get_facts`
/// filter set: `fact_type`, `entity_type`, pagination).
#[derive(Debug, Clone, Default)]
pub struct FactFilters {
    pub fact_type: Option<FactType>,
    pub entity_type: Option<EntityType>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl FactFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fact_type(mut self, fact_type: FactType) -> Self {
        self.fact_type = Some(fact_type);
        self
    }

    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn with_page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }
}

/// A bundle written atomically by [`TrustGraphStore::insert_extraction_result`]:
/// the pattern extractor's output plus the classifier's slot-filling output,
/// which together replace a document's entire owned fact set (Invariant F3).
#[derive(Debug, Clone, Default)]
pub struct ExtractionWrite {
    pub result: ExtractionResult,
    pub slots: Vec<ClauseFactSlot>,
}

/// The typed persistence boundary.
///
/// *Concurrency model*: single-writer, multi-reader. Backends are
/// `Send + Sync`; implementations serialize writes internally (a `Mutex`
/// writer guard for SQLite, an `RwLock` for the in-memory backend) so a
/// single `&self` reference is enough for every caller — there is no
/// separate writer handle type, matching the teacher's `AuditStorage`
/// pattern of one trait object shared across tasks.
pub trait TrustGraphStore: Send + Sync {
    // -- Contracts -----------------------------------------------------
    fn insert_contract(&self, contract: Contract) -> StoreResult<()>;
    fn get_contract(&self, document_id: &str) -> StoreResult<Contract>;
    fn list_contracts(&self) -> StoreResult<Vec<Contract>>;
    /// Cascades to every owned child entity (facts, clauses, bindings,
    /// cross-refs, slots) and sweeps dangling workspace references, but
    /// never deletes the workspace itself.
    fn delete_contract(&self, document_id: &str) -> StoreResult<()>;
    fn clear_all(&self) -> StoreResult<()>;

    /// Atomic replace: either every child entity lands or none does
    /// (Invariant F3). Implementations additionally mark any session that
    /// targeted this document `stale = true` when it already had a fact set
    ///.
    fn insert_extraction_result(&self, document_id: &str, write: ExtractionWrite) -> StoreResult<()>;

    fn get_facts(&self, document_id: &str, filters: &FactFilters) -> StoreResult<Vec<Fact>>;
    fn get_clauses(&self, document_id: &str, clause_type: Option<ClauseType>) -> StoreResult<Vec<Clause>>;
    fn get_clause(&self, clause_id: &str) -> StoreResult<Clause>;
    fn get_bindings(&self, document_id: &str) -> StoreResult<Vec<Binding>>;
    fn get_cross_refs(&self, clause_id: &str) -> StoreResult<Vec<CrossReference>>;
    fn get_slots(&self, document_id: &str) -> StoreResult<Vec<ClauseFactSlot>>;
    /// `status = missing` only.
    fn get_clause_gaps(&self, document_id: &str) -> StoreResult<Vec<ClauseFactSlot>> {
        Ok(self
            .get_slots(document_id)?
            .into_iter()
            .filter(|s| s.status == contractos_core::clause::SlotStatus::Missing)
            .collect())
    }

    // -- Workspaces ------------------------------------------------------
    fn insert_workspace(&self, workspace: Workspace) -> StoreResult<()>;
    fn get_workspace(&self, workspace_id: &str) -> StoreResult<Workspace>;
    fn list_workspaces(&self) -> StoreResult<Vec<Workspace>>;
    fn add_document_to_workspace(&self, workspace_id: &str, document_id: &str) -> StoreResult<()>;
    fn remove_document_from_workspace(&self, workspace_id: &str, document_id: &str) -> StoreResult<()>;

    // -- Sessions --------------------------------------------------------
    fn insert_session(&self, session: ReasoningSession) -> StoreResult<()>;
    /// Sessions are append-only: once `status == Completed`, no field may
    /// change. Implementations must reject an update that would mutate a
    /// completed session.
    fn update_session(&self, session: ReasoningSession) -> StoreResult<()>;
    fn get_session(&self, session_id: &str) -> StoreResult<ReasoningSession>;
    /// Most-recent-first, paginated, cap default 20.
    fn list_sessions(&self, workspace_id: &str, limit: usize) -> StoreResult<Vec<ReasoningSession>>;
    /// Explicit user action; cascades to session-owned inferences.
    fn clear_sessions(&self, workspace_id: &str) -> StoreResult<()>;
}

//! In-memory `TrustGraphStore` backend.
//!
//! Grounded on `legalis-audit/src/storage/memory.rs`'s `Arc<RwLock<Vec<..>>>`
//! pattern, generalized to the several entity tables the TrustGraph needs.
//! Snapshot-isolated reads: every read clones out of the lock rather than
//! holding a reference across a caller boundary, so a reader never observes
//! a write half-applied.

use std::collections::HashMap;
use std::sync::RwLock;

use contractos_core::clause::ClauseFactSlot;
use contractos_core::session::SessionStatus;
use contractos_core::{Binding, Clause, ClauseType, Contract, CrossReference, Fact, ReasoningSession, Workspace};

use crate::backend::{ExtractionWrite, FactFilters, TrustGraphStore};
use crate::error::{StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    contracts: HashMap<String, Contract>,
    facts: HashMap<String, Fact>,
    facts_by_doc: HashMap<String, Vec<String>>,
    clauses: HashMap<String, Clause>,
    clauses_by_doc: HashMap<String, Vec<String>>,
    bindings_by_doc: HashMap<String, Vec<Binding>>,
    cross_refs_by_clause: HashMap<String, Vec<CrossReference>>,
    slots_by_doc: HashMap<String, Vec<ClauseFactSlot>>,
    workspaces: HashMap<String, Workspace>,
    sessions: HashMap<String, ReasoningSession>,
    sessions_by_workspace: HashMap<String, Vec<String>>,
}

/// An in-memory backend. Suitable for tests and single-process deployments
/// that do not need cross-restart durability.
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }
}

impl TrustGraphStore for MemoryBackend {
    fn insert_contract(&self, contract: Contract) -> StoreResult<()> {
        let mut t = self.write()?;
        t.contracts.insert(contract.document_id.clone(), contract);
        Ok(())
    }

    fn get_contract(&self, document_id: &str) -> StoreResult<Contract> {
        let t = self.read()?;
        t.contracts
            .get(document_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("contract {document_id}")))
    }

    fn list_contracts(&self) -> StoreResult<Vec<Contract>> {
        let t = self.read()?;
        let mut out: Vec<Contract> = t.contracts.values().cloned().collect();
        out.sort_by(|a, b| a.indexed_at.cmp(&b.indexed_at));
        Ok(out)
    }

    fn delete_contract(&self, document_id: &str) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.contracts.remove(document_id).is_none() {
            return Err(StoreError::NotFound(format!("contract {document_id}")));
        }
        if let Some(fact_ids) = t.facts_by_doc.remove(document_id) {
            for id in fact_ids {
                t.facts.remove(&id);
            }
        }
        if let Some(clause_ids) = t.clauses_by_doc.remove(document_id) {
            for id in &clause_ids {
                t.clauses.remove(id);
                t.cross_refs_by_clause.remove(id);
            }
        }
        t.bindings_by_doc.remove(document_id);
        t.slots_by_doc.remove(document_id);

        // Workspaces reference, never own: drop the stale reference but
        // leave the workspace (and its sessions) intact.
        for ws in t.workspaces.values_mut() {
            ws.indexed_document_ids.retain(|id| id != document_id);
        }
        // Sessions that targeted this document are marked stale, never
        // deleted (append-only invariant, SPEC_FULL.md §D).
        let stale_ids: Vec<String> = t
            .sessions
            .values()
            .filter(|s| s.target_document_ids.iter().any(|d| d == document_id))
            .map(|s| s.session_id.clone())
            .collect();
        for id in stale_ids {
            if let Some(s) = t.sessions.get_mut(&id) {
                s.stale = true;
            }
        }
        Ok(())
    }

    fn clear_all(&self) -> StoreResult<()> {
        let mut t = self.write()?;
        *t = Tables::default();
        Ok(())
    }

    fn insert_extraction_result(&self, document_id: &str, write: ExtractionWrite) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.contracts.contains_key(document_id) {
            return Err(StoreError::Integrity(format!(
                "cannot extract into unknown contract {document_id}"
            )));
        }

        // Invariant F3: delete the entire existing fact set before rewrite.
        let was_previously_indexed = t.facts_by_doc.contains_key(document_id);
        if let Some(old_fact_ids) = t.facts_by_doc.remove(document_id) {
            for id in old_fact_ids {
                t.facts.remove(&id);
            }
        }
        if let Some(old_clause_ids) = t.clauses_by_doc.remove(document_id) {
            for id in &old_clause_ids {
                t.clauses.remove(id);
                t.cross_refs_by_clause.remove(id);
            }
        }
        t.bindings_by_doc.remove(document_id);
        t.slots_by_doc.remove(document_id);

        let ExtractionWrite { result, slots } = write;

        for fact in result.facts {
            if fact.document_id != document_id {
                return Err(StoreError::Integrity(format!(
                    "fact {} targets document {} while extraction result is for {document_id}",
                    fact.fact_id, fact.document_id
                )));
            }
            t.facts_by_doc.entry(document_id.to_string()).or_default().push(fact.fact_id.clone());
            t.facts.insert(fact.fact_id.clone(), fact);
        }
        for clause in result.clauses {
            if clause.document_id != document_id {
                return Err(StoreError::Integrity(format!(
                    "clause {} targets document {} while extraction result is for {document_id}",
                    clause.clause_id, clause.document_id
                )));
            }
            if !t.facts.contains_key(&clause.fact_id) {
                return Err(StoreError::Integrity(format!(
                    "clause {} references missing clause-span fact {}",
                    clause.clause_id, clause.fact_id
                )));
            }
            t.clauses_by_doc.entry(document_id.to_string()).or_default().push(clause.clause_id.clone());
            t.clauses.insert(clause.clause_id.clone(), clause);
        }
        let mut bindings = result.bindings;
        bindings.extend(result.aliases);
        t.bindings_by_doc.insert(document_id.to_string(), bindings);

        for xref in result.cross_refs {
            t.cross_refs_by_clause.entry(xref.source_clause_id.clone()).or_default().push(xref);
        }
        t.slots_by_doc.insert(document_id.to_string(), slots);

        if was_previously_indexed {
            let stale_ids: Vec<String> = t
                .sessions
                .values()
                .filter(|s| s.target_document_ids.iter().any(|d| d == document_id))
                .map(|s| s.session_id.clone())
                .collect();
            for id in stale_ids {
                if let Some(s) = t.sessions.get_mut(&id) {
                    s.stale = true;
                }
            }
        }
        Ok(())
    }

    fn get_facts(&self, document_id: &str, filters: &FactFilters) -> StoreResult<Vec<Fact>> {
        let t = self.read()?;
        let ids = t.facts_by_doc.get(document_id).cloned().unwrap_or_default();
        let mut facts: Vec<Fact> = ids.iter().filter_map(|id| t.facts.get(id).cloned()).collect();
        facts.sort_by_key(|f| f.evidence.char_start);
        if let Some(ft) = filters.fact_type {
            facts.retain(|f| f.fact_type == ft);
        }
        if let Some(et) = filters.entity_type {
            facts.retain(|f| f.entity_type == Some(et));
        }
        let facts = facts.into_iter().skip(filters.offset);
        Ok(match filters.limit {
            Some(n) => facts.take(n).collect(),
            None => facts.collect(),
        })
    }

    fn get_clauses(&self, document_id: &str, clause_type: Option<ClauseType>) -> StoreResult<Vec<Clause>> {
        let t = self.read()?;
        let ids = t.clauses_by_doc.get(document_id).cloned().unwrap_or_default();
        let mut clauses: Vec<Clause> = ids.iter().filter_map(|id| t.clauses.get(id).cloned()).collect();
        if let Some(ct) = clause_type {
            clauses.retain(|c| c.clause_type == ct);
        }
        Ok(clauses)
    }

    fn get_clause(&self, clause_id: &str) -> StoreResult<Clause> {
        let t = self.read()?;
        t.clauses
            .get(clause_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("clause {clause_id}")))
    }

    fn get_bindings(&self, document_id: &str) -> StoreResult<Vec<Binding>> {
        let t = self.read()?;
        Ok(t.bindings_by_doc.get(document_id).cloned().unwrap_or_default())
    }

    fn get_cross_refs(&self, clause_id: &str) -> StoreResult<Vec<CrossReference>> {
        let t = self.read()?;
        Ok(t.cross_refs_by_clause.get(clause_id).cloned().unwrap_or_default())
    }

    fn get_slots(&self, document_id: &str) -> StoreResult<Vec<ClauseFactSlot>> {
        let t = self.read()?;
        Ok(t.slots_by_doc.get(document_id).cloned().unwrap_or_default())
    }

    fn insert_workspace(&self, workspace: Workspace) -> StoreResult<()> {
        let mut t = self.write()?;
        t.workspaces.insert(workspace.workspace_id.clone(), workspace);
        Ok(())
    }

    fn get_workspace(&self, workspace_id: &str) -> StoreResult<Workspace> {
        let t = self.read()?;
        t.workspaces
            .get(workspace_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("workspace {workspace_id}")))
    }

    fn list_workspaces(&self) -> StoreResult<Vec<Workspace>> {
        let t = self.read()?;
        Ok(t.workspaces.values().cloned().collect())
    }

    fn add_document_to_workspace(&self, workspace_id: &str, document_id: &str) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.contracts.contains_key(document_id) {
            return Err(StoreError::NotFound(format!("contract {document_id}")));
        }
        let ws = t
            .workspaces
            .get_mut(workspace_id)
            .ok_or_else(|| StoreError::NotFound(format!("workspace {workspace_id}")))?;
        if !ws.indexed_document_ids.iter().any(|d| d == document_id) {
            ws.indexed_document_ids.push(document_id.to_string());
        }
        ws.last_accessed_at = chrono::Utc::now();
        Ok(())
    }

    fn remove_document_from_workspace(&self, workspace_id: &str, document_id: &str) -> StoreResult<()> {
        let mut t = self.write()?;
        let ws = t
            .workspaces
            .get_mut(workspace_id)
            .ok_or_else(|| StoreError::NotFound(format!("workspace {workspace_id}")))?;
        ws.indexed_document_ids.retain(|d| d != document_id);
        ws.last_accessed_at = chrono::Utc::now();
        Ok(())
    }

    fn insert_session(&self, session: ReasoningSession) -> StoreResult<()> {
        let mut t = self.write()?;
        t.sessions_by_workspace
            .entry(session.workspace_id.clone())
            .or_default()
            .push(session.session_id.clone());
        t.sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    fn update_session(&self, session: ReasoningSession) -> StoreResult<()> {
        let mut t = self.write()?;
        if let Some(existing) = t.sessions.get(&session.session_id) {
            if existing.status == SessionStatus::Completed {
                return Err(StoreError::Integrity(format!(
                    "session {} is completed and append-only",
                    session.session_id
                )));
            }
        } else {
            return Err(StoreError::NotFound(format!("session {}", session.session_id)));
        }
        t.sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    fn get_session(&self, session_id: &str) -> StoreResult<ReasoningSession> {
        let t = self.read()?;
        t.sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))
    }

    fn list_sessions(&self, workspace_id: &str, limit: usize) -> StoreResult<Vec<ReasoningSession>> {
        let t = self.read()?;
        let ids = t.sessions_by_workspace.get(workspace_id).cloned().unwrap_or_default();
        let mut sessions: Vec<ReasoningSession> = ids.iter().filter_map(|id| t.sessions.get(id).cloned()).collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    fn clear_sessions(&self, workspace_id: &str) -> StoreResult<()> {
        let mut t = self.write()?;
        if let Some(ids) = t.sessions_by_workspace.remove(workspace_id) {
            for id in ids {
                t.sessions.remove(&id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractos_core::contract::FileFormat;
    use contractos_core::fact::{Evidence, FactType};

    fn contract(id: &str) -> Contract {
        Contract::new(id, "Test Agreement", FileFormat::Docx, "hash123", 100, 1)
    }

    fn fact(id: &str, doc: &str, text: &str) -> Fact {
        let ev = Evidence::new(text, 0, text.len(), "para", "root").unwrap();
        Fact::new(id, doc, FactType::Heading, text, ev)
    }

    #[test]
    fn insert_and_get_contract_round_trips() {
        let store = MemoryBackend::new();
        store.insert_contract(contract("doc1")).unwrap();
        let got = store.get_contract("doc1").unwrap();
        assert_eq!(got.document_id, "doc1");
    }

    #[test]
    fn delete_contract_cascades_to_facts() {
        let store = MemoryBackend::new();
        store.insert_contract(contract("doc1")).unwrap();
        let mut write = ExtractionWrite::default();
        write.result.facts.push(fact("fact-1", "doc1", "1. Termination"));
        store.insert_extraction_result("doc1", write).unwrap();
        assert_eq!(store.get_facts("doc1", &FactFilters::default()).unwrap().len(), 1);

        store.delete_contract("doc1").unwrap();
        assert!(store.get_contract("doc1").is_err());
        assert!(store.get_facts("doc1", &FactFilters::default()).unwrap().is_empty());
    }

    #[test]
    fn delete_contract_drops_workspace_reference_without_deleting_workspace() {
        let store = MemoryBackend::new();
        store.insert_contract(contract("doc1")).unwrap();
        store.insert_workspace(Workspace::new("ws1", "Team")).unwrap();
        store.add_document_to_workspace("ws1", "doc1").unwrap();

        store.delete_contract("doc1").unwrap();

        let ws = store.get_workspace("ws1").unwrap();
        assert!(ws.indexed_document_ids.is_empty());
    }

    #[test]
    fn re_extraction_replaces_fact_set_atomically() {
        let store = MemoryBackend::new();
        store.insert_contract(contract("doc1")).unwrap();
        let mut w1 = ExtractionWrite::default();
        w1.result.facts.push(fact("fact-1", "doc1", "Old heading"));
        store.insert_extraction_result("doc1", w1).unwrap();

        let mut w2 = ExtractionWrite::default();
        w2.result.facts.push(fact("fact-2", "doc1", "New heading"));
        store.insert_extraction_result("doc1", w2).unwrap();

        let facts = store.get_facts("doc1", &FactFilters::default()).unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].fact_id, "fact-2");
    }

    #[test]
    fn re_extraction_marks_existing_sessions_stale() {
        let store = MemoryBackend::new();
        store.insert_contract(contract("doc1")).unwrap();
        let mut w1 = ExtractionWrite::default();
        w1.result.facts.push(fact("fact-1", "doc1", "Old heading"));
        store.insert_extraction_result("doc1", w1).unwrap();

        let session = ReasoningSession::new("s1", "ws1", "who are the parties?", contractos_core::session::QueryScope::Single, vec!["doc1".to_string()]);
        store.insert_session(session).unwrap();

        let mut w2 = ExtractionWrite::default();
        w2.result.facts.push(fact("fact-2", "doc1", "New heading"));
        store.insert_extraction_result("doc1", w2).unwrap();

        assert!(store.get_session("s1").unwrap().stale);
    }

    #[test]
    fn completed_session_is_append_only() {
        let store = MemoryBackend::new();
        let mut session = ReasoningSession::new("s1", "ws1", "q", contractos_core::session::QueryScope::Single, vec![]);
        store.insert_session(session.clone()).unwrap();
        session.status = SessionStatus::Completed;
        store.update_session(session.clone()).unwrap();

        session.query_text = "mutated".to_string();
        let err = store.update_session(session).unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
    }

    #[test]
    fn list_sessions_is_most_recent_first_and_capped() {
        let store = MemoryBackend::new();
        for i in 0..3 {
            let session = ReasoningSession::new(format!("s{i}"), "ws1", "q", contractos_core::session::QueryScope::Single, vec![]);
            store.insert_session(session).unwrap();
        }
        let sessions = store.list_sessions("ws1", 2).unwrap();
        assert_eq!(sessions.len(), 2);
    }
}

//! SQLite-backed `TrustGraphStore` (spec §4.5: "relational store with
//! foreign keys... Atomicity via transactions with write-ahead logging").
//!
//! Grounded on `legalis-audit/src/storage/sqlite.rs`: a single
//! `Arc<Mutex<Connection>>` guarding the one writer, `initialize_schema`
//! creating tables and indexes idempotently. Each entity is a typed row for
//! its indexed columns (`document_id`, `fact_type`, `entity_type`,
//! `clause_id`, `term`, `workspace_id` + `started_at`) with the full value
//! serialized as a JSON payload column — round-tripped through the same
//! `serde` derives the in-memory backend uses, so both backends agree on
//! wire shape.

use std::path::Path;
use std::sync::{Arc, Mutex};

use contractos_core::clause::ClauseFactSlot;
use contractos_core::{Binding, Clause, ClauseType, Contract, CrossReference, Fact, ReasoningSession, Workspace};
use rusqlite::{params, Connection, OptionalExtension};

use crate::backend::{ExtractionWrite, FactFilters, TrustGraphStore};
use crate::error::{StoreError, StoreResult};

/// A SQLite-backed store. One process owns the writer; readers share the
/// same connection behind a mutex, consistent with the spec's "single-writer,
/// multi-process deployments route writes through one process" model (§4.5)
/// collapsed to the simplest possible single-process form.
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    pub fn open<P: AsRef<Path>>(path: P, wal: bool) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let backend = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        backend.initialize_schema(wal)?;
        Ok(backend)
    }

    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let backend = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        backend.initialize_schema(false)?;
        Ok(backend)
    }

    fn initialize_schema(&self, wal: bool) -> StoreResult<()> {
        let conn = self.lock()?;
        if wal {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS contracts (
                document_id TEXT PRIMARY KEY,
                indexed_at  TEXT NOT NULL,
                payload     TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS facts (
                fact_id     TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                fact_type   TEXT NOT NULL,
                entity_type TEXT,
                char_start  INTEGER NOT NULL,
                payload     TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_facts_doc ON facts(document_id);
            CREATE INDEX IF NOT EXISTS idx_facts_doc_type ON facts(document_id, fact_type);
            CREATE INDEX IF NOT EXISTS idx_facts_doc_entity ON facts(document_id, entity_type);

            CREATE TABLE IF NOT EXISTS clauses (
                clause_id   TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                clause_type TEXT NOT NULL,
                payload     TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_clauses_doc ON clauses(document_id);

            CREATE TABLE IF NOT EXISTS bindings (
                document_id TEXT NOT NULL,
                term        TEXT NOT NULL,
                payload     TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_bindings_doc_term ON bindings(document_id, term);

            CREATE TABLE IF NOT EXISTS cross_refs (
                reference_id     TEXT PRIMARY KEY,
                source_clause_id TEXT NOT NULL,
                payload          TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_xrefs_clause ON cross_refs(source_clause_id);

            CREATE TABLE IF NOT EXISTS slots (
                document_id TEXT NOT NULL,
                clause_id   TEXT NOT NULL,
                payload     TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_slots_doc ON slots(document_id);

            CREATE TABLE IF NOT EXISTS workspaces (
                workspace_id TEXT PRIMARY KEY,
                payload      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                session_id   TEXT PRIMARY KEY,
                workspace_id TEXT NOT NULL,
                started_at   TEXT NOT NULL,
                status       TEXT NOT NULL,
                payload      TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_ws_started ON sessions(workspace_id, started_at DESC);
            ",
        )?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> StoreResult<String> {
    Ok(serde_json::to_string(value)?)
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str) -> StoreResult<T> {
    Ok(serde_json::from_str(s)?)
}

impl TrustGraphStore for SqliteBackend {
    fn insert_contract(&self, contract: Contract) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO contracts (document_id, indexed_at, payload) VALUES (?1, ?2, ?3)
             ON CONFLICT(document_id) DO UPDATE SET indexed_at = excluded.indexed_at, payload = excluded.payload",
            params![contract.document_id, contract.indexed_at.to_rfc3339(), to_json(&contract)?],
        )?;
        Ok(())
    }

    fn get_contract(&self, document_id: &str) -> StoreResult<Contract> {
        let conn = self.lock()?;
        let payload: Option<String> = conn
            .query_row("SELECT payload FROM contracts WHERE document_id = ?1", params![document_id], |r| r.get(0))
            .optional()?;
        match payload {
            Some(p) => from_json(&p),
            None => Err(StoreError::NotFound(format!("contract {document_id}"))),
        }
    }

    fn list_contracts(&self) -> StoreResult<Vec<Contract>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT payload FROM contracts ORDER BY indexed_at ASC")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(from_json(&row?)?);
        }
        Ok(out)
    }

    fn delete_contract(&self, document_id: &str) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute("DELETE FROM contracts WHERE document_id = ?1", params![document_id])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("contract {document_id}")));
        }
        tx.execute("DELETE FROM facts WHERE document_id = ?1", params![document_id])?;
        let clause_ids: Vec<String> = {
            let mut stmt = tx.prepare("SELECT clause_id FROM clauses WHERE document_id = ?1")?;
            let rows = stmt.query_map(params![document_id], |r| r.get::<_, String>(0))?;
            rows.collect::<Result<_, _>>()?
        };
        tx.execute("DELETE FROM clauses WHERE document_id = ?1", params![document_id])?;
        for clause_id in &clause_ids {
            tx.execute("DELETE FROM cross_refs WHERE source_clause_id = ?1", params![clause_id])?;
        }
        tx.execute("DELETE FROM bindings WHERE document_id = ?1", params![document_id])?;
        tx.execute("DELETE FROM slots WHERE document_id = ?1", params![document_id])?;

        // Sweep dangling workspace references.
        let ws_rows: Vec<(String, String)> = {
            let mut stmt = tx.prepare("SELECT workspace_id, payload FROM workspaces")?;
            let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
            rows.collect::<Result<_, _>>()?
        };
        for (ws_id, payload) in ws_rows {
            let mut ws: Workspace = from_json(&payload)?;
            let before = ws.indexed_document_ids.len();
            ws.indexed_document_ids.retain(|d| d != document_id);
            if ws.indexed_document_ids.len() != before {
                tx.execute(
                    "UPDATE workspaces SET payload = ?2 WHERE workspace_id = ?1",
                    params![ws_id, to_json(&ws)?],
                )?;
            }
        }

        mark_sessions_stale(&tx, document_id)?;
        tx.commit()?;
        Ok(())
    }

    fn clear_all(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "DELETE FROM contracts; DELETE FROM facts; DELETE FROM clauses; DELETE FROM bindings;
             DELETE FROM cross_refs; DELETE FROM slots; DELETE FROM workspaces; DELETE FROM sessions;",
        )?;
        Ok(())
    }

    fn insert_extraction_result(&self, document_id: &str, write: ExtractionWrite) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let exists: Option<i64> = tx
            .query_row("SELECT 1 FROM contracts WHERE document_id = ?1", params![document_id], |r| r.get(0))
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::Integrity(format!("cannot extract into unknown contract {document_id}")));
        }
        let was_previously_indexed: Option<i64> = tx
            .query_row("SELECT 1 FROM facts WHERE document_id = ?1 LIMIT 1", params![document_id], |r| r.get(0))
            .optional()?;

        tx.execute("DELETE FROM facts WHERE document_id = ?1", params![document_id])?;
        let old_clause_ids: Vec<String> = {
            let mut stmt = tx.prepare("SELECT clause_id FROM clauses WHERE document_id = ?1")?;
            let rows = stmt.query_map(params![document_id], |r| r.get::<_, String>(0))?;
            rows.collect::<Result<_, _>>()?
        };
        tx.execute("DELETE FROM clauses WHERE document_id = ?1", params![document_id])?;
        for clause_id in &old_clause_ids {
            tx.execute("DELETE FROM cross_refs WHERE source_clause_id = ?1", params![clause_id])?;
        }
        tx.execute("DELETE FROM bindings WHERE document_id = ?1", params![document_id])?;
        tx.execute("DELETE FROM slots WHERE document_id = ?1", params![document_id])?;

        let ExtractionWrite { result, slots } = write;

        for fact in &result.facts {
            if fact.document_id != document_id {
                return Err(StoreError::Integrity(format!(
                    "fact {} targets document {} while extraction result is for {document_id}",
                    fact.fact_id, fact.document_id
                )));
            }
            tx.execute(
                "INSERT INTO facts (fact_id, document_id, fact_type, entity_type, char_start, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    fact.fact_id,
                    fact.document_id,
                    format!("{:?}", fact.fact_type),
                    fact.entity_type.map(|e| format!("{e:?}")),
                    fact.evidence.char_start as i64,
                    to_json(fact)?,
                ],
            )?;
        }
        let fact_ids: std::collections::HashSet<&str> = result.facts.iter().map(|f| f.fact_id.as_str()).collect();
        for clause in &result.clauses {
            if clause.document_id != document_id {
                return Err(StoreError::Integrity(format!(
                    "clause {} targets document {} while extraction result is for {document_id}",
                    clause.clause_id, clause.document_id
                )));
            }
            if !fact_ids.contains(clause.fact_id.as_str()) {
                return Err(StoreError::Integrity(format!(
                    "clause {} references missing clause-span fact {}",
                    clause.clause_id, clause.fact_id
                )));
            }
            tx.execute(
                "INSERT INTO clauses (clause_id, document_id, clause_type, payload) VALUES (?1, ?2, ?3, ?4)",
                params![clause.clause_id, clause.document_id, clause.clause_type.to_string(), to_json(clause)?],
            )?;
        }
        let mut bindings = result.bindings;
        bindings.extend(result.aliases);
        for binding in &bindings {
            tx.execute(
                "INSERT INTO bindings (document_id, term, payload) VALUES (?1, ?2, ?3)",
                params![document_id, binding.term, to_json(binding)?],
            )?;
        }
        for xref in &result.cross_refs {
            tx.execute(
                "INSERT INTO cross_refs (reference_id, source_clause_id, payload) VALUES (?1, ?2, ?3)",
                params![xref.reference_id, xref.source_clause_id, to_json(xref)?],
            )?;
        }
        for slot in &slots {
            tx.execute(
                "INSERT INTO slots (document_id, clause_id, payload) VALUES (?1, ?2, ?3)",
                params![document_id, slot.clause_id, to_json(slot)?],
            )?;
        }

        if was_previously_indexed.is_some() {
            mark_sessions_stale(&tx, document_id)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_facts(&self, document_id: &str, filters: &FactFilters) -> StoreResult<Vec<Fact>> {
        let conn = self.lock()?;
        let mut sql = "SELECT payload FROM facts WHERE document_id = ?1".to_string();
        if filters.fact_type.is_some() {
            sql.push_str(" AND fact_type = ?2");
        }
        if filters.entity_type.is_some() {
            sql.push_str(if filters.fact_type.is_some() { " AND entity_type = ?3" } else { " AND entity_type = ?2" });
        }
        sql.push_str(" ORDER BY char_start ASC");

        let mut stmt = conn.prepare(&sql)?;
        let ft = filters.fact_type.map(|t| format!("{t:?}"));
        let et = filters.entity_type.map(|t| format!("{t:?}"));
        let payloads: Vec<String> = match (&ft, &et) {
            (Some(ft), Some(et)) => stmt
                .query_map(params![document_id, ft, et], |r| r.get::<_, String>(0))?
                .collect::<Result<_, _>>()?,
            (Some(ft), None) => stmt
                .query_map(params![document_id, ft], |r| r.get::<_, String>(0))?
                .collect::<Result<_, _>>()?,
            (None, Some(et)) => stmt
                .query_map(params![document_id, et], |r| r.get::<_, String>(0))?
                .collect::<Result<_, _>>()?,
            (None, None) => stmt
                .query_map(params![document_id], |r| r.get::<_, String>(0))?
                .collect::<Result<_, _>>()?,
        };
        let mut facts: Vec<Fact> = payloads.iter().map(|p| from_json(p)).collect::<StoreResult<_>>()?;
        if filters.offset > 0 {
            facts = facts.into_iter().skip(filters.offset).collect();
        }
        if let Some(limit) = filters.limit {
            facts.truncate(limit);
        }
        Ok(facts)
    }

    fn get_clauses(&self, document_id: &str, clause_type: Option<ClauseType>) -> StoreResult<Vec<Clause>> {
        let conn = self.lock()?;
        let payloads: Vec<String> = match clause_type {
            Some(ct) => {
                let mut stmt = conn.prepare("SELECT payload FROM clauses WHERE document_id = ?1 AND clause_type = ?2")?;
                stmt.query_map(params![document_id, ct.to_string()], |r| r.get::<_, String>(0))?.collect::<Result<_, _>>()?
            }
            None => {
                let mut stmt = conn.prepare("SELECT payload FROM clauses WHERE document_id = ?1")?;
                stmt.query_map(params![document_id], |r| r.get::<_, String>(0))?.collect::<Result<_, _>>()?
            }
        };
        payloads.iter().map(|p| from_json(p)).collect()
    }

    fn get_clause(&self, clause_id: &str) -> StoreResult<Clause> {
        let conn = self.lock()?;
        let payload: Option<String> = conn
            .query_row("SELECT payload FROM clauses WHERE clause_id = ?1", params![clause_id], |r| r.get(0))
            .optional()?;
        match payload {
            Some(p) => from_json(&p),
            None => Err(StoreError::NotFound(format!("clause {clause_id}"))),
        }
    }

    fn get_bindings(&self, document_id: &str) -> StoreResult<Vec<Binding>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT payload FROM bindings WHERE document_id = ?1")?;
        let payloads: Vec<String> = stmt.query_map(params![document_id], |r| r.get::<_, String>(0))?.collect::<Result<_, _>>()?;
        payloads.iter().map(|p| from_json(p)).collect()
    }

    fn get_cross_refs(&self, clause_id: &str) -> StoreResult<Vec<CrossReference>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT payload FROM cross_refs WHERE source_clause_id = ?1")?;
        let payloads: Vec<String> = stmt.query_map(params![clause_id], |r| r.get::<_, String>(0))?.collect::<Result<_, _>>()?;
        payloads.iter().map(|p| from_json(p)).collect()
    }

    fn get_slots(&self, document_id: &str) -> StoreResult<Vec<ClauseFactSlot>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT payload FROM slots WHERE document_id = ?1")?;
        let payloads: Vec<String> = stmt.query_map(params![document_id], |r| r.get::<_, String>(0))?.collect::<Result<_, _>>()?;
        payloads.iter().map(|p| from_json(p)).collect()
    }

    fn insert_workspace(&self, workspace: Workspace) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO workspaces (workspace_id, payload) VALUES (?1, ?2)
             ON CONFLICT(workspace_id) DO UPDATE SET payload = excluded.payload",
            params![workspace.workspace_id, to_json(&workspace)?],
        )?;
        Ok(())
    }

    fn get_workspace(&self, workspace_id: &str) -> StoreResult<Workspace> {
        let conn = self.lock()?;
        let payload: Option<String> = conn
            .query_row("SELECT payload FROM workspaces WHERE workspace_id = ?1", params![workspace_id], |r| r.get(0))
            .optional()?;
        match payload {
            Some(p) => from_json(&p),
            None => Err(StoreError::NotFound(format!("workspace {workspace_id}"))),
        }
    }

    fn list_workspaces(&self) -> StoreResult<Vec<Workspace>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT payload FROM workspaces")?;
        let payloads: Vec<String> = stmt.query_map([], |r| r.get::<_, String>(0))?.collect::<Result<_, _>>()?;
        payloads.iter().map(|p| from_json(p)).collect()
    }

    fn add_document_to_workspace(&self, workspace_id: &str, document_id: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        let exists: Option<i64> = conn
            .query_row("SELECT 1 FROM contracts WHERE document_id = ?1", params![document_id], |r| r.get(0))
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("contract {document_id}")));
        }
        let payload: Option<String> = conn
            .query_row("SELECT payload FROM workspaces WHERE workspace_id = ?1", params![workspace_id], |r| r.get(0))
            .optional()?;
        let mut ws: Workspace = match payload {
            Some(p) => from_json(&p)?,
            None => return Err(StoreError::NotFound(format!("workspace {workspace_id}"))),
        };
        if !ws.indexed_document_ids.iter().any(|d| d == document_id) {
            ws.indexed_document_ids.push(document_id.to_string());
        }
        ws.last_accessed_at = chrono::Utc::now();
        conn.execute(
            "UPDATE workspaces SET payload = ?2 WHERE workspace_id = ?1",
            params![workspace_id, to_json(&ws)?],
        )?;
        Ok(())
    }

    fn remove_document_from_workspace(&self, workspace_id: &str, document_id: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        let payload: Option<String> = conn
            .query_row("SELECT payload FROM workspaces WHERE workspace_id = ?1", params![workspace_id], |r| r.get(0))
            .optional()?;
        let mut ws: Workspace = match payload {
            Some(p) => from_json(&p)?,
            None => return Err(StoreError::NotFound(format!("workspace {workspace_id}"))),
        };
        ws.indexed_document_ids.retain(|d| d != document_id);
        ws.last_accessed_at = chrono::Utc::now();
        conn.execute(
            "UPDATE workspaces SET payload = ?2 WHERE workspace_id = ?1",
            params![workspace_id, to_json(&ws)?],
        )?;
        Ok(())
    }

    fn insert_session(&self, session: ReasoningSession) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sessions (session_id, workspace_id, started_at, status, payload) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.session_id,
                session.workspace_id,
                session.started_at.to_rfc3339(),
                format!("{:?}", session.status),
                to_json(&session)?,
            ],
        )?;
        Ok(())
    }

    fn update_session(&self, session: ReasoningSession) -> StoreResult<()> {
        let conn = self.lock()?;
        let existing: Option<String> = conn
            .query_row("SELECT status FROM sessions WHERE session_id = ?1", params![session.session_id], |r| r.get(0))
            .optional()?;
        match existing.as_deref() {
            Some("Completed") => {
                return Err(StoreError::Integrity(format!(
                    "session {} is completed and append-only",
                    session.session_id
                )))
            }
            None => return Err(StoreError::NotFound(format!("session {}", session.session_id))),
            _ => {}
        }
        conn.execute(
            "UPDATE sessions SET status = ?2, payload = ?3 WHERE session_id = ?1",
            params![session.session_id, format!("{:?}", session.status), to_json(&session)?],
        )?;
        Ok(())
    }

    fn get_session(&self, session_id: &str) -> StoreResult<ReasoningSession> {
        let conn = self.lock()?;
        let payload: Option<String> = conn
            .query_row("SELECT payload FROM sessions WHERE session_id = ?1", params![session_id], |r| r.get(0))
            .optional()?;
        match payload {
            Some(p) => from_json(&p),
            None => Err(StoreError::NotFound(format!("session {session_id}"))),
        }
    }

    fn list_sessions(&self, workspace_id: &str, limit: usize) -> StoreResult<Vec<ReasoningSession>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT payload FROM sessions WHERE workspace_id = ?1 ORDER BY started_at DESC LIMIT ?2",
        )?;
        let payloads: Vec<String> = stmt
            .query_map(params![workspace_id, limit as i64], |r| r.get::<_, String>(0))?
            .collect::<Result<_, _>>()?;
        payloads.iter().map(|p| from_json(p)).collect()
    }

    fn clear_sessions(&self, workspace_id: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM sessions WHERE workspace_id = ?1", params![workspace_id])?;
        Ok(())
    }
}

fn mark_sessions_stale(tx: &rusqlite::Transaction<'_>, document_id: &str) -> StoreResult<()> {
    let rows: Vec<(String, String)> = {
        let mut stmt = tx.prepare("SELECT session_id, payload FROM sessions")?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
        rows.collect::<Result<_, _>>()?
    };
    for (id, payload) in rows {
        let mut session: ReasoningSession = from_json(&payload)?;
        if session.target_document_ids.iter().any(|d| d == document_id) && !session.stale {
            session.stale = true;
            tx.execute("UPDATE sessions SET payload = ?2 WHERE session_id = ?1", params![id, to_json(&session)?])?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractos_core::contract::FileFormat;

    #[test]
    fn round_trips_contract_through_sqlite() {
        let store = SqliteBackend::in_memory().unwrap();
        let contract = Contract::new("doc1", "Test Agreement", FileFormat::Docx, "hash", 10, 1);
        store.insert_contract(contract).unwrap();
        let got = store.get_contract("doc1").unwrap();
        assert_eq!(got.title, "Test Agreement");
    }

    #[test]
    fn delete_contract_cascades_in_sqlite() {
        let store = SqliteBackend::in_memory().unwrap();
        store.insert_contract(Contract::new("doc1", "T", FileFormat::Docx, "h", 1, 1)).unwrap();
        store.delete_contract("doc1").unwrap();
        assert!(store.get_contract("doc1").is_err());
    }
}

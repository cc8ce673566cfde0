//! Workspace and reasoning-session data model.
//!
//! Operations (CRUD, cascades, append-only enforcement) live in
//! `contractos-store`; this module only defines the shapes, matching the
//! split between data model (§3) and component contract (§4.x) in the spec.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    pub history_limit: usize,
    pub retrieval_top_k: usize,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            history_limit: 10,
            retrieval_top_k: 30,
        }
    }
}

/// A persistent workspace referencing (not owning) contracts, owning
/// sessions. See the Ownership model in spec §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub workspace_id: String,
    pub name: String,
    pub indexed_document_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub settings: WorkspaceSettings,
}

impl Workspace {
    pub fn new(workspace_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            workspace_id: workspace_id.into(),
            name: name.into(),
            indexed_document_ids: Vec::new(),
            created_at: now,
            last_accessed_at: now,
            settings: WorkspaceSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryScope {
    Single,
    Family,
    Repository,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrievalMethod {
    Semantic,
    LexicalFallback,
}

/// Wire-serialized as `fact`/`binding`/`inference`/`not_found` (spec §4.7
/// step 6), matching the shape the LM is asked to reply with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    Fact,
    Binding,
    Inference,
    NotFound,
}

/// The agent's typed response (§4.7 step 6-10). Carried by
/// `ReasoningSession::result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer_type: AnswerType,
    pub answer_text: String,
    pub confidence: Option<f32>,
    pub cited_fact_ids: Vec<String>,
    pub cited_binding_ids: Vec<String>,
    pub reasoning_summary: String,
    pub provenance: crate::inference::ProvenanceChain,
    pub retrieval_method: RetrievalMethod,
    /// Set when the embedding index fell back to lexical mode because the
    /// embedding model was unavailable.
    pub index_degraded: bool,
}

/// `{session_id, workspace_id, query_text, scope, target_document_ids[],
/// result?, status, started_at, completed_at?, generation_time_ms?}`
///.
///
/// *Session append-only invariant*: once `status == Completed`, no field
/// may change — enforced at the store boundary (`contractos-store`), not
/// here, since this type is a plain value object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningSession {
    pub session_id: String,
    pub workspace_id: String,
    pub query_text: String,
    pub scope: QueryScope,
    pub target_document_ids: Vec<String>,
    pub result: Option<QueryResult>,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub generation_time_ms: Option<u64>,
    pub conversation_history: Vec<(String, String)>,
    /// Open Question resolution: set when a document
    /// this session targeted was re-extracted after the session completed.
    pub stale: bool,
}

impl ReasoningSession {
    pub fn new(
        session_id: impl Into<String>,
        workspace_id: impl Into<String>,
        query_text: impl Into<String>,
        scope: QueryScope,
        target_document_ids: Vec<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            workspace_id: workspace_id.into(),
            query_text: query_text.into(),
            scope,
            target_document_ids,
            result: None,
            status: SessionStatus::Active,
            started_at: Utc::now(),
            completed_at: None,
            generation_time_ms: None,
            conversation_history: Vec::new(),
            stale: false,
        }
    }
}

/// Truncates conversation history to `MAX_HISTORY_TURNS` (§4.7 step 5).
pub fn truncate_history(history: &[(String, String)], max_turns: usize) -> Vec<(String, String)> {
    if history.len() <= max_turns {
        history.to_vec()
    } else {
        history[history.len() - max_turns..].to_vec()
    }
}

pub type Metadata = HashMap<String, String>;

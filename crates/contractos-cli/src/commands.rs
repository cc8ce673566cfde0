//! Command implementations: one function per public operation.
//!
//! Each function is a thin wrapper — it does exactly what an HTTP handler
//! or plugin-protocol tool would do, and nothing else: validate CLI input,
//! call into `contractos-core`/`contractos-store`/`contractos-llm`, return
//! a typed value for `main.rs` to render. No business logic lives here.

use std::path::Path;

use anyhow::{bail, Context, Result};
use contractos_core::classifier::{self, ClassifierConfig};
use contractos_core::clause::{ClauseFactSlot, ClauseType, ClauseTypeRegistry, SlotStatus};
use contractos_core::contract::FileFormat;
use contractos_core::document_source::{DocumentSource, PlainTextSource};
use contractos_core::fact::{EntityType, FactType};
use contractos_core::session::{QueryScope, ReasoningSession, Workspace};
use contractos_core::{Binding, Clause, Contract};
use contractos_llm::agent::{AnswerRequest, DocumentAgent};
use contractos_llm::discovery::{self, DiscoveryResult};
use contractos_llm::embedding_index;
use contractos_store::backend::FactFilters;
use contractos_store::graph::{self, GraphView};

use crate::engine::Engine;

/// `upload(bytes, format) -> Contract`.
///
/// Parsing is delegated to [`PlainTextSource`] — byte-level DOCX/PDF
/// decoding is an explicit non-goal of the core; a real
/// deployment plugs in a `DocumentSource` implementation ahead of this
/// call. Runs the full upload pipeline synchronously: parse, extract,
/// classify, slot-fill, persist, build and persist the embedding index.
pub async fn upload(engine: &Engine, path: &Path, format: FileFormat) -> Result<Contract> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file_hash = Contract::hash_bytes(&bytes);
    let document_id = format!("doc-{}", &file_hash[..12]);

    let source = PlainTextSource;
    let parsed = source.parse(&bytes, format).map_err(anyhow::Error::from)?;

    let extraction_version = engine.config.extraction.version;
    let mut result = contractos_core::extract(&parsed, &document_id, extraction_version);

    let registry = ClauseTypeRegistry::built_in();
    let classifier_config = ClassifierConfig {
        pattern_confidence_floor: engine.config.classifier.pattern_confidence_floor,
        ..ClassifierConfig::default()
    };
    classify_clauses(engine, &mut result.clauses, &classifier_config).await?;

    let facts_by_id: std::collections::HashMap<&str, &contractos_core::Fact> =
        result.facts.iter().map(|f| (f.fact_id.as_str(), f)).collect();
    let mut slots = Vec::new();
    for clause in &result.clauses {
        let contained: Vec<&contractos_core::Fact> =
            clause.contained_fact_ids.iter().filter_map(|id| facts_by_id.get(id.as_str()).copied()).collect();
        slots.extend(classifier::fill_slots(clause, &contained, &registry));
    }

    let word_count = parsed.text.split_whitespace().count();
    let parties: Vec<String> = result
        .facts
        .iter()
        .filter(|f| f.fact_type == FactType::Entity && f.entity_type == Some(EntityType::Party))
        .map(|f| f.value.clone())
        .collect();

    let contract = Contract::new(document_id.clone(), title_from_path(path), format, file_hash, word_count, extraction_version)
        .with_parties(parties);

    engine.store.insert_contract(contract.clone()).map_err(anyhow::Error::from)?;
    engine
        .store
        .insert_extraction_result(&document_id, contractos_store::backend::ExtractionWrite { result: result.clone(), slots })
        .map_err(anyhow::Error::from)?;

    let chunks = embedding_index::build_chunks(&document_id, &result);
    let index = embedding_index::index_document(
        engine.provider.as_ref(),
        &engine.config.embedding.model_id,
        engine.config.embedding.dim,
        chunks,
    )
    .await;
    engine.save_index(&document_id, &index)?;

    Ok(contract)
}

fn title_from_path(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("Untitled Contract").to_string()
}

/// Runs the two-stage classifier over every clause produced by
/// extraction, mutating each clause's `clause_type`/`classification_method`/
/// `classification_confidence` in place.
async fn classify_clauses(engine: &Engine, clauses: &mut [Clause], config: &ClassifierConfig) -> Result<()> {
    for clause in clauses.iter_mut() {
        match classifier::classify_pattern_stage(&clause.heading, *config) {
            classifier::ClassificationOutcome::Decided { clause_type, method, confidence } => {
                clause.clause_type = clause_type;
                clause.classification_method = method;
                clause.classification_confidence = confidence;
            }
            classifier::ClassificationOutcome::NeedsLlm(request) => {
                let response = llm_classify(engine, &request).await;
                let (clause_type, method, confidence) = classifier::finalize_llm(response);
                clause.clause_type = clause_type;
                clause.classification_method = method;
                clause.classification_confidence = confidence;
            }
        }
    }
    Ok(())
}

/// LM fallback stage. Returns `None` (falling back to
/// `general`/pattern) whenever the provider is unavailable or returns an
/// unparseable reply — classification failure never aborts extraction.
async fn llm_classify(
    engine: &Engine,
    request: &classifier::LlmClassificationRequest,
) -> Option<classifier::LlmClassificationResponse> {
    use contractos_llm::provider::{CompletionRequest, Message};

    let allowed: Vec<String> = request.allowed_types.iter().map(|t| t.to_string()).collect();
    let prompt = format!(
        "Classify this contract clause heading into exactly one type: {}.\nHeading: {}\nReply as JSON: {{\"clause_type\": string, \"confidence\": number}}",
        allowed.join(", "),
        request.heading_text,
    );
    let completion = engine
        .provider
        .complete(CompletionRequest {
            messages: vec![Message::system("You classify contract clause types.".to_string()), Message::user(prompt)],
            max_tokens: 256,
            temperature: 0.0,
            structured_schema: None,
        })
        .await
        .ok()?;

    let value: serde_json::Value =
        completion.structured.clone().or_else(|| serde_json::from_str(&completion.text).ok())?;
    let type_str = value.get("clause_type")?.as_str()?;
    let confidence = value.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.5) as f32;
    let clause_type = request.allowed_types.iter().find(|t| t.to_string().eq_ignore_ascii_case(type_str)).cloned()?;
    Some(classifier::LlmClassificationResponse { clause_type, confidence })
}

pub fn list_contracts(engine: &Engine) -> Result<Vec<Contract>> {
    Ok(engine.store.list_contracts()?)
}

pub fn get_contract(engine: &Engine, document_id: &str) -> Result<Contract> {
    Ok(engine.store.get_contract(document_id)?)
}

#[derive(Debug, Clone, Default)]
pub struct FactQuery {
    pub fact_type: Option<FactType>,
    pub entity_type: Option<EntityType>,
    pub offset: usize,
    pub limit: Option<usize>,
}

pub fn get_facts(engine: &Engine, document_id: &str, query: FactQuery) -> Result<Vec<contractos_core::Fact>> {
    let mut filters = FactFilters::new().with_page(query.offset, query.limit.unwrap_or(usize::MAX));
    filters.fact_type = query.fact_type;
    filters.entity_type = query.entity_type;
    Ok(engine.store.get_facts(document_id, &filters)?)
}

pub fn get_clauses(engine: &Engine, document_id: &str, clause_type: Option<ClauseType>) -> Result<Vec<Clause>> {
    Ok(engine.store.get_clauses(document_id, clause_type)?)
}

pub fn get_bindings(engine: &Engine, document_id: &str) -> Result<Vec<Binding>> {
    Ok(engine.store.get_bindings(document_id)?)
}

/// `get_clause_gaps(id) -> ClauseFactSlot[]` (`status = missing` only).
pub fn get_clause_gaps(engine: &Engine, document_id: &str) -> Result<Vec<ClauseFactSlot>> {
    Ok(engine
        .store
        .get_slots(document_id)?
        .into_iter()
        .filter(|s| s.status == SlotStatus::Missing)
        .collect())
}

pub fn get_graph(engine: &Engine, document_id: &str) -> Result<GraphView> {
    Ok(graph::build_graph(engine.store.as_ref(), document_id)?)
}

pub fn delete_contract(engine: &Engine, document_id: &str) -> Result<()> {
    engine.store.delete_contract(document_id)?;
    engine.delete_index(document_id)?;
    Ok(())
}

pub fn clear_all(engine: &Engine) -> Result<()> {
    for contract in engine.store.list_contracts()? {
        engine.delete_index(&contract.document_id)?;
    }
    engine.store.clear_all()?;
    Ok(())
}

/// `ask(query_text, document_ids[], session_id?) -> QueryResult`.
pub async fn ask(
    engine: &Engine,
    query_text: &str,
    workspace_id: &str,
    document_ids: Vec<String>,
    session_id: Option<String>,
    conversation_history: Vec<(String, String)>,
) -> Result<ReasoningSession> {
    if document_ids.is_empty() {
        bail!("query against zero documents is an input error");
    }
    for id in &document_ids {
        engine.store.get_contract(id).map_err(|_| anyhow::anyhow!("document {id} is not indexed"))?;
    }

    // Resolved here rather than left to the agent so the caller always has
    // an id to look the persisted session back up by, new or continued.
    let session_id = session_id.unwrap_or_else(|| format!("session-{}", uuid::Uuid::new_v4()));

    let registry = engine.load_registry(&document_ids)?;
    let agent = DocumentAgent::new(engine.store.as_ref(), engine.provider.as_ref(), &registry, &engine.config);
    let request = AnswerRequest {
        query_text: query_text.to_string(),
        workspace_id: workspace_id.to_string(),
        scope: QueryScope::Single,
        target_document_ids: document_ids,
        session_id: Some(session_id.clone()),
        conversation_history,
    };
    agent.answer(request).await.map_err(anyhow::Error::from)?;
    Ok(engine.store.get_session(&session_id).map_err(anyhow::Error::from)?)
}

pub fn list_sessions(engine: &Engine, workspace_id: &str, limit: usize) -> Result<Vec<ReasoningSession>> {
    Ok(engine.store.list_sessions(workspace_id, limit)?)
}

pub fn clear_sessions(engine: &Engine, workspace_id: &str) -> Result<()> {
    Ok(engine.store.clear_sessions(workspace_id)?)
}

pub fn create_workspace(engine: &Engine, name: &str) -> Result<Workspace> {
    let workspace_id = format!("ws-{}", uuid::Uuid::new_v4());
    let workspace = Workspace::new(workspace_id, name);
    engine.store.insert_workspace(workspace.clone())?;
    Ok(workspace)
}

pub fn add_document(engine: &Engine, workspace_id: &str, document_id: &str) -> Result<()> {
    engine.store.get_contract(document_id).map_err(|_| anyhow::anyhow!("document {document_id} is not indexed"))?;
    Ok(engine.store.add_document_to_workspace(workspace_id, document_id)?)
}

pub fn remove_document(engine: &Engine, workspace_id: &str, document_id: &str) -> Result<()> {
    Ok(engine.store.remove_document_from_workspace(workspace_id, document_id)?)
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChangeCheck {
    pub current_hash: String,
    pub stored_hash: String,
    pub changed: bool,
}

/// `check_change(workspace_id, document_id) -> {current_hash, stored_hash, changed}`
///. `workspace_id` is accepted for parity with
/// the documented signature but the comparison itself only needs the
/// contract's stored hash and the file on disk.
pub fn check_change(engine: &Engine, workspace_id: &str, document_id: &str, path: &Path) -> Result<ChangeCheck> {
    let _ = engine.store.get_workspace(workspace_id)?;
    let contract = engine.store.get_contract(document_id)?;
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let current_hash = Contract::hash_bytes(&bytes);
    let changed = current_hash != contract.file_hash;
    Ok(ChangeCheck { current_hash, stored_hash: contract.file_hash, changed })
}

pub async fn discover(engine: &Engine, document_id: &str) -> Result<DiscoveryResult> {
    Ok(discovery::discover(engine.store.as_ref(), engine.provider.as_ref(), &engine.config, document_id)
        .await
        .map_err(anyhow::Error::from)?)
}

/// Parses a CLI string into a [`FactType`] using the field names from spec §3.
pub fn parse_fact_type(s: &str) -> Result<FactType> {
    Ok(match s.to_lowercase().replace(['-', ' '], "_").as_str() {
        "text_span" => FactType::TextSpan,
        "entity" => FactType::Entity,
        "clause" => FactType::Clause,
        "clause_text" => FactType::ClauseText,
        "table_cell" => FactType::TableCell,
        "heading" => FactType::Heading,
        "metadata" => FactType::Metadata,
        "structural" => FactType::Structural,
        "cross_reference" => FactType::CrossReference,
        other => bail!("unknown fact_type: {other}"),
    })
}

pub fn parse_entity_type(s: &str) -> Result<EntityType> {
    Ok(match s.to_lowercase().replace(['-', ' '], "_").as_str() {
        "party" => EntityType::Party,
        "date" => EntityType::Date,
        "money" => EntityType::Money,
        "product" => EntityType::Product,
        "location" => EntityType::Location,
        "duration" => EntityType::Duration,
        "section_ref" => EntityType::SectionRef,
        "percent" => EntityType::Percent,
        other => bail!("unknown entity_type: {other}"),
    })
}

pub fn parse_clause_type(s: &str) -> ClauseType {
    match s.to_lowercase().replace(['-', ' '], "_").as_str() {
        "termination" => ClauseType::Termination,
        "payment" => ClauseType::Payment,
        "indemnity" => ClauseType::Indemnity,
        "liability" => ClauseType::Liability,
        "confidentiality" => ClauseType::Confidentiality,
        "sla" => ClauseType::Sla,
        "price_escalation" => ClauseType::PriceEscalation,
        "penalty" => ClauseType::Penalty,
        "force_majeure" => ClauseType::ForceMajeure,
        "assignment" => ClauseType::Assignment,
        "governing_law" => ClauseType::GoverningLaw,
        "warranty" => ClauseType::Warranty,
        "ip" => ClauseType::Ip,
        "schedule_adherence" => ClauseType::ScheduleAdherence,
        "definitions" => ClauseType::Definitions,
        "general" => ClauseType::General,
        other => ClauseType::Custom(other.to_string()),
    }
}

pub fn parse_file_format(s: &str) -> Result<FileFormat> {
    Ok(match s.to_lowercase().as_str() {
        "docx" => FileFormat::Docx,
        "pdf" => FileFormat::Pdf,
        other => bail!("unknown file format: {other} (expected docx or pdf)"),
    })
}

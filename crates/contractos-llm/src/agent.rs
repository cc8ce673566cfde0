//! The document agent (C7, spec §4.7): retrieve → enrich → bind → build
//! prompt → call LM → validate → build provenance → persist session.
//!
//! Grounded on the teacher's `legalis-llm/src/rag.rs` retrieve-then-prompt
//! pipeline shape, replacing its open-ended legal-research prompt with the
//! spec's four-shape-only contract (fact / binding / inference / not_found)
//! and its unconstrained citation model with the spec's strict
//! cited-fact-must-be-retrieved validation pass (step 7).

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use contractos_core::binding::resolve_term;
use contractos_core::config::Config;
use contractos_core::error::{CoreError, CoreResult};
use contractos_core::inference::{ProvenanceChain, ProvenanceNode, ProvenanceNodeType};
use contractos_core::session::{AnswerType, QueryResult, QueryScope, ReasoningSession, RetrievalMethod, SessionStatus};
use contractos_core::{Binding, Clause, Fact};
use contractos_store::backend::{FactFilters, TrustGraphStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cancellation::{run_with_deadline, CancellationContext};
use crate::conversation::history_to_messages;
use crate::embedding_index::{self, ChunkType, EmbeddingIndexRegistry};
use crate::provider::{CompletionRequest, LmProvider, Message};

/// One request to the agent.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub query_text: String,
    pub workspace_id: String,
    pub scope: QueryScope,
    pub target_document_ids: Vec<String>,
    pub session_id: Option<String>,
    pub conversation_history: Vec<(String, String)>,
}

/// The LM's structured reply shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AgentReply {
    answer_type: AnswerType,
    answer_text: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    cited_fact_ids: Vec<String>,
    #[serde(default)]
    cited_binding_ids: Vec<String>,
    #[serde(default)]
    reasoning_summary: String,
}

struct EnrichedFact {
    fact: Fact,
    clause: Option<Clause>,
    score: f32,
}

pub struct DocumentAgent<'a> {
    store: &'a dyn TrustGraphStore,
    provider: &'a dyn LmProvider,
    indices: &'a EmbeddingIndexRegistry,
    config: &'a Config,
}

impl<'a> DocumentAgent<'a> {
    pub fn new(
        store: &'a dyn TrustGraphStore,
        provider: &'a dyn LmProvider,
        indices: &'a EmbeddingIndexRegistry,
        config: &'a Config,
    ) -> Self {
        Self { store, provider, indices, config }
    }

    pub async fn answer(&self, request: AnswerRequest) -> CoreResult<QueryResult> {
        if request.query_text.trim().is_empty() {
            return Err(CoreError::Input("empty query".to_string()));
        }
        for document_id in &request.target_document_ids {
            if self.indices.get(document_id).is_none() {
                return Err(CoreError::Input(format!("document {document_id} is not indexed")));
            }
        }

        let session_id = request.session_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut session = ReasoningSession::new(
            session_id,
            request.workspace_id.clone(),
            request.query_text.clone(),
            request.scope,
            request.target_document_ids.clone(),
        );
        session.conversation_history = request.conversation_history.clone();
        self.store.insert_session(session.clone()).map_err(CoreError::from)?;

        match self.run(&request).await {
            Ok(result) => {
                session.result = Some(result.clone());
                session.status = SessionStatus::Completed;
                session.completed_at = Some(Utc::now());
                self.store.update_session(session).map_err(CoreError::from)?;
                Ok(result)
            }
            Err(err) => {
                session.status = SessionStatus::Failed;
                session.completed_at = Some(Utc::now());
                self.store.update_session(session).map_err(CoreError::from)?;
                Err(err)
            }
        }
    }

    async fn run(&self, request: &AnswerRequest) -> CoreResult<QueryResult> {
        // Step 2: retrieve.
        let top_k = self.config.retrieval.top_k;
        let mut hits_by_document: HashMap<String, Vec<crate::embedding_index::SearchHit>> = HashMap::new();
        let mut any_degraded = false;
        for document_id in &request.target_document_ids {
            let index = self.indices.get(document_id).expect("checked indexed above");
            let (hits, used_fallback) =
                embedding_index::search(self.provider, index, &request.query_text, top_k, Option::<ChunkType>::None).await;
            any_degraded = any_degraded || used_fallback || index.degraded;
            hits_by_document.insert(document_id.clone(), hits);
        }

        // Step 3: enrich + dedup by fact_id, keeping the best score.
        let mut enriched: HashMap<String, EnrichedFact> = HashMap::new();
        let mut document_bindings: HashMap<String, Vec<Binding>> = HashMap::new();
        for document_id in &request.target_document_ids {
            let facts = self.store.get_facts(document_id, &FactFilters::new()).map_err(CoreError::from)?;
            let facts_by_id: HashMap<&str, &Fact> = facts.iter().map(|f| (f.fact_id.as_str(), f)).collect();
            let clauses = self.store.get_clauses(document_id, None).map_err(CoreError::from)?;
            let bindings = self.store.get_bindings(document_id).map_err(CoreError::from)?;
            document_bindings.insert(document_id.clone(), bindings);

            for hit in hits_by_document.get(document_id).into_iter().flatten() {
                let Some(fact) = facts_by_id.get(hit.source_fact_id.as_str()) else { continue };
                let clause = clauses
                    .iter()
                    .find(|c| c.fact_id == hit.source_fact_id || c.contained_fact_ids.iter().any(|f| f == &hit.source_fact_id))
                    .cloned();
                enriched
                    .entry(hit.source_fact_id.clone())
                    .and_modify(|existing| {
                        if hit.score > existing.score {
                            existing.score = hit.score;
                        }
                    })
                    .or_insert_with(|| EnrichedFact { fact: (*fact).clone(), clause, score: hit.score });
            }
        }

        // Step 4: bind — resolve any binding term that appears in a
        // retrieved fact's value.
        let mut resolved_terms: Vec<(String, String)> = Vec::new();
        for (document_id, bindings) in &document_bindings {
            for binding in bindings {
                let appears = enriched
                    .values()
                    .any(|e| e.fact.document_id == *document_id && e.fact.value.to_lowercase().contains(&binding.term.to_lowercase()));
                if !appears {
                    continue;
                }
                if let Ok(contractos_core::binding::ResolvedTerm::Resolved { final_value, .. }) =
                    resolve_term(&binding.term, bindings, self.config.binding.max_chain_depth)
                {
                    resolved_terms.push((binding.term.clone(), final_value));
                }
            }
        }

        let retrieved_fact_ids: Vec<String> = enriched.keys().cloned().collect();
        if enriched.is_empty() {
            return Ok(self.not_found_result(any_degraded));
        }

        // Step 5: build prompt.
        let system_prompt = build_system_prompt();
        let context_block = build_context_block(&enriched, &resolved_terms);
        let mut messages = vec![Message::system(system_prompt)];
        messages.extend(history_to_messages(&request.conversation_history, self.config.workspace.history_limit));
        messages.push(Message::user(format!("{context_block}\n\nQuestion: {}", request.query_text)));

        // Step 6: call the LM, bounded by a deadline.
        let cancellation = CancellationContext::new();
        let completion = run_with_deadline(
            self.provider.complete(CompletionRequest {
                messages,
                max_tokens: self.config.lm.max_tokens,
                temperature: self.config.lm.temperature,
                structured_schema: Some(agent_reply_schema()),
            }),
            Duration::from_secs(60),
            &cancellation,
        )
        .await;

        let completion = match completion {
            Ok(Ok(c)) => c,
            Ok(Err(CoreError::LmUnavailable(_))) | Ok(Err(CoreError::LmRateLimited(_))) => {
                return Ok(self.degraded_result(&enriched, any_degraded));
            }
            Ok(Err(err)) => return Err(err),
            Err(err) => return Err(err),
        };

        let reply = parse_reply(&completion.text, completion.structured.as_ref())?;

        // Step 7: validate citations.
        let mut cited_fact_ids: Vec<String> = reply.cited_fact_ids.into_iter().filter(|id| retrieved_fact_ids.contains(id)).collect();
        cited_fact_ids.dedup();
        let known_binding_ids: Vec<String> = document_bindings.values().flatten().map(|b| b.binding_id.clone()).collect();
        let cited_binding_ids: Vec<String> =
            reply.cited_binding_ids.into_iter().filter(|id| known_binding_ids.contains(id)).collect();

        let mut answer_type = reply.answer_type;
        if answer_type == AnswerType::Inference && cited_fact_ids.is_empty() {
            answer_type = AnswerType::NotFound;
        }

        let confidence = match answer_type {
            AnswerType::Fact | AnswerType::Binding => Some(1.0),
            AnswerType::Inference => Some(reply.confidence.unwrap_or(0.0).clamp(0.0, 0.95)),
            AnswerType::NotFound => reply.confidence,
        };

        // Step 8: provenance.
        let provenance = build_provenance(&enriched, &cited_fact_ids, &document_bindings, &cited_binding_ids, &reply.reasoning_summary);

        Ok(QueryResult {
            answer_type,
            answer_text: reply.answer_text,
            confidence,
            cited_fact_ids,
            cited_binding_ids,
            reasoning_summary: reply.reasoning_summary,
            provenance,
            retrieval_method: if any_degraded { RetrievalMethod::LexicalFallback } else { RetrievalMethod::Semantic },
            index_degraded: any_degraded,
        })
    }

    fn not_found_result(&self, degraded: bool) -> QueryResult {
        QueryResult {
            answer_type: AnswerType::NotFound,
            answer_text: "No relevant evidence was found in the indexed documents.".to_string(),
            confidence: None,
            cited_fact_ids: Vec::new(),
            cited_binding_ids: Vec::new(),
            reasoning_summary: "Retrieval returned no matching chunks.".to_string(),
            provenance: ProvenanceChain::new("No evidence retrieved."),
            retrieval_method: if degraded { RetrievalMethod::LexicalFallback } else { RetrievalMethod::Semantic },
            index_degraded: degraded,
        }
    }

    /// Degraded mode: a facts-only summary
    /// built from the top retrieved hits, with no LM-synthesized text.
    fn degraded_result(&self, enriched: &HashMap<String, EnrichedFact>, already_degraded: bool) -> QueryResult {
        let mut ranked: Vec<&EnrichedFact> = enriched.values().collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(5);

        let answer_text = ranked.iter().map(|e| e.fact.value.clone()).collect::<Vec<_>>().join(" ");
        let cited_fact_ids: Vec<String> = ranked.iter().map(|e| e.fact.fact_id.clone()).collect();
        let mut provenance = ProvenanceChain::new("Language model unavailable; returning top retrieved facts directly.");
        for e in &ranked {
            provenance.push(ProvenanceNode {
                node_type: ProvenanceNodeType::Fact,
                reference_id: e.fact.fact_id.clone(),
                summary: e.fact.value.chars().take(160).collect(),
                document_location: Some(e.fact.evidence.location_hint.clone()),
            });
        }

        QueryResult {
            answer_type: AnswerType::Fact,
            answer_text,
            confidence: Some(1.0),
            cited_fact_ids,
            cited_binding_ids: Vec::new(),
            reasoning_summary: "Returned verbatim top-ranked facts because the language model was unavailable.".to_string(),
            provenance,
            retrieval_method: RetrievalMethod::LexicalFallback,
            index_degraded: already_degraded,
        }
    }
}

fn build_system_prompt() -> String {
    "You answer questions about a single contract using only the facts provided below. \
     Every statement you make must cite a retrieved fact by its fact_id. \
     Your reply must be exactly one of: a fact-grounded answer, a binding-grounded answer, \
     an inference (with a self-reported confidence in [0,1]), or a not_found response. \
     Never invent a fact that is not present in the context. \
     Respond as JSON: {\"answer_type\": \"fact\"|\"binding\"|\"inference\"|\"not_found\", \
     \"answer_text\": string, \"confidence\": number or null, \"cited_fact_ids\": [string], \
     \"cited_binding_ids\": [string], \"reasoning_summary\": string}."
        .to_string()
}

fn agent_reply_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "required": ["answer_type", "answer_text", "cited_fact_ids", "cited_binding_ids", "reasoning_summary"],
        "properties": {
            "answer_type": {"enum": ["fact", "binding", "inference", "not_found"]},
            "answer_text": {"type": "string"},
            "confidence": {"type": ["number", "null"]},
            "cited_fact_ids": {"type": "array", "items": {"type": "string"}},
            "cited_binding_ids": {"type": "array", "items": {"type": "string"}},
            "reasoning_summary": {"type": "string"}
        }
    })
}

fn build_context_block(enriched: &HashMap<String, EnrichedFact>, resolved_terms: &[(String, String)]) -> String {
    let mut ranked: Vec<&EnrichedFact> = enriched.values().collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut block = String::from("Retrieved facts:\n");
    for e in &ranked {
        let clause_note = e.clause.as_ref().map(|c| format!(" [clause: {}]", c.clause_type)).unwrap_or_default();
        block.push_str(&format!("- ({}) {}{}\n", e.fact.fact_id, e.fact.value, clause_note));
    }
    if !resolved_terms.is_empty() {
        block.push_str("\nResolved terms:\n");
        for (term, value) in resolved_terms {
            block.push_str(&format!("- {term} = {value}\n"));
        }
    }
    block
}

fn parse_reply(text: &str, structured: Option<&Value>) -> CoreResult<AgentReply> {
    if let Some(value) = structured {
        if let Ok(reply) = serde_json::from_value::<AgentReply>(value.clone()) {
            return Ok(reply);
        }
    }
    serde_json::from_str(text).map_err(|e| CoreError::LmInvalidResponse(e.to_string()))
}

fn build_provenance(
    enriched: &HashMap<String, EnrichedFact>,
    cited_fact_ids: &[String],
    document_bindings: &HashMap<String, Vec<Binding>>,
    cited_binding_ids: &[String],
    reasoning_summary: &str,
) -> ProvenanceChain {
    let mut chain = ProvenanceChain::new(reasoning_summary);
    for fact_id in cited_fact_ids {
        if let Some(e) = enriched.get(fact_id) {
            chain.push(ProvenanceNode {
                node_type: ProvenanceNodeType::Fact,
                reference_id: fact_id.clone(),
                summary: e.fact.value.chars().take(160).collect(),
                document_location: Some(e.fact.evidence.location_hint.clone()),
            });
        }
    }
    for binding_id in cited_binding_ids {
        if let Some(binding) = document_bindings.values().flatten().find(|b| &b.binding_id == binding_id) {
            chain.push(ProvenanceNode {
                node_type: ProvenanceNodeType::Binding,
                reference_id: binding_id.clone(),
                summary: format!("{} := {}", binding.term, binding.resolves_to),
                document_location: None,
            });
        }
    }
    chain.push(ProvenanceNode {
        node_type: ProvenanceNodeType::Reasoning,
        reference_id: "reasoning".to_string(),
        summary: reasoning_summary.to_string(),
        document_location: None,
    });
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use contractos_core::clause::ClassificationMethod;
    use contractos_core::config::Config;
    use contractos_core::contract::FileFormat;
    use contractos_core::fact::{Evidence, FactType};
    use contractos_core::{Clause, ClauseType, Contract, ExtractionResult};
    use contractos_store::backend::ExtractionWrite;
    use contractos_store::memory::MemoryBackend;

    fn setup() -> (MemoryBackend, EmbeddingIndexRegistry, MockProvider, Config) {
        let store = MemoryBackend::new();
        store.insert_contract(Contract::new("doc1", "Agreement", FileFormat::Pdf, "hash", 100, 1)).unwrap();

        let ev = Evidence::new("Termination for convenience requires 30 days notice.", 0, 52, "para", "root").unwrap();
        let fact = Fact::new("f1", "doc1", FactType::ClauseText, "Termination for convenience requires 30 days notice.", ev);
        let clause = Clause::new("c1", "doc1", ClauseType::Termination, "Termination", "f1", ClassificationMethod::Pattern);

        let mut result = ExtractionResult::default();
        result.facts.push(fact);
        result.clauses.push(clause);
        store.insert_extraction_result("doc1", ExtractionWrite { result: result.clone(), slots: vec![] }).unwrap();

        (store, EmbeddingIndexRegistry::new(), MockProvider::new(), Config::default())
    }

    #[tokio::test]
    async fn returns_not_found_when_nothing_is_retrieved() {
        let (store, mut registry, provider, config) = setup();
        let chunks = vec![];
        let index = embedding_index::index_document(&provider, "mock", 32, chunks).await;
        registry.insert("doc1", index);

        let agent = DocumentAgent::new(&store, &provider, &registry, &config);
        let result = agent
            .answer(AnswerRequest {
                query_text: "who is the buyer?".to_string(),
                workspace_id: "ws1".to_string(),
                scope: QueryScope::Single,
                target_document_ids: vec!["doc1".to_string()],
                session_id: None,
                conversation_history: vec![],
            })
            .await
            .unwrap();
        assert_eq!(result.answer_type, AnswerType::NotFound);
    }

    #[tokio::test]
    async fn answers_from_retrieved_fact_when_lm_cites_it() {
        let (store, mut registry, _provider, config) = setup();
        let result = store.get_facts("doc1", &FactFilters::new()).unwrap();
        let fact_id = result[0].fact_id.clone();

        let provider = MockProvider::new().with_structured_response(
            "Retrieved facts",
            serde_json::json!({
                "answer_type": "fact",
                "answer_text": "Termination requires 30 days notice.",
                "confidence": null,
                "cited_fact_ids": [fact_id.clone()],
                "cited_binding_ids": [],
                "reasoning_summary": "Cited the termination clause text."
            }),
        );

        let chunks = embedding_index::build_chunks("doc1", &ExtractionResult {
            facts: store.get_facts("doc1", &FactFilters::new()).unwrap(),
            clauses: store.get_clauses("doc1", None).unwrap(),
            bindings: vec![],
            cross_refs: vec![],
            aliases: vec![],
        });
        let index = embedding_index::index_document(&provider, "mock", 32, chunks).await;
        registry.insert("doc1", index);

        let agent = DocumentAgent::new(&store, &provider, &registry, &config);
        let result = agent
            .answer(AnswerRequest {
                query_text: "How much notice is required to terminate?".to_string(),
                workspace_id: "ws1".to_string(),
                scope: QueryScope::Single,
                target_document_ids: vec!["doc1".to_string()],
                session_id: None,
                conversation_history: vec![],
            })
            .await
            .unwrap();

        assert_eq!(result.answer_type, AnswerType::Fact);
        assert_eq!(result.cited_fact_ids, vec![fact_id]);
        assert_eq!(result.confidence, Some(1.0));
    }
}

//! Discovery subsystem (C10, spec §4.10): LM-assisted hidden-fact discovery
//! over stored context.
//!
//! Grounded on the teacher's `legalis-llm/src/rag.rs` context-assembly
//! pattern, reused here to gather a document's facts/clauses/bindings
//! before the LM call. Every result is persisted as an `Inference` with
//! `generated_by = "discovery"` — never as a `Fact` — per the truth-model
//! boundary the spec draws in §4.10.

use contractos_core::config::Config;
use contractos_core::error::{CoreError, CoreResult};
use contractos_core::inference::{Inference, Severity};
use contractos_store::backend::{FactFilters, TrustGraphStore};
use serde::{Deserialize, Serialize};

use crate::provider::{CompletionRequest, LmProvider, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryCategory {
    ImplicitObligation,
    MissingProtection,
    CrossClauseImplication,
    AmbiguousTerm,
}

#[derive(Debug, Clone, Deserialize)]
struct DiscoveredFactWire {
    claim: String,
    category: DiscoveryCategory,
    severity: Severity,
    evidence_location: String,
    confidence: f32,
    #[serde(default)]
    supporting_fact_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct DiscoveryWire {
    #[serde(default)]
    findings: Vec<DiscoveredFactWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub document_id: String,
    pub inferences: Vec<Inference>,
}

pub async fn discover(
    store: &dyn TrustGraphStore,
    provider: &dyn LmProvider,
    config: &Config,
    document_id: &str,
) -> CoreResult<DiscoveryResult> {
    let facts = store.get_facts(document_id, &FactFilters::new()).map_err(CoreError::from)?;
    let clauses = store.get_clauses(document_id, None).map_err(CoreError::from)?;
    let bindings = store.get_bindings(document_id).map_err(CoreError::from)?;

    if facts.is_empty() {
        return Err(CoreError::Input(format!("document {document_id} has no stored facts to discover from")));
    }

    let mut context = String::from("Facts:\n");
    for fact in &facts {
        context.push_str(&format!("- ({}) {}\n", fact.fact_id, fact.value));
    }
    context.push_str("\nClauses:\n");
    for clause in &clauses {
        context.push_str(&format!("- ({}) {}: {}\n", clause.clause_id, clause.clause_type, clause.heading));
    }
    context.push_str("\nDefined terms:\n");
    for binding in &bindings {
        context.push_str(&format!("- {} := {}\n", binding.term, binding.resolves_to));
    }

    let system_prompt = "You surface implicit obligations, missing protections, cross-clause \
         implications, and ambiguous terms in the contract context below. Reply as JSON: \
         {\"findings\": [{\"claim\": string, \"category\": \"implicit_obligation\"|\"missing_protection\"| \
         \"cross_clause_implication\"|\"ambiguous_term\", \"severity\": \"info\"|\"low\"|\"medium\"|\"high\"|\"critical\", \
         \"evidence_location\": string, \"confidence\": number, \"supporting_fact_ids\": [string]}]}. \
         Every finding must cite at least one fact_id from the context; never invent a fact_id."
        .to_string();

    let completion = provider
        .complete(CompletionRequest {
            messages: vec![Message::system(system_prompt), Message::user(context)],
            max_tokens: config.lm.max_tokens,
            temperature: config.lm.temperature,
            structured_schema: None,
        })
        .await?;

    let wire: DiscoveryWire = completion
        .structured
        .as_ref()
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .or_else(|| serde_json::from_str(&completion.text).ok())
        .ok_or_else(|| CoreError::LmInvalidResponse("discovery response was not valid JSON".to_string()))?;

    let known_fact_ids: std::collections::HashSet<&str> = facts.iter().map(|f| f.fact_id.as_str()).collect();
    let mut inferences = Vec::new();
    for (i, finding) in wire.findings.into_iter().enumerate() {
        let supporting: Vec<String> = if finding.supporting_fact_ids.is_empty() {
            facts.first().map(|f| f.fact_id.clone()).into_iter().collect()
        } else {
            finding.supporting_fact_ids.into_iter().filter(|id| known_fact_ids.contains(id.as_str())).collect()
        };
        let Some(inference) = Inference::new(
            format!("discovery-{document_id}-{i}"),
            document_id,
            format!("{:?}", finding.category),
            finding.claim,
            supporting,
            format!("Located near: {}", finding.evidence_location),
            finding.confidence,
            format!("discovery pass, severity {:?}", finding.severity),
            "discovery",
        ) else {
            continue;
        };
        inferences.push(inference);
    }

    Ok(DiscoveryResult { document_id: document_id.to_string(), inferences })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use contractos_core::clause::ClassificationMethod;
    use contractos_core::contract::FileFormat;
    use contractos_core::fact::{Evidence, FactType};
    use contractos_core::{Clause, ClauseType, Contract, ExtractionResult, Fact};
    use contractos_store::backend::ExtractionWrite;
    use contractos_store::memory::MemoryBackend;

    #[tokio::test]
    async fn discovery_produces_inferences_never_facts() {
        let store = MemoryBackend::new();
        store.insert_contract(Contract::new("doc1", "Agreement", FileFormat::Pdf, "h", 10, 1)).unwrap();
        let ev = Evidence::new("Either party may terminate with 30 days notice.", 0, 47, "para", "root").unwrap();
        let fact = Fact::new("f1", "doc1", FactType::ClauseText, "Either party may terminate with 30 days notice.", ev);
        let clause = Clause::new("c1", "doc1", ClauseType::Termination, "Termination", "f1", ClassificationMethod::Pattern);
        let mut result = ExtractionResult::default();
        result.facts.push(fact);
        result.clauses.push(clause);
        store.insert_extraction_result("doc1", ExtractionWrite { result, slots: vec![] }).unwrap();

        let provider = MockProvider::new().with_structured_response(
            "Facts:",
            serde_json::json!({
                "findings": [{
                    "claim": "No cure period is specified before termination takes effect.",
                    "category": "missing_protection",
                    "severity": "medium",
                    "evidence_location": "Termination clause",
                    "confidence": 0.7,
                    "supporting_fact_ids": ["f1"]
                }]
            }),
        );

        let config = Config::default();
        let discovery = discover(&store, &provider, &config, "doc1").await.unwrap();
        assert_eq!(discovery.inferences.len(), 1);
        assert_eq!(discovery.inferences[0].generated_by, "discovery");
        assert!(!discovery.inferences[0].supporting_fact_ids.is_empty());
    }
}

//! Inferences, opinions, and provenance chains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{inference_id, document_id, inference_type, claim, supporting_fact_ids[],
/// supporting_binding_ids[], reasoning_chain, confidence, confidence_basis,
/// generated_by, generated_at, query_id?}`.
///
/// *Invariant I1*: `supporting_fact_ids` must be non-empty — enforced by
/// [`Inference::new`], which returns `None` otherwise. No inference without
/// evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inference {
    pub inference_id: String,
    pub document_id: String,
    pub inference_type: String,
    pub claim: String,
    pub supporting_fact_ids: Vec<String>,
    pub supporting_binding_ids: Vec<String>,
    pub reasoning_chain: String,
    pub confidence: f32,
    pub confidence_basis: String,
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
    pub query_id: Option<String>,
    /// Set when contradicted by new evidence (Invariant I3): the inference
    /// is never edited, only marked invalidated.
    pub invalidated_by: Option<String>,
}

impl Inference {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        inference_id: impl Into<String>,
        document_id: impl Into<String>,
        inference_type: impl Into<String>,
        claim: impl Into<String>,
        supporting_fact_ids: Vec<String>,
        reasoning_chain: impl Into<String>,
        confidence: f32,
        confidence_basis: impl Into<String>,
        generated_by: impl Into<String>,
    ) -> Option<Self> {
        if supporting_fact_ids.is_empty() {
            return None;
        }
        Some(Self {
            inference_id: inference_id.into(),
            document_id: document_id.into(),
            inference_type: inference_type.into(),
            claim: claim.into(),
            supporting_fact_ids,
            supporting_binding_ids: Vec::new(),
            reasoning_chain: reasoning_chain.into(),
            confidence: confidence.clamp(0.0, 1.0),
            confidence_basis: confidence_basis.into(),
            generated_by: generated_by.into(),
            generated_at: Utc::now(),
            query_id: None,
            invalidated_by: None,
        })
    }

    /// *Invariant I2*: confidence below 0.5 is low-confidence — callers must
    /// not chain further inferences on it without explicit human gating.
    pub fn is_low_confidence(&self) -> bool {
        self.confidence < 0.5
    }

    pub fn invalidate(&mut self, reason: impl Into<String>) {
        self.invalidated_by = Some(reason.into());
    }
}

/// Same shape as [`Inference`] but with `severity` instead of `confidence`.
///
/// *Invariant O1*: opinions are never persisted in the TrustGraph. They
/// exist only as return values of on-demand evaluators — there is
/// deliberately no store operation anywhere in this workspace that accepts
/// an `Opinion`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    pub inference_id: String,
    pub document_id: String,
    pub inference_type: String,
    pub claim: String,
    pub supporting_fact_ids: Vec<String>,
    pub supporting_binding_ids: Vec<String>,
    pub reasoning_chain: String,
    pub severity: Severity,
    pub role_context: String,
    pub policy_reference: String,
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvenanceNodeType {
    Fact,
    Binding,
    Inference,
    External,
    Reasoning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceNode {
    pub node_type: ProvenanceNodeType,
    pub reference_id: String,
    pub summary: String,
    pub document_location: Option<String>,
}

/// The ordered list of evidence nodes backing an answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceChain {
    pub nodes: Vec<ProvenanceNode>,
    pub reasoning_summary: String,
}

impl ProvenanceChain {
    pub fn new(reasoning_summary: impl Into<String>) -> Self {
        Self {
            nodes: Vec::new(),
            reasoning_summary: reasoning_summary.into(),
        }
    }

    pub fn push(&mut self, node: ProvenanceNode) {
        self.nodes.push(node);
    }
}

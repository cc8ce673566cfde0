//! Clause classifier (C3, spec §4.3): two-stage pattern + LLM-fallback
//! clause-type assignment, followed by mandatory/optional slot filling.

use crate::clause::{ClassificationMethod, Clause, ClauseFactSlot, ClauseType, ClauseTypeRegistry, SlotStatus};
use crate::fact::Fact;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Heading-keyword weights per clause type — the deterministic pattern
/// stage. Weight 1.0 means an exact, unambiguous heading keyword.
fn keyword_weights() -> &'static HashMap<ClauseType, Vec<(&'static str, f32)>> {
    static MAP: OnceLock<HashMap<ClauseType, Vec<(&'static str, f32)>>> = OnceLock::new();
    MAP.get_or_init(|| {
        let mut m: HashMap<ClauseType, Vec<(&'static str, f32)>> = HashMap::new();
        m.insert(ClauseType::Termination, vec![("termination", 1.0), ("terminate", 0.7)]);
        m.insert(ClauseType::Payment, vec![("payment", 1.0), ("fees", 0.8), ("invoice", 0.6)]);
        m.insert(ClauseType::Indemnity, vec![("indemnification", 1.0), ("indemnity", 1.0)]);
        m.insert(ClauseType::Liability, vec![("limitation of liability", 1.0), ("liability", 0.6)]);
        m.insert(ClauseType::Confidentiality, vec![("confidentiality", 1.0), ("non-disclosure", 0.9)]);
        m.insert(ClauseType::Sla, vec![("service level", 1.0), ("sla", 1.0)]);
        m.insert(ClauseType::PriceEscalation, vec![("price escalation", 1.0), ("price adjustment", 0.7)]);
        m.insert(ClauseType::Penalty, vec![("penalty", 1.0), ("liquidated damages", 0.9)]);
        m.insert(ClauseType::ForceMajeure, vec![("force majeure", 1.0)]);
        m.insert(ClauseType::Assignment, vec![("assignment", 1.0)]);
        m.insert(ClauseType::GoverningLaw, vec![("governing law", 1.0), ("jurisdiction", 0.6)]);
        m.insert(ClauseType::Warranty, vec![("warranty", 1.0), ("warranties", 1.0)]);
        m.insert(ClauseType::Ip, vec![("intellectual property", 1.0)]);
        m.insert(ClauseType::ScheduleAdherence, vec![("schedule adherence", 1.0), ("schedule", 0.5)]);
        m.insert(ClauseType::Definitions, vec![("definitions", 1.0), ("defined terms", 1.0)]);
        m
    })
}

#[derive(Debug, Clone, Copy)]
pub struct ClassifierConfig {
    pub pattern_confidence_floor: f32,
    pub pattern_margin: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            pattern_confidence_floor: 0.7,
            pattern_margin: 0.15,
        }
    }
}

/// A constrained classification request handed to the LM fallback stage.
/// `contractos-llm` implements the actual call; this type is the schema the
/// response must conform to.
#[derive(Debug, Clone)]
pub struct LlmClassificationRequest {
    pub heading_text: String,
    pub first_paragraph: String,
    pub allowed_types: Vec<ClauseType>,
}

#[derive(Debug, Clone)]
pub struct LlmClassificationResponse {
    pub clause_type: ClauseType,
    pub confidence: f32,
}

pub enum ClassificationOutcome {
    Decided {
        clause_type: ClauseType,
        method: ClassificationMethod,
        confidence: Option<f32>,
    },
    NeedsLlm(LlmClassificationRequest),
}

/// Stage 1 of §4.3: pattern-stage classification. Returns `Decided` when the
/// top keyword match clears both the confidence floor and the margin over
/// the runner-up; otherwise returns `NeedsLlm` so the caller can invoke the
/// LM provider and feed the result back through [`finalize_llm`].
pub fn classify_pattern_stage(heading_text: &str, config: ClassifierConfig) -> ClassificationOutcome {
    let heading_lower = heading_text.to_lowercase();
    let mut scores: Vec<(ClauseType, f32)> = keyword_weights()
        .iter()
        .filter_map(|(ty, keywords)| {
            keywords
                .iter()
                .filter(|(kw, _)| heading_lower.contains(kw))
                .map(|(_, w)| *w)
                .fold(None, |acc: Option<f32>, w| Some(acc.map_or(w, |a| a.max(w))))
                .map(|score| (ty.clone(), score))
        })
        .collect();
    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

    match scores.as_slice() {
        [] => ClassificationOutcome::NeedsLlm(LlmClassificationRequest {
            heading_text: heading_text.to_string(),
            first_paragraph: String::new(),
            allowed_types: keyword_weights().keys().cloned().collect(),
        }),
        [(top_type, top_score)] if *top_score >= config.pattern_confidence_floor => {
            ClassificationOutcome::Decided {
                clause_type: top_type.clone(),
                method: ClassificationMethod::Pattern,
                confidence: None,
            }
        }
        [(top_type, top_score), (_, runner_up), ..]
            if *top_score >= config.pattern_confidence_floor && (top_score - runner_up) >= config.pattern_margin =>
        {
            ClassificationOutcome::Decided {
                clause_type: top_type.clone(),
                method: ClassificationMethod::Pattern,
                confidence: None,
            }
        }
        _ => ClassificationOutcome::NeedsLlm(LlmClassificationRequest {
            heading_text: heading_text.to_string(),
            first_paragraph: String::new(),
            allowed_types: keyword_weights().keys().cloned().collect(),
        }),
    }
}

/// Stage 2: folds an LM response (or its absence, on `LmUnavailable`) into
/// a final classification. LM unavailability at classification time falls
/// back to `general` with `method=pattern` —
/// never fails the whole extraction.
pub fn finalize_llm(response: Option<LlmClassificationResponse>) -> (ClauseType, ClassificationMethod, Option<f32>) {
    match response {
        Some(r) => (r.clause_type, ClassificationMethod::Llm, Some(r.confidence)),
        None => (ClauseType::General, ClassificationMethod::Pattern, None),
    }
}

/// Fills a clause's mandatory/optional slots by matching contained facts
/// against the clause type's `FactSpec`s (§4.3 "Slot filling").
///
/// *Invariant S1*: a missing required slot is surfaced as `SlotStatus::Missing`,
/// never silently filled.
pub fn fill_slots(clause: &Clause, contained_facts: &[&Fact], registry: &ClauseTypeRegistry) -> Vec<ClauseFactSlot> {
    let Some(spec) = registry.get(&clause.clause_type) else {
        return Vec::new();
    };
    let mut slots = Vec::new();
    for fact_spec in spec.mandatory_facts.iter().map(|f| (f, true)).chain(spec.optional_facts.iter().map(|f| (f, false))) {
        let (fs, required) = fact_spec;
        let matching: Vec<&&Fact> = contained_facts
            .iter()
            .filter(|f| f.fact_type == fs.expected_fact_type && f.entity_type == fs.expected_entity_type)
            .collect();
        let (status, filled_by) = match matching.len() {
            0 => (SlotStatus::Missing, None),
            1 => (SlotStatus::Filled, Some(matching[0].fact_id.clone())),
            _ => (SlotStatus::Partial, Some(matching[0].fact_id.clone())),
        };
        slots.push(ClauseFactSlot {
            clause_id: clause.clause_id.clone(),
            fact_spec_name: fs.name.clone(),
            status,
            filled_by_fact_id: filled_by,
            required,
        });
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termination_heading_classifies_by_pattern() {
        let outcome = classify_pattern_stage("4. Termination", ClassifierConfig::default());
        match outcome {
            ClassificationOutcome::Decided { clause_type, method, confidence } => {
                assert_eq!(clause_type, ClauseType::Termination);
                assert_eq!(method, ClassificationMethod::Pattern);
                assert_eq!(confidence, None);
            }
            _ => panic!("expected decided outcome"),
        }
    }

    #[test]
    fn ambiguous_heading_needs_llm() {
        let outcome = classify_pattern_stage("Miscellaneous Provisions", ClassifierConfig::default());
        assert!(matches!(outcome, ClassificationOutcome::NeedsLlm(_)));
    }

    #[test]
    fn missing_required_slot_reports_gap() {
        let registry = ClauseTypeRegistry::built_in();
        let clause = Clause::new("c1", "doc1", ClauseType::Termination, "Termination", "f1", ClassificationMethod::Pattern);
        let slots = fill_slots(&clause, &[], &registry);
        let notice = slots.iter().find(|s| s.fact_spec_name == "notice_period").unwrap();
        assert_eq!(notice.status, SlotStatus::Missing);
        assert!(notice.required);
    }
}

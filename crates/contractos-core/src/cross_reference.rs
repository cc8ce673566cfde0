//! Cross-references: pointers from one clause to another location.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceType {
    Section,
    Clause,
    Appendix,
    Schedule,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceEffect {
    Modifies,
    Overrides,
    Conditions,
    Incorporates,
    Exempts,
    Delegates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossReference {
    pub reference_id: String,
    pub source_clause_id: String,
    pub target_reference: String,
    pub target_clause_id: Option<String>,
    pub reference_type: ReferenceType,
    pub effect: ReferenceEffect,
    pub context: String,
    pub resolved: bool,
    pub source_fact_id: String,
}

impl CrossReference {
    pub fn new(
        reference_id: impl Into<String>,
        source_clause_id: impl Into<String>,
        target_reference: impl Into<String>,
        reference_type: ReferenceType,
        effect: ReferenceEffect,
        context: impl Into<String>,
        source_fact_id: impl Into<String>,
    ) -> Self {
        Self {
            reference_id: reference_id.into(),
            source_clause_id: source_clause_id.into(),
            target_reference: target_reference.into(),
            target_clause_id: None,
            reference_type,
            effect,
            context: context.into(),
            resolved: false,
            source_fact_id: source_fact_id.into(),
        }
    }

    pub fn resolve_to(&mut self, target_clause_id: impl Into<String>) {
        self.target_clause_id = Some(target_clause_id.into());
        self.resolved = true;
    }
}

/// Determines `effect` from a qualifying prefix preceding a cross-reference
/// occurrence.
pub fn effect_from_prefix(prefix: &str) -> ReferenceEffect {
    let p = prefix.to_lowercase();
    if p.contains("notwithstanding") {
        ReferenceEffect::Overrides
    } else if p.contains("subject to") {
        ReferenceEffect::Conditions
    } else if p.contains("as defined in") || p.contains("incorporated by reference") {
        ReferenceEffect::Incorporates
    } else if p.contains("except as") || p.contains("exempt") {
        ReferenceEffect::Exempts
    } else if p.contains("delegate") {
        ReferenceEffect::Delegates
    } else {
        ReferenceEffect::Modifies
    }
}

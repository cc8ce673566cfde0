//! Clauses and the clause-type registry.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClauseType {
    Termination,
    Payment,
    Indemnity,
    Liability,
    Confidentiality,
    Sla,
    PriceEscalation,
    Penalty,
    ForceMajeure,
    Assignment,
    GoverningLaw,
    Warranty,
    Ip,
    ScheduleAdherence,
    Definitions,
    General,
    Custom(String),
}

impl std::fmt::Display for ClauseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClauseType::Custom(name) => write!(f, "{name}"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassificationMethod {
    Pattern,
    Llm,
}

/// `{clause_id, document_id, clause_type, heading, section_number?, fact_id,
/// contained_fact_ids[], cross_reference_ids[], classification_method,
/// classification_confidence?}`.
///
/// *Invariant C1*: `fact_id` references a fact of type `clause` in the same
/// document — enforced by the caller constructing this from an already
/// inserted clause-span fact, never fabricated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub clause_id: String,
    pub document_id: String,
    pub clause_type: ClauseType,
    pub heading: String,
    pub section_number: Option<String>,
    pub fact_id: String,
    pub contained_fact_ids: Vec<String>,
    pub cross_reference_ids: Vec<String>,
    pub classification_method: ClassificationMethod,
    /// `None` for pattern-stage classifications; "not applicable", not zero
    /// (Open Question resolution, SPEC_FULL.md §D).
    pub classification_confidence: Option<f32>,
}

impl Clause {
    pub fn new(
        clause_id: impl Into<String>,
        document_id: impl Into<String>,
        clause_type: ClauseType,
        heading: impl Into<String>,
        fact_id: impl Into<String>,
        classification_method: ClassificationMethod,
    ) -> Self {
        Self {
            clause_id: clause_id.into(),
            document_id: document_id.into(),
            clause_type,
            heading: heading.into(),
            section_number: None,
            fact_id: fact_id.into(),
            contained_fact_ids: Vec::new(),
            cross_reference_ids: Vec::new(),
            classification_method,
            classification_confidence: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    Filled,
    Missing,
    Partial,
}

/// `{clause_id, fact_spec_name, status, filled_by_fact_id?, required}`.
///
/// *Invariant S1*: a missing required slot is surfaced, never silently
/// filled — producers of this type must not invent a `filled_by_fact_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseFactSlot {
    pub clause_id: String,
    pub fact_spec_name: String,
    pub status: SlotStatus,
    pub filled_by_fact_id: Option<String>,
    pub required: bool,
}

/// One mandatory/optional fact slot a clause type expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactSpec {
    pub name: String,
    pub expected_fact_type: crate::fact::FactType,
    pub expected_entity_type: Option<crate::fact::EntityType>,
}

impl FactSpec {
    pub fn new(
        name: impl Into<String>,
        expected_fact_type: crate::fact::FactType,
        expected_entity_type: Option<crate::fact::EntityType>,
    ) -> Self {
        Self {
            name: name.into(),
            expected_fact_type,
            expected_entity_type,
        }
    }
}

/// `{type_id, display_name, mandatory_facts[], optional_facts[],
/// common_cross_refs[]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClauseTypeSpec {
    pub type_id: ClauseType,
    pub display_name: String,
    pub mandatory_facts: Vec<FactSpec>,
    pub optional_facts: Vec<FactSpec>,
    pub common_cross_refs: Vec<String>,
}

/// A runtime-configurable registry of clause types.
///
/// Grounded on `StatuteRegistry`'s `IndexMap`-based registration pattern in
/// the teacher's registry crate: insertion order is preserved, lookup is by
/// key.
#[derive(Debug, Clone, Default)]
pub struct ClauseTypeRegistry {
    specs: IndexMap<String, ClauseTypeSpec>,
}

impl ClauseTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ClauseTypeSpec) {
        self.specs.insert(spec.type_id.to_string(), spec);
    }

    pub fn get(&self, clause_type: &ClauseType) -> Option<&ClauseTypeSpec> {
        self.specs.get(&clause_type.to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClauseTypeSpec> {
        self.specs.values()
    }

    /// The built-in registry covering every enumerated `clause_type` from
    /// spec §3, each with a small set of representative mandatory/optional
    /// slots used for completeness-gap detection (§4.3 slot filling).
    pub fn built_in() -> Self {
        use crate::fact::{EntityType, FactType};
        let mut reg = Self::new();
        let mut add = |type_id: ClauseType, display_name: &str, mandatory: Vec<(&str, Option<EntityType>)>, optional: Vec<(&str, Option<EntityType>)>| {
            reg.register(ClauseTypeSpec {
                type_id,
                display_name: display_name.to_string(),
                mandatory_facts: mandatory
                    .into_iter()
                    .map(|(name, et)| FactSpec::new(name, FactType::Entity, et))
                    .collect(),
                optional_facts: optional
                    .into_iter()
                    .map(|(name, et)| FactSpec::new(name, FactType::Entity, et))
                    .collect(),
                common_cross_refs: Vec::new(),
            });
        };
        add(
            ClauseType::Termination,
            "Termination",
            vec![("notice_period", Some(EntityType::Duration))],
            vec![("cure_period", Some(EntityType::Duration))],
        );
        add(
            ClauseType::Payment,
            "Payment",
            vec![("amount", Some(EntityType::Money)), ("due_period", Some(EntityType::Duration))],
            vec![],
        );
        add(
            ClauseType::Indemnity,
            "Indemnity",
            vec![],
            vec![("cap_amount", Some(EntityType::Money))],
        );
        add(ClauseType::Liability, "Limitation of Liability", vec![("cap_amount", Some(EntityType::Money))], vec![]);
        add(ClauseType::Confidentiality, "Confidentiality", vec![], vec![("duration", Some(EntityType::Duration))]);
        add(ClauseType::Sla, "Service Level Agreement", vec![("uptime_target", Some(EntityType::Percent))], vec![]);
        add(ClauseType::PriceEscalation, "Price Escalation", vec![("escalation_rate", Some(EntityType::Percent))], vec![]);
        add(ClauseType::Penalty, "Penalty", vec![("penalty_amount", Some(EntityType::Money))], vec![]);
        add(ClauseType::ForceMajeure, "Force Majeure", vec![], vec![]);
        add(ClauseType::Assignment, "Assignment", vec![], vec![]);
        add(ClauseType::GoverningLaw, "Governing Law", vec![("jurisdiction", Some(EntityType::Location))], vec![]);
        add(ClauseType::Warranty, "Warranty", vec![], vec![("warranty_period", Some(EntityType::Duration))]);
        add(ClauseType::Ip, "Intellectual Property", vec![], vec![]);
        add(ClauseType::ScheduleAdherence, "Schedule Adherence", vec![], vec![]);
        add(ClauseType::Definitions, "Definitions", vec![], vec![]);
        add(ClauseType::General, "General", vec![], vec![]);
        reg
    }
}

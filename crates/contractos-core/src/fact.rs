//! Facts: immutable, source-addressable claims.

use serde::{Deserialize, Serialize};

/// Where in the source document a fact came from.
///
/// *Invariant F2*: `0 <= char_start <= char_end <= document_length`, and
/// `text_span` equals the substring of the source at that range. Enforced in
/// [`Evidence::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub text_span: String,
    pub char_start: usize,
    pub char_end: usize,
    pub location_hint: String,
    pub structural_path: String,
    pub page_number: Option<u32>,
}

impl Evidence {
    /// Builds evidence, validating the char-range/text_span relationship
    /// against the full document text (Invariant F2).
    pub fn new(
        document_text: &str,
        char_start: usize,
        char_end: usize,
        location_hint: impl Into<String>,
        structural_path: impl Into<String>,
    ) -> Option<Self> {
        if char_start > char_end || char_end > document_text.len() {
            return None;
        }
        let text_span = document_text.get(char_start..char_end)?.to_string();
        Some(Self {
            text_span,
            char_start,
            char_end,
            location_hint: location_hint.into(),
            structural_path: structural_path.into(),
            page_number: None,
        })
    }

    pub fn with_page_number(mut self, page: u32) -> Self {
        self.page_number = Some(page);
        self
    }

    pub fn len(&self) -> usize {
        self.char_end - self.char_start
    }

    pub fn is_empty(&self) -> bool {
        self.char_start == self.char_end
    }

    /// Returns whether `self` is fully contained within `other` — the
    /// primitive behind Invariant C2 (clause containment).
    pub fn contained_within(&self, other: &Evidence) -> bool {
        other.char_start <= self.char_start && self.char_end <= other.char_end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactType {
    TextSpan,
    Entity,
    Clause,
    ClauseText,
    TableCell,
    Heading,
    Metadata,
    Structural,
    CrossReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    Party,
    Date,
    Money,
    Product,
    Location,
    Duration,
    SectionRef,
    Percent,
}

/// Normalized monetary value: surface form preserved alongside the parsed
/// numeric amount and currency code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyValue {
    pub surface_form: String,
    pub amount: f64,
    pub currency: String,
}

/// Normalized duration: `{magnitude, unit}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationValue {
    pub magnitude: u64,
    pub unit: DurationUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationUnit {
    Day,
    BusinessDay,
    Month,
    Year,
}

/// An immutable, source-addressable fact.
///
/// *Invariant F3*: facts are never mutated; re-extraction deletes and
/// rewrites the whole set atomically (enforced at the store boundary, see
/// `contractos-store`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub fact_id: String,
    pub document_id: String,
    pub fact_type: FactType,
    pub entity_type: Option<EntityType>,
    pub value: String,
    pub evidence: Evidence,
    /// Present only for `FactType::Entity` facts of entity_type Money.
    pub money: Option<MoneyValue>,
    /// Present only for `FactType::Entity` facts of entity_type Duration.
    pub duration: Option<DurationValue>,
    /// Present only for `FactType::Entity` facts of entity_type Percent;
    /// a decimal fraction (e.g. `0.05` for "5%").
    pub percent: Option<f64>,
}

impl Fact {
    pub fn new(
        fact_id: impl Into<String>,
        document_id: impl Into<String>,
        fact_type: FactType,
        value: impl Into<String>,
        evidence: Evidence,
    ) -> Self {
        Self {
            fact_id: fact_id.into(),
            document_id: document_id.into(),
            fact_type,
            entity_type: None,
            value: value.into(),
            evidence,
            money: None,
            duration: None,
            percent: None,
        }
    }

    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn with_money(mut self, money: MoneyValue) -> Self {
        self.money = Some(money);
        self
    }

    pub fn with_duration(mut self, duration: DurationValue) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_percent(mut self, percent: f64) -> Self {
        self.percent = Some(percent);
        self
    }
}

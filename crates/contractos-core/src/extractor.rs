//! Pattern extractor (C2, spec §4.2): deterministic regex + heuristic
//! extraction of facts, bindings, clauses, cross-references, and aliases.
//!
//! `extract` is a pure function: the same [`ParsedDocument`] and
//! `extraction_version` always produce a byte-identical fact set modulo
//! fact IDs (Invariant F1). No randomness, no wall clock in output values —
//! callers stamp `indexed_at` themselves.

use crate::binding::{Binding, BindingType};
use crate::clause::{ClassificationMethod, Clause, ClauseType};
use crate::cross_reference::{effect_from_prefix, CrossReference, ReferenceType};
use crate::document_source::ParsedDocument;
use crate::fact::{DurationUnit, DurationValue, EntityType, Evidence, Fact, FactType, MoneyValue};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub facts: Vec<Fact>,
    pub clauses: Vec<Clause>,
    pub bindings: Vec<Binding>,
    pub cross_refs: Vec<CrossReference>,
    pub aliases: Vec<Binding>,
}

struct IdSeq {
    facts: usize,
    clauses: usize,
    bindings: usize,
    cross_refs: usize,
}

impl IdSeq {
    fn new() -> Self {
        Self {
            facts: 0,
            clauses: 0,
            bindings: 0,
            cross_refs: 0,
        }
    }
    fn next_fact(&mut self) -> String {
        self.facts += 1;
        format!("fact-{:06}", self.facts)
    }
    fn next_clause(&mut self) -> String {
        self.clauses += 1;
        format!("clause-{:06}", self.clauses)
    }
    fn next_binding(&mut self) -> String {
        self.bindings += 1;
        format!("binding-{:06}", self.bindings)
    }
    fn next_cross_ref(&mut self) -> String {
        self.cross_refs += 1;
        format!("xref-{:06}", self.cross_refs)
    }
}

/// A staged fact, pre-ID-assignment, carrying its document position for the
/// deterministic sort in spec §4.2 ("outputs sorted by (document position,
/// fact_type) before assigning sequential IDs").
struct StagedFact {
    position: usize,
    fact_type: FactType,
    build: Box<dyn FnOnce(&mut IdSeq) -> Fact>,
}

/// Entry point: `extract(ParsedDocument, ExtractionVersion) -> ExtractionResult`.
pub fn extract(doc: &ParsedDocument, document_id: &str, extraction_version: u32) -> ExtractionResult {
    let _ = extraction_version;
    let mut seq = IdSeq::new();
    let mut result = ExtractionResult::default();

    if doc.is_empty() {
        return result;
    }

    let mut staged: Vec<StagedFact> = Vec::new();

    // Heading facts.
    for heading in &doc.headings {
        let position = heading.char_start;
        let text = heading.text.clone();
        let doc_text = doc.text.clone();
        let doc_id = document_id.to_string();
        let (start, end) = (heading.char_start, heading.char_end);
        staged.push(StagedFact {
            position,
            fact_type: FactType::Heading,
            build: Box::new(move |seq| {
                let ev = Evidence::new(&doc_text, start, end, "heading", "heading").unwrap();
                Fact::new(seq.next_fact(), doc_id, FactType::Heading, text, ev)
            }),
        });
    }

    // Table cell facts.
    for table in &doc.tables {
        for cell in table {
            if cell.text.trim().is_empty() {
                continue;
            }
            let position = cell.char_start;
            let doc_id = document_id.to_string();
            let doc_text = doc.text.clone();
            let (start, end) = (cell.char_start, cell.char_end);
            let text = cell.text.clone();
            let row = cell.row;
            let col = cell.col;
            let col_header = cell.col_header.clone();
            staged.push(StagedFact {
                position,
                fact_type: FactType::TableCell,
                build: Box::new(move |seq| {
                    let path = match &col_header {
                        Some(h) => format!("table[{row},{col}]:{h}"),
                        None => format!("table[{row},{col}]"),
                    };
                    let ev = Evidence::new(&doc_text, start, end, "table_cell", &path).unwrap();
                    Fact::new(seq.next_fact(), doc_id, FactType::TableCell, text, ev)
                }),
            });
        }
    }

    // Entity facts: scan the whole text with each pattern in fixed order.
    stage_entity_facts(doc, document_id, &mut staged);

    // Sort by (document position, fact_type) before assigning IDs — the
    // determinism requirement of spec §4.2.
    staged.sort_by_key(|s| (s.position, fact_type_rank(s.fact_type)));
    for staged_fact in staged {
        let fact = (staged_fact.build)(&mut seq);
        result.facts.push(fact);
    }

    // Clause spans + clause text, derived from headings in document order.
    build_clauses(doc, document_id, &mut seq, &mut result);

    // Cross references, scanned against the raw text with qualifying prefixes.
    stage_cross_refs(doc, document_id, &mut seq, &mut result);

    // Aliases and definitions -> bindings.
    stage_bindings(doc, document_id, &mut seq, &mut result);

    result
}

fn fact_type_rank(ft: FactType) -> u8 {
    match ft {
        FactType::Heading => 0,
        FactType::Structural => 1,
        FactType::Clause => 2,
        FactType::ClauseText => 3,
        FactType::Entity => 4,
        FactType::TableCell => 5,
        FactType::CrossReference => 6,
        FactType::Metadata => 7,
        FactType::TextSpan => 8,
    }
}

fn money_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:[$€£¥]\s?[0-9][0-9,]*(?:\.[0-9]{2})?|\b[0-9][0-9,]*(?:\.[0-9]{2})?\s?(?:USD|EUR|GBP|JPY)\b)")
            .unwrap()
    })
}

/// Splits a money match into its numeric amount and detected currency code —
/// a leading symbol (`$`, `€`, `£`, `¥`) or a trailing ISO code (spec §4.2
/// "monetary amounts with currency detection").
fn parse_money(surface: &str) -> (f64, String) {
    let trimmed = surface.trim();
    for (symbol, code) in [("$", "USD"), ("€", "EUR"), ("£", "GBP"), ("¥", "JPY")] {
        if let Some(rest) = trimmed.strip_prefix(symbol) {
            return (rest.trim().replace(',', "").parse().unwrap_or(0.0), code.to_string());
        }
    }
    let upper = trimmed.to_uppercase();
    for code in ["USD", "EUR", "GBP", "JPY"] {
        if let Some(rest) = upper.strip_suffix(code) {
            return (rest.trim().replace(',', "").parse().unwrap_or(0.0), code.to_string());
        }
    }
    (trimmed.replace(',', "").parse().unwrap_or(0.0), "USD".to_string())
}

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[0-9]+(?:\.[0-9]+)?\s?%").unwrap())
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b([a-z]+)\s*\((\d+)\)\s*(business day|business days|day|days|month|months|year|years)\b")
            .unwrap()
    })
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},\s+\d{4}\b",
        )
        .unwrap()
    })
}

fn section_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(Section|§|Appendix|Schedule|Exhibit|Article)\s*[\w.]+").unwrap())
}

fn governing_law_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)govern(ed|ing)\s+by\s+(the\s+laws?\s+of\s+)?([A-Z][\w ]{2,40})").unwrap()
    })
}

/// A run of consecutive Capitalized Words — the heuristic used for a party
/// name's surface form, which keeps it from swallowing the whole preceding
/// sentence the way a lazy `.*?` would.
const CAPITALIZED_RUN: &str = r"[A-Z][\w&.'-]*(?:\s+[A-Z][\w&.'-]*)*";

fn alias_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r#"(?P<full>{CAPITALIZED_RUN}),?\s*(?:hereinafter referred to as|hereinafter|hereafter)\s*"(?P<short>[^"]+)""#
        ))
        .unwrap()
    })
}

fn alias_paren_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r#"(?P<full>{CAPITALIZED_RUN})\s*\(the\s*"(?P<short>[^"]+)"\)"#)).unwrap()
    })
}

fn shall_mean_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""?(?P<term>[A-Z][\w ]{2,40}?)"?\s+shall mean\s+(?P<def>[^.]+)\."#).unwrap())
}

/// Parses `"sixty (60) days"` into a normalized [`DurationValue`].
fn parse_duration_unit(raw: &str) -> DurationUnit {
    let r = raw.to_lowercase();
    if r.starts_with("business") {
        DurationUnit::BusinessDay
    } else if r.starts_with("day") {
        DurationUnit::Day
    } else if r.starts_with("month") {
        DurationUnit::Month
    } else {
        DurationUnit::Year
    }
}

fn stage_entity_facts(doc: &ParsedDocument, document_id: &str, staged: &mut Vec<StagedFact>) {
    let text = doc.text.clone();

    // Money: tie-break "more specific pattern wins" — we only emit one
    // entity per match span, and overlapping spans are resolved by keeping
    // the first (document-order) match since our patterns don't overlap by
    // construction (money pattern match length always subsumes bare digits).
    for m in money_re().find_iter(&text) {
        let (start, end) = (m.start(), m.end());
        let surface = m.as_str().to_string();
        let (amount, currency) = parse_money(&surface);
        push_entity(
            staged,
            &text,
            document_id,
            start,
            end,
            EntityType::Money,
            surface.clone(),
            Some(MoneyValue {
                surface_form: surface,
                amount,
                currency,
            }),
            None,
            None,
        );
    }

    for m in percent_re().find_iter(&text) {
        let (start, end) = (m.start(), m.end());
        let surface = m.as_str().to_string();
        let numeric: f64 = surface
            .trim_end_matches('%')
            .trim()
            .parse()
            .unwrap_or(0.0);
        push_entity(
            staged,
            &text,
            document_id,
            start,
            end,
            EntityType::Percent,
            surface,
            None,
            None,
            Some(numeric / 100.0),
        );
    }

    for cap in duration_re().captures_iter(&text) {
        let whole = cap.get(0).unwrap();
        let (start, end) = (whole.start(), whole.end());
        let magnitude: u64 = cap.get(2).unwrap().as_str().parse().unwrap_or(0);
        let unit = parse_duration_unit(cap.get(3).unwrap().as_str());
        push_entity(
            staged,
            &text,
            document_id,
            start,
            end,
            EntityType::Duration,
            whole.as_str().to_string(),
            None,
            Some(DurationValue { magnitude, unit }),
            None,
        );
    }

    for m in date_re().find_iter(&text) {
        push_entity(
            staged,
            &text,
            document_id,
            m.start(),
            m.end(),
            EntityType::Date,
            m.as_str().to_string(),
            None,
            None,
            None,
        );
    }

    for m in section_ref_re().find_iter(&text) {
        push_entity(
            staged,
            &text,
            document_id,
            m.start(),
            m.end(),
            EntityType::SectionRef,
            m.as_str().to_string(),
            None,
            None,
            None,
        );
    }

    for cap in governing_law_re().captures_iter(&text) {
        let whole = cap.get(0).unwrap();
        let jurisdiction = cap.get(3).unwrap();
        push_entity(
            staged,
            &text,
            document_id,
            jurisdiction.start(),
            jurisdiction.end(),
            EntityType::Location,
            jurisdiction.as_str().trim().to_string(),
            None,
            None,
            None,
        );
        let _ = whole;
    }

    // Parties: the short-form alias target is the canonical party surface
    // form (spec §4.2 "Aliases override generic entity tags for the aliased
    // surface form").
    for cap in alias_re().captures_iter(&text) {
        if let Some(full) = cap.name("full") {
            push_entity(
                staged,
                &text,
                document_id,
                full.start(),
                full.end(),
                EntityType::Party,
                full.as_str().trim_end_matches(',').trim().to_string(),
                None,
                None,
                None,
            );
        }
    }
    for cap in alias_paren_re().captures_iter(&text) {
        if let Some(full) = cap.name("full") {
            push_entity(
                staged,
                &text,
                document_id,
                full.start(),
                full.end(),
                EntityType::Party,
                full.as_str().trim().to_string(),
                None,
                None,
                None,
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn push_entity(
    staged: &mut Vec<StagedFact>,
    doc_text: &str,
    document_id: &str,
    start: usize,
    end: usize,
    entity_type: EntityType,
    value: String,
    money: Option<MoneyValue>,
    duration: Option<DurationValue>,
    percent: Option<f64>,
) {
    let doc_text = doc_text.to_string();
    let doc_id = document_id.to_string();
    staged.push(StagedFact {
        position: start,
        fact_type: FactType::Entity,
        build: Box::new(move |seq| {
            let ev = Evidence::new(&doc_text, start, end, "entity", "entity").unwrap();
            let mut fact = Fact::new(seq.next_fact(), doc_id, FactType::Entity, value, ev)
                .with_entity_type(entity_type);
            if let Some(m) = money {
                fact = fact.with_money(m);
            }
            if let Some(d) = duration {
                fact = fact.with_duration(d);
            }
            if let Some(p) = percent {
                fact = fact.with_percent(p);
            }
            fact
        }),
    });
}

/// Maps a heading keyword to a clause type via a weighted dictionary — the
/// deterministic pattern stage of the classifier (§4.3). Living here lets
/// `extract` produce clause facts whose heading is already legible; the
/// actual `ClauseType` assignment with confidence margins is
/// `classifier::classify`, invoked by callers after extraction (the
/// extractor itself stays type-agnostic and tags every clause span
/// `ClauseType::General` pending classification).
fn build_clauses(doc: &ParsedDocument, document_id: &str, seq: &mut IdSeq, result: &mut ExtractionResult) {
    if doc.headings.is_empty() {
        return;
    }
    let headings = &doc.headings;
    for (i, heading) in headings.iter().enumerate() {
        let span_end = headings[i + 1..]
            .iter()
            .find(|h| h.level <= heading.level)
            .map(|h| h.char_start)
            .unwrap_or(doc.text.len());
        let span_start = heading.char_start;

        let clause_fact_id = seq.next_fact();
        let ev = Evidence::new(&doc.text, span_start, span_end, "clause_span", "clause").unwrap();
        let clause_fact = Fact::new(
            clause_fact_id.clone(),
            document_id,
            FactType::Clause,
            heading.text.clone(),
            ev.clone(),
        );
        result.facts.push(clause_fact);

        let clause_id = seq.next_clause();
        let mut clause = Clause::new(
            clause_id.clone(),
            document_id,
            ClauseType::General,
            heading.text.clone(),
            clause_fact_id,
            ClassificationMethod::Pattern,
        );
        clause.section_number = heading.section_number.clone();

        // clause_text facts: one per paragraph body contained in the span
        // (Open Question resolution: both clause and clause_text kept).
        for para in &doc.paragraphs {
            if para.char_start >= span_start && para.char_end <= span_end {
                let fact_id = seq.next_fact();
                let para_ev = Evidence::new(&doc.text, para.char_start, para.char_end, "clause_text", &para.structural_path).unwrap();
                let fact = Fact::new(fact_id.clone(), document_id, FactType::ClauseText, para.text.clone(), para_ev);
                result.facts.push(fact);
                clause.contained_fact_ids.push(fact_id);
            }
        }

        // Attach any already-extracted entity/table facts whose evidence is
        // contained within the span (Invariant C2).
        for fact in &result.facts {
            if fact.fact_type == FactType::Entity || fact.fact_type == FactType::TableCell {
                if ev.char_start <= fact.evidence.char_start && fact.evidence.char_end <= ev.char_end {
                    clause.contained_fact_ids.push(fact.fact_id.clone());
                }
            }
        }
        clause.contained_fact_ids.sort();
        clause.contained_fact_ids.dedup();

        result.clauses.push(clause);
    }
}

fn stage_cross_refs(doc: &ParsedDocument, document_id: &str, seq: &mut IdSeq, result: &mut ExtractionResult) {
    let text = &doc.text;
    for m in section_ref_re().find_iter(text) {
        let prefix_start = m.start().saturating_sub(30);
        let prefix = &text[prefix_start..m.start()];
        let effect = effect_from_prefix(prefix);
        let reference_type = classify_reference_type(m.as_str());

        let source_clause_id = result
            .clauses
            .iter()
            .find(|c| {
                let span = result
                    .facts
                    .iter()
                    .find(|f| f.fact_id == c.fact_id)
                    .map(|f| &f.evidence);
                span.map(|ev| ev.char_start <= m.start() && m.end() <= ev.char_end)
                    .unwrap_or(false)
            })
            .map(|c| c.clause_id.clone())
            .unwrap_or_default();

        let fact_id = seq.next_fact();
        let ev = Evidence::new(text, m.start(), m.end(), "cross_reference", "cross_reference").unwrap();
        let fact = Fact::new(fact_id.clone(), document_id, FactType::CrossReference, m.as_str(), ev);
        result.facts.push(fact);

        let xref_id = seq.next_cross_ref();
        let mut xref = CrossReference::new(
            xref_id,
            source_clause_id,
            m.as_str(),
            reference_type,
            effect,
            prefix.trim().to_string(),
            fact_id,
        );
        if let Some(target_clause_id) = resolve_cross_ref_target(m.as_str(), &result.clauses) {
            xref.resolve_to(target_clause_id);
        }
        result.cross_refs.push(xref);
    }
}

/// Extracts the bare section number/letter a reference keyword precedes, so
/// `"Section 4.2"` and a heading's `section_number` of `"4.2"` compare equal.
fn reference_number(raw: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:section|§|appendix|schedule|exhibit|article)\s*([\w.]+)").unwrap()
    });
    re.captures(raw).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

fn section_number_key(raw: &str) -> String {
    reference_number(raw).unwrap_or_else(|| raw.trim().to_string()).to_lowercase()
}

/// Matches a cross-reference's target text against every clause's
/// `section_number` within the document, so `target_clause_id`/`resolved`
/// are populated whenever the reference names a section this document
/// itself defines (§4.2). References to external documents (statutes,
/// other contracts) stay unresolved.
fn resolve_cross_ref_target(raw: &str, clauses: &[Clause]) -> Option<String> {
    let key = section_number_key(raw);
    clauses
        .iter()
        .find(|c| c.section_number.as_deref().map(section_number_key).as_deref() == Some(key.as_str()))
        .map(|c| c.clause_id.clone())
}

fn classify_reference_type(raw: &str) -> ReferenceType {
    let lower = raw.to_lowercase();
    if lower.starts_with("appendix") {
        ReferenceType::Appendix
    } else if lower.starts_with("schedule") {
        ReferenceType::Schedule
    } else if lower.starts_with("exhibit") {
        ReferenceType::External
    } else {
        ReferenceType::Section
    }
}

/// Phrases marking a definition as an intentional amendment of an earlier
/// one, rather than an unrelated repeated "shall mean" sentence (§4.4: a
/// later definition only supersedes the earlier one when the text itself
/// signals an amendment).
const AMENDMENT_MARKERS: &[&str] = &[
    "hereby amended",
    "is hereby amended",
    "amended and restated",
    "amended to mean",
    "superseded by",
    "supersedes the foregoing definition",
    "shall hereinafter mean",
    "is hereby revised",
];

fn has_amendment_marker(prefix: &str) -> bool {
    let p = prefix.to_lowercase();
    AMENDMENT_MARKERS.iter().any(|marker| p.contains(marker))
}

fn stage_bindings(doc: &ParsedDocument, document_id: &str, seq: &mut IdSeq, result: &mut ExtractionResult) {
    let text = &doc.text;

    // Definitions: `"Term" shall mean <definition>.`
    for cap in shall_mean_re().captures_iter(text) {
        let whole = cap.get(0).unwrap();
        let term = cap.name("term").unwrap().as_str().trim().to_string();
        let def = cap.name("def").unwrap().as_str().trim().to_string();
        let fact_id = seq.next_fact();
        let ev = Evidence::new(text, whole.start(), whole.end(), "definition", "binding").unwrap();
        let fact = Fact::new(fact_id.clone(), document_id, FactType::Metadata, whole.as_str(), ev);
        result.facts.push(fact);

        if let Some(existing_idx) = result.bindings.iter().position(|b| b.term.eq_ignore_ascii_case(&term)) {
            // Later definitions supersede earlier ones only when an
            // amendment phrase accompanies them; otherwise the earlier
            // definition wins and this repeat is dropped (§4.4).
            let prefix_start = whole.start().saturating_sub(80);
            let prefix = &text[prefix_start..whole.start()];
            if has_amendment_marker(prefix) {
                let binding_id = seq.next_binding();
                let superseding = Binding::new(binding_id.clone(), document_id, BindingType::Definition, term, def, fact_id);
                result.bindings[existing_idx].is_overridden_by = Some(binding_id);
                result.bindings.push(superseding);
            }
            continue;
        }
        let binding_id = seq.next_binding();
        let binding = Binding::new(binding_id, document_id, BindingType::Definition, term, def, fact_id);
        result.bindings.push(binding);
    }

    // Aliases: `X, hereinafter referred to as "Y"` / `X (the "Y")`.
    for cap in alias_re().captures_iter(text) {
        stage_alias(&cap, text, document_id, seq, result);
    }
    for cap in alias_paren_re().captures_iter(text) {
        stage_alias(&cap, text, document_id, seq, result);
    }
}

fn already_bound(bindings: &[Binding], term: &str) -> bool {
    bindings.iter().any(|b| b.term.eq_ignore_ascii_case(term))
}

fn stage_alias(
    cap: &regex::Captures,
    text: &str,
    document_id: &str,
    seq: &mut IdSeq,
    result: &mut ExtractionResult,
) {
    let whole = cap.get(0).unwrap();
    let full = cap.name("full").unwrap().as_str().trim_end_matches(',').trim().to_string();
    let short = cap.name("short").unwrap().as_str().trim().to_string();

    if already_bound(&result.bindings, &short) {
        return;
    }

    let fact_id = seq.next_fact();
    let ev = Evidence::new(text, whole.start(), whole.end(), "alias", "binding").unwrap();
    let fact = Fact::new(fact_id.clone(), document_id, FactType::Metadata, whole.as_str(), ev);
    result.facts.push(fact);

    let binding_id = seq.next_binding();
    let binding = Binding::new(binding_id, document_id, BindingType::Alias, short, full, fact_id);
    result.bindings.push(binding.clone());
    result.aliases.push(binding);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::FileFormat;
    use crate::document_source::{DocumentSource, PlainTextSource};

    fn parse(text: &str) -> ParsedDocument {
        PlainTextSource.parse(text.as_bytes(), FileFormat::Docx).unwrap()
    }

    #[test]
    fn extraction_is_deterministic() {
        let text = "This Master Services Agreement is entered into between Alpha Corp, hereinafter referred to as \"Buyer\", and Beta Services Ltd, hereinafter referred to as \"Vendor\".";
        let doc = parse(text);
        let a = extract(&doc, "doc1", 1);
        let b = extract(&doc, "doc1", 1);
        assert_eq!(a.facts.len(), b.facts.len());
        for (fa, fb) in a.facts.iter().zip(b.facts.iter()) {
            assert_eq!(fa.value, fb.value);
            assert_eq!(fa.evidence, fb.evidence);
        }
    }

    #[test]
    fn extracts_party_aliases() {
        let text = "This Master Services Agreement is entered into between Alpha Corp, hereinafter referred to as \"Buyer\", and Beta Services Ltd, hereinafter referred to as \"Vendor\".";
        let doc = parse(text);
        let result = extract(&doc, "doc1", 1);
        assert_eq!(result.aliases.len(), 2);
        assert!(result.aliases.iter().any(|b| b.term == "Buyer" && b.resolves_to == "Alpha Corp"));
        assert!(result.aliases.iter().any(|b| b.term == "Vendor" && b.resolves_to == "Beta Services Ltd"));
    }

    #[test]
    fn extracts_money_and_duration() {
        let text = "Buyer shall pay Vendor $150,000.00 within sixty (60) days from the Effective Date.";
        let doc = parse(text);
        let result = extract(&doc, "doc1", 1);
        let money = result.facts.iter().find(|f| f.entity_type == Some(EntityType::Money));
        assert!(money.is_some());
        assert_eq!(money.unwrap().money.as_ref().unwrap().amount, 150000.0);
        let duration = result.facts.iter().find(|f| f.entity_type == Some(EntityType::Duration));
        assert!(duration.is_some());
        let d = duration.unwrap().duration.unwrap();
        assert_eq!(d.magnitude, 60);
        assert_eq!(d.unit, DurationUnit::Day);
    }

    #[test]
    fn detects_non_dollar_currencies() {
        let text = "Vendor invoices Buyer for €2,500.00 monthly, plus a one-time setup fee of 1,000.00 GBP.";
        let doc = parse(text);
        let result = extract(&doc, "doc1", 1);
        let money: Vec<_> = result.facts.iter().filter_map(|f| f.money.as_ref()).collect();
        assert!(money.iter().any(|m| m.currency == "EUR" && (m.amount - 2500.0).abs() < f64::EPSILON));
        assert!(money.iter().any(|m| m.currency == "GBP" && (m.amount - 1000.0).abs() < f64::EPSILON));
    }

    #[test]
    fn later_definition_with_amendment_phrase_supersedes_earlier_one() {
        let text = r#""Term" shall mean January 1, 2025. Effective immediately, this agreement is hereby amended and "Term" shall mean March 1, 2025."#;
        let doc = parse(text);
        let result = extract(&doc, "doc1", 1);
        let term_bindings: Vec<_> = result.bindings.iter().filter(|b| b.term == "Term").collect();
        assert_eq!(term_bindings.len(), 2);
        assert!(term_bindings[0].is_overridden_by.is_some());
        assert!(term_bindings[1].is_overridden_by.is_none());
    }

    #[test]
    fn later_definition_without_amendment_phrase_is_dropped() {
        let text = r#""Term" shall mean January 1, 2025. Separately, "Term" shall mean March 1, 2025."#;
        let doc = parse(text);
        let result = extract(&doc, "doc1", 1);
        let term_bindings: Vec<_> = result.bindings.iter().filter(|b| b.term == "Term").collect();
        assert_eq!(term_bindings.len(), 1);
        assert_eq!(term_bindings[0].resolves_to, "January 1, 2025");
    }

    #[test]
    fn cross_reference_resolves_to_matching_clause() {
        let text = "1. Termination\n\nEither party may terminate as set out in Section 2.\n\n2. Payment\n\nClient shall pay within fifteen (15) days.";
        let doc = parse(text);
        let result = extract(&doc, "doc1", 1);
        let xref = result.cross_refs.iter().find(|x| x.target_reference.eq_ignore_ascii_case("Section 2")).unwrap();
        assert!(xref.resolved);
        let target = result.clauses.iter().find(|c| c.clause_id == xref.target_clause_id.clone().unwrap()).unwrap();
        assert_eq!(target.heading, "2. Payment");
    }

    #[test]
    fn fact_evidence_matches_source_substring() {
        let text = "1. Purpose\n\nThis sets the stage for $1,000.00 payment.\n\n2. Term\n\nThe term is one year.";
        let doc = parse(text);
        let result = extract(&doc, "doc1", 1);
        for fact in &result.facts {
            assert_eq!(&doc.text[fact.evidence.char_start..fact.evidence.char_end], fact.evidence.text_span);
        }
    }

    #[test]
    fn clause_contains_only_facts_within_its_span() {
        let text = "1. Purpose\n\nThis sets the stage for $1,000.00 payment.\n\n2. Term\n\nThe term is one year.";
        let doc = parse(text);
        let result = extract(&doc, "doc1", 1);
        for clause in &result.clauses {
            let clause_fact = result.facts.iter().find(|f| f.fact_id == clause.fact_id).unwrap();
            for fid in &clause.contained_fact_ids {
                let f = result.facts.iter().find(|f| &f.fact_id == fid).unwrap();
                assert!(f.evidence.contained_within(&clause_fact.evidence));
            }
        }
    }
}

//! Bindings and the binding resolver.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingType {
    Definition,
    Assignment,
    Incorporation,
    Delegation,
    ScopeLimitation,
    Alias,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingScope {
    Contract,
    Family,
    Repository,
}

/// `{binding_id, document_id, binding_type, term, resolves_to,
/// source_fact_id, scope, is_overridden_by?}`.
///
/// *Invariant B1*: bindings carry no confidence field by construction — they
/// either exist in text or they do not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub binding_id: String,
    pub document_id: String,
    pub binding_type: BindingType,
    pub term: String,
    pub resolves_to: String,
    pub source_fact_id: String,
    pub scope: BindingScope,
    pub is_overridden_by: Option<String>,
}

impl Binding {
    pub fn new(
        binding_id: impl Into<String>,
        document_id: impl Into<String>,
        binding_type: BindingType,
        term: impl Into<String>,
        resolves_to: impl Into<String>,
        source_fact_id: impl Into<String>,
    ) -> Self {
        Self {
            binding_id: binding_id.into(),
            document_id: document_id.into(),
            binding_type,
            term: term.into(),
            resolves_to: resolves_to.into(),
            source_fact_id: source_fact_id.into(),
            scope: BindingScope::Contract,
            is_overridden_by: None,
        }
    }

    pub fn with_scope(mut self, scope: BindingScope) -> Self {
        self.scope = scope;
        self
    }

    fn normalized_term(&self) -> String {
        self.term.trim().to_lowercase()
    }
}

/// The outcome of [`resolve_term`]: either a chain of resolutions ending in
/// a concrete value, or an explicit `Unresolved` carrying nearby candidates.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTerm {
    Resolved {
        term: String,
        final_value: String,
        chain: Vec<String>,
    },
    Unresolved {
        term: String,
        nearest_candidates: Vec<String>,
    },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BindingError {
    #[error("binding resolution cycle detected for term '{0}'")]
    Cycle(String),
    #[error("binding chain for '{0}' exceeded max depth {1}")]
    MaxDepthExceeded(String, usize),
}

/// Resolves a term through a document's binding set.
///
/// *Invariant B2*: within-document resolution only (family/repository
/// precedence is out of scope for the core, per §4.4/§9).
/// *Invariant B3*: termination is guaranteed by an explicit visited set plus
/// `max_chain_depth`.
pub fn resolve_term(term: &str, bindings: &[Binding], max_chain_depth: usize) -> Result<ResolvedTerm, BindingError> {
    let normalized = term.trim().to_lowercase();
    let mut visited: HashSet<String> = HashSet::new();
    let mut chain = Vec::new();
    let mut current = normalized.clone();

    loop {
        if visited.contains(&current) {
            return Err(BindingError::Cycle(term.to_string()));
        }
        if chain.len() >= max_chain_depth {
            return Err(BindingError::MaxDepthExceeded(term.to_string(), max_chain_depth));
        }
        visited.insert(current.clone());

        // Later definitions supersede earlier ones (§4.4): when a term has
        // more than one binding, the most recently staged one — the one an
        // amendment phrase justified pushing alongside the original, see
        // `extractor::stage_bindings` — is the effective definition.
        let hit = bindings.iter().rev().find(|b| b.normalized_term() == current);
        match hit {
            None => {
                if chain.is_empty() {
                    let nearest = nearest_candidates(&current, bindings);
                    return Ok(ResolvedTerm::Unresolved {
                        term: term.to_string(),
                        nearest_candidates: nearest,
                    });
                }
                // Chain ended on a literal value, not a further term.
                return Ok(ResolvedTerm::Resolved {
                    term: term.to_string(),
                    final_value: current,
                    chain,
                });
            }
            Some(binding) => {
                let target = &binding.resolves_to;
                chain.push(target.clone());
                let candidate_next = target.trim().to_lowercase();
                // If the resolved value is itself a defined term, keep
                // walking the chain; otherwise this is the final value.
                if bindings.iter().any(|b| b.normalized_term() == candidate_next) {
                    current = candidate_next;
                    continue;
                }
                return Ok(ResolvedTerm::Resolved {
                    term: term.to_string(),
                    final_value: target.clone(),
                    chain,
                });
            }
        }
    }
}

fn nearest_candidates(term: &str, bindings: &[Binding]) -> Vec<String> {
    let mut candidates: Vec<(usize, String)> = bindings
        .iter()
        .map(|b| (levenshtein(term, &b.normalized_term()), b.term.clone()))
        .collect();
    candidates.sort_by_key(|(dist, _)| *dist);
    candidates.into_iter().take(3).map(|(_, t)| t).collect()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(term: &str, resolves_to: &str) -> Binding {
        Binding::new("b1", "doc1", BindingType::Definition, term, resolves_to, "f1")
    }

    #[test]
    fn resolves_simple_definition() {
        let bindings = vec![binding("Effective Date", "January 1, 2025")];
        let result = resolve_term("effective date", &bindings, 8).unwrap();
        match result {
            ResolvedTerm::Resolved { final_value, .. } => assert_eq!(final_value, "January 1, 2025"),
            other => panic!("expected resolved, got {other:?}"),
        }
    }

    #[test]
    fn later_binding_for_the_same_term_supersedes_the_earlier_one() {
        let bindings = vec![binding("Effective Date", "January 1, 2025"), binding("Effective Date", "March 1, 2025")];
        let result = resolve_term("effective date", &bindings, 8).unwrap();
        match result {
            ResolvedTerm::Resolved { final_value, .. } => assert_eq!(final_value, "March 1, 2025"),
            other => panic!("expected resolved, got {other:?}"),
        }
    }

    #[test]
    fn detects_cycles() {
        let bindings = vec![binding("X", "Y"), binding("Y", "X")];
        let err = resolve_term("X", &bindings, 8).unwrap_err();
        assert!(matches!(err, BindingError::Cycle(_)));
    }

    #[test]
    fn unresolved_returns_candidates() {
        let bindings = vec![binding("Buyer", "Alpha Corp")];
        let result = resolve_term("Byuer", &bindings, 8).unwrap();
        match result {
            ResolvedTerm::Unresolved { nearest_candidates, .. } => {
                assert_eq!(nearest_candidates, vec!["Buyer".to_string()]);
            }
            other => panic!("expected unresolved, got {other:?}"),
        }
    }
}

//! Derived graph view: `{nodes[], edges[]}` assembled
//! from facts, clauses, and bindings already persisted for a document.
//!
//! This is a read-only projection, not a stored entity — there is no
//! `graph` table in either backend. It is rebuilt on every call from the
//! typed rows the rest of the crate already exposes, the same way the
//! teacher's `KnowledgeGraph` type in `legalis-core/src/knowledge_graph.rs`
//! is assembled on demand from statute/case records rather than persisted
//! separately.

use serde::{Deserialize, Serialize};

use contractos_core::clause::ClassificationMethod;
use contractos_core::{Binding, Clause, Fact};

use crate::backend::{FactFilters, TrustGraphStore};
use crate::error::StoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphNodeType {
    Fact,
    Clause,
    Binding,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub node_type: GraphNodeType,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphEdgeType {
    /// A clause contains a fact (`Clause::contained_fact_ids`).
    Contains,
    /// A binding's definition or alias-of chain resolves to a fact or term.
    BindsTo,
    /// A clause cross-references another clause.
    CrossReferences,
    /// A fact fills a clause's expected slot (`ClauseFactSlot`).
    Fills,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub edge_type: GraphEdgeType,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

fn fact_label(fact: &Fact) -> String {
    format!("{:?}: {}", fact.fact_type, fact.value)
}

fn clause_label(clause: &Clause) -> String {
    match clause.classification_method {
        ClassificationMethod::Pattern => format!("{} ({})", clause.heading, clause.clause_type),
        ClassificationMethod::Llm => format!("{} ({}, llm)", clause.heading, clause.clause_type),
    }
}

fn binding_label(binding: &Binding) -> String {
    format!("{} := {}", binding.term, binding.resolves_to)
}

/// Builds the full graph for a document: every owned fact, clause, and
/// binding as a node, wired by containment, slot-fill, cross-reference, and
/// binding-resolution edges.
pub fn build_graph(store: &dyn TrustGraphStore, document_id: &str) -> StoreResult<GraphView> {
    let facts = store.get_facts(document_id, &FactFilters::new())?;
    let clauses = store.get_clauses(document_id, None)?;
    let bindings = store.get_bindings(document_id)?;
    let slots = store.get_slots(document_id)?;

    let mut view = GraphView::default();

    for fact in &facts {
        view.nodes.push(GraphNode {
            id: fact.fact_id.clone(),
            node_type: GraphNodeType::Fact,
            label: fact_label(fact),
        });
    }

    for clause in &clauses {
        view.nodes.push(GraphNode {
            id: clause.clause_id.clone(),
            node_type: GraphNodeType::Clause,
            label: clause_label(clause),
        });
        for contained in &clause.contained_fact_ids {
            view.edges.push(GraphEdge {
                from: clause.clause_id.clone(),
                to: contained.clone(),
                edge_type: GraphEdgeType::Contains,
            });
        }
        for xref in store.get_cross_refs(&clause.clause_id)? {
            if let Some(target) = &xref.target_clause_id {
                view.edges.push(GraphEdge {
                    from: clause.clause_id.clone(),
                    to: target.clone(),
                    edge_type: GraphEdgeType::CrossReferences,
                });
            }
        }
    }

    for binding in &bindings {
        view.nodes.push(GraphNode {
            id: binding.binding_id.clone(),
            node_type: GraphNodeType::Binding,
            label: binding_label(binding),
        });
        view.edges.push(GraphEdge {
            from: binding.binding_id.clone(),
            to: binding.source_fact_id.clone(),
            edge_type: GraphEdgeType::BindsTo,
        });
    }

    for slot in &slots {
        if let Some(fact_id) = &slot.filled_by_fact_id {
            view.edges.push(GraphEdge {
                from: slot.clause_id.clone(),
                to: fact_id.clone(),
                edge_type: GraphEdgeType::Fills,
            });
        }
    }

    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use contractos_core::contract::FileFormat;
    use contractos_core::{Contract, ExtractionResult};
    use crate::backend::ExtractionWrite;

    #[test]
    fn empty_document_has_empty_graph() {
        let store = MemoryBackend::new();
        store.insert_contract(Contract::new("doc1", "T", FileFormat::Pdf, "h", 1, 1)).unwrap();
        store
            .insert_extraction_result("doc1", ExtractionWrite { result: ExtractionResult::default(), slots: vec![] })
            .unwrap();
        let graph = build_graph(&store, "doc1").unwrap();
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
    }
}

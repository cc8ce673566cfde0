//! Embedding index (C6, spec §4.6): per-document chunked vector index with a
//! deterministic lexical fallback.
//!
//! Grounded on the teacher's `legalis-llm/src/embeddings.rs` `Embedding`
//! shape (`{vector, dimensions}`) and `legalis-llm/src/rag.rs`'s
//! `DocumentChunk` chunking pattern, narrowed to the spec's fixed chunk
//! taxonomy (`fact`, `clause`, `binding`) and persisted as a flat binary
//! format rather than the teacher's in-memory-only RAG store.

use std::collections::HashMap;
use std::io::{self, Read, Write};

use contractos_core::clause::ClassificationMethod;
use contractos_core::{Clause, ExtractionResult, Fact};
use serde::{Deserialize, Serialize};

use crate::provider::LmProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkType {
    Fact,
    Clause,
    Binding,
    Table,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_type: ChunkType,
    pub source_fact_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub source_fact_id: String,
    pub document_id: String,
    pub score: f32,
}

/// Builds the chunk set for a document's extraction result (spec §4.6 "Chunk
/// construction"). `clause_text` facts, clause span summaries, entity facts
/// with surface forms of at least 3 tokens, and binding definitions all
/// become chunks; table rows are concatenated per row (SPEC_FULL.md §C.2,
/// alias-aware: a table row is chunked once per distinct row index, joining
/// every cell whose evidence shares that index, tagged with the row's column
/// headers so a retrieved `chunk_type=table` chunk carries row context).
pub fn build_chunks(document_id: &str, result: &ExtractionResult) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let facts_by_id: HashMap<&str, &Fact> = result.facts.iter().map(|f| (f.fact_id.as_str(), f)).collect();

    for fact in &result.facts {
        match fact.fact_type {
            contractos_core::FactType::ClauseText => {
                chunks.push(Chunk {
                    chunk_id: format!("chunk-{}", fact.fact_id),
                    document_id: document_id.to_string(),
                    chunk_type: ChunkType::Fact,
                    source_fact_id: fact.fact_id.clone(),
                    text: fact.value.clone(),
                });
            }
            contractos_core::FactType::Entity => {
                if fact.value.split_whitespace().count() >= 3 {
                    chunks.push(Chunk {
                        chunk_id: format!("chunk-{}", fact.fact_id),
                        document_id: document_id.to_string(),
                        chunk_type: ChunkType::Fact,
                        source_fact_id: fact.fact_id.clone(),
                        text: fact.value.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    chunks.extend(build_table_chunks(document_id, &result.facts));

    for clause in &result.clauses {
        let summary = clause_summary(clause, &facts_by_id);
        chunks.push(Chunk {
            chunk_id: format!("chunk-clause-{}", clause.clause_id),
            document_id: document_id.to_string(),
            chunk_type: ChunkType::Clause,
            source_fact_id: clause.fact_id.clone(),
            text: summary,
        });
    }

    for binding in result.bindings.iter().chain(result.aliases.iter()) {
        chunks.push(Chunk {
            chunk_id: format!("chunk-binding-{}", binding.binding_id),
            document_id: document_id.to_string(),
            chunk_type: ChunkType::Binding,
            source_fact_id: binding.source_fact_id.clone(),
            text: format!("{} means {}", binding.term, binding.resolves_to),
        });
    }

    chunks
}

/// Parses the `structural_path` the extractor stamps onto a `table_cell`
/// fact's evidence (`"table[row,col]"` or `"table[row,col]:header"`) back
/// into `(row, col, column_header)`.
fn parse_table_cell_path(path: &str) -> Option<(usize, usize, Option<String>)> {
    let rest = path.strip_prefix("table[")?;
    let bracket_end = rest.find(']')?;
    let mut coords = rest[..bracket_end].split(',');
    let row: usize = coords.next()?.trim().parse().ok()?;
    let col: usize = coords.next()?.trim().parse().ok()?;
    let header = rest[bracket_end + 1..].strip_prefix(':').map(|h| h.to_string());
    Some((row, col, header))
}

/// Groups every `table_cell` fact by its originating row and joins the row
/// into a single chunk, one chunk per distinct row index (SPEC_FULL.md §C.2).
fn build_table_chunks(document_id: &str, facts: &[Fact]) -> Vec<Chunk> {
    let mut rows: std::collections::BTreeMap<usize, Vec<(usize, Option<String>, &Fact)>> =
        std::collections::BTreeMap::new();
    for fact in facts {
        if fact.fact_type != contractos_core::FactType::TableCell {
            continue;
        }
        if let Some((row, col, header)) = parse_table_cell_path(&fact.evidence.structural_path) {
            rows.entry(row).or_default().push((col, header, fact));
        }
    }

    rows.into_iter()
        .map(|(row, mut cells)| {
            cells.sort_by_key(|(col, _, _)| *col);
            let text = cells
                .iter()
                .map(|(_, header, fact)| match header {
                    Some(h) => format!("{h}: {}", fact.value),
                    None => fact.value.clone(),
                })
                .collect::<Vec<_>>()
                .join(" | ");
            let source_fact_id = cells.first().map(|(_, _, f)| f.fact_id.clone()).unwrap_or_default();
            Chunk {
                chunk_id: format!("chunk-table-{document_id}-row-{row}"),
                document_id: document_id.to_string(),
                chunk_type: ChunkType::Table,
                source_fact_id,
                text,
            }
        })
        .collect()
}

fn clause_summary(clause: &Clause, facts_by_id: &HashMap<&str, &Fact>) -> String {
    let method_note = match clause.classification_method {
        ClassificationMethod::Pattern => "",
        ClassificationMethod::Llm => " (llm-classified)",
    };
    let body: String = facts_by_id
        .get(clause.fact_id.as_str())
        .map(|f| f.value.chars().take(200).collect::<String>())
        .unwrap_or_default();
    format!("{}{}: {}", clause.heading, method_note, body)
}

const FLAT_MAGIC: &[u8; 4] = b"CEI1";

/// A per-document index holding chunk metadata, embedding vectors, and a
/// lexical-token index used as a fallback when the embedding model cannot
/// be reached at index time.
#[derive(Debug, Clone, Default)]
pub struct DocumentIndex {
    pub model_id: String,
    pub dim: usize,
    pub degraded: bool,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

impl DocumentIndex {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Serializes `{dim, count, model_id}` header plus float32 vector data,
    /// followed by JSON-encoded chunk metadata (spec §4.6 binary flat
    /// format; metadata trails the fixed-width vector block so vectors can
    /// be memory-mapped independently in a future revision).
    pub fn to_flat_bytes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(FLAT_MAGIC);
        out.extend_from_slice(&(self.dim as u32).to_le_bytes());
        out.extend_from_slice(&(self.chunks.len() as u32).to_le_bytes());
        let model_bytes = self.model_id.as_bytes();
        out.extend_from_slice(&(model_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(model_bytes);
        out.push(self.degraded as u8);
        for vector in &self.vectors {
            for value in vector {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        let meta = serde_json::to_vec(&self.chunks)?;
        out.extend_from_slice(&(meta.len() as u32).to_le_bytes());
        out.extend_from_slice(&meta);
        Ok(out)
    }

    pub fn from_flat_bytes(mut bytes: &[u8]) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        bytes.read_exact(&mut magic)?;
        if &magic != FLAT_MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic for embedding index"));
        }
        let dim = read_u32(&mut bytes)? as usize;
        let count = read_u32(&mut bytes)? as usize;
        let model_len = read_u32(&mut bytes)? as usize;
        let mut model_bytes = vec![0u8; model_len];
        bytes.read_exact(&mut model_bytes)?;
        let model_id = String::from_utf8(model_bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut degraded_byte = [0u8; 1];
        bytes.read_exact(&mut degraded_byte)?;
        let degraded = degraded_byte[0] != 0;

        let mut vectors = Vec::with_capacity(count);
        for _ in 0..count {
            let mut vector = vec![0.0f32; dim];
            for slot in &mut vector {
                let mut buf = [0u8; 4];
                bytes.read_exact(&mut buf)?;
                *slot = f32::from_le_bytes(buf);
            }
            vectors.push(vector);
        }

        let meta_len = read_u32(&mut bytes)? as usize;
        let mut meta_bytes = vec![0u8; meta_len];
        bytes.read_exact(&mut meta_bytes)?;
        let chunks: Vec<Chunk> = serde_json::from_slice(&meta_bytes)?;

        Ok(Self { model_id, dim, degraded, chunks, vectors })
    }
}

fn read_u32(bytes: &mut &[u8]) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    bytes.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector {
            *value /= norm;
        }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Tokenizes into lowercase alphanumeric terms for the BM25-style fallback.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// A deterministic BM25-style lexical rank used when no embedding model is
/// available. Not a full BM25 implementation — term-frequency
/// overlap normalized by document length, which is enough to keep the
/// system usable without a model and fully reproducible in tests.
fn lexical_score(query_tokens: &[String], chunk_tokens: &[String]) -> f32 {
    if chunk_tokens.is_empty() {
        return 0.0;
    }
    let mut hits = 0usize;
    for qt in query_tokens {
        hits += chunk_tokens.iter().filter(|ct| *ct == qt).count();
    }
    hits as f32 / (chunk_tokens.len() as f32).sqrt()
}

/// Embeds and indexes a document's chunks.
/// Retries the embedding call a bounded number of times; on persistent
/// failure, marks the index `degraded` and leaves vectors empty so `search`
/// falls back to lexical mode.
pub async fn index_document(
    provider: &dyn LmProvider,
    model_id: &str,
    dim: usize,
    chunks: Vec<Chunk>,
) -> DocumentIndex {
    const MAX_ATTEMPTS: u32 = 3;
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

    let mut attempt = 0;
    loop {
        attempt += 1;
        match provider.embed(&texts).await {
            Ok(mut vectors) => {
                for v in &mut vectors {
                    l2_normalize(v);
                }
                return DocumentIndex { model_id: model_id.to_string(), dim, degraded: false, chunks, vectors };
            }
            Err(_) if attempt < MAX_ATTEMPTS => continue,
            Err(_) => {
                return DocumentIndex { model_id: model_id.to_string(), dim, degraded: true, chunks, vectors: Vec::new() };
            }
        }
    }
}

/// Searches an index for the top-k chunks matching `query_text`, optionally
/// restricted to `chunk_type_filter`. Falls back to the lexical rank when
/// the index is degraded or the embedding call fails.
pub async fn search(
    provider: &dyn LmProvider,
    index: &DocumentIndex,
    query_text: &str,
    top_k: usize,
    chunk_type_filter: Option<ChunkType>,
) -> (Vec<SearchHit>, bool) {
    let candidate_indices: Vec<usize> = index
        .chunks
        .iter()
        .enumerate()
        .filter(|(_, c)| chunk_type_filter.is_none_or(|f| c.chunk_type == f))
        .map(|(i, _)| i)
        .collect();

    if !index.degraded {
        if let Ok(mut query_vec) = provider.embed(std::slice::from_ref(&query_text.to_string())).await {
            if let Some(q) = query_vec.pop() {
                let mut q = q;
                l2_normalize(&mut q);
                let mut scored: Vec<(usize, f32)> =
                    candidate_indices.iter().map(|&i| (i, cosine(&q, &index.vectors[i]))).collect();
                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                scored.truncate(top_k);
                let hits = scored
                    .into_iter()
                    .map(|(i, score)| {
                        let chunk = &index.chunks[i];
                        SearchHit {
                            chunk_id: chunk.chunk_id.clone(),
                            source_fact_id: chunk.source_fact_id.clone(),
                            document_id: chunk.document_id.clone(),
                            score,
                        }
                    })
                    .collect();
                return (hits, false);
            }
        }
    }

    let query_tokens = tokenize(query_text);
    let mut scored: Vec<(usize, f32)> = candidate_indices
        .iter()
        .map(|&i| (i, lexical_score(&query_tokens, &tokenize(&index.chunks[i].text))))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    let hits = scored
        .into_iter()
        .map(|(i, score)| {
            let chunk = &index.chunks[i];
            SearchHit {
                chunk_id: chunk.chunk_id.clone(),
                source_fact_id: chunk.source_fact_id.clone(),
                document_id: chunk.document_id.clone(),
                score,
            }
        })
        .collect();
    (hits, true)
}

/// Multi-document registry, keyed by `document_id` (spec §4.6
/// `remove_document`). Owned by the document agent, not by
/// `contractos-store` — the spec treats the embedding index as a derived,
/// rebuildable artifact rather than part of the TrustGraph proper.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndexRegistry {
    indices: HashMap<String, DocumentIndex>,
}

impl EmbeddingIndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, document_id: impl Into<String>, index: DocumentIndex) {
        self.indices.insert(document_id.into(), index);
    }

    pub fn get(&self, document_id: &str) -> Option<&DocumentIndex> {
        self.indices.get(document_id)
    }

    pub fn remove_document(&mut self, document_id: &str) {
        self.indices.remove(document_id);
    }

    pub fn to_writer<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&(self.indices.len() as u32).to_le_bytes())?;
        for (document_id, index) in &self.indices {
            let id_bytes = document_id.as_bytes();
            writer.write_all(&(id_bytes.len() as u32).to_le_bytes())?;
            writer.write_all(id_bytes)?;
            let flat = index.to_flat_bytes()?;
            writer.write_all(&(flat.len() as u32).to_le_bytes())?;
            writer.write_all(&flat)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use contractos_core::clause::ClauseType;
    use contractos_core::fact::{Evidence, FactType};
    use contractos_core::{Clause, Fact};

    fn sample_result() -> ExtractionResult {
        let mut result = ExtractionResult::default();
        let ev = Evidence::new("Termination for convenience with 30 days notice", 0, 48, "para", "root").unwrap();
        let fact = Fact::new("f1", "doc1", FactType::Clause, "Termination for convenience with 30 days notice", ev);
        result.clauses.push(Clause::new("c1", "doc1", ClauseType::Termination, "Termination", "f1", ClassificationMethod::Pattern));
        result.facts.push(fact);
        result
    }

    #[test]
    fn builds_a_clause_chunk_per_clause() {
        let result = sample_result();
        let chunks = build_chunks("doc1", &result);
        assert!(chunks.iter().any(|c| c.chunk_type == ChunkType::Clause));
    }

    #[test]
    fn table_rows_are_chunked_once_per_row_with_headers() {
        let rows = [
            [("product", "Dell Inspiron 15"), ("category", "IT Equipment"), ("quantity", "50")],
            [("product", "HP LaserJet Pro"), ("category", "Office Equipment"), ("quantity", "25")],
        ];
        let mut text = String::new();
        let mut facts = Vec::new();
        for (row, cells) in rows.iter().enumerate() {
            for (col, (header, value)) in cells.iter().enumerate() {
                let start = text.len();
                text.push_str(value);
                let end = text.len();
                let ev = Evidence::new(&text, start, end, "table_cell", format!("table[{row},{col}]:{header}")).unwrap();
                facts.push(Fact::new(format!("f-{row}-{col}"), "doc1", FactType::TableCell, *value, ev));
            }
        }
        let mut result = ExtractionResult::default();
        result.facts = facts;

        let chunks = build_chunks("doc1", &result);
        let table_chunks: Vec<_> = chunks.iter().filter(|c| c.chunk_type == ChunkType::Table).collect();
        assert_eq!(table_chunks.len(), 2);
        let row0 = table_chunks.iter().find(|c| c.chunk_id.ends_with("row-0")).unwrap();
        assert!(row0.text.contains("product: Dell Inspiron 15"));
        assert!(row0.text.contains("category: IT Equipment"));
        assert!(row0.text.contains("quantity: 50"));
    }

    #[tokio::test]
    async fn index_then_search_finds_relevant_chunk() {
        let provider = MockProvider::new();
        let result = sample_result();
        let chunks = build_chunks("doc1", &result);
        let index = index_document(&provider, "mock-embed", 32, chunks).await;
        assert!(!index.degraded);
        let (hits, used_fallback) = search(&provider, &index, "termination notice", 5, None).await;
        assert!(!used_fallback);
        assert!(!hits.is_empty());
    }

    #[test]
    fn flat_bytes_round_trip() {
        let index = DocumentIndex {
            model_id: "mock-embed".to_string(),
            dim: 4,
            degraded: false,
            chunks: vec![Chunk {
                chunk_id: "c1".to_string(),
                document_id: "doc1".to_string(),
                chunk_type: ChunkType::Fact,
                source_fact_id: "f1".to_string(),
                text: "hello".to_string(),
            }],
            vectors: vec![vec![0.5, 0.5, 0.5, 0.5]],
        };
        let bytes = index.to_flat_bytes().unwrap();
        let restored = DocumentIndex::from_flat_bytes(&bytes).unwrap();
        assert_eq!(restored.model_id, "mock-embed");
        assert_eq!(restored.len(), 1);
    }
}

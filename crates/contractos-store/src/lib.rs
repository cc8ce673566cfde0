//! TrustGraph persistence: the typed storage boundary
//! plus two interchangeable backends and a derived graph view.
//!
//! Grounded on the teacher's `legalis-audit` crate: a pluggable `Storage`
//! trait (here `TrustGraphStore`) with an in-memory backend for tests and a
//! SQLite backend for durability, both behind the same interface so callers
//! never branch on which one is active.

pub mod backend;
pub mod error;
pub mod graph;
pub mod memory;
pub mod sqlite;

pub use backend::{ExtractionWrite, FactFilters, TrustGraphStore};
pub use error::{StoreError, StoreResult};
pub use graph::{GraphEdge, GraphEdgeType, GraphNode, GraphNodeType, GraphView};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

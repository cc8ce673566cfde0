//! Contracts: the top-level owning entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    Docx,
    Pdf,
}

/// A contract, created on upload and immutable thereafter except that
/// re-indexing replaces all owned child entities atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub document_id: String,
    pub title: String,
    pub file_format: FileFormat,
    pub file_hash: String,
    pub parties: Vec<String>,
    pub effective_date: Option<DateTime<Utc>>,
    pub word_count: usize,
    pub indexed_at: DateTime<Utc>,
    pub extraction_version: u32,
}

impl Contract {
    pub fn new(
        document_id: impl Into<String>,
        title: impl Into<String>,
        file_format: FileFormat,
        file_hash: impl Into<String>,
        word_count: usize,
        extraction_version: u32,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            title: title.into(),
            file_format,
            file_hash: file_hash.into(),
            parties: Vec::new(),
            effective_date: None,
            word_count,
            indexed_at: Utc::now(),
            extraction_version,
        }
    }

    pub fn with_parties(mut self, parties: Vec<String>) -> Self {
        self.parties = parties;
        self
    }

    pub fn with_effective_date(mut self, date: DateTime<Utc>) -> Self {
        self.effective_date = Some(date);
        self
    }

    /// Computes the hash used by `check_change` (§6 workspace operations).
    pub fn hash_bytes(bytes: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }
}

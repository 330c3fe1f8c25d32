use serde::{Deserialize, Serialize};

pub type TermId = u32;
pub type DocId = u32;

/// A unit of the corpus: a globally unique identifier and its raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub identifier: String,
    pub content: String,
}

impl Document {
    pub fn new(identifier: impl Into<String>, content: impl Into<String>) -> Self {
        Self { identifier: identifier.into(), content: content.into() }
    }
}

/// Per-document record stored in `docs.bin`, indexed by [`DocId`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMeta {
    pub identifier: String,
    /// Byte range of the content inside `texts.bin`.
    pub offset: u64,
    pub len: u64,
    pub num_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
}

/// Dictionary entry: document frequency and the byte range of the encoded
/// posting list inside `postings.bin`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TermInfo {
    pub df: u32,
    pub offset: u64,
    pub len: u64,
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type Term = String;
pub type DocId = u32;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    pub url: Option<String>,
    /// Number of tokens in the document, used for BM25 length normalization.
    pub length: u32,
}

/// One (term, document) entry of the inverted index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub term_frequency: u32,
    /// Token offsets of the term in the document, strictly increasing.
    #[serde(default)]
    pub positions: Vec<u32>,
}

impl Posting {
    /// Build a posting whose frequency is the number of positions.
    pub fn from_positions(positions: Vec<u32>) -> Self {
        Self { term_frequency: positions.len() as u32, positions }
    }

    pub fn positions_are_sorted(&self) -> bool {
        self.positions.windows(2).all(|w| w[0] < w[1])
    }
}

pub type TermPostings = HashMap<DocId, Posting>;

/// Postings fetched for one ranking pass, keyed by term.
pub type PostingList = HashMap<Term, TermPostings>;

/// Read-only corpus snapshot taken once per ranking pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorpusStats {
    pub corpus_size: u64,
    pub average_document_length: f64,
}

impl CorpusStats {
    pub fn new(corpus_size: u64, average_document_length: f64) -> Self {
        Self { corpus_size: corpus_size.max(1), average_document_length }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDocument {
    pub id: DocId,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub id: DocId,
    pub score: f64,
    pub url: String,
}

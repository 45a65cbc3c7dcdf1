//! The index store the ranker reads from, and an in-memory implementation.

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::index::{DocId, DocMeta, Posting, PostingList, TermPostings};

/// Read capabilities the ranker needs from an inverted-index store.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Total number of indexed documents.
    async fn corpus_size(&self) -> Result<u64>;

    /// Mean document length, or `None` if the store does not track it.
    async fn average_document_length(&self) -> Result<Option<f64>>;

    /// Postings for `term`; an empty map if the term was never indexed.
    async fn postings(&self, term: &str) -> Result<TermPostings>;

    async fn document_length(&self, doc: DocId) -> Result<u32>;

    /// URLs for `docs`, same length and order. `None` marks an id the store cannot resolve.
    async fn resolve_urls(&self, docs: &[DocId]) -> Result<Vec<Option<String>>>;
}

#[derive(Debug, Default)]
struct Inner {
    docs: HashMap<DocId, DocMeta>,
    postings: PostingList,
}

/// Store held entirely in memory. Writers and ranking passes may run concurrently.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_document(&self, doc: DocId, meta: DocMeta) {
        self.inner.write().docs.insert(doc, meta);
    }

    pub fn insert_posting(&self, term: &str, doc: DocId, posting: Posting) -> Result<()> {
        if !posting.positions_are_sorted() {
            bail!("positions for term {term:?} in doc {doc} are not strictly increasing");
        }
        self.inner.write().postings.entry(term.to_string()).or_default().insert(doc, posting);
        Ok(())
    }

    pub fn document(&self, doc: DocId) -> Option<DocMeta> {
        self.inner.read().docs.get(&doc).cloned()
    }

    pub fn num_docs(&self) -> usize {
        self.inner.read().docs.len()
    }

    pub fn num_terms(&self) -> usize {
        self.inner.read().postings.len()
    }

    pub(crate) fn export(&self) -> (HashMap<DocId, DocMeta>, PostingList) {
        let inner = self.inner.read();
        (inner.docs.clone(), inner.postings.clone())
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn corpus_size(&self) -> Result<u64> {
        Ok(self.inner.read().docs.len() as u64)
    }

    async fn average_document_length(&self) -> Result<Option<f64>> {
        let inner = self.inner.read();
        if inner.docs.is_empty() {
            return Ok(None);
        }
        let total: u64 = inner.docs.values().map(|d| d.length as u64).sum();
        Ok(Some(total as f64 / inner.docs.len() as f64))
    }

    async fn postings(&self, term: &str) -> Result<TermPostings> {
        Ok(self.inner.read().postings.get(term).cloned().unwrap_or_default())
    }

    async fn document_length(&self, doc: DocId) -> Result<u32> {
        match self.inner.read().docs.get(&doc) {
            Some(meta) => Ok(meta.length),
            None => bail!("unknown document {doc}"),
        }
    }

    async fn resolve_urls(&self, docs: &[DocId]) -> Result<Vec<Option<String>>> {
        let inner = self.inner.read();
        Ok(docs.iter().map(|d| inner.docs.get(d).and_then(|m| m.url.clone())).collect())
    }
}

//! JSON snapshots of a [`MemoryStore`].

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::index::{DocId, DocMeta, PostingList};
use crate::store::MemoryStore;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub documents: HashMap<DocId, DocMeta>,
    pub postings: PostingList,
}

impl Snapshot {
    pub fn into_store(self) -> Result<MemoryStore> {
        if self.version != SNAPSHOT_VERSION {
            bail!("unsupported snapshot version {} (expected {SNAPSHOT_VERSION})", self.version);
        }
        let store = MemoryStore::new();
        for (term, docs) in &self.postings {
            if let Some(doc) = docs.keys().find(|&&d| !self.documents.contains_key(&d)) {
                bail!("postings for term {term:?} reference unregistered document {doc}");
            }
        }
        for (doc, meta) in self.documents {
            store.insert_document(doc, meta);
        }
        for (term, docs) in self.postings {
            for (doc, posting) in docs {
                store.insert_posting(&term, doc, posting)?;
            }
        }
        Ok(store)
    }

    pub fn from_store(store: &MemoryStore) -> Self {
        let (documents, postings) = store.export();
        Self { version: SNAPSHOT_VERSION, documents, postings }
    }
}

pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<MemoryStore> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("opening snapshot {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parsing snapshot {}", path.display()))?;
    let store = snapshot.into_store()?;
    tracing::info!(path = %path.display(), num_docs = store.num_docs(), num_terms = store.num_terms(), "loaded snapshot");
    Ok(store)
}

pub fn save_snapshot<P: AsRef<Path>>(path: P, store: &MemoryStore) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
        create_dir_all(dir)?;
    }
    let mut f = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut f, &Snapshot::from_store(store))?;
    f.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Posting;
    use crate::store::IndexStore;

    #[tokio::test]
    async fn save_then_load_keeps_postings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let store = MemoryStore::new();
        store.insert_document(4, DocMeta { url: Some("https://d.example".into()), length: 12 });
        store.insert_posting("rust", 4, Posting::from_positions(vec![0, 7])).unwrap();
        save_snapshot(&path, &store).unwrap();

        let loaded = load_snapshot(&path).unwrap();
        let postings = loaded.postings("rust").await.unwrap();
        assert_eq!(postings[&4].term_frequency, 2);
        assert_eq!(postings[&4].positions, vec![0, 7]);
        assert_eq!(loaded.document(4).unwrap().length, 12);
    }

    #[test]
    fn positions_are_optional_in_json() {
        let json = r#"{
            "version": 1,
            "documents": {"1": {"url": "https://a.example", "length": 3}},
            "postings": {"cat": {"1": {"term_frequency": 2}}}
        }"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        let store = snapshot.into_store().unwrap();
        assert_eq!(store.num_terms(), 1);
    }

    #[test]
    fn rejects_unknown_version() {
        let snapshot = Snapshot { version: 99, ..Default::default() };
        assert!(snapshot.into_store().is_err());
    }

    #[test]
    fn rejects_unsorted_positions() {
        let json = r#"{"version": 1, "documents": {"1": {"length": 7}}, "postings": {"cat": {"1": {"term_frequency": 2, "positions": [5, 2]}}}}"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.into_store().is_err());
    }

    #[test]
    fn rejects_postings_for_unregistered_documents() {
        let json = r#"{
            "version": 1,
            "documents": {"1": {"url": "https://a.example", "length": 3}},
            "postings": {"a": {"1": {"term_frequency": 1}, "2": {"term_frequency": 1}}}
        }"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        let err = snapshot.into_store().unwrap_err();
        assert!(err.to_string().contains("unregistered document 2"));
    }
}

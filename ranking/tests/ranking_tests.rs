use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ranking::{DocId, DocMeta, IndexStore, MemoryStore, Posting, RankError, RankRequest, Ranker, RankerConfig, TermPostings};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn url(doc: DocId) -> String {
    format!("https://example.com/{doc}")
}

fn add_doc(store: &MemoryStore, doc: DocId, length: u32) {
    store.insert_document(doc, DocMeta { url: Some(url(doc)), length });
}

fn add(store: &MemoryStore, term: &str, doc: DocId, positions: &[u32]) {
    store.insert_posting(term, doc, Posting::from_positions(positions.to_vec())).unwrap();
}

/// Ten documents; "cat" in 1 (twice) and 2 (once).
fn cat_store() -> MemoryStore {
    let store = MemoryStore::new();
    for doc in 1..=10 {
        add_doc(&store, doc, 10);
    }
    store.insert_posting("cat", 1, Posting { term_frequency: 2, positions: vec![0] }).unwrap();
    store.insert_posting("cat", 2, Posting { term_frequency: 1, positions: vec![3] }).unwrap();
    store
}

/// Small corpus with phrases and boolean structure.
fn corpus() -> MemoryStore {
    let store = MemoryStore::new();
    for doc in 1..=6 {
        add_doc(&store, doc, 20);
    }
    // 1: "new york pizza"   2: "york new"   3: "new jersey york"
    // 4: "pizza pizza"      5: "new york new york"   6: "bagel"
    add(&store, "new", 1, &[0]);
    add(&store, "york", 1, &[1]);
    add(&store, "pizza", 1, &[2]);
    add(&store, "york", 2, &[0]);
    add(&store, "new", 2, &[1]);
    add(&store, "new", 3, &[0]);
    add(&store, "jersey", 3, &[1]);
    add(&store, "york", 3, &[2]);
    add(&store, "pizza", 4, &[0, 1]);
    add(&store, "new", 5, &[0, 2]);
    add(&store, "york", 5, &[1, 3]);
    add(&store, "bagel", 6, &[0]);
    store
}

fn ranker(store: impl IndexStore + 'static) -> Ranker {
    Ranker::new(Arc::new(store), RankerConfig::default())
}

fn ids(results: &[ranking::ScoredDocument]) -> Vec<DocId> {
    results.iter().map(|d| d.id).collect()
}

#[tokio::test]
async fn tfidf_end_to_end() {
    let r = ranker(cat_store());
    let ranked = r.rank(&RankRequest::new("cat").with_strategy("tfidf").with_limit(100)).await.unwrap();
    assert_eq!(ids(&ranked), vec![1, 2]);
    assert!(ranked[0].score > ranked[1].score);

    let urls = r.rank_results("cat", "tfidf", "", "").await.unwrap();
    assert_eq!(urls, vec![url(1), url(2)]);
}

#[tokio::test]
async fn blank_strategy_uses_default() {
    let r = ranker(cat_store());
    assert_eq!(r.rank_results("cat", "", "", "").await.unwrap(), vec![url(1), url(2)]);
    assert_eq!(r.rank_results("cat", "  ", "", "").await.unwrap(), vec![url(1), url(2)]);
}

#[tokio::test]
async fn bm25_stays_finite_when_postings_outnumber_documents() {
    let store = MemoryStore::new();
    add_doc(&store, 1, 10);
    for doc in [1, 2, 3] {
        add(&store, "a", doc, &[0]);
    }
    for doc in [2, 3] {
        add(&store, "x", doc, &[1]);
    }
    let ranked = ranker(store).rank(&RankRequest::new("a").with_not("x").with_strategy("bm25")).await.unwrap();
    assert_eq!(ids(&ranked), vec![1]);
    assert!(ranked[0].score.is_finite());
}

#[tokio::test]
async fn every_strategy_ranks_higher_frequency_first() {
    let r = ranker(cat_store());
    for name in ["tf", "tfidf", "bm25"] {
        let ranked = r.rank(&RankRequest::new("cat").with_strategy(name)).await.unwrap();
        assert_eq!(ids(&ranked), vec![1, 2], "strategy {name}");
    }
}

#[tokio::test]
async fn default_strategy_comes_from_config() {
    let r = ranker(cat_store());
    let ranked = r.rank(&RankRequest::new("CAT!")).await.unwrap();
    assert_eq!(ids(&ranked), vec![1, 2]);
}

#[tokio::test]
async fn boolean_operators_filter_candidates() {
    let r = ranker(corpus());
    let ranked = r.rank(&RankRequest::new("new pizza").with_and("york").with_not("jersey")).await.unwrap();
    let mut got = ids(&ranked);
    got.sort_unstable();
    assert_eq!(got, vec![1, 2, 5]);
}

#[tokio::test]
async fn and_only_query_returns_matches() {
    let r = ranker(corpus());
    let ranked = r.rank(&RankRequest::new("").with_and("pizza")).await.unwrap();
    let mut got = ids(&ranked);
    got.sort_unstable();
    assert_eq!(got, vec![1, 4]);
}

#[tokio::test]
async fn unknown_not_term_is_a_no_op() {
    let r = ranker(corpus());
    let with = r.rank(&RankRequest::new("pizza").with_not("unicorn")).await.unwrap();
    let without = r.rank(&RankRequest::new("pizza")).await.unwrap();
    assert_eq!(with, without);
}

#[tokio::test]
async fn phrase_requires_contiguous_terms() {
    let r = ranker(corpus());
    let ranked = r.rank(&RankRequest::new("").with_phrase("New York")).await.unwrap();
    // doc 5 holds the phrase twice
    assert_eq!(ids(&ranked), vec![5, 1]);
}

#[tokio::test]
async fn phrase_combines_with_optional_terms() {
    let r = ranker(corpus());
    let ranked = r.rank(&RankRequest::new("pizza").with_phrase("new york").with_strategy("tf")).await.unwrap();
    assert_eq!(ids(&ranked), vec![1]);
}

#[tokio::test]
async fn ties_resolve_by_ascending_id() {
    let store = MemoryStore::new();
    for doc in [7, 3, 5] {
        add_doc(&store, doc, 10);
        add(&store, "tie", doc, &[0]);
    }
    let r = ranker(store);
    for _ in 0..5 {
        let ranked = r.rank(&RankRequest::new("tie").with_strategy("bm25")).await.unwrap();
        assert_eq!(ids(&ranked), vec![3, 5, 7]);
    }
}

#[tokio::test]
async fn result_limit_truncates() {
    let store = MemoryStore::new();
    for doc in 0..150 {
        add_doc(&store, doc, 10);
        add(&store, "common", doc, &[0]);
    }
    let r = ranker(store);
    assert_eq!(r.rank_results("common", "tf", "", "").await.unwrap().len(), 100);
    assert_eq!(r.rank(&RankRequest::new("common").with_limit(7)).await.unwrap().len(), 7);
}

#[tokio::test]
async fn unresolvable_ids_are_dropped() {
    let store = cat_store();
    store.insert_document(2, DocMeta { url: None, length: 10 });
    let r = ranker(store);
    assert_eq!(r.rank_results("cat", "tfidf", "", "").await.unwrap(), vec![url(1)]);
}

#[tokio::test]
async fn unknown_strategy_is_reported_not_fatal() {
    let r = ranker(cat_store());
    let err = r.rank(&RankRequest::new("cat").with_strategy("pagerank")).await.unwrap_err();
    assert!(matches!(err, RankError::UnknownStrategy(_)));
    assert!(r.rank_results("cat", "pagerank", "", "").await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_query_is_invalid() {
    let r = ranker(cat_store());
    let err = r.rank(&RankRequest::new("  ?! ")).await.unwrap_err();
    assert!(matches!(err, RankError::InvalidQuery(_)));
    assert!(r.rank_results("", "tfidf", "", "").await.unwrap().is_empty());

    let err = r.rank(&RankRequest::new("cat").with_phrase("...")).await.unwrap_err();
    assert!(matches!(err, RankError::InvalidQuery(_)));
}

struct DownStore;

#[async_trait]
impl IndexStore for DownStore {
    async fn corpus_size(&self) -> Result<u64> {
        Ok(10)
    }
    async fn average_document_length(&self) -> Result<Option<f64>> {
        Ok(None)
    }
    async fn postings(&self, term: &str) -> Result<TermPostings> {
        Err(anyhow!("connection refused while reading {term}"))
    }
    async fn document_length(&self, _doc: DocId) -> Result<u32> {
        Ok(1)
    }
    async fn resolve_urls(&self, docs: &[DocId]) -> Result<Vec<Option<String>>> {
        Ok(docs.iter().map(|d| Some(url(*d))).collect())
    }
}

#[tokio::test]
async fn store_failure_is_not_swallowed() {
    let r = ranker(DownStore);
    let err = r.rank_results("cat", "tfidf", "", "").await.unwrap_err();
    assert!(matches!(err, RankError::StoreUnavailable(_)));
    assert!(err.to_string().contains("connection refused"));
}

/// Delays posting fetches and can hide the average document length.
struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
    report_average: bool,
}

#[async_trait]
impl IndexStore for SlowStore {
    async fn corpus_size(&self) -> Result<u64> {
        self.inner.corpus_size().await
    }
    async fn average_document_length(&self) -> Result<Option<f64>> {
        if !self.report_average {
            return Ok(None);
        }
        self.inner.average_document_length().await
    }
    async fn postings(&self, term: &str) -> Result<TermPostings> {
        tokio::time::sleep(self.delay).await;
        self.inner.postings(term).await
    }
    async fn document_length(&self, doc: DocId) -> Result<u32> {
        self.inner.document_length(doc).await
    }
    async fn resolve_urls(&self, docs: &[DocId]) -> Result<Vec<Option<String>>> {
        self.inner.resolve_urls(docs).await
    }
}

#[tokio::test]
async fn slow_store_times_out() {
    let store = SlowStore { inner: cat_store(), delay: Duration::from_secs(5), report_average: true };
    let config = RankerConfig { request_timeout_ms: Some(20), ..Default::default() };
    let r = Ranker::new(Arc::new(store), config);
    let err = r.search(&RankRequest::new("cat")).await.unwrap_err();
    assert!(matches!(err, RankError::Timeout(_)));
}

#[tokio::test]
async fn cancellation_returns_no_partial_results() {
    let store = SlowStore { inner: cat_store(), delay: Duration::from_secs(5), report_average: true };
    let r = Ranker::new(Arc::new(store), RankerConfig::default());
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });
    let err = r.search_with_cancel(&RankRequest::new("cat"), &token).await.unwrap_err();
    assert!(matches!(err, RankError::Cancelled));
}

#[tokio::test]
async fn bm25_uses_fallback_length_when_store_has_none() {
    let store = SlowStore { inner: cat_store(), delay: Duration::ZERO, report_average: false };
    let r = ranker(store);
    let ranked = r.rank(&RankRequest::new("cat").with_strategy("bm25")).await.unwrap();
    assert_eq!(ids(&ranked), vec![1, 2]);

    let empty = MemoryStore::new();
    // No documents registered: lengths cannot be fetched, so BM25 fails loudly.
    empty.insert_posting("cat", 1, Posting::from_positions(vec![0])).unwrap();
    let err = ranker(empty).rank(&RankRequest::new("cat").with_strategy("bm25")).await.unwrap_err();
    assert!(matches!(err, RankError::StoreUnavailable(_)));
}

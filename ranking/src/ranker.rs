//! Query orchestration: parse, fetch, filter, score, sort, resolve.

use anyhow::{anyhow, Context};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::RankerConfig;
use crate::error::RankError;
use crate::filter::filter;
use crate::index::{CorpusStats, DocId, PostingList, RankedResult, ScoredDocument, Term, TermPostings};
use crate::phrase::match_phrase;
use crate::query::{dedup, ParsedQuery};
use crate::scoring::{ScoringContext, ScoringStrategy, StrategyKind};
use crate::store::IndexStore;
use crate::tokenizer::normalize;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankRequest {
    /// Optional terms; any of them admits a document.
    pub query: String,
    /// Strategy name; the configured default when `None`.
    pub strategy: Option<String>,
    /// Required terms.
    pub and_query: String,
    /// Excluded terms.
    pub not_query: String,
    /// Words that must appear contiguously, in order.
    pub phrase: String,
    pub limit: Option<usize>,
}

impl RankRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Default::default() }
    }

    pub fn with_strategy(mut self, name: impl Into<String>) -> Self {
        self.strategy = Some(name.into());
        self
    }

    pub fn with_and(mut self, and_query: impl Into<String>) -> Self {
        self.and_query = and_query.into();
        self
    }

    pub fn with_not(mut self, not_query: impl Into<String>) -> Self {
        self.not_query = not_query.into();
        self
    }

    pub fn with_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.phrase = phrase.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Progress of one ranking pass. Stages only move forward; `Done` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Parsing,
    Fetching,
    Filtering,
    Scoring,
    Sorting,
    Resolving,
    Done,
    Failed(String),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Parsing => "parsing",
            Stage::Fetching => "fetching",
            Stage::Filtering => "filtering",
            Stage::Scoring => "scoring",
            Stage::Sorting => "sorting",
            Stage::Resolving => "resolving",
            Stage::Done => "done",
            Stage::Failed(reason) => return write!(f, "failed: {reason}"),
        };
        f.write_str(name)
    }
}

pub struct Ranker {
    store: Arc<dyn IndexStore>,
    config: RankerConfig,
}

impl Ranker {
    pub fn new(store: Arc<dyn IndexStore>, config: RankerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Rank without resolving ids to URLs.
    pub async fn rank(&self, req: &RankRequest) -> Result<Vec<ScoredDocument>, RankError> {
        self.rank_with_cancel(req, &CancellationToken::new()).await
    }

    pub async fn rank_with_cancel(&self, req: &RankRequest, token: &CancellationToken) -> Result<Vec<ScoredDocument>, RankError> {
        let mut pass = RankPass::new(self);
        let out = self.guarded(token, pass.rank(req)).await;
        pass.finish(out)
    }

    /// Rank and resolve ids to URLs. Ids the store cannot resolve are dropped.
    pub async fn search(&self, req: &RankRequest) -> Result<Vec<RankedResult>, RankError> {
        self.search_with_cancel(req, &CancellationToken::new()).await
    }

    pub async fn search_with_cancel(&self, req: &RankRequest, token: &CancellationToken) -> Result<Vec<RankedResult>, RankError> {
        let start = Instant::now();
        let mut pass = RankPass::new(self);
        let out = self
            .guarded(token, async {
                let ranked = pass.rank(req).await?;
                pass.resolve(ranked).await
            })
            .await;
        let results = pass.finish(out)?;
        tracing::info!(
            query = %req.query,
            strategy = req.strategy.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or(self.config.default_strategy.name()),
            hits = results.len(),
            took_s = start.elapsed().as_secs_f64(),
            "ranked query"
        );
        Ok(results)
    }

    /// URLs in ranked order, at most `result_limit` of them. A blank `strategy`
    /// selects the configured default.
    ///
    /// An unknown strategy or a query with no searchable terms is logged and yields
    /// an empty list. Store failures, cancellation and timeouts are returned.
    pub async fn rank_results(&self, query: &str, strategy: &str, and_query: &str, not_query: &str) -> Result<Vec<String>, RankError> {
        let req = RankRequest::new(query).with_strategy(strategy).with_and(and_query).with_not(not_query);
        match self.search(&req).await {
            Ok(results) => Ok(results.into_iter().map(|r| r.url).collect()),
            Err(e) if e.is_recoverable() => {
                tracing::error!(error = %e, query, "query not ranked");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn guarded<T, F>(&self, token: &CancellationToken, work: F) -> Result<T, RankError>
    where
        F: Future<Output = Result<T, RankError>>,
    {
        let timed = async {
            match self.config.request_timeout() {
                Some(limit) => tokio::time::timeout(limit, work)
                    .await
                    .unwrap_or_else(|_| Err(RankError::Timeout(limit))),
                None => work.await,
            }
        };
        let out = tokio::select! {
            biased;
            _ = token.cancelled() => Err(RankError::Cancelled),
            out = timed => out,
        };
        if let Err(e) = &out {
            if matches!(e, RankError::Cancelled | RankError::Timeout(_)) {
                tracing::warn!(error = %e, "ranking abandoned");
            }
        }
        out
    }

    async fn corpus_stats(&self, strategy: ScoringStrategy) -> Result<CorpusStats, RankError> {
        let corpus_size = self.store.corpus_size().await.context("fetching corpus size")?;
        if corpus_size == 0 {
            tracing::warn!("store reported an empty corpus, treating it as one document");
        }
        let fallback = self.config.fallback_average_document_length;
        let average = if strategy.needs_document_lengths() {
            match self.store.average_document_length().await.context("fetching average document length")? {
                Some(avg) if avg > 0.0 => avg,
                _ => {
                    tracing::debug!(fallback, "store has no average document length, using fallback");
                    fallback
                }
            }
        } else {
            fallback
        };
        Ok(CorpusStats::new(corpus_size, average))
    }

    async fn fetch_postings(&self, terms: Vec<Term>) -> Result<PostingList, RankError> {
        let store = &self.store;
        let postings: PostingList = stream::iter(terms)
            .map(|term| async move {
                let p = store
                    .postings(&term)
                    .await
                    .with_context(|| format!("fetching postings for {term:?}"))?;
                Ok::<_, anyhow::Error>((term, p))
            })
            .buffer_unordered(self.config.fetch_concurrency())
            .try_collect()
            .await?;
        Ok(postings)
    }

    async fn fetch_lengths(&self, docs: &HashSet<DocId>) -> Result<HashMap<DocId, u32>, RankError> {
        let store = &self.store;
        let lengths: HashMap<DocId, u32> = stream::iter(docs.iter().copied())
            .map(|doc| async move {
                let len = store
                    .document_length(doc)
                    .await
                    .with_context(|| format!("fetching length of document {doc}"))?;
                Ok::<_, anyhow::Error>((doc, len))
            })
            .buffer_unordered(self.config.fetch_concurrency())
            .try_collect()
            .await?;
        Ok(lengths)
    }
}

/// Sort by descending score, ties by ascending id, and keep the first `limit`.
pub fn sort_and_truncate(scores: HashMap<DocId, f64>, limit: usize) -> Vec<ScoredDocument> {
    let mut scored: Vec<ScoredDocument> = scores.into_iter().map(|(id, score)| ScoredDocument { id, score }).collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    scored.truncate(limit);
    scored
}

// Quote characters never survive normalization, so this cannot collide with a real term.
fn phrase_key(terms: &[Term]) -> Term {
    format!("\"{}\"", terms.join(" "))
}

struct RankPass<'a> {
    ranker: &'a Ranker,
    stage: Stage,
}

impl<'a> RankPass<'a> {
    fn new(ranker: &'a Ranker) -> Self {
        Self { ranker, stage: Stage::Parsing }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(from = %self.stage, to = %stage, "ranking stage");
        self.stage = stage;
    }

    fn finish<T>(&mut self, out: Result<T, RankError>) -> Result<T, RankError> {
        match &out {
            Ok(_) => self.enter(Stage::Done),
            Err(e) => {
                tracing::warn!(stage = %self.stage, error = %e, "ranking failed");
                self.enter(Stage::Failed(e.to_string()));
            }
        }
        out
    }

    async fn rank(&mut self, req: &RankRequest) -> Result<Vec<ScoredDocument>, RankError> {
        let ranker = self.ranker;
        let config = &ranker.config;

        let kind: StrategyKind = match &req.strategy {
            Some(name) if !name.trim().is_empty() => name.parse()?,
            _ => config.default_strategy,
        };
        let strategy = ScoringStrategy::new(kind, config.bm25);
        let mut query = ParsedQuery::new(&req.query, &req.and_query, &req.not_query);
        let phrase = if req.phrase.trim().is_empty() {
            None
        } else {
            let terms = normalize(&req.phrase);
            if terms.is_empty() {
                return Err(RankError::InvalidQuery(format!("phrase {:?} has no searchable terms", req.phrase)));
            }
            Some(terms)
        };
        if query.is_empty() && phrase.is_none() {
            return Err(RankError::InvalidQuery("query has no searchable terms".into()));
        }
        let limit = req.limit.unwrap_or(config.result_limit);

        self.enter(Stage::Fetching);
        let fetch_terms = dedup(query.distinct_terms().into_iter().chain(phrase.iter().flatten().cloned()));
        let (stats, mut postings) = tokio::try_join!(ranker.corpus_stats(strategy), ranker.fetch_postings(fetch_terms))?;

        self.enter(Stage::Filtering);
        if let Some(terms) = &phrase {
            let matches = match_phrase(terms, &postings)?;
            let key = phrase_key(terms);
            let entry: TermPostings = matches.iter().map(|(&doc, m)| (doc, m.to_posting())).collect();
            tracing::debug!(phrase = %key, matches = entry.len(), "phrase matched");
            postings.insert(key.clone(), entry);
            query.and_terms.push(key);
        }
        let candidates = filter(&query.or_terms, &query.and_terms, &query.not_terms, &postings);
        tracing::debug!(candidates = candidates.len(), "filtered candidates");

        self.enter(Stage::Scoring);
        let document_lengths = if strategy.needs_document_lengths() {
            ranker.fetch_lengths(&candidates).await?
        } else {
            HashMap::new()
        };
        let terms = query.scored_terms();
        let ctx = ScoringContext {
            postings: &postings,
            candidates: &candidates,
            terms: &terms,
            stats,
            document_lengths: &document_lengths,
        };
        let scores = strategy.score(&ctx);

        self.enter(Stage::Sorting);
        Ok(sort_and_truncate(scores, limit))
    }

    async fn resolve(&mut self, ranked: Vec<ScoredDocument>) -> Result<Vec<RankedResult>, RankError> {
        self.enter(Stage::Resolving);
        let ids: Vec<DocId> = ranked.iter().map(|d| d.id).collect();
        let urls = self.ranker.store.resolve_urls(&ids).await.context("resolving document urls")?;
        if urls.len() != ids.len() {
            return Err(anyhow!("store resolved {} urls for {} ids", urls.len(), ids.len()).into());
        }
        let results: Vec<RankedResult> = ranked
            .into_iter()
            .zip(urls)
            .filter_map(|(doc, url)| url.map(|url| RankedResult { id: doc.id, score: doc.score, url }))
            .collect();
        if results.len() < ids.len() {
            tracing::debug!(dropped = ids.len() - results.len(), "dropped unresolvable documents");
        }
        Ok(results)
    }
}

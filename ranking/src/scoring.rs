//! Scoring strategies. Each one scores only the candidate documents handed to it.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::config::Bm25Params;
use crate::error::RankError;
use crate::index::{CorpusStats, DocId, PostingList, Term};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Sum of raw term frequencies.
    Tf,
    TfIdf,
    Bm25,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Tf => "tf",
            StrategyKind::TfIdf => "tfidf",
            StrategyKind::Bm25 => "bm25",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tf" => Ok(StrategyKind::Tf),
            "tfidf" => Ok(StrategyKind::TfIdf),
            "bm25" => Ok(StrategyKind::Bm25),
            _ => Err(RankError::UnknownStrategy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoringStrategy {
    RawTermFrequency,
    TfIdf,
    Bm25(Bm25Params),
}

/// Inputs shared by all strategies for one ranking pass.
pub struct ScoringContext<'a> {
    pub postings: &'a PostingList,
    pub candidates: &'a HashSet<DocId>,
    /// Scored terms; a term listed twice contributes twice.
    pub terms: &'a [Term],
    pub stats: CorpusStats,
    /// Per-document lengths; required by BM25 only.
    pub document_lengths: &'a HashMap<DocId, u32>,
}

impl ScoringStrategy {
    pub fn new(kind: StrategyKind, bm25: Bm25Params) -> Self {
        match kind {
            StrategyKind::Tf => ScoringStrategy::RawTermFrequency,
            StrategyKind::TfIdf => ScoringStrategy::TfIdf,
            StrategyKind::Bm25 => ScoringStrategy::Bm25(bm25),
        }
    }

    pub fn needs_document_lengths(&self) -> bool {
        matches!(self, ScoringStrategy::Bm25(_))
    }

    /// Score every candidate. Candidates containing none of the terms score zero.
    pub fn score(&self, ctx: &ScoringContext<'_>) -> HashMap<DocId, f64> {
        let mut scores: HashMap<DocId, f64> = ctx.candidates.iter().map(|&d| (d, 0.0)).collect();
        let n = ctx.stats.corpus_size as f64;

        for term in ctx.terms {
            let Some(term_postings) = ctx.postings.get(term) else { continue };
            // df never exceeds N, so both idf formulas stay finite.
            let df = (term_postings.len() as f64).min(n);
            if df == 0.0 {
                continue;
            }
            let idf = match self {
                ScoringStrategy::RawTermFrequency => 1.0,
                ScoringStrategy::TfIdf => tf_idf_weight(n, df),
                ScoringStrategy::Bm25(_) => bm25_idf(n, df),
            };

            for (doc, score) in scores.iter_mut() {
                let Some(posting) = term_postings.get(doc) else { continue };
                let tf = posting.term_frequency as f64;
                *score += match self {
                    ScoringStrategy::RawTermFrequency | ScoringStrategy::TfIdf => tf * idf,
                    ScoringStrategy::Bm25(params) => {
                        let doc_len = ctx.document_lengths.get(doc).copied().unwrap_or_default() as f64;
                        idf * bm25_tf(tf, doc_len, ctx.stats.average_document_length, params)
                    }
                };
            }
        }
        scores
    }
}

/// `ln(N / df)`; callers guarantee `df > 0`.
pub fn tf_idf_weight(corpus_size: f64, df: f64) -> f64 {
    (corpus_size / df).ln()
}

/// `ln((N - df + 0.5) / (df + 0.5))`. Negative for terms in more than half the corpus.
pub fn bm25_idf(corpus_size: f64, df: f64) -> f64 {
    ((corpus_size - df + 0.5) / (df + 0.5)).ln()
}

/// Saturated, length-normalized term frequency.
pub fn bm25_tf(tf: f64, doc_len: f64, avg_len: f64, params: &Bm25Params) -> f64 {
    let norm = 1.0 - params.b + params.b * doc_len / avg_len;
    (tf * (params.k1 + 1.0)) / (tf + params.k1 * norm)
}

//! Ranker configuration. Every field has a default so a partial JSON file is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use crate::scoring::StrategyKind;

/// Maximum number of results returned by a ranking pass.
pub const RESULT_LIMIT: usize = 100;

/// BM25 term frequency saturation.
pub const BM25_K1: f64 = 1.6;

/// BM25 document length normalization.
pub const BM25_B: f64 = 0.75;

/// Average document length assumed when the store cannot report one.
pub const DEFAULT_AVERAGE_DOCUMENT_LENGTH: f64 = 100.0;

/// Number of store calls in flight per request.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: BM25_K1, b: BM25_B }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    pub result_limit: usize,
    pub default_strategy: StrategyKind,
    pub bm25: Bm25Params,
    pub fallback_average_document_length: f64,
    pub fetch_concurrency: usize,
    pub request_timeout_ms: Option<u64>,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            result_limit: RESULT_LIMIT,
            default_strategy: StrategyKind::TfIdf,
            bm25: Bm25Params::default(),
            fallback_average_document_length: DEFAULT_AVERAGE_DOCUMENT_LENGTH,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            request_timeout_ms: None,
        }
    }
}

impl RankerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        let config: RankerConfig = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn fetch_concurrency(&self) -> usize {
        self.fetch_concurrency.max(1)
    }
}

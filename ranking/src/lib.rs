pub mod config;
pub mod error;
pub mod filter;
pub mod index;
pub mod persist;
pub mod phrase;
pub mod query;
pub mod ranker;
pub mod scoring;
pub mod store;
pub mod tokenizer;

pub use config::{Bm25Params, RankerConfig, RESULT_LIMIT};
pub use error::RankError;
pub use index::{CorpusStats, DocId, DocMeta, Posting, PostingList, RankedResult, ScoredDocument, Term, TermPostings};
pub use query::ParsedQuery;
pub use ranker::{RankRequest, Ranker, Stage};
pub use scoring::{ScoringStrategy, StrategyKind};
pub use store::{IndexStore, MemoryStore};

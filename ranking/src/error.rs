use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RankError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("unknown ranking strategy: {0}")]
    UnknownStrategy(String),
    #[error("index store unavailable: {0:#}")]
    StoreUnavailable(#[from] anyhow::Error),
    #[error("ranking cancelled")]
    Cancelled,
    #[error("ranking timed out after {0:?}")]
    Timeout(Duration),
}

impl RankError {
    /// Query-shape and configuration problems that callers report as "no results"
    /// rather than a failed ranking.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RankError::InvalidQuery(_) | RankError::UnknownStrategy(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_split() {
        assert!(RankError::InvalidQuery("empty".into()).is_recoverable());
        assert!(RankError::UnknownStrategy("pagerank".into()).is_recoverable());
        assert!(!RankError::Cancelled.is_recoverable());
        assert!(!RankError::Timeout(Duration::from_millis(5)).is_recoverable());
        assert!(!RankError::StoreUnavailable(anyhow::anyhow!("down")).is_recoverable());
    }

    #[test]
    fn store_error_keeps_context() {
        let err: RankError = anyhow::anyhow!("connection refused").context("fetching postings").into();
        let msg = err.to_string();
        assert!(msg.contains("fetching postings"));
        assert!(msg.contains("connection refused"));
    }
}

use std::collections::HashSet;

use crate::index::Term;
use crate::tokenizer::normalize;

/// Normalized boolean query. The three sets may overlap; overlap is not rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    pub or_terms: Vec<Term>,
    pub and_terms: Vec<Term>,
    pub not_terms: Vec<Term>,
}

impl ParsedQuery {
    pub fn new(query: &str, and_query: &str, not_query: &str) -> Self {
        Self {
            or_terms: normalize_set(query),
            and_terms: normalize_set(and_query),
            not_terms: normalize_set(not_query),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.or_terms.is_empty() && self.and_terms.is_empty() && self.not_terms.is_empty()
    }

    /// Terms that contribute to a document's score: required terms first, then optional.
    /// A term present in both sets is counted twice.
    pub fn scored_terms(&self) -> Vec<Term> {
        self.and_terms.iter().chain(self.or_terms.iter()).cloned().collect()
    }

    /// Every distinct term across the three sets, in first-seen order.
    pub fn distinct_terms(&self) -> Vec<Term> {
        dedup(self.or_terms.iter().chain(&self.and_terms).chain(&self.not_terms).cloned())
    }
}

fn normalize_set(text: &str) -> Vec<Term> {
    dedup(normalize(text))
}

pub(crate) fn dedup<I: IntoIterator<Item = Term>>(terms: I) -> Vec<Term> {
    let mut seen = HashSet::new();
    terms.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

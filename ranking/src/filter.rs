use std::collections::HashSet;

use crate::index::{DocId, PostingList, Term};

fn docs_for<'a>(postings: &'a PostingList, term: &str) -> impl Iterator<Item = DocId> + 'a {
    postings.get(term).into_iter().flat_map(|p| p.keys().copied())
}

/// Combine per-term document sets: union of `or_terms`, intersected with every
/// `and_terms` set, minus the union of `not_terms`. Unindexed terms map to the
/// empty set. When `or_terms` is empty the AND intersection seeds the result.
pub fn filter(or_terms: &[Term], and_terms: &[Term], not_terms: &[Term], postings: &PostingList) -> HashSet<DocId> {
    let mut result: HashSet<DocId> = or_terms.iter().flat_map(|t| docs_for(postings, t)).collect();

    if let Some((first, rest)) = and_terms.split_first() {
        let mut required: HashSet<DocId> = docs_for(postings, first).collect();
        for term in rest {
            let docs: HashSet<DocId> = docs_for(postings, term).collect();
            required.retain(|d| docs.contains(d));
        }
        if or_terms.is_empty() {
            result = required;
        } else {
            result.retain(|d| required.contains(d));
        }
    }

    for term in not_terms {
        if let Some(excluded) = postings.get(term) {
            result.retain(|d| !excluded.contains_key(d));
        }
    }
    result
}

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::RankError;
use crate::index::{DocId, Posting, PostingList, Term, TermPostings};

/// A document in which the phrase occurs contiguously at least once.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseMatch {
    /// Sum of the phrase terms' frequencies in the document.
    pub aggregate_score: f64,
    /// Position of the first term in the earliest occurrence.
    pub anchor_position: u32,
    /// Positions of the first term at every occurrence, ascending.
    pub anchors: Vec<u32>,
    pub occurrences: u32,
}

impl PhraseMatch {
    /// Posting for the phrase treated as a single term.
    pub fn to_posting(&self) -> Posting {
        Posting { term_frequency: self.occurrences, positions: self.anchors.clone() }
    }
}

/// Find documents where `terms` occur at consecutive positions.
///
/// Candidates start as the first term's documents with its positions as anchors.
/// The term at offset `i` keeps an anchor `a` only if it occurs at `a + i`.
/// A document is dropped as soon as it has no anchor left.
pub fn match_phrase(terms: &[Term], postings: &PostingList) -> Result<HashMap<DocId, PhraseMatch>, RankError> {
    let (first, rest) = terms
        .split_first()
        .ok_or_else(|| RankError::InvalidQuery("phrase has no terms".into()))?;
    let Some(seed) = postings.get(first) else {
        return Ok(HashMap::new());
    };

    if rest.is_empty() {
        return Ok(single_term(seed));
    }

    let mut candidates: HashMap<DocId, (BTreeSet<u32>, f64)> = seed
        .iter()
        .map(|(&doc, p)| (doc, (p.positions.iter().copied().collect(), p.term_frequency as f64)))
        .collect();

    for (i, term) in rest.iter().enumerate() {
        let offset = i as u32 + 1;
        let Some(next) = postings.get(term) else {
            return Ok(HashMap::new());
        };
        candidates.retain(|doc, (anchors, score)| {
            let Some(p) = next.get(doc) else { return false };
            let shifted: HashSet<u32> = p.positions.iter().filter_map(|&pos| pos.checked_sub(offset)).collect();
            anchors.retain(|a| shifted.contains(a));
            *score += p.term_frequency as f64;
            !anchors.is_empty()
        });
        if candidates.is_empty() {
            break;
        }
    }

    Ok(candidates
        .into_iter()
        .filter_map(|(doc, (anchors, aggregate_score))| {
            let anchors: Vec<u32> = anchors.into_iter().collect();
            let anchor_position = *anchors.first()?;
            let occurrences = anchors.len() as u32;
            Some((doc, PhraseMatch { aggregate_score, anchor_position, anchors, occurrences }))
        })
        .collect())
}

// A one-word phrase is the term's own postings, positions or not.
fn single_term(seed: &TermPostings) -> HashMap<DocId, PhraseMatch> {
    seed.iter()
        .map(|(&doc, p)| {
            let m = PhraseMatch {
                aggregate_score: p.term_frequency as f64,
                anchor_position: p.positions.first().copied().unwrap_or_default(),
                anchors: p.positions.clone(),
                occurrences: p.term_frequency,
            };
            (doc, m)
        })
        .collect()
}

use crate::protocol::SearchResult;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// BM25 parameters.
///
/// Postings carry no document length, so scores use term frequency
/// saturation only (no length normalization).
pub struct BM25 {
    k1: f64,
}

impl Default for BM25 {
    fn default() -> Self {
        Self {
            k1: 1.5, // Term frequency saturation parameter
        }
    }
}

impl BM25 {
    pub fn new(k1: f64) -> Self {
        Self { k1 }
    }

    /// Score every document that appears in `result` for the given terms
    pub fn rank(&self, terms: &[String], result: &SearchResult) -> Vec<ScoredDocument> {
        let corpus: HashSet<&str> = result
            .values()
            .flatten()
            .flat_map(|posting| posting.documents.iter().map(String::as_str))
            .collect();
        let total_docs = corpus.len() as f64;

        let mut scores: HashMap<&str, f64> = HashMap::new();
        let mut seen_terms = HashSet::new();

        for term in terms {
            if !seen_terms.insert(term.as_str()) {
                continue;
            }
            // a term repeated in the query carries copies of the same posting
            let Some(posting) = result.get(term).and_then(|postings| postings.first()) else {
                continue;
            };

            let docs = posting.distinct_documents();
            let doc_freq = docs.len() as f64;
            let idf = ((total_docs - doc_freq + 0.5) / (doc_freq + 0.5) + 1.0).ln();

            for doc_id in docs {
                let tf = posting.term_frequency(doc_id) as f64;
                let normalized_tf = (tf * (self.k1 + 1.0)) / (tf + self.k1);
                *scores.entry(doc_id).or_insert(0.0) += idf * normalized_tf;
            }
        }

        let mut scored_docs: Vec<ScoredDocument> = scores
            .into_iter()
            .map(|(doc_id, score)| ScoredDocument::new(doc_id.to_string(), score))
            .collect();

        // Sort by score descending, ties by id so output is stable
        scored_docs.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });

        scored_docs
    }
}

/// Ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredDocument {
    pub doc_id: String,
    pub score: f64,
}

impl ScoredDocument {
    pub fn new(doc_id: String, score: f64) -> Self {
        Self { doc_id, score }
    }
}

/// Rank documents using BM25 with default parameters
pub fn rank_documents(terms: &[String], result: &SearchResult) -> Vec<ScoredDocument> {
    BM25::default().rank(terms, result)
}

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Exact character span of one lexeme occurrence.
///
/// Offsets count Unicode scalar values (`char`s), not bytes or UTF-16 code
/// units, so `"😀 cat"` puts `cat` at 2..5.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPosition {
    pub document_id: String,
    pub start_index: usize,
    pub end_index: usize,
}

/// Everything the index knows about one lexeme
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Posting {
    /// One entry per occurrence, in indexing order
    pub documents: Vec<String>,
    /// Word offsets of the lexeme, per document
    pub positions: HashMap<String, Vec<usize>>,
    pub document_positions: Vec<DocumentPosition>,
}

impl Posting {
    /// Number of occurrences in `doc_id`
    pub fn term_frequency(&self, doc_id: &str) -> usize {
        self.positions.get(doc_id).map(Vec::len).unwrap_or(0)
    }

    /// Distinct documents containing the lexeme, in first-seen order
    pub fn distinct_documents(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.documents
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Inverted index: lexeme -> posting
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    index: HashMap<String, Posting>,
    documents: HashSet<String>,
    occurrences: usize,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `lexeme` in `doc_id`
    pub fn upsert(&mut self, lexeme: &str, doc_id: &str, word_offset: usize, start: usize, end: usize) {
        let posting = self.index.entry(lexeme.to_string()).or_default();

        posting.documents.push(doc_id.to_string());
        posting.document_positions.push(DocumentPosition {
            document_id: doc_id.to_string(),
            start_index: start,
            end_index: end,
        });
        posting
            .positions
            .entry(doc_id.to_string())
            .or_default()
            .push(word_offset);

        if !self.documents.contains(doc_id) {
            self.documents.insert(doc_id.to_string());
        }
        self.occurrences += 1;
    }

    /// Get the posting for a lexeme, `None` if it was never indexed
    pub fn get(&self, lexeme: &str) -> Option<&Posting> {
        self.index.get(lexeme)
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Get index statistics
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_documents: self.documents.len(),
            total_lexemes: self.index.len(),
            total_occurrences: self.occurrences,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub total_documents: usize,
    pub total_lexemes: usize,
    pub total_occurrences: usize,
}

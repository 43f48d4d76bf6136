use crate::document::Document;
use crate::error::{Error, Result};
use crate::index::{IndexStats, InvertedIndex};
use crate::protocol::{Request, Response, SearchResult};
use crate::tokenizer::Tokenizer;
use tracing::{debug, info};

/// Owns the inverted index and executes requests against it.
///
/// The engine is single-threaded by construction: it is owned by whoever
/// drives it (normally the worker thread), so the index needs no locking.
#[derive(Debug, Default)]
pub struct IndexEngine {
    index: InvertedIndex,
    tokenizer: Tokenizer,
}

impl IndexEngine {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self {
            index: InvertedIndex::new(),
            tokenizer,
        }
    }

    /// Execute one request to completion
    pub fn handle(&mut self, request: Request) -> Result<Response> {
        match request {
            Request::Index { notes } => self.index(&notes).map(|_| Response::Indexed),
            Request::Flush => {
                self.flush();
                Ok(Response::Flushed)
            }
            Request::Search { terms } => Ok(Response::Search(self.search(&terms))),
            Request::Stats => Ok(Response::Stats(self.stats())),
        }
    }

    /// Index a batch of notes.
    ///
    /// Every note is checked before the index is touched, so a malformed note
    /// fails the whole batch and leaves the index as it was.
    pub fn index(&mut self, docs: &[Document]) -> Result<()> {
        let texts = docs
            .iter()
            .map(|doc| {
                doc.text()
                    .map(|text| (doc.id.as_str(), text))
                    .ok_or_else(|| Error::MalformedDocument {
                        id: doc.id.clone(),
                        reason: "note has no text".to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut occurrences = 0;
        for (doc_id, text) in texts {
            for (word_offset, span) in self.tokenizer.spans(text).enumerate() {
                self.index
                    .upsert(span.lexeme, doc_id, word_offset, span.start, span.end);
                occurrences += 1;
            }
        }

        info!(
            notes = docs.len(),
            occurrences,
            lexemes = self.index.len(),
            "indexed notes"
        );
        Ok(())
    }

    /// Look up each term. Terms that were never indexed are left out of the result.
    pub fn search(&self, terms: &[String]) -> SearchResult {
        let mut result = SearchResult::new();

        for term in terms {
            if let Some(posting) = self.index.get(term) {
                result.entry(term.clone()).or_default().push(posting.clone());
            }
        }

        debug!(terms = terms.len(), matched = result.len(), "search");
        result
    }

    /// Reset the index to empty
    pub fn flush(&mut self) {
        let lexemes = self.index.len();
        self.index.clear();
        info!(lexemes, "flushed index");
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }
}

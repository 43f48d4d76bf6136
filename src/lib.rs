// Re-export main components
pub mod api;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod index;
pub mod protocol;
pub mod ranking;
pub mod tokenizer;
pub mod worker;

// Re-export commonly used types
pub use config::WorkerConfig;
pub use document::Document;
pub use engine::IndexEngine;
pub use error::{Error, Result};
pub use index::{DocumentPosition, IndexStats, InvertedIndex, Posting};
pub use protocol::{Request, RequestId, Response, SearchResult};
pub use ranking::{rank_documents, ScoredDocument, BM25};
pub use tokenizer::{Span, Tokenizer};
pub use worker::{Correlator, NoteSearchWorker, ResponseHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

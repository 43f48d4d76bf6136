//! Envelopes exchanged with the index worker.
//!
//! Requests and responses are plain data so they can be logged, sent over the
//! HTTP API, or replayed in tests without a running worker.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::index::{IndexStats, Posting};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Matched postings, keyed by the search term. Terms with no match are absent.
pub type SearchResult = HashMap<String, Vec<Posting>>;

/// Identifier that pairs a response with the request that caused it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Work the engine can perform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "UPPERCASE")]
pub enum Request {
    Index { notes: Vec<Document> },
    Flush,
    Search { terms: Vec<String> },
    Stats,
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Index { .. } => "INDEX",
            Request::Flush => "FLUSH",
            Request::Search { .. } => "SEARCH",
            Request::Stats => "STATS",
        }
    }
}

/// Successful engine output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Response {
    Indexed,
    Flushed,
    Search(SearchResult),
    Stats(IndexStats),
}

impl Response {
    pub fn into_ack(self) -> Result<()> {
        match self {
            Response::Indexed | Response::Flushed => Ok(()),
            other => Err(unexpected("acknowledgement", &other)),
        }
    }

    pub fn into_search_result(self) -> Result<SearchResult> {
        match self {
            Response::Search(result) => Ok(result),
            other => Err(unexpected("search result", &other)),
        }
    }

    pub fn into_stats(self) -> Result<IndexStats> {
        match self {
            Response::Stats(stats) => Ok(stats),
            other => Err(unexpected("stats", &other)),
        }
    }
}

fn unexpected(wanted: &str, got: &Response) -> Error {
    Error::transport(format!("expected {} from worker, got {:?}", wanted, got))
}

/// Request as it crosses into the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEnvelope {
    pub request_id: RequestId,
    #[serde(flatten)]
    pub request: Request,
}

/// Engine result as it crosses back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEnvelope {
    pub request_id: RequestId,
    pub result: std::result::Result<Response, Error>,
}

/// Everything the worker side can report to the correlator
#[derive(Debug)]
pub enum WorkerEvent {
    Response(OutboundEnvelope),
    /// The worker itself failed; no single request can be blamed
    Fault(String),
}

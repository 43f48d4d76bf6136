use crate::protocol::RequestId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Errors surfaced to callers of the engine and the worker
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum Error {
    /// A document in an `INDEX` batch could not be tokenized; the batch was not applied
    #[error("malformed document '{id}': {reason}")]
    MalformedDocument { id: String, reason: String },

    /// The channel to the worker failed, so no specific request can be blamed
    #[error("worker transport failed: {0}")]
    Transport(String),

    #[error("request {request_id} timed out after {after:?}")]
    Timeout { request_id: RequestId, after: Duration },

    #[error("request {request_id} was cancelled")]
    Cancelled { request_id: RequestId },
}

impl Error {
    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

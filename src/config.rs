use crate::tokenizer::DEFAULT_DELIMITER;
use std::time::Duration;

/// Settings for a [`NoteSearchWorker`](crate::worker::NoteSearchWorker)
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Lexeme delimiter used by the worker's tokenizer
    pub delimiter: char,
    /// How long a caller waits for a response. `None` waits forever.
    pub request_timeout: Option<Duration>,
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            request_timeout: None,
            thread_name: "note-search-worker".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

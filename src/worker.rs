//! Runs an [`IndexEngine`] on its own thread and pairs responses with callers.
//!
//! Callers talk to the engine through two unbounded channels: requests go in
//! as [`InboundEnvelope`]s and come back as [`WorkerEvent`]s. A correlator
//! thread reads the events and completes the matching [`ResponseHandle`] by
//! request id, so responses may arrive in any order.

use crate::config::WorkerConfig;
use crate::document::Document;
use crate::engine::IndexEngine;
use crate::error::{Error, Result};
use crate::index::IndexStats;
use crate::protocol::{InboundEnvelope, OutboundEnvelope, Request, RequestId, Response, SearchResult, WorkerEvent};
use crate::tokenizer::Tokenizer;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};

type Completion = oneshot::Sender<Result<Response>>;

#[derive(Default)]
struct PendingRequests {
    requests: HashMap<RequestId, Completion>,
    /// Set once the transport has failed; later submits are rejected with this reason
    closed: Option<String>,
}

type Pending = Arc<Mutex<PendingRequests>>;

/// Caller side of the worker boundary
pub struct Correlator {
    requests: mpsc::UnboundedSender<InboundEnvelope>,
    pending: Pending,
    timeout: Option<Duration>,
    dispatcher: JoinHandle<()>,
}

impl Correlator {
    /// Attach to a worker through its request sender and event receiver
    pub fn new(
        requests: mpsc::UnboundedSender<InboundEnvelope>,
        events: mpsc::UnboundedReceiver<WorkerEvent>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let pending = Pending::default();
        let dispatcher = {
            let pending = Arc::clone(&pending);
            thread::Builder::new()
                .name("note-search-correlator".to_string())
                .spawn(move || dispatch_events(events, pending))
                .map_err(|e| Error::transport(format!("failed to start correlator thread: {}", e)))?
        };

        Ok(Self {
            requests,
            pending,
            timeout,
            dispatcher,
        })
    }

    /// Send a request to the worker without waiting for it
    pub fn submit(&self, request: Request) -> ResponseHandle {
        let request_id = RequestId::new();
        let (completion, receiver) = oneshot::channel();
        let handle = ResponseHandle {
            request_id,
            receiver,
            pending: Arc::clone(&self.pending),
            submitted: Instant::now(),
            timeout: self.timeout,
            sleep: None,
            done: false,
        };

        {
            let mut state = self.pending.lock();
            if let Some(reason) = &state.closed {
                let _ = completion.send(Err(Error::transport(reason.clone())));
                return handle;
            }
            state.requests.insert(request_id, completion);
        }

        debug!(%request_id, kind = request.kind(), "submitting request");
        if self
            .requests
            .send(InboundEnvelope { request_id, request })
            .is_err()
        {
            reject_all(&self.pending, "worker is not accepting requests");
        }

        handle
    }

    /// Fail a pending request with [`Error::Cancelled`].
    ///
    /// Returns `false` if the request already completed or was never pending.
    pub fn cancel(&self, request_id: RequestId) -> bool {
        let completion = self.pending.lock().requests.remove(&request_id);
        match completion {
            Some(completion) => {
                debug!(%request_id, "cancelled request");
                let _ = completion.send(Err(Error::Cancelled { request_id }));
                true
            }
            None => false,
        }
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending.lock().requests.len()
    }

    /// Stop sending requests and wait for the correlator thread to drain.
    ///
    /// Blocks until the worker has closed its side of the event channel.
    pub fn shutdown(self) {
        let Correlator {
            requests,
            dispatcher,
            ..
        } = self;
        drop(requests);
        if dispatcher.join().is_err() {
            error!("correlator thread panicked");
        }
    }
}

fn dispatch_events(mut events: mpsc::UnboundedReceiver<WorkerEvent>, pending: Pending) {
    while let Some(event) = events.blocking_recv() {
        match event {
            WorkerEvent::Response(envelope) => resolve(&pending, envelope),
            WorkerEvent::Fault(reason) => {
                error!(%reason, "note search worker failed");
                reject_all(&pending, &reason);
                return;
            }
        }
    }
    reject_all(&pending, "worker channel closed");
}

fn resolve(pending: &Pending, envelope: OutboundEnvelope) {
    let OutboundEnvelope { request_id, result } = envelope;
    let completion = pending.lock().requests.remove(&request_id);
    match completion {
        Some(completion) => {
            debug!(%request_id, ok = result.is_ok(), "resolving request");
            // the caller may have dropped its handle in the meantime
            let _ = completion.send(result);
        }
        None => warn!(%request_id, "dropping response for unknown request id"),
    }
}

/// A transport failure cannot be pinned on one request, so every pending one fails
fn reject_all(pending: &Pending, reason: &str) {
    let drained: Vec<_> = {
        let mut state = pending.lock();
        if state.closed.is_none() {
            state.closed = Some(reason.to_string());
        }
        state.requests.drain().collect()
    };

    if !drained.is_empty() {
        warn!(count = drained.len(), %reason, "rejecting pending requests");
    }
    for (_, completion) in drained {
        let _ = completion.send(Err(Error::transport(reason)));
    }
}

/// Resolves to the engine's response for one submitted request.
///
/// Dropping the handle before it resolves removes its pending entry. When a
/// request timeout is configured it is measured from submission, and the
/// handle must be polled inside a Tokio runtime with the time driver enabled.
pub struct ResponseHandle {
    request_id: RequestId,
    receiver: oneshot::Receiver<Result<Response>>,
    pending: Pending,
    submitted: Instant,
    timeout: Option<Duration>,
    sleep: Option<Pin<Box<Sleep>>>,
    done: bool,
}

impl ResponseHandle {
    pub fn id(&self) -> RequestId {
        self.request_id
    }

    fn forget(&mut self) {
        self.pending.lock().requests.remove(&self.request_id);
    }
}

impl Future for ResponseHandle {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;

        if let Poll::Ready(outcome) = Pin::new(&mut this.receiver).poll(cx) {
            this.done = true;
            return Poll::Ready(outcome.unwrap_or_else(|_| {
                Err(Error::transport("worker dropped the request"))
            }));
        }

        if let Some(after) = this.timeout {
            let deadline = tokio::time::Instant::from_std(this.submitted + after);
            let sleep = this
                .sleep
                .get_or_insert_with(|| Box::pin(tokio::time::sleep_until(deadline)));
            if sleep.as_mut().poll(cx).is_ready() {
                this.done = true;
                this.forget();
                warn!(request_id = %this.request_id, ?after, "request timed out");
                return Poll::Ready(Err(Error::Timeout {
                    request_id: this.request_id,
                    after,
                }));
            }
        }

        Poll::Pending
    }
}

impl Drop for ResponseHandle {
    fn drop(&mut self) {
        if !self.done {
            self.forget();
        }
    }
}

/// An [`IndexEngine`] running on a dedicated thread
pub struct NoteSearchWorker {
    correlator: Correlator,
    worker: JoinHandle<()>,
}

impl NoteSearchWorker {
    /// Start the worker thread with an empty index
    pub fn spawn(config: WorkerConfig) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let engine = IndexEngine::new(Tokenizer::with_delimiter(config.delimiter));

        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run_engine(engine, request_rx, event_tx))
            .map_err(|e| Error::transport(format!("failed to start worker thread: {}", e)))?;
        let correlator = Correlator::new(request_tx, event_rx, config.request_timeout)?;

        info!(thread = %config.thread_name, "note search worker started");
        Ok(Self { correlator, worker })
    }

    pub fn submit(&self, request: Request) -> ResponseHandle {
        self.correlator.submit(request)
    }

    pub async fn index(&self, notes: Vec<Document>) -> Result<()> {
        self.submit(Request::Index { notes }).await?.into_ack()
    }

    pub async fn search(&self, terms: Vec<String>) -> Result<SearchResult> {
        self.submit(Request::Search { terms })
            .await?
            .into_search_result()
    }

    pub async fn flush(&self) -> Result<()> {
        self.submit(Request::Flush).await?.into_ack()
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        self.submit(Request::Stats).await?.into_stats()
    }

    pub fn cancel(&self, request_id: RequestId) -> bool {
        self.correlator.cancel(request_id)
    }

    pub fn pending_count(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Stop the worker after it finishes the requests already queued.
    ///
    /// Blocks the calling thread until both worker threads have exited.
    pub fn shutdown(self) {
        let NoteSearchWorker { correlator, worker } = self;
        correlator.shutdown();
        if worker.join().is_err() {
            error!("note search worker thread panicked");
        }
        info!("note search worker shut down");
    }
}

fn run_engine(
    mut engine: IndexEngine,
    mut requests: mpsc::UnboundedReceiver<InboundEnvelope>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    while let Some(InboundEnvelope { request_id, request }) = requests.blocking_recv() {
        debug!(%request_id, kind = request.kind(), "handling request");

        let event = match panic::catch_unwind(AssertUnwindSafe(|| engine.handle(request))) {
            Ok(result) => WorkerEvent::Response(OutboundEnvelope { request_id, result }),
            Err(payload) => WorkerEvent::Fault(panic_message(payload.as_ref())),
        };
        let fault = matches!(event, WorkerEvent::Fault(_));

        if events.send(event).is_err() || fault {
            break;
        }
    }
    debug!("engine loop finished");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", message)
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeWorker {
        requests: mpsc::UnboundedReceiver<InboundEnvelope>,
        events: mpsc::UnboundedSender<WorkerEvent>,
    }

    impl FakeWorker {
        fn respond(&self, request_id: RequestId, result: Result<Response>) {
            self.events
                .send(WorkerEvent::Response(OutboundEnvelope { request_id, result }))
                .unwrap();
        }
    }

    fn connect(timeout: Option<Duration>) -> (Correlator, FakeWorker) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let correlator = Correlator::new(request_tx, event_rx, timeout).unwrap();
        (
            correlator,
            FakeWorker {
                requests: request_rx,
                events: event_tx,
            },
        )
    }

    fn search(term: &str) -> Request {
        Request::Search {
            terms: vec![term.to_string()],
        }
    }

    fn answer_for(envelope: &InboundEnvelope) -> Result<Response> {
        match &envelope.request {
            Request::Search { terms } => {
                let mut result = SearchResult::new();
                result.insert(terms[0].clone(), Vec::new());
                Ok(Response::Search(result))
            }
            _ => Ok(Response::Indexed),
        }
    }

    #[tokio::test]
    async fn test_responses_paired_out_of_order() -> Result<()> {
        let (correlator, mut fake) = connect(None);

        let cat = correlator.submit(search("cat"));
        let dog = correlator.submit(search("dog"));
        assert_ne!(cat.id(), dog.id());

        let first = fake.requests.recv().await.unwrap();
        let second = fake.requests.recv().await.unwrap();
        fake.respond(second.request_id, answer_for(&second));
        fake.respond(first.request_id, answer_for(&first));

        let dog_result = dog.await?.into_search_result()?;
        let cat_result = cat.await?.into_search_result()?;
        assert!(cat_result.contains_key("cat") && !cat_result.contains_key("dog"));
        assert!(dog_result.contains_key("dog") && !dog_result.contains_key("cat"));
        assert_eq!(correlator.pending_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_engine_error_reaches_caller() {
        let (correlator, mut fake) = connect(None);

        let handle = correlator.submit(Request::Index {
            notes: vec![Document::without_text("n1")],
        });
        let envelope = fake.requests.recv().await.unwrap();
        let malformed = Error::MalformedDocument {
            id: "n1".to_string(),
            reason: "note has no text".to_string(),
        };
        fake.respond(envelope.request_id, Err(malformed.clone()));

        assert_eq!(handle.await, Err(malformed));
    }

    #[tokio::test]
    async fn test_unknown_request_id_dropped() -> Result<()> {
        let (correlator, mut fake) = connect(None);

        let handle = correlator.submit(Request::Flush);
        let envelope = fake.requests.recv().await.unwrap();

        fake.respond(RequestId::new(), Ok(Response::Flushed));
        fake.respond(envelope.request_id, Ok(Response::Flushed));

        assert_eq!(handle.await?, Response::Flushed);
        assert_eq!(correlator.pending_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_transport_failure_rejects_all_pending() {
        let (correlator, fake) = connect(None);

        let first = correlator.submit(search("cat"));
        let second = correlator.submit(Request::Flush);
        drop(fake);

        assert!(matches!(first.await, Err(Error::Transport(_))));
        assert!(matches!(second.await, Err(Error::Transport(_))));
        assert_eq!(correlator.pending_count(), 0);

        let late = correlator.submit(Request::Stats);
        assert!(matches!(late.await, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_fault_rejects_all_pending() {
        let (correlator, fake) = connect(None);

        let first = correlator.submit(search("cat"));
        let second = correlator.submit(search("dog"));
        fake.events
            .send(WorkerEvent::Fault("worker panicked: boom".to_string()))
            .unwrap();

        assert_eq!(
            first.await,
            Err(Error::transport("worker panicked: boom"))
        );
        assert_eq!(
            second.await,
            Err(Error::transport("worker panicked: boom"))
        );
    }

    #[tokio::test]
    async fn test_timeout_removes_pending_entry() {
        let (correlator, _fake) = connect(Some(Duration::from_millis(50)));

        let handle = correlator.submit(search("cat"));
        let request_id = handle.id();
        assert_eq!(correlator.pending_count(), 1);

        let outcome = handle.await;
        assert!(matches!(outcome, Err(Error::Timeout { request_id: id, .. }) if id == request_id));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel() {
        let (correlator, _fake) = connect(None);

        let handle = correlator.submit(search("cat"));
        let request_id = handle.id();
        assert!(correlator.cancel(request_id));
        assert!(!correlator.cancel(request_id));

        assert_eq!(handle.await, Err(Error::Cancelled { request_id }));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_leak() {
        let (correlator, _fake) = connect(None);

        let handle = correlator.submit(search("cat"));
        assert_eq!(correlator.pending_count(), 1);
        drop(handle);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_worker_round_trip() -> Result<()> {
        let worker = NoteSearchWorker::spawn(WorkerConfig::default())?;

        worker.index(vec![Document::new("d1", "the cat sat")]).await?;
        let result = worker.search(vec!["cat".to_string()]).await?;
        assert_eq!(result["cat"][0].positions["d1"], vec![1]);

        worker.flush().await?;
        assert!(worker.search(vec!["cat".to_string()]).await?.is_empty());
        assert_eq!(worker.stats().await?, IndexStats::default());

        worker.shutdown();
        Ok(())
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "worker panicked: boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "worker panicked: bang");

        let payload: Box<dyn Any + Send> = Box::new(7);
        assert_eq!(panic_message(payload.as_ref()), "worker panicked");
    }
}

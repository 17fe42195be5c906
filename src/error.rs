//! Error types for the queue, the worker pool and the server

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors returned by [`ConnectionQueue`](crate::http::ConnectionQueue) operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue has been shut down (and, for dequeue, fully drained)
    #[error("connection queue is shut down")]
    Shutdown,

    /// The queue's lock was poisoned by a panicking thread
    #[error("connection queue lock is unusable: {0}")]
    Resource(String),

    /// A queue was requested with no room for any connection
    #[error("connection queue capacity must be positive")]
    ZeroCapacity,
}

impl QueueError {
    /// Check if this is the expected shutdown signal rather than a failure
    pub fn is_shutdown(&self) -> bool {
        matches!(self, QueueError::Shutdown)
    }
}

/// A rejected enqueue, handing the connection back to the caller
///
/// The caller owns the connection again and is responsible for closing it.
pub struct EnqueueError<T> {
    item: T,
    kind: QueueError,
}

impl<T> EnqueueError<T> {
    pub(crate) fn new(item: T, kind: QueueError) -> Self {
        Self { item, kind }
    }

    /// Why the connection was rejected
    pub fn kind(&self) -> &QueueError {
        &self.kind
    }

    /// Recover the rejected connection
    pub fn into_inner(self) -> T {
        self.item
    }

    /// Split into the rejected connection and the reason
    pub fn into_parts(self) -> (T, QueueError) {
        (self.item, self.kind)
    }
}

impl<T> fmt::Debug for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnqueueError")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enqueue rejected: {}", self.kind)
    }
}

impl<T> std::error::Error for EnqueueError<T> {}

/// Failure reported by a [`ConnectionHandler`](crate::http::ConnectionHandler)
///
/// Handler errors only ever affect the connection being handled.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// I/O error while reading the request or writing the response
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The request line could not be understood
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The handler panicked
    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Reason a worker thread stopped other than a clean shutdown
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker could no longer dequeue
    #[error("worker {worker} stopped on queue failure: {source}")]
    Queue {
        /// Worker index
        worker: usize,
        /// Underlying queue failure
        source: QueueError,
    },

    /// The worker thread panicked outside the handler
    #[error("worker {worker} panicked: {message}")]
    Panicked {
        /// Worker index
        worker: usize,
        /// Panic payload, when it was a string
        message: String,
    },
}

/// Aggregate failure from [`WorkerPool::join_all`](crate::http::WorkerPool::join_all)
#[derive(Debug, Error)]
#[error("{} worker(s) failed", failures.len())]
pub struct JoinError {
    /// One entry per failed worker
    pub failures: Vec<WorkerError>,
}

/// Errors starting a [`WorkerPool`](crate::http::WorkerPool)
#[derive(Debug, Error)]
pub enum PoolError {
    /// A pool needs at least one worker
    #[error("worker pool needs at least one thread")]
    NoWorkers,

    /// The operating system refused to spawn a worker thread
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Top-level server error
#[derive(Debug, Error)]
pub enum ServerError {
    /// I/O error from the listener
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Connection queue failure
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Worker pool failed to start
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    /// One or more workers failed
    #[error("join error: {0}")]
    Join(#[from] JoinError),

    /// The directory to serve does not exist or is not a directory
    #[error("not a directory: {0}")]
    NotADirectory(String),
}

/// Extract a printable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

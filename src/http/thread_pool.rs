//! Fixed-size worker pool fed by a [`ConnectionQueue`]
//!
//! Each worker loops: dequeue a connection, hand it to the
//! [`ConnectionHandler`], close it. Workers exit once the queue has been shut
//! down and drained. A failing or panicking handler only costs the one
//! connection it was serving; the worker carries on with the next one.

use super::connection_queue::ConnectionQueue;
use crate::error::{HandlerError, JoinError, PoolError, QueueError, WorkerError, panic_message};
use std::io;
use std::net::{Shutdown, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// An accepted connection that a worker closes when done with it
pub trait Connection: Send + 'static {
    /// Close the connection, consuming it
    fn close(self) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn close(self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            // the peer may already have hung up
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

/// Serves a single request on a connection
pub trait ConnectionHandler<C>: Send + Sync {
    /// Read the request from `conn` and write the response
    fn handle(&self, conn: &mut C) -> Result<(), HandlerError>;
}

impl<C, F> ConnectionHandler<C> for F
where
    F: Fn(&mut C) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, conn: &mut C) -> Result<(), HandlerError> {
        self(conn)
    }
}

/// Shared counters updated by every worker
#[derive(Default)]
struct PoolStats {
    handled: AtomicUsize,
    failed: AtomicUsize,
    active: AtomicUsize,
    live_workers: AtomicUsize,
}

/// Point-in-time view of pool activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Connections whose handler returned successfully
    pub handled: usize,
    /// Connections whose handler failed or panicked
    pub failed: usize,
    /// Connections being handled right now
    pub active: usize,
    /// Workers that have not exited yet
    pub live_workers: usize,
}

/// Fixed set of worker threads sharing one connection queue
pub struct WorkerPool {
    workers: Vec<Worker>,
    stats: Arc<PoolStats>,
}

impl WorkerPool {
    /// Start `size` workers consuming from `queue`
    ///
    /// If a thread fails to spawn, the queue is shut down and the workers
    /// already running are joined before the error is returned.
    pub fn start<C, H>(
        size: usize,
        queue: Arc<ConnectionQueue<C>>,
        handler: Arc<H>,
    ) -> Result<Self, PoolError>
    where
        C: Connection,
        H: ConnectionHandler<C> + ?Sized + 'static,
    {
        if size == 0 {
            return Err(PoolError::NoWorkers);
        }

        let stats = Arc::new(PoolStats::default());
        let mut pool = Self {
            workers: Vec::with_capacity(size),
            stats: Arc::clone(&stats),
        };

        for id in 0..size {
            let spawned = Worker::spawn(
                id,
                Arc::clone(&queue),
                Arc::clone(&handler),
                Arc::clone(&stats),
            );
            match spawned {
                Ok(worker) => pool.workers.push(worker),
                Err(e) => {
                    tracing::error!(worker = id, error = %e, "failed to spawn worker");
                    if let Err(qe) = queue.shutdown() {
                        tracing::error!(error = %qe, "failed to shut down queue after spawn failure");
                    }
                    if let Err(je) = pool.join_all() {
                        tracing::error!(error = %je, "workers failed while unwinding pool start");
                    }
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        tracing::debug!(workers = size, "worker pool started");
        Ok(pool)
    }

    /// Number of workers started
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Current pool statistics
    pub fn stats(&self) -> PoolSnapshot {
        snapshot(&self.stats)
    }

    /// Wait for every worker to exit
    ///
    /// Only returns once the queue has been shut down and drained, or every
    /// worker has failed. Failures are collected rather than stopping early.
    pub fn join_all(self) -> Result<PoolSnapshot, JoinError> {
        let mut failures = Vec::new();

        for worker in self.workers {
            let id = worker.id;
            match worker.handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(e),
                Err(payload) => failures.push(WorkerError::Panicked {
                    worker: id,
                    message: panic_message(payload.as_ref()),
                }),
            }
        }

        let stats = snapshot(&self.stats);
        if failures.is_empty() {
            tracing::debug!(handled = stats.handled, failed = stats.failed, "worker pool joined");
            Ok(stats)
        } else {
            Err(JoinError { failures })
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.workers.len())
            .field("stats", &self.stats())
            .finish()
    }
}

fn snapshot(stats: &PoolStats) -> PoolSnapshot {
    PoolSnapshot {
        handled: stats.handled.load(Ordering::Relaxed),
        failed: stats.failed.load(Ordering::Relaxed),
        active: stats.active.load(Ordering::Relaxed),
        live_workers: stats.live_workers.load(Ordering::Relaxed),
    }
}

struct Worker {
    id: usize,
    handle: thread::JoinHandle<Result<(), WorkerError>>,
}

impl Worker {
    fn spawn<C, H>(
        id: usize,
        queue: Arc<ConnectionQueue<C>>,
        handler: Arc<H>,
        stats: Arc<PoolStats>,
    ) -> io::Result<Self>
    where
        C: Connection,
        H: ConnectionHandler<C> + ?Sized + 'static,
    {
        stats.live_workers.fetch_add(1, Ordering::Relaxed);
        let thread_stats = Arc::clone(&stats);
        let spawned = thread::Builder::new()
            .name(format!("fileserve-worker-{}", id))
            .spawn(move || {
                let result = worker_loop(id, &queue, handler.as_ref(), &thread_stats);
                thread_stats.live_workers.fetch_sub(1, Ordering::Relaxed);
                result
            });

        match spawned {
            Ok(handle) => Ok(Self { id, handle }),
            Err(e) => {
                stats.live_workers.fetch_sub(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}

fn worker_loop<C, H>(
    id: usize,
    queue: &ConnectionQueue<C>,
    handler: &H,
    stats: &PoolStats,
) -> Result<(), WorkerError>
where
    C: Connection,
    H: ConnectionHandler<C> + ?Sized,
{
    tracing::trace!(worker = id, "worker running");

    loop {
        let mut conn = match queue.dequeue() {
            Ok(conn) => conn,
            Err(QueueError::Shutdown) => break,
            Err(source) => {
                tracing::error!(worker = id, error = %source, "worker cannot dequeue");
                return Err(WorkerError::Queue { worker: id, source });
            }
        };

        stats.active.fetch_add(1, Ordering::Relaxed);
        match serve(handler, &mut conn) {
            Ok(()) => {
                stats.handled.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(worker = id, error = %e, "connection handler failed");
            }
        }
        stats.active.fetch_sub(1, Ordering::Relaxed);

        if let Err(e) = conn.close() {
            tracing::warn!(worker = id, error = %e, "failed to close connection");
        }
    }

    tracing::trace!(worker = id, "worker exiting");
    Ok(())
}

/// Run the handler, turning a panic into a [`HandlerError::Panicked`]
fn serve<C, H>(handler: &H, conn: &mut C) -> Result<(), HandlerError>
where
    H: ConnectionHandler<C> + ?Sized,
{
    panic::catch_unwind(AssertUnwindSafe(|| handler.handle(conn)))
        .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload.as_ref()))))
}

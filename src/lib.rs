//! fileserve - static file server on a bounded connection queue
//!
//! One thread accepts connections and pushes them into a fixed-capacity
//! [`ConnectionQueue`](http::ConnectionQueue); a fixed pool of worker threads
//! pops them, answers a single `GET`/`HEAD` request with the file contents or
//! a 404, and closes the connection.
//!
//! Shutdown is driven by a [`CancellationToken`]: the accept loop stops,
//! the queue is shut down, workers drain whatever was already accepted and
//! exit, and [`Server::run`] returns once every worker has been joined.

#![warn(missing_docs)]

pub mod builder;
pub mod error;
pub mod http;
pub mod signal;

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

pub use builder::ServerBuilder;
pub use error::{Result, ServerError};
pub use http::{
    Connection, ConnectionHandler, ConnectionQueue, PoolSnapshot, ServerConfig, StaticFiles,
    WorkerPool,
};
pub use tokio_util::sync::CancellationToken;

/// The accepting side of the server
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    handler: Arc<dyn ConnectionHandler<TcpStream>>,
}

impl Server {
    /// Bind a server that serves files from `config.root`
    ///
    /// # Examples
    /// ```no_run
    /// use fileserve::{CancellationToken, Server, ServerConfig};
    ///
    /// let server = Server::bind(ServerConfig::new("./public", 8080)).unwrap();
    /// server.run(CancellationToken::new()).unwrap();
    /// ```
    pub fn bind(config: ServerConfig) -> Result<Self> {
        let handler = Arc::new(StaticFiles::new(config.root.clone()));
        Self::with_handler(config, handler)
    }

    /// Bind a server that hands every connection to `handler`
    pub fn with_handler(
        config: ServerConfig,
        handler: Arc<dyn ConnectionHandler<TcpStream>>,
    ) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.address())?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            listener,
            config,
            handler,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Configuration the server was built with
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Accept connections until `cancel` fires, then drain and join the workers
    ///
    /// Returns the final worker statistics. An accept error ends the loop
    /// early, but the queue is still shut down and the workers joined before
    /// the error is returned.
    pub fn run(self, cancel: CancellationToken) -> Result<PoolSnapshot> {
        let Self {
            listener,
            config,
            handler,
        } = self;

        let addr = listener.local_addr()?;
        let queue = Arc::new(ConnectionQueue::new(config.capacity)?);
        let pool = WorkerPool::start(config.threads, Arc::clone(&queue), handler)?;

        tracing::info!(
            addr = %addr,
            root = %config.root.display(),
            threads = config.threads,
            capacity = config.capacity,
            "server listening"
        );

        let accepted = accept_loop(&listener, &queue, &config, &cancel);
        tracing::info!("accept loop stopped, draining connections");

        // accept_loop never returns mid-enqueue, so nothing is in flight here
        let shutdown = queue.shutdown();
        let joined = pool.join_all();

        accepted?;
        shutdown?;
        let stats = joined?;
        tracing::info!(handled = stats.handled, failed = stats.failed, "server stopped");
        Ok(stats)
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listener", &self.listener)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn accept_loop(
    listener: &TcpListener,
    queue: &ConnectionQueue<TcpStream>,
    config: &ServerConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    while !cancel.is_cancelled() {
        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(config.accept_poll_interval);
                continue;
            }
            Err(e) if is_transient(&e) => {
                tracing::debug!(error = %e, "transient accept failure");
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
                return Err(e.into());
            }
        };

        if let Err(e) = prepare(&stream, config) {
            tracing::warn!(peer = %peer, error = %e, "dropping connection");
            continue;
        }

        if let Err(rejected) = queue.enqueue(stream) {
            let (stream, kind) = rejected.into_parts();
            if let Err(e) = stream.close() {
                tracing::warn!(peer = %peer, error = %e, "failed to close rejected connection");
            }
            tracing::error!(peer = %peer, error = %kind, "connection queue rejected connection");
            return Err(kind.into());
        }
        tracing::trace!(peer = %peer, "connection queued");
    }
    Ok(())
}

/// Accepted sockets inherit non-blocking mode from the listener on some
/// platforms; workers expect blocking I/O bounded by timeouts.
fn prepare(stream: &TcpStream, config: &ServerConfig) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(config.read_timeout)?;
    stream.set_write_timeout(config.write_timeout)
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

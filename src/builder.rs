//! Server builder

use crate::{ConnectionHandler, Result, Server, ServerConfig};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Server builder
///
/// # Examples
/// ```no_run
/// use fileserve::{CancellationToken, ServerBuilder};
///
/// let server = ServerBuilder::new("./public")
///     .port(8080)
///     .threads(8)
///     .capacity(64)
///     .build()
///     .unwrap();
/// server.run(CancellationToken::new()).unwrap();
/// ```
pub struct ServerBuilder {
    config: ServerConfig,
    handler: Option<Arc<dyn ConnectionHandler<TcpStream>>>,
}

impl ServerBuilder {
    /// Create new server builder serving `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            config: ServerConfig::new(root, ServerConfig::default().port),
            handler: None,
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: ServerConfig) -> Self {
        Self {
            config,
            handler: None,
        }
    }

    /// Interface to bind
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Port to bind
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Number of worker threads
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    /// Connection queue capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Per-connection read and write timeout
    pub fn io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.read_timeout = timeout;
        self.config.write_timeout = timeout;
        self
    }

    /// Replace the static file handler
    pub fn handler(mut self, handler: impl ConnectionHandler<TcpStream> + 'static) -> Self {
        let handler: Arc<dyn ConnectionHandler<TcpStream>> = Arc::new(handler);
        self.handler = Some(handler);
        self
    }

    /// Build the server
    pub fn build(self) -> Result<Server> {
        match self.handler {
            Some(handler) => Server::with_handler(self.config, handler),
            None => Server::bind(self.config),
        }
    }
}

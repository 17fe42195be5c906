//! Server configuration

use crate::error::ServerError;
use std::path::PathBuf;
use std::time::Duration;

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 5;

/// Default number of accepted connections buffered for the workers
pub const DEFAULT_CAPACITY: usize = 5;

/// Default idle sleep of the accept loop, the worst-case added accept latency
pub const DEFAULT_ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Everything needed to run a server, fixed once the server starts
///
/// # Examples
/// ```
/// use fileserve::http::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::new("/srv/www", 8080)
///     .with_threads(8)
///     .with_capacity(32)
///     .with_read_timeout(Some(Duration::from_secs(5)));
/// assert_eq!(config.address(), "0.0.0.0:8080");
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory whose files are served
    pub root: PathBuf,

    /// Interface to bind
    pub host: String,

    /// Port to bind, 0 for any free port
    pub port: u16,

    /// Number of worker threads
    pub threads: usize,

    /// Connection queue capacity
    pub capacity: usize,

    /// How long the accept loop sleeps between polls when idle
    pub accept_poll_interval: Duration,

    /// Socket read timeout for accepted connections (None for no timeout)
    pub read_timeout: Option<Duration>,

    /// Socket write timeout for accepted connections (None for no timeout)
    pub write_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            host: "0.0.0.0".to_string(),
            port: 8080,
            threads: DEFAULT_THREADS,
            capacity: DEFAULT_CAPACITY,
            accept_poll_interval: DEFAULT_ACCEPT_POLL_INTERVAL,
            read_timeout: Some(Duration::from_secs(30)),
            write_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl ServerConfig {
    /// Serve `root` on `port` with default settings
    pub fn new(root: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            root: root.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the interface to bind
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the number of worker threads
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the connection queue capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the idle accept poll interval
    pub fn with_accept_poll_interval(mut self, interval: Duration) -> Self {
        self.accept_poll_interval = interval;
        self
    }

    /// Set the per-connection read timeout
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the per-connection write timeout
    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Get the bind address as a string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check the configuration before anything is bound or spawned
    pub fn validate(&self) -> Result<(), ServerError> {
        if !self.root.is_dir() {
            return Err(ServerError::NotADirectory(self.root.display().to_string()));
        }
        if self.threads == 0 {
            return Err(crate::error::PoolError::NoWorkers.into());
        }
        if self.capacity == 0 {
            return Err(crate::error::QueueError::ZeroCapacity.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.threads, DEFAULT_THREADS);
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.accept_poll_interval, DEFAULT_ACCEPT_POLL_INTERVAL);
        assert!(config.accept_poll_interval <= Duration::from_millis(10));
        assert_eq!(config.address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_builder_methods() {
        let config = ServerConfig::new("/tmp", 0)
            .with_host("127.0.0.1")
            .with_threads(2)
            .with_capacity(9)
            .with_write_timeout(None);
        assert_eq!(config.address(), "127.0.0.1:0");
        assert_eq!(config.threads, 2);
        assert_eq!(config.capacity, 9);
        assert!(config.write_timeout.is_none());
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::new(dir.path(), 0);
        assert!(config.validate().is_ok());

        assert!(matches!(
            config.clone().with_threads(0).validate(),
            Err(ServerError::Pool(_))
        ));
        assert!(matches!(
            config.clone().with_capacity(0).validate(),
            Err(ServerError::Queue(_))
        ));

        let missing = ServerConfig::new(dir.path().join("missing"), 0);
        assert!(matches!(missing.validate(), Err(ServerError::NotADirectory(_))));
    }
}

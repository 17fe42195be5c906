//! Connection queue, worker pool and the minimal HTTP/1.0 file protocol
//!
//! The accepting thread pushes sockets into a [`ConnectionQueue`]; a
//! [`WorkerPool`] pops them and runs a [`ConnectionHandler`] on each.

mod connection_queue;
mod parser;
mod response;
mod server_config;
mod static_files;
mod thread_pool;

pub use connection_queue::ConnectionQueue;
pub use parser::{MAX_REQUEST_LINE, ParseError, Request};
pub use response::{CHUNK_SIZE, Response, Status};
pub use server_config::{
    DEFAULT_ACCEPT_POLL_INTERVAL, DEFAULT_CAPACITY, DEFAULT_THREADS, ServerConfig,
};
pub use static_files::{StaticFiles, mime_type};
pub use thread_pool::{Connection, ConnectionHandler, PoolSnapshot, WorkerPool};

/// HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Send the file
    GET,
    /// Send only the headers GET would
    HEAD,
}

impl Method {
    /// Parse method from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"GET" => Some(Self::GET),
            b"HEAD" => Some(Self::HEAD),
            _ => None,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GET => "GET",
            Self::HEAD => "HEAD",
        }
    }
}

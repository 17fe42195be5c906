//! Static file handler

use super::parser::{ParseError, Request};
use super::response::Response;
use super::thread_pool::ConnectionHandler;
use super::{Method, Status};
use crate::error::HandlerError;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::net::TcpStream;
use std::path::{Component, Path, PathBuf};

/// Serves files below a root directory, one request per connection
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    /// Serve files below `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory being served
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto a file below the root
    ///
    /// Returns `None` for paths that would escape the root.
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let relative = Path::new(request_path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(resolved)
    }

    /// Serve one request read from `reader`, writing the response to `writer`
    pub fn serve<R: Read, W: Write>(&self, reader: R, writer: &mut W) -> Result<(), HandlerError> {
        let mut reader = BufReader::new(reader);
        let request = match Request::read_from(&mut reader)? {
            Ok(request) => request,
            // the client gave up without asking for anything
            Err(ParseError::Empty) => return Ok(()),
            Err(e) => {
                Response::bad_request().write_to(writer)?;
                return Err(HandlerError::BadRequest(e.to_string()));
            }
        };

        let Some((file, len)) = self.open(&request.path) else {
            tracing::debug!(path = %request.path, status = 404, "not found");
            Response::not_found().write_to(writer)?;
            return Ok(());
        };

        let response = Response::new(Status::Ok)
            .content_type(mime_type(&request.path))
            .content_length(len);
        match request.method {
            Method::GET => response.write_with_body(writer, &mut BufReader::new(file))?,
            Method::HEAD => response.write_to(writer)?,
        }

        tracing::debug!(path = %request.path, status = 200, bytes = len, "served");
        Ok(())
    }

    /// Open a regular file, treating directories and errors as not found
    fn open(&self, request_path: &str) -> Option<(File, u64)> {
        let path = self.resolve(request_path)?;
        let file = File::open(&path).ok()?;
        let meta = file.metadata().ok()?;
        meta.is_file().then(|| (file, meta.len()))
    }
}

impl ConnectionHandler<TcpStream> for StaticFiles {
    fn handle(&self, conn: &mut TcpStream) -> Result<(), HandlerError> {
        let peer = conn.peer_addr().ok();
        tracing::trace!(peer = ?peer, "handling connection");
        let mut writer = &*conn;
        self.serve(&*conn, &mut writer)
    }
}

/// Content-Type for a path, by extension
pub fn mime_type(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("txt") => "text/plain",
        Some("html") => "text/html",
        Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

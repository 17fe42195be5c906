//! HTTP/1.0 response head and body streaming

use std::io::{self, Read, Result as IoResult, Write};

/// Body bytes copied per write
pub const CHUNK_SIZE: usize = 4096;

/// HTTP status codes
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u16)]
pub enum Status {
    /// 200
    Ok = 200,
    /// 400
    BadRequest = 400,
    /// 404
    NotFound = 404,
}

impl Status {
    /// Get status text
    pub fn text(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
        }
    }
}

/// Status line plus the only two headers this server sends
#[derive(Debug)]
pub struct Response {
    pub(crate) status: Status,
    pub(crate) content_type: Option<&'static str>,
    pub(crate) content_length: u64,
}

impl Response {
    /// Create new response with status and an empty body
    pub fn new(status: Status) -> Self {
        Self {
            status,
            content_type: None,
            content_length: 0,
        }
    }

    /// Set the Content-Type header
    pub fn content_type(mut self, mime: &'static str) -> Self {
        self.content_type = Some(mime);
        self
    }

    /// Set the Content-Length header
    pub fn content_length(mut self, len: u64) -> Self {
        self.content_length = len;
        self
    }

    /// Write the status line and headers
    pub fn write_head<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        write!(writer, "HTTP/1.0 {} {}\r\n", self.status as u16, self.status.text())?;
        if let Some(mime) = self.content_type {
            write!(writer, "Content-Type: {}\r\n", mime)?;
        }
        write!(writer, "Content-Length: {}\r\n\r\n", self.content_length)
    }

    /// Write the head followed by `body`, streamed in [`CHUNK_SIZE`] pieces
    ///
    /// Fails if `body` yields fewer bytes than the advertised length.
    pub fn write_with_body<W: Write, R: Read>(&self, writer: &mut W, body: &mut R) -> IoResult<()> {
        self.write_head(writer)?;

        let mut chunk = [0u8; CHUNK_SIZE];
        let mut remaining = self.content_length;
        while remaining > 0 {
            let want = remaining.min(CHUNK_SIZE as u64) as usize;
            let n = match body.read(&mut chunk[..want]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "body ended before Content-Length bytes",
                    ));
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            writer.write_all(&chunk[..n])?;
            remaining -= n as u64;
        }
        writer.flush()
    }

    /// Write a response that has no body
    pub fn write_to<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        self.write_head(writer)?;
        writer.flush()
    }
}

// Convenience constructors
impl Response {
    /// 404 Not Found response
    pub fn not_found() -> Self {
        Self::new(Status::NotFound)
    }

    /// 400 Bad Request response
    pub fn bad_request() -> Self {
        Self::new(Status::BadRequest)
    }
}

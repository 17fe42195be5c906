//! Request-line parser

use super::Method;
use std::io::{BufRead, Read};
use std::str;

/// Longest request line accepted, terminator included
pub const MAX_REQUEST_LINE: usize = 512;

/// The parts of a request line the server acts on
#[derive(Debug, PartialEq, Eq)]
pub struct Request {
    /// Request method
    pub method: Method,
    /// Request path with any query string removed
    pub path: String,
}

/// Parse errors
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The peer closed the connection before sending anything
    Empty,
    /// No line terminator within [`MAX_REQUEST_LINE`] bytes
    TooLong,
    /// Method other than `GET` or `HEAD`
    InvalidMethod,
    /// Missing path or one not starting with `/`
    InvalidPath,
    /// Path is not valid UTF-8
    InvalidEncoding,
}

impl Request {
    /// Read and parse one request line
    ///
    /// Anything after the line (headers, body) is left unread.
    pub fn read_from<R: BufRead>(reader: &mut R) -> std::io::Result<Result<Self, ParseError>> {
        let mut line = Vec::with_capacity(128);
        reader
            .take(MAX_REQUEST_LINE as u64)
            .read_until(b'\n', &mut line)?;

        if line.is_empty() {
            return Ok(Err(ParseError::Empty));
        }
        if line.last() != Some(&b'\n') && line.len() == MAX_REQUEST_LINE {
            return Ok(Err(ParseError::TooLong));
        }
        Ok(Self::parse(&line))
    }

    /// Parse a request line such as `GET /index.html HTTP/1.0`
    ///
    /// The version token is optional and ignored; responses are always
    /// HTTP/1.0.
    pub fn parse(line: &[u8]) -> Result<Self, ParseError> {
        let mut parts = line
            .trim_ascii()
            .split(|&b| b == b' ')
            .filter(|part| !part.is_empty());

        let method = parts
            .next()
            .and_then(Method::from_bytes)
            .ok_or(ParseError::InvalidMethod)?;

        let path = parts.next().ok_or(ParseError::InvalidPath)?;
        let path = str::from_utf8(path).map_err(|_| ParseError::InvalidEncoding)?;
        if !path.starts_with('/') {
            return Err(ParseError::InvalidPath);
        }

        // drop any query string
        let path = path.split(['?', '#']).next().unwrap_or(path);

        Ok(Request {
            method,
            path: path.to_string(),
        })
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty request"),
            Self::TooLong => write!(f, "Request line exceeds {} bytes", MAX_REQUEST_LINE),
            Self::InvalidMethod => write!(f, "Invalid HTTP method"),
            Self::InvalidPath => write!(f, "Invalid request path"),
            Self::InvalidEncoding => write!(f, "Request path is not UTF-8"),
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_get_request() {
        let req = Request::parse(b"GET /index.html HTTP/1.0\r\n").unwrap();
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.path, "/index.html");
    }

    #[test]
    fn test_parse_without_version() {
        let req = Request::parse(b"HEAD /a/b.txt").unwrap();
        assert_eq!(req.method, Method::HEAD);
        assert_eq!(req.path, "/a/b.txt");
    }

    #[test]
    fn test_query_string_stripped() {
        let req = Request::parse(b"GET /file.txt?v=2 HTTP/1.1").unwrap();
        assert_eq!(req.path, "/file.txt");
    }

    #[test]
    fn test_invalid_lines() {
        assert_eq!(Request::parse(b"POST /x HTTP/1.0"), Err(ParseError::InvalidMethod));
        assert_eq!(Request::parse(b"GET"), Err(ParseError::InvalidPath));
        assert_eq!(Request::parse(b"GET index.html"), Err(ParseError::InvalidPath));
        assert_eq!(Request::parse(b"GET /\xff\xfe"), Err(ParseError::InvalidEncoding));
    }

    #[test]
    fn test_read_leaves_headers_unread() {
        let mut input = Cursor::new(&b"GET /a.txt HTTP/1.0\r\nHost: x\r\n\r\n"[..]);
        let req = Request::read_from(&mut input).unwrap().unwrap();
        assert_eq!(req.path, "/a.txt");
        assert_eq!(input.position(), 21);
    }

    #[test]
    fn test_read_empty_and_oversized() {
        let mut empty = Cursor::new(&b""[..]);
        assert_eq!(Request::read_from(&mut empty).unwrap(), Err(ParseError::Empty));

        let long = format!("GET /{} HTTP/1.0\r\n", "a".repeat(MAX_REQUEST_LINE));
        let mut input = Cursor::new(long.into_bytes());
        assert_eq!(Request::read_from(&mut input).unwrap(), Err(ParseError::TooLong));
    }
}

//! Request reading and request-line parsing.
//!
//! Only the request line matters; headers are read (so the client is not
//! cut off mid-send) and then ignored.

use std::io;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;

/// Largest request head we read.
pub const MAX_REQUEST_BYTES: usize = 4096;

/// Method and decoded path of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    /// Percent-decoded path without query string or fragment.
    pub path: String,
}

impl RequestLine {
    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed request line")]
    Malformed,
    #[error("request path is not valid UTF-8 after decoding")]
    InvalidPath,
}

/// Parse `METHOD SP PATH [SP VERSION]` from the first line of `raw`.
pub fn parse_request(raw: &[u8]) -> Result<RequestLine, ParseError> {
    let text = String::from_utf8_lossy(raw);
    let line = text.lines().next().unwrap_or_default();
    let mut parts = line.split_whitespace();

    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err(ParseError::Malformed);
    };

    let target = target.split(['?', '#']).next().unwrap_or_default();
    let path = percent_decode_str(target)
        .decode_utf8()
        .map_err(|_| ParseError::InvalidPath)?
        .into_owned();

    Ok(RequestLine {
        method: method.to_string(),
        path,
    })
}

/// Read a request head from `reader`.
///
/// Stops at the blank line ending the headers, at [`MAX_REQUEST_BYTES`], or
/// at EOF. Returns `Ok(None)` if the peer closed without sending anything.
/// If the deadline passes after some bytes arrived, those bytes are
/// returned; with nothing received it is a `TimedOut` error.
pub async fn read_request<R>(reader: &mut R, timeout: Duration) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let deadline = Instant::now() + timeout;
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    while buf.len() < MAX_REQUEST_BYTES && !has_complete_head(&buf) {
        let want = chunk.len().min(MAX_REQUEST_BYTES - buf.len());
        match tokio::time::timeout_at(deadline, reader.read(&mut chunk[..want])).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
            Ok(Err(e)) => return Err(e),
            Err(_) if buf.is_empty() => {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "no request received before the read deadline",
                ))
            }
            Err(_) => break,
        }
    }

    Ok(if buf.is_empty() { None } else { Some(buf) })
}

fn has_complete_head(buf: &[u8]) -> bool {
    buf.windows(4).any(|w| w == b"\r\n\r\n")
}

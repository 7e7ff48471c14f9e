//! Response serialization.
//!
//! Every response is `Connection: close` with an exact `Content-Length`.

use bytes::Bytes;
use ::http::StatusCode;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const TEXT_HTML: &str = "text/html";
pub const TEXT_PLAIN: &str = "text/plain";

const FORBIDDEN_BODY: &str =
    "<!DOCTYPE html><html><body><h1>403 Forbidden</h1><p>Access denied.</p></body></html>";
const NOT_FOUND_BODY: &str =
    "<!DOCTYPE html><html><body><h1>404 Not Found</h1><p>The requested file was not found.</p></body></html>";
const UNSUPPORTED_BODY: &str = "<!DOCTYPE html><html><body><h1>404 Not Found</h1>\
     <p>File type not supported. Server only supports HTML, PNG, and PDF files.</p></body></html>";

/// A complete response, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    content_type: &'static str,
    body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    pub fn ok(content_type: &'static str, body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, content_type, body)
    }

    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST, TEXT_PLAIN, "Bad Request")
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, TEXT_HTML, FORBIDDEN_BODY)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, TEXT_HTML, NOT_FOUND_BODY)
    }

    /// 404 for an existing file whose type is not served.
    pub fn unsupported_type() -> Self {
        Self::new(StatusCode::NOT_FOUND, TEXT_HTML, UNSUPPORTED_BODY)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, TEXT_PLAIN, "Method Not Allowed")
    }

    pub fn too_many_requests() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, TEXT_PLAIN, "Too Many Requests")
    }

    pub fn internal_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, TEXT_PLAIN, "Internal Server Error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Status line and headers, including the terminating blank line.
    pub fn head(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or("Unknown"),
            self.content_type,
            self.body.len(),
        )
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(self.head().as_bytes()).await?;
        writer.write_all(&self.body).await?;
        writer.flush().await
    }
}

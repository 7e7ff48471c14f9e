//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hitserve::config::{ServerConfig, SimulationConfig};
use hitserve::http::ConnectionHandler;
use hitserve::lifecycle::Shutdown;
use hitserve::net::Listener;
use hitserve::{FileServer, Mode};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n%test document\n%%EOF\n";
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-an-image";
pub const INDEX_HTML: &str = "<!DOCTYPE html><html><body><h1>index</h1></body></html>";

/// Build a served directory:
///
/// ```text
/// index.html  report.pdf  logo.png  notes.txt
/// docs/guide.html
/// ```
pub fn populate_root() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "index.html", INDEX_HTML.as_bytes());
    write(dir.path(), "report.pdf", PDF_BYTES);
    write(dir.path(), "logo.png", PNG_BYTES);
    write(dir.path(), "notes.txt", b"plain text is not served");
    std::fs::create_dir(dir.path().join("docs")).unwrap();
    write(&dir.path().join("docs"), "guide.html", b"<p>guide</p>");
    dir
}

fn write(dir: &Path, name: &str, bytes: &[u8]) {
    std::fs::write(dir.join(name), bytes).unwrap();
}

/// Config for `mode` serving `root` on an ephemeral port, with no
/// artificial delays.
pub fn config_for(mode: Mode, root: &Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.server.root = Some(root.to_path_buf());
    config.server.mode = mode;
    config.simulation = SimulationConfig::none();
    config.shutdown.grace_secs = 2;
    config
}

/// A server running on its own task.
pub struct TestServer {
    pub addr: SocketAddr,
    pub handler: Arc<ConnectionHandler>,
    pub shutdown: Shutdown,
    pub task: JoinHandle<()>,
    // Held so the served directory outlives the server.
    _root: Option<TempDir>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}

/// Start `mode` over a freshly populated root.
pub async fn start(mode: Mode) -> TestServer {
    let root = populate_root();
    let config = config_for(mode, root.path());
    let mut server = start_with(config).await;
    server._root = Some(root);
    server
}

/// Start a server with an explicit config. The caller owns the root.
pub async fn start_with(config: ServerConfig) -> TestServer {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = FileServer::new(&config).unwrap();
    let handler = server.handler();
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();

    let task = tokio::spawn(async move {
        server.run(listener, signal).await.unwrap();
    });

    TestServer {
        addr,
        handler,
        shutdown,
        task,
        _root: None,
    }
}

/// A raw response as read off the socket.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub head: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Write `raw` verbatim and read until the server closes.
pub async fn send_raw(addr: SocketAddr, raw: &[u8]) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    parse_raw(&buf)
}

pub async fn get(addr: SocketAddr, path: &str) -> RawResponse {
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    send_raw(addr, request.as_bytes()).await
}

pub fn parse_raw(buf: &[u8]) -> RawResponse {
    let split = buf
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has no header terminator");
    let head = String::from_utf8_lossy(&buf[..split]).into_owned();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("response has no status code");
    RawResponse {
        status,
        head,
        body: buf[split + 4..].to_vec(),
    }
}

//! Per-connection request lifecycle.
//!
//! # States
//! ```text
//! Received → Parsed → RateChecked → Resolved → CounterUpdated → Responded → Closed
//!     │         │          │            │
//!     └─────────┴──────────┴────────────┴──→ Responded(error) → Closed
//! ```
//!
//! The handler is assembled once from the [`Mode`]: a mode without rate
//! limiting simply has no limiter, a mode without counting has no counter,
//! and only `single`/`multi` carry a non-zero work delay. Serving a request
//! never looks at the mode again.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::config::ServerConfig;
use crate::hits::{HitCounter, ResourceKey};
use crate::http::listing::render_listing;
use crate::http::request::{parse_request, read_request};
use crate::http::resolve::{PathResolver, Resolution};
use crate::http::response::{Response, TEXT_HTML};
use crate::mode::Mode;
use crate::observability::metrics;
use crate::security::{Admission, RateLimiter};

/// Last stage a request passed before being answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Parsed,
    RateChecked,
    Resolved,
    CounterUpdated,
}

/// A response and the last stage reached before producing it.
#[derive(Debug)]
pub struct Outcome {
    pub response: Response,
    pub stage: Stage,
}

impl Outcome {
    fn at(stage: Stage, response: Response) -> Self {
        Self { response, stage }
    }
}

/// Serves one request per connection according to a fixed mode.
#[derive(Debug)]
pub struct ConnectionHandler {
    mode: Mode,
    resolver: PathResolver,
    hits: Option<Arc<HitCounter>>,
    limiter: Option<Arc<RateLimiter>>,
    work_delay: Duration,
    read_timeout: Duration,
}

impl ConnectionHandler {
    /// Build the handler for `config.server.mode` serving `resolver`'s root.
    pub fn for_mode(config: &ServerConfig, resolver: PathResolver) -> Self {
        let mode = config.server.mode;
        let hits = mode
            .consistency()
            .map(|c| Arc::new(HitCounter::new(c, config.simulation.counter_delay())));
        let limiter = mode
            .is_rate_limited()
            .then(|| Arc::new(RateLimiter::from_config(&config.rate_limit)));
        let work_delay = if mode.simulates_work() {
            config.simulation.request_delay()
        } else {
            Duration::ZERO
        };

        Self {
            mode,
            resolver,
            hits,
            limiter,
            work_delay,
            read_timeout: config.listener.read_timeout(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The hit counter, when this mode counts.
    pub fn hits(&self) -> Option<&Arc<HitCounter>> {
        self.hits.as_ref()
    }

    pub fn limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.limiter.as_ref()
    }

    pub fn root(&self) -> &std::path::Path {
        self.resolver.root()
    }

    /// Run the whole lifecycle on `stream` and close it.
    ///
    /// Never fails: faults become 500 responses where possible and are
    /// logged otherwise.
    pub async fn serve<S>(&self, mut stream: S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let start = Instant::now();

        let raw = match read_request(&mut stream, self.read_timeout).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!("Peer closed without sending a request");
                return;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read request");
                return;
            }
        };

        let outcome = self.respond(&raw, peer.ip()).await;
        let status = outcome.response.status();
        tracing::info!(
            status = status.as_u16(),
            stage = ?outcome.stage,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request served"
        );
        metrics::record_request(self.mode, status.as_u16(), start);

        if let Err(e) = outcome.response.write_to(&mut stream).await {
            tracing::debug!(error = %e, "Failed to write response");
            return;
        }
        let _ = stream.shutdown().await;
    }

    /// Turn a raw request from `client` into a response.
    pub async fn respond(&self, raw: &[u8], client: IpAddr) -> Outcome {
        let request = match parse_request(raw) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting malformed request");
                return Outcome::at(Stage::Received, Response::bad_request());
            }
        };
        tracing::debug!(method = %request.method, path = %request.path, "Request parsed");
        let mut stage = Stage::Parsed;

        if let Some(limiter) = &self.limiter {
            if limiter.check(client) == Admission::Rejected {
                tracing::warn!(client = %client, "Rate limit exceeded");
                metrics::record_rate_limited();
                return Outcome::at(stage, Response::too_many_requests());
            }
            stage = Stage::RateChecked;
        }

        if !request.is_get() {
            return Outcome::at(stage, Response::method_not_allowed());
        }

        if !self.work_delay.is_zero() {
            tokio::time::sleep(self.work_delay).await;
        }

        let resolution = match self.resolver.resolve(&request.path).await {
            Ok(resolution) => resolution,
            Err(e) => {
                tracing::error!(error = %e, "Failed to resolve request path");
                return Outcome::at(stage, Response::internal_error());
            }
        };

        let (path, content_type) = match resolution {
            Resolution::Forbidden => {
                tracing::warn!(path = %request.path, "Path escapes the served root");
                return Outcome::at(Stage::Resolved, Response::forbidden());
            }
            Resolution::Missing => return Outcome::at(Stage::Resolved, Response::not_found()),
            Resolution::UnsupportedType(_) => {
                return Outcome::at(Stage::Resolved, Response::unsupported_type())
            }
            Resolution::Directory(dir) => {
                let html = render_listing(&dir, &request.path, self.hits.as_deref()).await;
                return Outcome::at(Stage::Resolved, Response::ok(TEXT_HTML, html));
            }
            Resolution::File { path, content_type } => (path, content_type),
        };

        stage = Stage::Resolved;
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to read file");
                return Outcome::at(stage, Response::internal_error());
            }
        };

        // Only requests that will be answered with the file are counted.
        if let Some(hits) = &self.hits {
            let key = ResourceKey::new(path);
            let count = hits.increment(&key).await;
            tracing::debug!(resource = %key, count, "Hit recorded");
            stage = Stage::CounterUpdated;
        }

        Outcome::at(stage, Response::ok(content_type, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use ::http::StatusCode;
    use std::fs;

    const LOCALHOST: IpAddr = IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);

    fn handler(mode: Mode) -> (tempfile::TempDir, ConnectionHandler) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("report.pdf"), b"%PDF-1.4 \x00\xff").unwrap();
        fs::write(dir.path().join("notes.txt"), b"plain").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();

        let mut config = ServerConfig::default();
        config.server.mode = mode;
        config.simulation = SimulationConfig::none();
        let resolver = PathResolver::new(dir.path()).unwrap();
        (dir, ConnectionHandler::for_mode(&config, resolver))
    }

    async fn get(handler: &ConnectionHandler, path: &str) -> Outcome {
        let raw = format!("GET {path} HTTP/1.1\r\nHost: test\r\n\r\n");
        handler.respond(raw.as_bytes(), LOCALHOST).await
    }

    fn report_key(handler: &ConnectionHandler) -> ResourceKey {
        ResourceKey::new(handler.root().join("report.pdf"))
    }

    #[test]
    fn components_follow_the_mode() {
        for mode in Mode::ALL {
            let (_dir, handler) = handler(mode);
            assert_eq!(handler.hits().is_some(), mode.consistency().is_some(), "{mode}");
            assert_eq!(handler.limiter().is_some(), mode.is_rate_limited(), "{mode}");
        }
    }

    #[tokio::test]
    async fn error_mapping_is_the_same_in_every_mode() {
        for mode in Mode::ALL {
            let (_dir, handler) = handler(mode);
            let cases: [(&[u8], StatusCode); 6] = [
                (b"NONSENSE\r\n\r\n", StatusCode::BAD_REQUEST),
                (b"POST /report.pdf HTTP/1.1\r\n\r\n", StatusCode::METHOD_NOT_ALLOWED),
                (b"GET /../secret HTTP/1.1\r\n\r\n", StatusCode::FORBIDDEN),
                (b"GET /absent.pdf HTTP/1.1\r\n\r\n", StatusCode::NOT_FOUND),
                (b"GET /notes.txt HTTP/1.1\r\n\r\n", StatusCode::NOT_FOUND),
                (b"GET /report.pdf HTTP/1.1\r\n\r\n", StatusCode::OK),
            ];
            for (raw, expected) in cases {
                let outcome = handler.respond(raw, LOCALHOST).await;
                assert_eq!(
                    outcome.response.status(),
                    expected,
                    "{mode}: {}",
                    String::from_utf8_lossy(raw)
                );
            }
        }
    }

    #[tokio::test]
    async fn files_are_counted_but_listings_are_not() {
        let (_dir, handler) = handler(Mode::ThreadSafe);
        let hits = handler.hits().unwrap().clone();

        let outcome = get(&handler, "/report.pdf").await;
        assert_eq!(outcome.stage, Stage::CounterUpdated);
        assert_eq!(outcome.response.content_type(), "application/pdf");
        assert_eq!(&outcome.response.body()[..], b"%PDF-1.4 \x00\xff");

        get(&handler, "/./report.pdf").await;
        get(&handler, "/docs/../report.pdf").await;
        assert_eq!(hits.get(&report_key(&handler)).await, 3);

        let listing = get(&handler, "/").await;
        assert_eq!(listing.stage, Stage::Resolved);
        assert_eq!(hits.len(), 1);
        let html = std::str::from_utf8(listing.response.body()).unwrap();
        assert!(html.contains("report.pdf</a></td><td>3</td>"));

        get(&handler, "/notes.txt").await;
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn uncounted_modes_skip_the_counter() {
        for mode in [Mode::Single, Mode::Multi] {
            let (_dir, handler) = handler(mode);
            let outcome = get(&handler, "/report.pdf").await;
            assert_eq!(outcome.response.status(), StatusCode::OK);
            assert_eq!(outcome.stage, Stage::Resolved);
        }
    }

    #[tokio::test]
    async fn rejected_requests_touch_nothing_else() {
        let (_dir, handler) = handler(Mode::RateLimited);
        let hits = handler.hits().unwrap().clone();

        for _ in 0..5 {
            assert_eq!(get(&handler, "/report.pdf").await.response.status(), StatusCode::OK);
        }
        let rejected = get(&handler, "/report.pdf").await;
        assert_eq!(rejected.response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(rejected.stage, Stage::Parsed);
        assert_eq!(hits.get(&report_key(&handler)).await, 5);

        // Even a traversal attempt is answered with 429 once over the limit.
        let traversal = get(&handler, "/../etc/passwd").await;
        assert_eq!(traversal.response.status(), StatusCode::TOO_MANY_REQUESTS);

        // Other clients are unaffected.
        let other: IpAddr = "192.0.2.7".parse().unwrap();
        let outcome = handler
            .respond(b"GET /report.pdf HTTP/1.1\r\n\r\n", other)
            .await;
        assert_eq!(outcome.response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_requests_are_not_rate_checked() {
        let (_dir, handler) = handler(Mode::RateLimited);
        for _ in 0..10 {
            let outcome = handler.respond(b"\r\n\r\n", LOCALHOST).await;
            assert_eq!(outcome.response.status(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(handler.limiter().unwrap().tracked_addresses(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn work_delay_applies_only_to_simulating_modes() {
        for mode in Mode::ALL {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("a.html"), b"<p>").unwrap();
            let mut config = ServerConfig::default();
            config.server.mode = mode;
            config.simulation.request_delay_ms = 500;
            config.simulation.counter_delay_ms = 0;
            let handler = ConnectionHandler::for_mode(&config, PathResolver::new(dir.path()).unwrap());

            let start = tokio::time::Instant::now();
            get(&handler, "/a.html").await;
            let waited = start.elapsed() >= Duration::from_millis(500);
            assert_eq!(waited, mode.simulates_work(), "{mode}");
        }
    }

    async fn concurrent_gets(handler: Arc<ConnectionHandler>, n: usize) -> u64 {
        let tasks: Vec<_> = (0..n)
            .map(|_| {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let outcome = get(&handler, "/report.pdf").await;
                    assert_eq!(outcome.response.status(), StatusCode::OK);
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        handler.hits().unwrap().get(&report_key(&handler)).await
    }

    fn counting_handler(mode: Mode, dir: &std::path::Path) -> Arc<ConnectionHandler> {
        let mut config = ServerConfig::default();
        config.server.mode = mode;
        config.simulation = SimulationConfig::none();
        config.simulation.counter_delay_ms = 1;
        Arc::new(ConnectionHandler::for_mode(&config, PathResolver::new(dir).unwrap()))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn race_mode_loses_hits_where_threadsafe_does_not() {
        let (dir, _) = handler(Mode::Race);

        let mut lost = false;
        for _ in 0..10 {
            let race = counting_handler(Mode::Race, dir.path());
            if concurrent_gets(race, 100).await < 100 {
                lost = true;
                break;
            }
        }
        assert!(lost, "race mode counted all 100 concurrent hits in 10 trials");

        let threadsafe = counting_handler(Mode::ThreadSafe, dir.path());
        assert_eq!(concurrent_gets(threadsafe, 100).await, 100);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_file_is_a_500_and_is_not_counted() {
        let (dir, handler) = handler(Mode::ThreadSafe);
        let hits = handler.hits().unwrap().clone();
        // A socket passes as a file with a served extension but cannot be read.
        let _socket = std::os::unix::net::UnixListener::bind(dir.path().join("s.pdf")).unwrap();

        let outcome = get(&handler, "/s.pdf").await;
        assert_eq!(outcome.response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&outcome.response.body()[..], b"Internal Server Error");
        assert_eq!(outcome.stage, Stage::Resolved);
        assert_eq!(hits.get(&ResourceKey::new(handler.root().join("s.pdf"))).await, 0);
        assert!(hits.is_empty());

        let outcome = get(&handler, "/report.pdf").await;
        assert_eq!(outcome.response.status(), StatusCode::OK);
        assert_eq!(hits.get(&report_key(&handler)).await, 1);
    }

    #[tokio::test]
    async fn serve_writes_a_full_response_and_closes() {
        let (_dir, handler) = handler(Mode::Multi);
        let (mut client, server) = tokio::io::duplex(4096);
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();

        let serving = async { handler.serve(server, peer).await };
        let talking = async {
            use tokio::io::AsyncReadExt;
            client.write_all(b"GET /report.pdf HTTP/1.1\r\n\r\n").await.unwrap();
            let mut out = Vec::new();
            client.read_to_end(&mut out).await.unwrap();
            out
        };
        let ((), out) = tokio::join!(serving, talking);

        let text = String::from_utf8_lossy(&out);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: application/pdf\r\n"));
        assert!(text.contains("Content-Length: 11\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(out.ends_with(b"%PDF-1.4 \x00\xff"));
    }
}

//! Concurrency-lab file server.
//!
//! Serves a directory over a minimal HTTP/1.1 subset while counting hits
//! per file. Five operating modes show a race condition and its fixes:
//!
//! ```text
//!  Client ──▶ net::Listener ──▶ http::server (inline | spawn)
//!                                   │
//!                                   ▼
//!                          http::handler ──▶ security::rate_limit (ratelimit)
//!                                   │
//!                                   ├──▶ http::resolve ──▶ http::listing
//!                                   ├──▶ hits::store (race | threadsafe | ratelimit)
//!                                   ▼
//!  Client ◀──────────────── http::response
//! ```

pub mod config;
pub mod hits;
pub mod http;
pub mod lifecycle;
pub mod mode;
pub mod net;
pub mod observability;
pub mod security;

pub use config::ServerConfig;
pub use http::{FileServer, ServeError};
pub use lifecycle::Shutdown;
pub use mode::Mode;

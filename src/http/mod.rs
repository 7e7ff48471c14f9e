//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TCP connection
//!     → server.rs (accept loop, inline or spawned dispatch)
//!     → handler.rs (one request lifecycle)
//!         → request.rs (read head, parse request line)
//!         → [security::rate_limit in ratelimit mode]
//!         → resolve.rs (sandboxed path → file / directory / error)
//!         → [hits::store for counted files]
//!         → listing.rs (directory pages)
//!         → response.rs (status line, headers, body)
//!     → connection closed
//! ```

pub mod handler;
pub mod listing;
pub mod request;
pub mod resolve;
pub mod response;
pub mod server;

pub use handler::{ConnectionHandler, Outcome, Stage};
pub use resolve::{PathResolver, Resolution};
pub use response::Response;
pub use server::{FileServer, ServeError};

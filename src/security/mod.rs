//! Admission control.
//!
//! # Data Flow
//! ```text
//! Parsed request (ratelimit mode only):
//!     → rate_limit.rs (sliding window keyed by client IP)
//!     → Admitted: continue to path resolution
//!     → Rejected: 429, nothing else touched
//! ```
//!
//! # Design Decisions
//! - Check-then-record is atomic under the limiter's own lock
//! - The limiter lock is never held together with the hit counter lock

pub mod rate_limit;

pub use rate_limit::{Admission, RateLimiter};

//! Hit counter subsystem.
//!
//! # Data Flow
//! ```text
//! Connection handler resolves a file
//!     → ResourceKey (canonical absolute path)
//!     → store.rs increment (racy or locked read-delay-write)
//!
//! Directory listing
//!     → store.rs get (same lock as writers when locked)
//! ```
//!
//! # Design Decisions
//! - Entries are created on first increment and never removed
//! - The racy path and the locked path run the same code; the locked path
//!   only wraps it in the critical section
//! - The read-modify-write window is an explicit, tunable delay

pub mod store;

pub use store::{Consistency, HitCounter, ResourceKey};

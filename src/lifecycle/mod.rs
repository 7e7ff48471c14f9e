//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → metrics → bind listener → build handler → serve
//!
//! Shutdown (shutdown.rs):
//!     Interrupt received → stop accepting → drain in-flight connections → exit
//!
//! Signals (signals.rs):
//!     SIGINT / SIGTERM → trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - In-flight connections are never cancelled; they get a grace period

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;

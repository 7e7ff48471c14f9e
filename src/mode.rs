//! Operating modes.
//!
//! A [`Mode`] is picked once at startup and never changes afterwards. It
//! decides three things:
//!
//! ```text
//!  mode         dispatch   hit counter     rate limiter   simulated work
//!  ----------   --------   -------------   ------------   --------------
//!  single       inline     -               -              yes
//!  multi        spawn      -               -              yes
//!  race         spawn      racy            -              -
//!  threadsafe   spawn      locked          -              -
//!  ratelimit    spawn      locked          per-IP         -
//! ```
//!
//! The connection handler reads these answers when it is built, so nothing
//! on the request path branches on the mode again.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hits::Consistency;

/// Concurrency and synchronization behaviour of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum Mode {
    /// One connection at a time, no counter.
    #[serde(rename = "single")]
    Single,
    /// Task per connection, no counter.
    #[serde(rename = "multi")]
    Multi,
    /// Task per connection, counter updated without mutual exclusion.
    #[serde(rename = "race")]
    Race,
    /// Task per connection, counter updated under its lock.
    #[default]
    #[serde(rename = "threadsafe", alias = "thread-safe")]
    ThreadSafe,
    /// `ThreadSafe` plus per-IP sliding-window admission.
    #[serde(rename = "ratelimit", alias = "ratelimited", alias = "rate-limited")]
    RateLimited,
}

/// How the listener hands an accepted connection to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Await the handler before accepting again.
    Inline,
    /// Spawn a task and keep accepting.
    Spawn,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Single,
        Mode::Multi,
        Mode::Race,
        Mode::ThreadSafe,
        Mode::RateLimited,
    ];

    pub fn dispatch(self) -> Dispatch {
        match self {
            Mode::Single => Dispatch::Inline,
            _ => Dispatch::Spawn,
        }
    }

    /// Counter discipline, or `None` when hits are not counted at all.
    pub fn consistency(self) -> Option<Consistency> {
        match self {
            Mode::Race => Some(Consistency::Racy),
            Mode::ThreadSafe | Mode::RateLimited => Some(Consistency::Locked),
            Mode::Single | Mode::Multi => None,
        }
    }

    pub fn is_rate_limited(self) -> bool {
        matches!(self, Mode::RateLimited)
    }

    /// Whether the per-request artificial delay applies.
    pub fn simulates_work(self) -> bool {
        matches!(self, Mode::Single | Mode::Multi)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Single => "single",
            Mode::Multi => "multi",
            Mode::Race => "race",
            Mode::ThreadSafe => "threadsafe",
            Mode::RateLimited => "ratelimit",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mode `{0}` (expected single, multi, race, threadsafe or ratelimit)")]
pub struct ParseModeError(String);

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Mode::Single),
            "multi" => Ok(Mode::Multi),
            "race" => Ok(Mode::Race),
            "threadsafe" | "thread-safe" => Ok(Mode::ThreadSafe),
            "ratelimit" | "ratelimited" | "rate-limited" => Ok(Mode::RateLimited),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

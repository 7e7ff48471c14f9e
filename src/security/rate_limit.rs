//! Per-IP sliding-window rate limiting.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Outcome of a [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected,
}

impl Admission {
    pub fn is_admitted(self) -> bool {
        self == Admission::Admitted
    }
}

/// Sliding-window limiter: at most `max_requests` admissions per address
/// within any `window`.
///
/// Each address keeps the instants of its recent admissions, oldest first.
/// Rejected requests are not recorded, so a client that keeps hammering
/// regains a slot as soon as its oldest admission ages out.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
    window: Duration,
    max_requests: usize,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
            max_requests,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.window(), config.max_requests)
    }

    /// Admit or reject one request from `addr`, recording it if admitted.
    pub fn check(&self, addr: IpAddr) -> Admission {
        self.check_at(addr, Instant::now())
    }

    /// [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(&self, addr: IpAddr, now: Instant) -> Admission {
        // The map holds plain data, so a panic elsewhere cannot leave it
        // half-updated.
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let stamps = windows.entry(addr).or_default();

        while let Some(&oldest) = stamps.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                stamps.pop_front();
            } else {
                break;
            }
        }

        if stamps.len() >= self.max_requests {
            return Admission::Rejected;
        }
        stamps.push_back(now);
        Admission::Admitted
    }

    /// Number of addresses with state. Grows with distinct clients.
    pub fn tracked_addresses(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }
}

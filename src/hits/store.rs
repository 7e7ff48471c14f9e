//! Shared per-file hit counts.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::observability::metrics;

/// Canonical absolute path identifying one counted resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey(PathBuf);

impl ResourceKey {
    /// Wrap an already canonicalized path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Whether increments are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    /// Read, wait, write with nobody holding the critical section.
    /// Concurrent increments on one key lose updates.
    Racy,
    /// The whole read-wait-write runs inside the critical section.
    Locked,
}

/// Mapping from [`ResourceKey`] to visit count.
///
/// Individual reads and writes of the map are always memory safe; what
/// [`Consistency`] controls is whether the read-modify-write *sequence* is
/// atomic. A single critical section guards every key.
#[derive(Debug)]
pub struct HitCounter {
    counts: DashMap<ResourceKey, u64>,
    critical: Mutex<()>,
    consistency: Consistency,
    /// Time between reading the old value and writing the new one.
    window: Duration,
}

impl HitCounter {
    pub fn new(consistency: Consistency, window: Duration) -> Self {
        Self {
            counts: DashMap::new(),
            critical: Mutex::new(()),
            consistency,
            window,
        }
    }

    pub fn consistency(&self) -> Consistency {
        self.consistency
    }

    /// Count one visit and return the value this caller wrote.
    ///
    /// Under [`Consistency::Racy`] the returned value may already have been
    /// overwritten by another caller.
    pub async fn increment(&self, key: &ResourceKey) -> u64 {
        let written = match self.consistency {
            Consistency::Racy => self.read_wait_write(key).await,
            Consistency::Locked => {
                let _guard = self.critical.lock().await;
                self.read_wait_write(key).await
            }
        };
        metrics::record_increment(self.consistency);
        written
    }

    /// Current count, 0 for keys never seen.
    pub async fn get(&self, key: &ResourceKey) -> u64 {
        match self.consistency {
            Consistency::Racy => self.peek(key),
            Consistency::Locked => {
                let _guard = self.critical.lock().await;
                self.peek(key)
            }
        }
    }

    /// Number of distinct keys observed so far.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    async fn read_wait_write(&self, key: &ResourceKey) -> u64 {
        let current = self.peek(key);
        widen_window(self.window).await;
        let next = current + 1;
        self.counts.insert(key.clone(), next);
        next
    }

    fn peek(&self, key: &ResourceKey) -> u64 {
        self.counts.get(key).map(|count| *count).unwrap_or(0)
    }
}

/// Suspend between read and write. A zero window still yields so other
/// tasks get a chance to run in between.
async fn widen_window(window: Duration) {
    if window.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(window).await;
    }
}

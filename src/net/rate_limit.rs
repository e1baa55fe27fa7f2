//! Per-connection sliding-window rate limiting.
//!
//! Each connection id gets a fixed message budget per window. Excess
//! traffic is rejected with a retry-after hint; the connection itself is
//! left intact. Entries are purged on disconnect and swept periodically so
//! abandoned ids do not accumulate.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

pub struct RateLimiter {
    budget: usize,
    window: Duration,
    entries: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(budget: usize, window: Duration) -> Self {
        Self {
            budget,
            window,
            entries: DashMap::new(),
        }
    }

    /// Admit or reject one message for `conn_id` at time `now`.
    /// Returns the retry-after hint in whole seconds on rejection.
    pub fn check_at(&self, conn_id: &str, now: Instant) -> Result<(), u64> {
        let mut entry = self.entries.entry(conn_id.to_string()).or_default();
        while let Some(&front) = entry.front() {
            if now.duration_since(front) >= self.window {
                entry.pop_front();
            } else {
                break;
            }
        }
        if entry.len() >= self.budget {
            let retry = entry
                .front()
                .map(|&oldest| self.window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(self.window);
            return Err(retry.as_secs().max(1));
        }
        entry.push_back(now);
        Ok(())
    }

    pub fn check(&self, conn_id: &str) -> Result<(), u64> {
        self.check_at(conn_id, Instant::now())
    }

    /// Drop a connection's window on disconnect.
    pub fn purge(&self, conn_id: &str) {
        self.entries.remove(conn_id);
    }

    /// Drop every entry whose newest message is older than the window.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries.retain(|_, window| {
            window
                .back()
                .is_some_and(|&newest| now.duration_since(newest) < self.window)
        });
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.entries.len()
    }
}

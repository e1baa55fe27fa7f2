//! Configuration utilities (port, tick timing, TTLs, rate-limit thresholds).
//!
//! Everything is resolved from env vars into plain numbers at startup;
//! there are no config files.

use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Socket address to bind the server to.
///
/// Reads the `PORT` env var (Fly.io) or defaults to 8080, binds to 0.0.0.0.
pub fn server_addr() -> SocketAddr {
    let port = env::var("PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(8080);
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

/// Interval of each session's update loop.
pub fn tick_interval() -> Duration {
    Duration::from_millis(env_u64("FROSTGRID_TICK_MS", 45))
}

/// Maximum age of a broadcast snapshot before it is re-sent even when
/// nothing changed.
pub fn snapshot_refresh() -> Duration {
    Duration::from_millis(env_u64("FROSTGRID_REFRESH_MS", 1000))
}

/// TTL applied to every metadata record mirrored into the shared store.
pub fn store_ttl() -> Duration {
    Duration::from_secs(env_u64("FROSTGRID_STORE_TTL_SECS", 300))
}

/// A session with no activity for this long is reaped.
pub fn idle_session_max_age() -> Duration {
    Duration::from_secs(env_u64("FROSTGRID_IDLE_SECS", 600))
}

/// Messages allowed per connection per rate-limit window.
pub fn rate_limit_budget() -> usize {
    env_u64("FROSTGRID_RATE_BUDGET", 60) as usize
}

/// Length of the rate-limit window.
pub fn rate_limit_window() -> Duration {
    Duration::from_secs(env_u64("FROSTGRID_RATE_WINDOW_SECS", 10))
}

//! Session lifecycle: one `Game` per two-player match.
//!
//! A session owns its GameCore behind a mutex, its two seats, and the
//! ~45 ms update loop that runs housekeeping and pushes snapshots. All
//! gameplay writes happen under the core mutex in arrival order; the loop
//! only ticks the clock and broadcasts.

pub mod service;
pub mod store;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config;
use crate::game::{Catalog, GameCore, GameInput, Side, Snapshot, StepOutcome};
use crate::net::connection::Connection;

pub use service::GameService;
pub use store::MemoryStore;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Lightweight matchmaking metadata mirrored into the shared store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMeta {
    pub id: String,
    pub host_id: Option<String>,
    pub client_id: Option<String>,
    pub player_count: usize,
    pub active: bool,
    pub created_at: u64,
    pub last_activity: u64,
}

/// Full store record: metadata plus the state snapshot needed to
/// reconstruct the session on another instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub meta: GameMeta,
    pub snapshot: Snapshot,
}

#[derive(Default)]
struct Seats {
    host: Option<Arc<dyn Connection>>,
    client: Option<Arc<dyn Connection>>,
    host_id: Option<String>,
    client_id: Option<String>,
}

pub struct Game {
    pub id: String,
    core: Mutex<GameCore>,
    seats: Mutex<Seats>,
    active: AtomicBool,
    created_at: u64,
    last_activity: AtomicU64,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Game {
    pub fn new(id: String, catalog: Arc<Catalog>) -> Self {
        let core = GameCore::new(catalog, &mut rand::thread_rng());
        Self::from_core(id, core)
    }

    pub fn from_core(id: String, core: GameCore) -> Self {
        let now = unix_now();
        Self {
            id,
            core: Mutex::new(core),
            seats: Mutex::new(Seats::default()),
            active: AtomicBool::new(true),
            created_at: now,
            last_activity: AtomicU64::new(now),
            loop_handle: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn touch(&self) {
        self.last_activity.store(unix_now(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> u64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    pub fn idle_for(&self) -> Duration {
        Duration::from_secs(unix_now().saturating_sub(self.last_activity()))
    }

    pub fn attach_host(&self, conn: Arc<dyn Connection>) {
        let mut seats = self.seats.lock();
        seats.host_id = Some(conn.id().to_string());
        seats.host = Some(conn);
    }

    /// Record the host's connection id without a live connection, for
    /// sessions recovered from the shared store.
    pub fn set_host_id(&self, host_id: Option<String>) {
        self.seats.lock().host_id = host_id;
    }

    /// Seat the second player. Fails when both seats are taken, which is
    /// how the cross-instance join race is detected.
    pub fn attach_client(&self, conn: Arc<dyn Connection>) -> bool {
        let mut seats = self.seats.lock();
        if seats.client.is_some() || seats.client_id.is_some() {
            return false;
        }
        seats.client_id = Some(conn.id().to_string());
        seats.client = Some(conn);
        true
    }

    pub fn player_count(&self) -> usize {
        let seats = self.seats.lock();
        usize::from(seats.host_id.is_some()) + usize::from(seats.client_id.is_some())
    }

    pub fn side_of(&self, conn_id: &str) -> Option<Side> {
        let seats = self.seats.lock();
        if seats.host_id.as_deref() == Some(conn_id) {
            return Some(Side::Host);
        }
        if seats.client_id.as_deref() == Some(conn_id) {
            return Some(Side::Client);
        }
        None
    }

    pub fn host_id(&self) -> Option<String> {
        self.seats.lock().host_id.clone()
    }

    pub fn conn(&self, side: Side) -> Option<Arc<dyn Connection>> {
        let seats = self.seats.lock();
        match side {
            Side::Host => seats.host.clone(),
            Side::Client => seats.client.clone(),
        }
    }

    pub fn send_to(&self, side: Side, msg: String) {
        if let Some(conn) = self.conn(side) {
            conn.send(msg);
        }
    }

    pub fn send_both(&self, msg: &str) {
        self.send_to(Side::Host, msg.to_string());
        self.send_to(Side::Client, msg.to_string());
    }

    pub fn with_core<T>(&self, f: impl FnOnce(&mut GameCore) -> T) -> T {
        f(&mut self.core.lock())
    }

    pub fn process(&self, side: Side, input: GameInput) -> StepOutcome {
        self.core.lock().process(side, input)
    }

    pub fn meta(&self) -> GameMeta {
        let seats = self.seats.lock();
        GameMeta {
            id: self.id.clone(),
            host_id: seats.host_id.clone(),
            client_id: seats.client_id.clone(),
            player_count: usize::from(seats.host_id.is_some())
                + usize::from(seats.client_id.is_some()),
            active: self.is_active(),
            created_at: self.created_at,
            last_activity: self.last_activity(),
        }
    }

    pub fn record(&self) -> GameRecord {
        GameRecord {
            meta: self.meta(),
            snapshot: self.core.lock().snapshot(),
        }
    }

    /// Spawn the session's single update loop: tick housekeeping, then
    /// broadcast a snapshot when state changed or the refresh interval
    /// lapsed. One loop per session, stopped only by `stop()`.
    pub fn start_update_loop(self: &Arc<Self>) {
        let game = Arc::clone(self);
        let tick = config::tick_interval();
        let refresh = config::snapshot_refresh();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            let mut last_push = tokio::time::Instant::now();
            loop {
                interval.tick().await;
                let force = last_push.elapsed() >= refresh;
                let snapshot = {
                    let mut core = game.core.lock();
                    core.tick();
                    core.snapshot_if_changed(force)
                };
                if let Some(snapshot) = snapshot {
                    last_push = tokio::time::Instant::now();
                    if let Ok(payload) = serde_json::to_value(&snapshot) {
                        let seats = game.seats.lock();
                        if let Some(host) = &seats.host {
                            host.emit("onserverupdate", payload.clone());
                        }
                        if let Some(client) = &seats.client {
                            client.emit("onserverupdate", payload);
                        }
                    }
                }
            }
        });
        *self.loop_handle.lock() = Some(handle);
    }

    /// Explicit teardown of the update loop; sessions are never preempted.
    pub fn stop(&self) {
        self.active.store(false, Ordering::Relaxed);
        if let Some(handle) = self.loop_handle.lock().take() {
            handle.abort();
            debug!(game_id = %self.id, "update loop stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::connection::testutil::RecordingConnection;

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::load().unwrap())
    }

    #[test]
    fn seats_fill_in_order() {
        let game = Game::new("g1".into(), catalog());
        let host = Arc::new(RecordingConnection::new("host"));
        let client = Arc::new(RecordingConnection::new("client"));
        game.attach_host(host);
        assert_eq!(game.player_count(), 1);
        assert!(game.attach_client(client));
        assert_eq!(game.player_count(), 2);
        assert_eq!(game.side_of("host"), Some(Side::Host));
        assert_eq!(game.side_of("client"), Some(Side::Client));
        assert_eq!(game.side_of("nobody"), None);
    }

    #[test]
    fn second_client_is_rejected() {
        let game = Game::new("g1".into(), catalog());
        game.attach_host(Arc::new(RecordingConnection::new("host")));
        assert!(game.attach_client(Arc::new(RecordingConnection::new("a"))));
        assert!(!game.attach_client(Arc::new(RecordingConnection::new("b"))));
    }

    #[test]
    fn record_carries_meta_and_snapshot() {
        let game = Game::new("g1".into(), catalog());
        game.attach_host(Arc::new(RecordingConnection::new("host")));
        let record = game.record();
        assert_eq!(record.meta.id, "g1");
        assert_eq!(record.meta.player_count, 1);
        assert!(record.meta.active);
        let json = serde_json::to_string(&record).unwrap();
        let back: GameRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.snapshot, record.snapshot);
    }
}

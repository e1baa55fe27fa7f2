//! Session registry and matchmaking.
//!
//! The in-process registry is the source of truth while this process owns
//! a session; the shared store only carries discovery hints and the
//! recovery snapshot. Store writes are fire-and-forget; store failures
//! degrade matchmaking to in-process-only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::config;
use crate::game::{core::rating_delta, Catalog, Phase, Side};
use crate::game::{GameCore, StepOutcome};
use crate::net::connection::Connection;
use crate::net::protocol::ServerMessage;
use crate::util::id::new_game_id;

use super::store::MetaStore;
use super::{Game, GameRecord};

/// Store set holding the ids of joinable sessions across all instances.
const OPEN_SET: &str = "frostgrid:open";

fn game_key(id: &str) -> String {
    format!("frostgrid:game:{id}")
}

pub struct GameService {
    games: DashMap<String, Arc<Game>>,
    by_conn: DashMap<String, String>,
    store: Arc<dyn MetaStore>,
    catalog: Arc<Catalog>,
    active_games: AtomicUsize,
}

impl GameService {
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn MetaStore>) -> Self {
        Self {
            games: DashMap::new(),
            by_conn: DashMap::new(),
            store,
            catalog,
            active_games: AtomicUsize::new(0),
        }
    }

    pub fn session_for(&self, conn_id: &str) -> Option<Arc<Game>> {
        let game_id = self.by_conn.get(conn_id)?.clone();
        self.games.get(&game_id).map(|g| Arc::clone(&g))
    }

    pub fn active_games(&self) -> usize {
        self.active_games.load(Ordering::Relaxed)
    }

    pub fn open_games(&self) -> usize {
        self.games
            .iter()
            .filter(|g| g.is_active() && g.player_count() < 2)
            .count()
    }

    /// Find or create a session for a connecting player: local open
    /// session first, then recovery of another instance's open session
    /// from the shared store, then a fresh session with this player as
    /// host.
    pub fn find_game(self: &Arc<Self>, conn: Arc<dyn Connection>) -> Arc<Game> {
        if let Some(existing) = self.session_for(conn.id()) {
            return existing;
        }

        let local_open = self
            .games
            .iter()
            .find(|g| g.is_active() && g.player_count() < 2)
            .map(|g| Arc::clone(&g));
        if let Some(game) = local_open {
            if self.join(&game, Arc::clone(&conn)) {
                return game;
            }
        }

        if let Some(game) = self.recover_from_store(Arc::clone(&conn)) {
            return game;
        }

        self.create_game(conn)
    }

    fn create_game(self: &Arc<Self>, conn: Arc<dyn Connection>) -> Arc<Game> {
        let id = new_game_id();
        let game = Arc::new(Game::new(id.clone(), Arc::clone(&self.catalog)));
        game.attach_host(Arc::clone(&conn));
        self.by_conn.insert(conn.id().to_string(), id.clone());
        self.games.insert(id.clone(), Arc::clone(&game));
        self.active_games.fetch_add(1, Ordering::Relaxed);
        game.start_update_loop();
        let time = game.with_core(|core| core.time());
        conn.send(ServerMessage::Host(time).encode());
        info!(game_id = %id, conn_id = %conn.id(), "game created");
        self.sync(&game);
        game
    }

    /// Seat `conn` as the client of `game`. Returns false when the seat
    /// was taken concurrently.
    fn join(self: &Arc<Self>, game: &Arc<Game>, conn: Arc<dyn Connection>) -> bool {
        if !game.attach_client(Arc::clone(&conn)) {
            return false;
        }
        self.by_conn
            .insert(conn.id().to_string(), game.id.clone());
        let time = game.with_core(|core| {
            if core.phase() == Phase::AwaitingPlayer {
                core.start();
            }
            core.time()
        });
        let host_id = game.host_id().unwrap_or_default();
        conn.send(ServerMessage::Joined(host_id).encode());
        game.send_both(&ServerMessage::Ready(time).encode());
        info!(game_id = %game.id, conn_id = %conn.id(), "player joined");
        self.sync(game);
        true
    }

    /// Reconstruct an open session created by another instance from its
    /// last synced snapshot, then attach the new player. The open-set hint
    /// is eventually consistent, so the record's player count is
    /// re-checked after reconstruction; losing the race falls back to
    /// creating a fresh session.
    fn recover_from_store(self: &Arc<Self>, conn: Arc<dyn Connection>) -> Option<Arc<Game>> {
        let candidates = match self.store.set_members(OPEN_SET) {
            Ok(ids) => ids,
            Err(err) => {
                warn!(%err, "store unavailable, matchmaking degrades to in-process");
                return None;
            }
        };
        for id in candidates {
            if self.games.contains_key(&id) {
                continue;
            }
            let raw = match self.store.get(&game_key(&id)) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(err) => {
                    warn!(%err, "store unavailable, matchmaking degrades to in-process");
                    return None;
                }
            };
            let record: GameRecord = match serde_json::from_str(&raw) {
                Ok(record) => record,
                Err(err) => {
                    warn!(game_id = %id, %err, "discarding unreadable store record");
                    continue;
                }
            };
            if !record.meta.active || record.meta.player_count >= 2 {
                continue;
            }
            let mut core =
                match GameCore::from_snapshot(Arc::clone(&self.catalog), &record.snapshot) {
                    Ok(core) => core,
                    Err(err) => {
                        warn!(game_id = %id, %err, "snapshot restore failed");
                        continue;
                    }
                };
            // A one-player record never started; joining will start it.
            core.set_awaiting();

            // Join race: another instance may have seated a client since
            // this record was fetched.
            let fresh_count = self
                .store
                .get(&game_key(&id))
                .ok()
                .flatten()
                .and_then(|raw| serde_json::from_str::<GameRecord>(&raw).ok())
                .map(|r| r.meta.player_count)
                .unwrap_or(record.meta.player_count);
            if fresh_count >= 2 {
                debug!(game_id = %id, "lost cross-instance join race");
                continue;
            }

            let game = Arc::new(Game::from_core(id.clone(), core));
            game.set_host_id(record.meta.host_id.clone());
            self.games.insert(id.clone(), Arc::clone(&game));
            self.active_games.fetch_add(1, Ordering::Relaxed);
            game.start_update_loop();
            if self.join(&game, conn) {
                info!(game_id = %id, "session recovered from store");
                return Some(game);
            }
            return None;
        }
        None
    }

    /// Mirror the session's metadata (and recovery snapshot) into the
    /// shared store, best effort and off the caller's path.
    pub fn sync(self: &Arc<Self>, game: &Arc<Game>) {
        let record = game.record();
        let store = Arc::clone(&self.store);
        let id = game.id.clone();
        tokio::spawn(async move {
            let joinable = record.meta.active && record.meta.player_count < 2;
            let payload = match serde_json::to_string(&record) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(game_id = %id, %err, "record serialization failed");
                    return;
                }
            };
            if let Err(err) = store.set_with_ttl(&game_key(&id), payload, config::store_ttl()) {
                warn!(game_id = %id, %err, "store sync failed");
                return;
            }
            let result = if joinable {
                store.add_to_set(OPEN_SET, &id)
            } else {
                store.remove_from_set(OPEN_SET, &id)
            };
            if let Err(err) = result {
                warn!(game_id = %id, %err, "open-set sync failed");
            }
        });
    }

    /// Touch a session's activity clock off the message path.
    pub fn touch_async(self: &Arc<Self>, game: &Arc<Game>) {
        let game = Arc::clone(game);
        tokio::spawn(async move {
            game.touch();
        });
    }

    /// Stop and unregister a session, notifying both seats.
    pub fn end_game(self: &Arc<Self>, game: &Arc<Game>) {
        if !game.is_active() {
            return;
        }
        game.stop();
        game.send_both(&ServerMessage::Ended.encode());
        let meta = game.meta();
        for conn_id in [meta.host_id, meta.client_id].into_iter().flatten() {
            self.by_conn.remove(&conn_id);
        }
        self.games.remove(&game.id);
        self.active_games.fetch_sub(1, Ordering::Relaxed);
        let store = Arc::clone(&self.store);
        let id = game.id.clone();
        tokio::spawn(async move {
            if let Err(err) = store.remove_from_set(OPEN_SET, &id) {
                warn!(game_id = %id, %err, "open-set removal failed");
            }
        });
        info!(game_id = %game.id, "game ended");
    }

    /// A win surfaced from the state machine: push rating deltas, then
    /// tear the session down.
    pub fn handle_win(self: &Arc<Self>, game: &Arc<Game>, winner: Side) {
        let (winner_mmr, loser_mmr) = game.with_core(|core| {
            (
                core.player(winner).mmr,
                core.player(winner.other()).mmr,
            )
        });
        let delta = rating_delta(winner_mmr, loser_mmr).round() as i64;
        game.send_to(winner, ServerMessage::RatingUpdate(delta).encode());
        game.send_to(winner.other(), ServerMessage::RatingUpdate(-delta).encode());
        self.end_game(game);
    }

    /// A player's socket closed: end their session, then requeue the
    /// surviving player's still-live connection through find_game so
    /// they host or join another session without reconnecting.
    pub fn handle_disconnect(self: &Arc<Self>, conn_id: &str) {
        if let Some(game) = self.session_for(conn_id) {
            debug!(game_id = %game.id, %conn_id, "player disconnected");
            let survivor = game
                .side_of(conn_id)
                .and_then(|side| game.conn(side.other()));
            self.end_game(&game);
            if let Some(conn) = survivor {
                self.find_game(conn);
            }
        }
        self.by_conn.remove(conn_id);
    }

    /// Reap sessions whose last activity is older than the configured
    /// idle cutoff, and reclaim expired store records.
    pub fn sweep_idle(self: &Arc<Self>) {
        self.store.sweep();
        let cutoff = config::idle_session_max_age();
        let stale: Vec<Arc<Game>> = self
            .games
            .iter()
            .filter(|g| g.idle_for() > cutoff)
            .map(|g| Arc::clone(&g))
            .collect();
        for game in stale {
            info!(game_id = %game.id, "reaping idle session");
            self.end_game(&game);
        }
    }

    /// Apply an outcome's side effects: store sync or win handling.
    /// The activity touch happens at dispatch, before the outcome exists.
    pub fn after_step(self: &Arc<Self>, game: &Arc<Game>, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Ignored => {}
            StepOutcome::Applied => self.sync(game),
            StepOutcome::Won(side) => self.handle_win(game, side),
        }
    }
}

//! Dispatch of validated messages into the owning session.
//!
//! Order matters: rate limit first, then shape validation, then game
//! logic. Rejections carry a generic code only; the reason lands in the
//! logs, never on the wire.

use std::sync::Arc;

use tracing::debug;

use crate::config;
use crate::game::core::position_to_cell;
use crate::game::GameInput;
use crate::session::GameService;

use super::connection::Connection;
use super::protocol::{ClientMessage, ErrorCode, InputOp, ServerMessage};
use super::rate_limit::RateLimiter;
use super::validator::validate;

pub struct MessageHandler {
    service: Arc<GameService>,
    limiter: RateLimiter,
}

impl MessageHandler {
    pub fn new(service: Arc<GameService>) -> Self {
        Self {
            service,
            limiter: RateLimiter::new(config::rate_limit_budget(), config::rate_limit_window()),
        }
    }

    pub fn service(&self) -> &Arc<GameService> {
        &self.service
    }

    pub fn handle(&self, conn: &Arc<dyn Connection>, raw: &str) {
        if let Err(retry_secs) = self.limiter.check(conn.id()) {
            conn.send(ServerMessage::Error(ErrorCode::RateLimited { retry_secs }).encode());
            return;
        }
        let msg = match validate(raw) {
            Ok(msg) => msg,
            Err(err) => {
                debug!(conn_id = %conn.id(), %err, "rejected message");
                conn.send(ServerMessage::Error(ErrorCode::InvalidMessage).encode());
                return;
            }
        };
        match msg {
            ClientMessage::Ping(echo) => {
                conn.send(ServerMessage::Pong(echo).encode());
            }
            ClientMessage::LatencyReport(ms) => {
                debug!(conn_id = %conn.id(), ms, "latency report");
            }
            ClientMessage::MmrReport(rating) => {
                if let Some(game) = self.service.session_for(conn.id()) {
                    if let Some(side) = game.side_of(conn.id()) {
                        game.with_core(|core| core.set_mmr(side, rating as f64));
                    }
                }
            }
            ClientMessage::WinReport => {
                // Server-authoritative: the claim only re-triggers a board
                // check, it is never trusted.
                if let Some(game) = self.service.session_for(conn.id()) {
                    self.service.touch_async(&game);
                    if let Some(winner) = game.with_core(|core| core.claim_win()) {
                        self.service.handle_win(&game, winner);
                    }
                }
            }
            ClientMessage::Input { op, card, pos, .. } => {
                let Some(game) = self.service.session_for(conn.id()) else {
                    return;
                };
                let Some(side) = game.side_of(conn.id()) else {
                    return;
                };
                let input = match op {
                    InputOp::PlayCard => GameInput::PlayCard { hand_index: card },
                    InputOp::TargetSquare => {
                        let (row, col) = position_to_cell(pos);
                        GameInput::TargetSquare { row, col }
                    }
                    InputOp::EndTurn => GameInput::EndTurn,
                    InputOp::Draw => GameInput::Draw,
                };
                self.service.touch_async(&game);
                let outcome = game.process(side, input);
                self.service.after_step(&game, outcome);
            }
        }
    }

    /// Socket closed: forget the rate-limit window, tear down the session.
    pub fn disconnect(&self, conn_id: &str) {
        self.limiter.purge(conn_id);
        self.service.handle_disconnect(conn_id);
    }

    /// Periodic maintenance entry point for the limiter.
    pub fn sweep_limiter(&self) {
        self.limiter.sweep();
    }
}

//! Wire protocol types.
//!
//! Messages are short ASCII strings, fields separated by `.`, sub-fields
//! within the input field separated by `-`. Client messages are decoded by
//! the validator; server messages are encoded here with the `s.` prefix.

use crate::game::BOARD_CELLS;

/// Hard cap on raw message length.
pub const MAX_MESSAGE_LEN: usize = 500;

/// Highest addressable hand slot.
pub const MAX_CARD_INDEX: u64 = 5;

/// Highest board position (`N*N - 1`).
pub const MAX_POSITION: u64 = BOARD_CELLS as u64 - 1;

/// Sequence numbers wrap before this.
pub const MAX_SEQ: u64 = 1_000_000;

/// Bound on the `p`/`r`/`m` numeric payloads.
pub const MAX_NUMERIC_FIELD: u64 = 1_000_000_000;

/// Operation selector inside an input message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOp {
    PlayCard,
    TargetSquare,
    EndTurn,
    Draw,
}

impl InputOp {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(InputOp::PlayCard),
            1 => Some(InputOp::TargetSquare),
            2 => Some(InputOp::EndTurn),
            3 => Some(InputOp::Draw),
            _ => None,
        }
    }
}

/// A validated client message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// `i.<op>-<card>-<pos>.<ts>.<seq>`
    Input {
        op: InputOp,
        card: usize,
        pos: usize,
        ts: f64,
        seq: u64,
    },
    /// `p.<n>`
    Ping(u64),
    /// `r.<ms>` simulated latency report.
    LatencyReport(u64),
    /// `m.<rating>` stored skill rating report.
    MmrReport(u64),
    /// `w` win report; the server re-checks the board.
    WinReport,
}

/// Server-to-client messages, same `.`-delimited scheme under `s.`.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// You are hosting; carries server time.
    Host(u64),
    /// You joined; carries the host's connection id.
    Joined(String),
    /// Game ready, reset positions; carries server time.
    Ready(u64),
    /// Game ended.
    Ended,
    /// Ping echo.
    Pong(u64),
    /// Rating delta after a finished game.
    RatingUpdate(i64),
    /// Rejected message.
    Error(ErrorCode),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCode {
    InvalidMessage,
    RateLimited { retry_secs: u64 },
}

impl ServerMessage {
    pub fn encode(&self) -> String {
        match self {
            ServerMessage::Host(time) => format!("s.h.{time}"),
            ServerMessage::Joined(host_id) => format!("s.j.{host_id}"),
            ServerMessage::Ready(time) => format!("s.r.{time}"),
            ServerMessage::Ended => "s.e".to_string(),
            ServerMessage::Pong(echo) => format!("s.p.{echo}"),
            ServerMessage::RatingUpdate(delta) => format!("s.m.{delta}"),
            ServerMessage::Error(ErrorCode::InvalidMessage) => "s.error.invalid_message".into(),
            ServerMessage::Error(ErrorCode::RateLimited { retry_secs }) => {
                format!("s.error.rate_limited.{retry_secs}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_messages_encode_compactly() {
        assert_eq!(ServerMessage::Host(12).encode(), "s.h.12");
        assert_eq!(ServerMessage::Joined("abc123".into()).encode(), "s.j.abc123");
        assert_eq!(ServerMessage::Ready(7).encode(), "s.r.7");
        assert_eq!(ServerMessage::Ended.encode(), "s.e");
        assert_eq!(ServerMessage::Pong(42).encode(), "s.p.42");
        assert_eq!(ServerMessage::RatingUpdate(-16).encode(), "s.m.-16");
        assert_eq!(
            ServerMessage::Error(ErrorCode::InvalidMessage).encode(),
            "s.error.invalid_message"
        );
        assert_eq!(
            ServerMessage::Error(ErrorCode::RateLimited { retry_secs: 3 }).encode(),
            "s.error.rate_limited.3"
        );
    }

    #[test]
    fn input_op_codes_are_dense() {
        assert_eq!(InputOp::from_code(0), Some(InputOp::PlayCard));
        assert_eq!(InputOp::from_code(3), Some(InputOp::Draw));
        assert_eq!(InputOp::from_code(4), None);
    }
}

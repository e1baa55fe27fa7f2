//! Input validation for the wire protocol.
//!
//! Everything here runs before any game logic. Clients are told a generic
//! error code only; the variants below exist for logs and tests, not for
//! the wire.

use thiserror::Error;

use super::protocol::{
    ClientMessage, InputOp, MAX_CARD_INDEX, MAX_MESSAGE_LEN, MAX_NUMERIC_FIELD, MAX_POSITION,
    MAX_SEQ,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty message")]
    Empty,
    #[error("message too long")]
    TooLong,
    #[error("control characters in message")]
    ControlChars,
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("wrong field count")]
    BadShape,
    #[error("field out of range")]
    OutOfRange,
    #[error("non-numeric field")]
    NotNumeric,
}

fn bounded(field: &str, max: u64) -> Result<u64, ProtocolError> {
    let n: u64 = field.parse().map_err(|_| ProtocolError::NotNumeric)?;
    if n > max {
        return Err(ProtocolError::OutOfRange);
    }
    Ok(n)
}

/// Timestamps tolerate a dash as decimal separator: `123-45` is 123.45.
fn timestamp(field: &str) -> Result<f64, ProtocolError> {
    let normalized = field.replacen('-', ".", 1);
    let ts: f64 = normalized.parse().map_err(|_| ProtocolError::NotNumeric)?;
    if !ts.is_finite() || ts < 0.0 {
        return Err(ProtocolError::OutOfRange);
    }
    Ok(ts)
}

/// Validate a raw frame and decode it into a typed message.
pub fn validate(raw: &str) -> Result<ClientMessage, ProtocolError> {
    if raw.is_empty() {
        return Err(ProtocolError::Empty);
    }
    if raw.len() > MAX_MESSAGE_LEN {
        return Err(ProtocolError::TooLong);
    }
    if raw.chars().any(|c| c.is_control()) {
        return Err(ProtocolError::ControlChars);
    }

    let fields: Vec<&str> = raw.split('.').collect();
    match fields[0] {
        "i" => {
            if fields.len() != 4 {
                return Err(ProtocolError::BadShape);
            }
            let sub: Vec<&str> = fields[1].split('-').collect();
            if sub.len() != 3 {
                return Err(ProtocolError::BadShape);
            }
            let op = InputOp::from_code(bounded(sub[0], 3)?).ok_or(ProtocolError::OutOfRange)?;
            let card = bounded(sub[1], MAX_CARD_INDEX)? as usize;
            let pos = bounded(sub[2], MAX_POSITION)? as usize;
            let ts = timestamp(fields[2])?;
            let seq = bounded(fields[3], MAX_SEQ)?;
            Ok(ClientMessage::Input {
                op,
                card,
                pos,
                ts,
                seq,
            })
        }
        "p" => {
            if fields.len() != 2 {
                return Err(ProtocolError::BadShape);
            }
            Ok(ClientMessage::Ping(bounded(fields[1], MAX_NUMERIC_FIELD)?))
        }
        "r" => {
            if fields.len() != 2 {
                return Err(ProtocolError::BadShape);
            }
            Ok(ClientMessage::LatencyReport(bounded(
                fields[1],
                MAX_NUMERIC_FIELD,
            )?))
        }
        "m" => {
            if fields.len() != 2 {
                return Err(ProtocolError::BadShape);
            }
            Ok(ClientMessage::MmrReport(bounded(
                fields[1],
                MAX_NUMERIC_FIELD,
            )?))
        }
        "w" => {
            if fields.len() != 1 {
                return Err(ProtocolError::BadShape);
            }
            Ok(ClientMessage::WinReport)
        }
        other => Err(ProtocolError::UnknownType(other.to_string())),
    }
}

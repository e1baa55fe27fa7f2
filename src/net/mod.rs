//! Wire protocol, validation, rate limiting and WebSocket plumbing.

pub mod connection;
pub mod handler;
pub mod protocol;
pub mod rate_limit;
pub mod validator;
pub mod ws;

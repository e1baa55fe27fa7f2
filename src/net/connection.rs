//! Connection abstraction between sessions and the transport.
//!
//! Sessions talk to players through this trait only: a unique identifier,
//! a fire-and-forget text send for protocol strings, and an event emit for
//! the JSON snapshot channel. The WebSocket implementation pushes into an
//! unbounded channel that a forwarding task drains into the socket, so a
//! slow client never blocks game logic.

use serde_json::Value;
use tokio::sync::mpsc;

pub trait Connection: Send + Sync {
    fn id(&self) -> &str;
    /// Queue a protocol string (`s.`-prefixed) for delivery.
    fn send(&self, msg: String);
    /// Queue a named JSON payload (the snapshot channel).
    fn emit(&self, event: &str, payload: Value);
}

/// A live WebSocket seat.
pub struct WsConnection {
    id: String,
    tx: mpsc::UnboundedSender<String>,
}

impl WsConnection {
    pub fn new(id: String, tx: mpsc::UnboundedSender<String>) -> Self {
        Self { id, tx }
    }
}

impl Connection for WsConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, msg: String) {
        // A closed socket just drops the message; disconnect teardown is
        // driven by the read loop.
        let _ = self.tx.send(msg);
    }

    fn emit(&self, event: &str, payload: Value) {
        let framed = serde_json::json!({ "event": event, "data": payload });
        let _ = self.tx.send(framed.to_string());
    }
}

#[cfg(test)]
pub mod testutil {
    use std::sync::Mutex;

    use super::*;

    /// Records everything a session sends, for assertions.
    pub struct RecordingConnection {
        id: String,
        pub sent: Mutex<Vec<String>>,
        pub emitted: Mutex<Vec<(String, Value)>>,
    }

    impl RecordingConnection {
        pub fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                sent: Mutex::new(Vec::new()),
                emitted: Mutex::new(Vec::new()),
            }
        }

        pub fn sent_messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Connection for RecordingConnection {
        fn id(&self) -> &str {
            &self.id
        }

        fn send(&self, msg: String) {
            self.sent.lock().unwrap().push(msg);
        }

        fn emit(&self, event: &str, payload: Value) {
            self.emitted.lock().unwrap().push((event.to_string(), payload));
        }
    }
}

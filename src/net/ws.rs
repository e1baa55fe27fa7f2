//! WebSocket connection lifecycle.
//!
//! Each socket gets a fresh connection id and is matched into a session
//! immediately on upgrade. Outbound traffic rides an unbounded channel
//! drained by a forwarding task; inbound text frames go through the
//! message handler synchronously in arrival order.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::util::id::new_conn_id;
use crate::AppState;

use super::connection::{Connection, WsConnection};

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn_id = new_conn_id();
    let conn: Arc<dyn Connection> = Arc::new(WsConnection::new(conn_id.clone(), tx));

    // Forward server messages to the socket.
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let game = state.handler.service().find_game(Arc::clone(&conn));
    debug!(%conn_id, game_id = %game.id, "socket attached to session");

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => state.handler.handle(&conn, &text),
            Message::Close(_) => break,
            // The protocol is text-only; everything else is dropped.
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    state.handler.disconnect(&conn_id);
    debug!(%conn_id, "socket closed");
}

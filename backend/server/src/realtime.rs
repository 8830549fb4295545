//! # Realtime
//!
//! Websocket change feed at `/realtime?table=feedback` or `/realtime?table=comments&post_id=N`.
//!
//! Each text frame is one JSON [`ChangeEvent`](board::ChangeEvent). The feed carries no
//! record bodies; clients reload the affected list. Frames sent by the client are ignored
//! apart from close.
use std::sync::Arc;

use axum::{
    extract::{
        self, Query,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use board::{ChangeFilter, Subscription};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::{error::AppError, state::State};

pub async fn realtime_handler(
    ws: WebSocketUpgrade,
    extract::State(state): extract::State<Arc<State>>,
    Query(filter): Query<ChangeFilter>,
) -> Result<Response, AppError> {
    let subscription = state.database.subscribe(filter).await?;
    info!(table = %filter.table, post_id = ?filter.post_id, "Realtime subscriber connected");

    Ok(ws.on_upgrade(move |socket| stream_changes(socket, subscription)))
}

async fn stream_changes(socket: WebSocket, mut subscription: Subscription) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = subscription.next() => {
                let Some(event) = event else { break };

                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to serialize change event: {e}");
                        continue;
                    }
                };

                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Realtime socket error: {e}");
                        break;
                    }
                }
            }
        }
    }

    debug!(table = %subscription.filter().table, "Realtime subscriber disconnected");
}

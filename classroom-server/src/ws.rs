//! The single websocket upgrade endpoint: authenticates the connection,
//! registers its outbound channel, and pumps frames between the socket and
//! the dispatcher (component L) for the life of the connection.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use classroom_core::dispatcher::{Credential, Dispatcher};
use classroom_core::AppContext;
use classroom_protocol::Frame;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

/// `GET /ws`: upgrades the HTTP connection, reading the credential from
/// `Authorization: Bearer <token>` or `X-API-KEY: <monitorKey>` (spec §6
/// "Authentication") before handing off to [`run_connection`].
pub async fn upgrade(State(ctx): State<Arc<AppContext>>, headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    let credential = credential_from_headers(&headers);
    ws.on_upgrade(move |socket| run_connection(ctx, socket, credential))
}

fn credential_from_headers(headers: &HeaderMap) -> Option<Credential> {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(Credential::MonitorKey(key.to_string()));
    }
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))?;
    Some(Credential::Bearer(bearer.to_string()))
}

/// Owns one connection's lifetime: authenticate, register outbound delivery,
/// pump inbound frames through the dispatcher until the socket closes, then
/// tear the session down.
async fn run_connection(ctx: Arc<AppContext>, socket: WebSocket, credential: Option<Credential>) {
    let sid = uuid::Uuid::new_v4().to_string();
    let dispatcher = Dispatcher::new(ctx.clone());

    let Some(credential) = credential else {
        tracing::info!(sid, "connection refused: no credential presented");
        return;
    };
    if let Err(err) = dispatcher.connect(&sid, credential).await {
        tracing::info!(sid, error = %err, "connection refused");
        return;
    }

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
    ctx.outbound.register(sid.clone(), tx);

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else {
                tracing::warn!(event = %frame.event, "dropping frame that failed to serialize");
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                tracing::info!(sid, error = %err, "websocket read error, closing connection");
                break;
            }
        };
        match message {
            Message::Text(text) => match serde_json::from_str::<Frame>(&text) {
                Ok(frame) => dispatcher.handle_frame(&sid, frame).await,
                Err(err) => tracing::warn!(sid, error = %err, "dropping malformed frame"),
            },
            Message::Close(_) => break,
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    writer.abort();
    dispatcher.disconnect(&sid).await;
}

//! WebSocket endpoint.
//!
//! `GET /ws` upgrades to a WebSocket and streams every frame the hub
//! broadcasts. Client messages are read only to notice a close.

use crate::error::TelemetryError;
use crate::hub::TelemetryHub;
use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Router serving `/ws` from `hub`.
pub fn router(hub: Arc<TelemetryHub>) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(hub)
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<TelemetryHub>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<TelemetryHub>) {
    let (mut sender, mut receiver) = socket.split();
    let (id, mut frames) = hub.subscribe();

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if sender
                .send(Message::Text(frame.to_string().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                debug!("telemetry client {} sent close", id);
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    hub.unsubscribe(id);
}

/// Bind the telemetry listener.
pub async fn bind(addr: &str) -> Result<TcpListener, TelemetryError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| TelemetryError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Serve `/ws` on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    hub: Arc<TelemetryHub>,
    shutdown: F,
) -> Result<(), TelemetryError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local: Option<SocketAddr> = listener.local_addr().ok();
    if let Some(addr) = local {
        info!("telemetry listening on ws://{}/ws", addr);
    }
    axum::serve(listener, router(hub))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("telemetry server stopped");
    Ok(())
}

//! Observer WebSocket endpoint.
//!
//! Each connection subscribes to `entry.updated` on the engine's flow bus
//! and receives one text frame per external change:
//!
//! ```json
//! {"message":"update_tiddler","title":"HelloThere"}
//! ```
//!
//! Frames from the client are ignored; a Close frame ends the connection.
//! Nothing is queued for observers that are not connected.

use std::fmt::Display;
use std::future::Future;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use futures::{Sink, SinkExt, StreamExt};
use tokio::net::TcpListener;
use tracing::Instrument;

use folio_kernel::{EntryFlow, SharedEntryFlowBus, Subscription, UpdateMessage};

/// Subject pattern every connection subscribes to.
const UPDATE_SUBJECT: &str = "entry.updated";

/// Shared state for the endpoint.
#[derive(Clone)]
pub struct ObserverState {
    pub bus: SharedEntryFlowBus,
}

/// Router serving the endpoint at `/`.
pub fn router(bus: SharedEntryFlowBus) -> Router {
    Router::new()
        .route("/", get(websocket_handler))
        .with_state(ObserverState { bus })
}

/// Serve the endpoint on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    bus: SharedEntryFlowBus,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "observer endpoint listening");
    }
    axum::serve(listener, router(bus))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ObserverState>) -> Response {
    ws.on_upgrade(move |socket| {
        handle_socket(socket, state).instrument(tracing::info_span!("observer.connection"))
    })
}

async fn handle_socket(socket: WebSocket, state: ObserverState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let updates = state.bus.subscribe(UPDATE_SUBJECT);
    tracing::info!("observer connected");

    let mut send_task = tokio::spawn(pump_updates(updates, ws_sender).in_current_span());

    let mut recv_task = tokio::spawn(
        async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "observer socket error");
                        break;
                    }
                }
            }
        }
        .in_current_span(),
    );

    // Whichever side finishes first ends the connection.
    tokio::select! {
        sent = &mut send_task => {
            recv_task.abort();
            if let Ok(sent) = sent {
                tracing::debug!(sent, "update stream ended");
            }
        }
        _ = &mut recv_task => send_task.abort(),
    }
    tracing::info!("observer disconnected");
}

/// Forward `entry.updated` events from `updates` to `sink` as JSON text
/// frames until the bus closes or the sink fails.
///
/// Returns how many frames were sent.
pub async fn pump_updates<S>(mut updates: Subscription<EntryFlow>, mut sink: S) -> usize
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut sent = 0;
    while let Some(msg) = updates.recv().await {
        let EntryFlow::Updated { title, .. } = msg.payload else {
            continue;
        };
        let frame = Message::Text(UpdateMessage::new(title).to_json().into());
        if let Err(e) = sink.send(frame).await {
            tracing::debug!(error = %e, "observer went away");
            break;
        }
        sent += 1;
    }
    sent
}

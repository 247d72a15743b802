// WebSocket endpoint for leaderboard viewers.
//
// Each connection gets the current leaderboard on connect, every newly
// published one after that, and a reply to each request it sends.

use std::sync::Arc;

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::app::RequestHandler;
use crate::protocol::{ClientMessage, LeaderboardSnapshot, ServerMessage};

/// Accept connections forever, serving each on its own task.
pub async fn run(
    listener: TcpListener,
    handler: Arc<dyn RequestHandler>,
    updates: watch::Receiver<Option<LeaderboardSnapshot>>,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("WebSocket server listening on {local_addr}");

    loop {
        let (stream, addr) = listener.accept().await?;
        let addr_str = addr.to_string();
        info!("Accepted TCP connection from {addr_str}");

        let handler = handler.clone();
        let updates = updates.clone();
        tokio::spawn(async move {
            serve_connection(stream, addr_str, handler, updates).await;
        });
    }
}

/// Bind the viewer endpoint on `127.0.0.1:{port}`.
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind(format!("127.0.0.1:{port}")).await
}

async fn serve_connection(
    stream: TcpStream,
    addr: String,
    handler: Arc<dyn RequestHandler>,
    updates: watch::Receiver<Option<LeaderboardSnapshot>>,
) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {addr}: {e}");
            return;
        }
    };
    let (mut write, read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(64);

    let writer_addr = addr.clone();
    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize message for {writer_addr}: {e}");
                    continue;
                }
            };
            if let Err(e) = write.send(Message::Text(json.into())).await {
                debug!("Write to {writer_addr} failed: {e}");
                break;
            }
        }
        let _ = write.close().await;
    });

    tokio::select! {
        _ = process_message_stream(read, &out_tx, handler.as_ref(), &addr) => {}
        _ = push_updates(updates, &out_tx) => {}
    }

    drop(out_tx);
    let _ = writer.await;
    info!("Client {addr} disconnected");
}

/// Forward the current leaderboard, then each new one, until the channel
/// closes on either side.
pub async fn push_updates(
    mut updates: watch::Receiver<Option<LeaderboardSnapshot>>,
    out: &mpsc::Sender<ServerMessage>,
) {
    loop {
        let current = updates.borrow_and_update().clone();
        if let Some(snapshot) = current {
            if out.send(ServerMessage::Leaderboard(snapshot)).await.is_err() {
                return;
            }
        }
        if updates.changed().await.is_err() {
            return;
        }
    }
}

/// Answer each text frame with the handler's reply. Unparseable requests
/// get an `ERROR` reply. Returns `Err(())` once `out` is closed.
///
/// Generic over the stream so it can be driven by in-memory messages.
pub async fn process_message_stream<St>(
    mut stream: St,
    out: &mpsc::Sender<ServerMessage>,
    handler: &dyn RequestHandler,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(request) => handler.handle(request).await,
                    Err(e) => {
                        warn!("Bad request from {addr}: {e}");
                        ServerMessage::Error {
                            message: format!("invalid request: {e}"),
                        }
                    }
                };
                if out.send(reply).await.is_err() {
                    return Err(());
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            _ => {
                // Binary, Ping, Pong and raw frames carry no requests.
            }
        }
    }
    Ok(())
}

//! Outbound visualization links
//!
//! Dials a downstream visualization endpoint once and registers the link
//! with the broadcaster. There is no reconnect: a failed or timed-out dial,
//! or a dropped link, leaves the session closed until the process restarts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastError, Broadcaster, SessionId, SessionSink};

type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Write half of an outbound websocket.
pub struct OutboundSession {
    writer: Mutex<WsWriter>,
}

#[async_trait]
impl SessionSink for OutboundSession {
    async fn send_text(&self, payload: &str) -> Result<(), BroadcastError> {
        let mut writer = self.writer.lock().await;
        writer
            .send(Message::text(payload.to_owned()))
            .await
            .map_err(|e| BroadcastError::Send(e.to_string()))
    }
}

/// Dial `url` once and open a session for it.
///
/// The TCP connect and websocket handshake together must finish within
/// `connect_timeout`. A reader task drains inbound frames and closes the
/// session when the peer hangs up.
pub async fn connect(
    broadcaster: Arc<Broadcaster>,
    url: &str,
    connect_timeout: Duration,
) -> Result<SessionId, BroadcastError> {
    let id = broadcaster.begin_connect(url);

    let (stream, _response) = match tokio::time::timeout(connect_timeout, connect_async(url)).await {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => {
            broadcaster.close(id);
            warn!(url = %url, error = %e, "Visualization endpoint unreachable, not retrying");
            return Err(BroadcastError::Connect(e.to_string()));
        }
        Err(_) => {
            broadcaster.close(id);
            warn!(url = %url, timeout = ?connect_timeout, "Visualization handshake timed out, not retrying");
            return Err(BroadcastError::Connect(format!(
                "handshake timed out after {:?}",
                connect_timeout
            )));
        }
    };

    let (writer, mut reader) = stream.split();
    broadcaster.mark_open(
        id,
        Arc::new(OutboundSession {
            writer: Mutex::new(writer),
        }),
    )?;
    info!(session = id, url = %url, "Visualization endpoint connected");

    let url = url.to_owned();
    tokio::spawn(async move {
        while let Some(frame) = reader.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    debug!(session = id, text = %text.as_str(), "Message from visualization endpoint");
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(session = id, url = %url, error = %e, "Visualization link error");
                    break;
                }
            }
        }
        broadcaster.close(id);
    });

    Ok(id)
}

/// Dial every endpoint concurrently; failures are logged and skipped.
pub async fn connect_all(
    broadcaster: Arc<Broadcaster>,
    urls: &[String],
    connect_timeout: Duration,
) -> Vec<SessionId> {
    let dials = urls
        .iter()
        .map(|url| connect(Arc::clone(&broadcaster), url, connect_timeout));
    join_all(dials).await.into_iter().filter_map(Result::ok).collect()
}

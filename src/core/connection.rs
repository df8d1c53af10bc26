//! The session's single persistent transport channel.
//!
//! A [`Channel`] owns one spawned pump task. Outbound frames are queued
//! without waiting (fire-and-forget); inbound frames are decoded and handed
//! to the session as [`SessionEvent::Inbound`] in transport order. Dropping
//! the channel cancels the pump, which closes the websocket.

use crate::{
    core::{error::ChatError, protocol},
    events::app_event::{AppEvent, SessionEvent},
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::{fmt, future::Future};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage, tungstenite};
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opens channels for a session. Opening never blocks: the handshake runs
/// inside the channel's pump and its outcome arrives as an event.
pub trait Connector: Send + Sync {
    fn open(&self, identity: &str, id: ChannelId, events: mpsc::Sender<AppEvent>) -> Channel;
}

/// Connects to the chat websocket endpoint.
pub struct WsConnector {
    endpoint: Url,
}

impl WsConnector {
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint }
    }
}

impl Connector for WsConnector {
    fn open(&self, identity: &str, id: ChannelId, events: mpsc::Sender<AppEvent>) -> Channel {
        tracing::info!("Opening chat channel {} to {} for {}", id, self.endpoint, identity);
        let endpoint = self.endpoint.clone();
        Channel::spawn(id, events, async move {
            let (ws_stream, _) = connect_async(endpoint.as_str()).await?;
            tracing::info!("WebSocket handshake has been successfully completed");
            Ok::<_, ChatError>(ws_stream.split())
        })
    }
}

pub struct Channel {
    id: ChannelId,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl Channel {
    /// Spawns the pump for a transport produced by `connect`.
    pub fn spawn<C, W, R>(id: ChannelId, events: mpsc::Sender<AppEvent>, connect: C) -> Self
    where
        C: Future<Output = Result<(W, R), ChatError>> + Send + 'static,
        W: Sink<WsMessage, Error = tungstenite::Error> + Unpin + Send + 'static,
        R: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin + Send + 'static,
    {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let pump_cancel = cancel.clone();
        tokio::spawn(async move {
            let transport = tokio::select! {
                _ = pump_cancel.cancelled() => return,
                transport = connect => transport,
            };
            let reason = match transport {
                Ok((write, read)) => {
                    if events
                        .send(AppEvent::Session(SessionEvent::ChannelOpened(id)))
                        .await
                        .is_err()
                    {
                        return;
                    }
                    pump(id, write, read, outbound_rx, &events, &pump_cancel).await
                }
                Err(e) => {
                    tracing::error!("Channel {} failed to connect: {}", id, e);
                    Some(e.to_string())
                }
            };
            if !pump_cancel.is_cancelled() {
                let _ = events
                    .send(AppEvent::Session(SessionEvent::ChannelClosed {
                        channel: id,
                        reason,
                    }))
                    .await;
            }
        });
        Self {
            id,
            outbound,
            cancel,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Queues one encoded frame. There is no acknowledgment.
    pub fn send(&self, frame: String) {
        if self.outbound.send(frame).is_err() {
            tracing::warn!("Channel {} is closed, dropping outbound frame", self.id);
        }
    }

    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        tracing::debug!("Closing channel {}", self.id);
        self.cancel.cancel();
    }
}

/// Moves frames in both directions until cancelled or the transport ends.
/// Returns the reason the transport ended, if it was not a clean close.
async fn pump<W, R>(
    id: ChannelId,
    mut write: W,
    mut read: R,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: &mpsc::Sender<AppEvent>,
    cancel: &CancellationToken,
) -> Option<String>
where
    W: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
    R: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = write.send(WsMessage::Close(None)).await;
                return None;
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    let _ = write.send(WsMessage::Close(None)).await;
                    return None;
                };
                if let Err(e) = write.send(WsMessage::Text(frame.into())).await {
                    tracing::error!("Error writing to channel {}: {}", id, e);
                    return Some(e.to_string());
                }
            }
            msg = read.next() => {
                let frame = match msg {
                    Some(Ok(WsMessage::Text(text))) => text.as_bytes().to_vec(),
                    Some(Ok(WsMessage::Binary(bytes))) => bytes.to_vec(),
                    Some(Ok(WsMessage::Close(c))) => {
                        tracing::info!("Websocket closed: {:?}", c);
                        return None;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::error!("Error reading message from websocket: {}", e);
                        return Some(e.to_string());
                    }
                    None => return None,
                };
                match protocol::decode(&frame) {
                    Ok(message) => {
                        let event = AppEvent::Session(SessionEvent::Inbound { channel: id, message });
                        if events.send(event).await.is_err() {
                            tracing::error!("Failed to deliver frame to session: channel is closed.");
                            return None;
                        }
                    }
                    Err(e) => tracing::warn!("Dropping malformed frame on channel {}: {}", id, e),
                }
            }
        }
    }
}

//! WebSocket transport
//!
//! Connects to the game server with `tokio-tungstenite` and exchanges JSON
//! text frames. A reader task decodes [`ServerMessage`]s into the event
//! channel; a writer task drains an mpsc queue into the socket.
//!
//! [`Transport::disconnect`] closes the queue and lets the writer flush what
//! is already queued, up to [`FLUSH_TIMEOUT`], before the socket is dropped.

use crate::networking::transport::{
    Transport, TransportError, TransportEvent, TransportResult, EVENT_CAPACITY,
};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use shared::protocol::{ClientMessage, ServerMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

const OUTGOING_QUEUE: usize = 100;

/// Longest wait for queued frames on disconnect
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

pub struct WsTransport {
    url: Url,
    connected: Arc<AtomicBool>,
    events: broadcast::Sender<TransportEvent>,
    outgoing: Mutex<Option<mpsc::Sender<String>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    /// # Errors
    ///
    /// [`TransportError::InvalidUrl`] unless `url` is a `ws://` or `wss://` URL.
    pub fn new(url: &str) -> TransportResult<Self> {
        let parsed = Url::parse(url).map_err(|_| TransportError::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(TransportError::InvalidUrl(url.to_string()));
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            url: parsed,
            connected: Arc::new(AtomicBool::new(false)),
            events,
            outgoing: Mutex::new(None),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn abort_tasks(&self) {
        for task in [self.reader.lock().take(), self.writer.lock().take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }

    /// Wait for the writer to drain its queue and close the socket
    async fn flush_writer(&self) {
        let Some(mut writer) = self.writer.lock().take() else {
            return;
        };
        if tokio::time::timeout(FLUSH_TIMEOUT, &mut writer).await.is_err() {
            warn!("[NET] Outgoing queue not flushed within {:?}", FLUSH_TIMEOUT);
            writer.abort();
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> TransportResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        info!("[NET] Connecting to {}...", self.url);
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut write, mut read) = stream.split();

        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<String>(OUTGOING_QUEUE);
        *self.outgoing.lock() = Some(outgoing_tx);
        self.connected.store(true, Ordering::SeqCst);
        info!("[NET] WebSocket connected");
        let _ = self.events.send(TransportEvent::Connected);

        let connected = Arc::clone(&self.connected);
        let events = self.events.clone();
        let reader = tokio::spawn(async move {
            let mut reason = None;
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => {
                            debug!("[NET] Received: {:?}", message);
                            let _ = events.send(TransportEvent::Message(message));
                        }
                        Err(e) => {
                            warn!("[NET] Failed to parse server message: {} - {}", e, text);
                            let _ = events.send(TransportEvent::Error(e.to_string()));
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        info!("[NET] Server closed connection");
                        reason = frame.map(|f| f.reason.to_string());
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("[NET] WebSocket read error: {}", e);
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        reason = Some(e.to_string());
                        break;
                    }
                }
            }
            if connected.swap(false, Ordering::SeqCst) {
                let reason = Some(reason.unwrap_or_else(|| "connection closed".to_string()));
                let _ = events.send(TransportEvent::Disconnected { reason });
            }
        });

        let writer = tokio::spawn(async move {
            while let Some(json) = outgoing_rx.recv().await {
                if let Err(e) = write.send(Message::Text(json)).await {
                    error!("[NET] Failed to send message: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
            debug!("[NET] Writer loop ended");
        });

        *self.reader.lock() = Some(reader);
        *self.writer.lock() = Some(writer);
        Ok(())
    }

    async fn disconnect(&self) {
        let was_connected = self.connected.swap(false, Ordering::SeqCst);
        // Dropping the last sender ends the writer loop once the queue is empty
        self.outgoing.lock().take();
        self.flush_writer().await;
        self.abort_tasks();
        if was_connected {
            info!("[NET] Disconnected from {}", self.url);
            let _ = self.events.send(TransportEvent::Disconnected { reason: None });
        }
    }

    async fn send(&self, message: ClientMessage) -> TransportResult<()> {
        let json =
            serde_json::to_string(&message).map_err(|e| TransportError::Encode(e.to_string()))?;
        let sender = self
            .outgoing
            .lock()
            .clone()
            .filter(|_| self.is_connected())
            .ok_or(TransportError::NotConnected)?;

        debug!("[NET] Sending: {}", json);
        sender
            .send(json)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

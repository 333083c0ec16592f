//! Transport seam for multiplayer games
//!
//! A [`Transport`] is a duplex channel to the game server: typed
//! [`ClientMessage`]s go out, [`TransportEvent`]s come back through a
//! broadcast channel. Controllers never see frames or sockets.
//!
//! [`ChannelTransport`] is the in-memory implementation. Its [`ServerEnd`]
//! plays the server in tests and local tooling.

use async_trait::async_trait;
use shared::protocol::{ClientMessage, ServerMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

/// Capacity of every transport's event channel
pub const EVENT_CAPACITY: usize = 64;

/// Something that happened on the connection
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    /// `reason` is `None` for a local disconnect
    Disconnected { reason: Option<String> },
    Message(ServerMessage),
    /// Frame that could not be decoded, or a socket error
    Error(String),
}

/// Errors raised by transports
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Could not encode message: {0}")]
    Encode(String),

    #[error("Invalid server URL '{0}'")]
    InvalidUrl(String),
}

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> TransportResult<()>;

    /// Close the connection; a no-op when already closed
    async fn disconnect(&self);

    async fn send(&self, message: ClientMessage) -> TransportResult<()>;

    /// Receive every event from now on; dropping the receiver unsubscribes
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;

    fn is_connected(&self) -> bool;
}

/// In-memory loopback transport
#[derive(Debug)]
pub struct ChannelTransport {
    connected: Arc<AtomicBool>,
    events: broadcast::Sender<TransportEvent>,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
}

/// Server side of a [`ChannelTransport`]
#[derive(Debug)]
pub struct ServerEnd {
    connected: Arc<AtomicBool>,
    events: broadcast::Sender<TransportEvent>,
    incoming: mpsc::UnboundedReceiver<ClientMessage>,
}

impl ChannelTransport {
    pub fn pair() -> (ChannelTransport, ServerEnd) {
        let connected = Arc::new(AtomicBool::new(false));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (outgoing, incoming) = mpsc::unbounded_channel();

        let client = ChannelTransport {
            connected: Arc::clone(&connected),
            events: events.clone(),
            outgoing,
        };
        let server = ServerEnd {
            connected,
            events,
            incoming,
        };
        (client, server)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn connect(&self) -> TransportResult<()> {
        if !self.connected.swap(true, Ordering::SeqCst) {
            info!("[NET] Loopback transport connected");
            let _ = self.events.send(TransportEvent::Connected);
        }
        Ok(())
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("[NET] Loopback transport disconnected");
            let _ = self.events.send(TransportEvent::Disconnected { reason: None });
        }
    }

    async fn send(&self, message: ClientMessage) -> TransportResult<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        debug!("[NET] Sending {:?}", message);
        self.outgoing
            .send(message)
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl ServerEnd {
    /// Deliver `message` to the client's subscribers
    pub fn push(&self, message: ServerMessage) {
        let _ = self.events.send(TransportEvent::Message(message));
    }

    /// Deliver an undecodable frame
    pub fn push_error(&self, message: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Error(message.into()));
    }

    /// Drop the connection from the server side
    pub fn drop_connection(&self, reason: impl Into<String>) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(TransportEvent::Disconnected {
                reason: Some(reason.into()),
            });
        }
    }

    /// Next message sent by the client
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        self.incoming.recv().await
    }

    /// Every message sent by the client and not yet read
    pub fn drain(&mut self) -> Vec<ClientMessage> {
        let mut sent = Vec::new();
        while let Ok(message) = self.incoming.try_recv() {
            sent.push(message);
        }
        sent
    }
}

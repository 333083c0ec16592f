//! Multiplayer networking
//!
//! The client side of the game server protocol. Wire types live in
//! [`shared::protocol`]; this module only moves them.
//!
//! - [`transport`] - the [`Transport`] seam and the in-memory [`ChannelTransport`]
//! - [`ws`] - [`WsTransport`], JSON over WebSocket

pub mod transport;
pub mod ws;

pub use transport::{
    ChannelTransport, ServerEnd, Transport, TransportError, TransportEvent, TransportResult,
};
pub use ws::WsTransport;

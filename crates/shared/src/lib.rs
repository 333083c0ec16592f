//! Wire types shared between the XFChess game server and its clients.

pub mod protocol;

//! Error types for the client session layer.

use thiserror::Error;

use wing_protocol::{IndexOutOfRange, ProtocolError};

/// Errors surfaced by discovery, session management, and blocking reads.
#[derive(Error, Debug)]
pub enum Error {
    /// TCP connect to the console failed or timed out.
    #[error("failed to connect to console at {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The byte stream violated the protocol. Fatal to the session.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The operation requires a live session.
    #[error("not connected to a console")]
    NotConnected,

    /// The console closed the connection or the session task exited.
    #[error("connection closed by console")]
    ConnectionClosed,

    /// Reading meters without an active subscription.
    #[error("no meter subscription active")]
    NotSubscribed,

    /// A scan finished without a single console answering.
    #[error("no console found during discovery")]
    NoConsoleFound,

    /// A node name that neither the registry nor numeric parsing resolves.
    #[error("unknown node name: {0}")]
    NameNotFound(String),

    /// An indexed accessor went past the end of its collection.
    #[error(transparent)]
    IndexOutOfRange(#[from] IndexOutOfRange),

    /// A socket operation failed outside of connect.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

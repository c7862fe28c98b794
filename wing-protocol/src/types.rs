//! Message type definitions for the WING control protocol.

use serde::{Deserialize, Serialize};

use crate::meter::MeterId;
use crate::node::{NodeDef, NodeId, NodeValue};

/// TCP port of the console control channel.
pub const CONTROL_PORT: u16 = 2222;

/// UDP port the discovery probe is sent to.
pub const DISCOVERY_PORT: u16 = 2222;

/// Payload of the discovery probe datagram.
pub const DISCOVERY_PROBE: &[u8] = b"WING?";

/// First token of a discovery reply: `WING,<ip>,<name>,<model>,<serial>,<firmware>`.
pub const DISCOVERY_REPLY_PREFIX: &str = "WING";

/// Upper bound on a node definition body, applied before buffering it.
pub const MAX_DEF_SIZE: u32 = 64 * 1024;

/// A command the client puts on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Set a string-typed node.
    SetString { id: NodeId, value: String },
    /// Set a float-typed node.
    SetFloat { id: NodeId, value: f32 },
    /// Set an integer-typed node.
    SetInt { id: NodeId, value: i32 },
    /// Ask the console to emit the definition of a node (0 = tree root).
    RequestNodeDefinition { id: NodeId },
    /// Ask the console to emit the current data of a node (0 = tree root).
    RequestNodeData { id: NodeId },
    /// Replace the meter subscription; levels arrive on the given UDP port.
    SubscribeMeters {
        request_id: u16,
        port: u16,
        meters: Vec<MeterId>,
    },
    /// Control-channel keep-alive.
    KeepAlive,
    /// Meter-channel keep-alive for one outstanding subscription.
    MeterKeepAlive { request_id: u16, port: u16 },
}

/// One decoded console response.
///
/// Exclusively owned by the caller that pulled it from the session; every
/// response is constructed fresh per decode and never cached by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// Logical end of a requested dump. A protocol delimiter, not a
    /// connection-close signal.
    RequestEnd,
    /// One node definition.
    NodeDef(NodeDef),
    /// The current value of one node.
    NodeData { id: NodeId, value: NodeValue },
}

impl Response {
    pub fn is_end(&self) -> bool {
        matches!(self, Response::RequestEnd)
    }
}

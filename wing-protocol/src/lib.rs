//! Wire protocol for Behringer WING family digital mixing consoles.
//!
//! The console exposes its whole state as a tree of typed nodes and speaks
//! an escaped token stream over TCP port 2222, with meter levels delivered
//! separately over UDP. This crate holds the protocol layer only: message
//! types, the node model, meter addressing, and the codec. The session and
//! discovery layer lives in the `wing-client` crate.

pub mod codec;
pub mod error;
pub mod meter;
pub mod node;
pub mod types;

pub use codec::{
    encode_command, encode_response, Event, StreamDecoder, CONTROL_CHANNEL, HANDSHAKE,
    METER_CHANNEL,
};
pub use error::{IndexOutOfRange, ProtocolError};
pub use meter::{decode_meter_datagram, encode_meter_datagram, MeterBank, MeterBatch, MeterId};
pub use node::{Constraints, EnumItem, NodeDef, NodeId, NodeType, NodeUnit, NodeValue, ValueKind};
pub use types::{
    Command, Response, CONTROL_PORT, DISCOVERY_PORT, DISCOVERY_PROBE, DISCOVERY_REPLY_PREFIX,
    MAX_DEF_SIZE,
};

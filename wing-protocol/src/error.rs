//! Error types for the WING wire protocol.

use thiserror::Error;

/// Protocol-level errors that can occur while encoding or decoding the
/// console byte stream.
///
/// Any decode-side variant is fatal to the stream it occurred on: the
/// decoder makes no attempt to resynchronize, and the session must be
/// reconnected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A node definition body announced a length beyond the allowed maximum.
    #[error("definition body too large: {0} bytes (max: {1})")]
    DefinitionTooLarge(u32, u32),

    /// A node definition body ended in the middle of a field.
    #[error("truncated node definition: needed {expected} more bytes, got {actual}")]
    TruncatedDefinition { expected: usize, actual: usize },

    /// A meter identifier carried a bank byte outside the sixteen known banks.
    #[error("unknown meter bank: 0x{0:02X}")]
    UnknownMeterBank(u8),

    /// A meter datagram was too short or carried an odd number of level bytes.
    #[error("malformed meter datagram: {0} bytes")]
    MalformedMeterDatagram(usize),

    /// A meter batch did not line up with the subscribed identifier set.
    #[error("meter batch mismatch: {got} levels for {expected} subscribed meters")]
    MeterBatchMismatch { expected: usize, got: usize },

    /// Failed to decode a payload.
    #[error("failed to decode message: {0}")]
    DecodeError(String),

    /// Failed to encode a payload.
    #[error("failed to encode message: {0}")]
    EncodeError(String),
}

/// An indexed accessor was called with an index past the end of the
/// collection it addresses.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("index {index} out of range (count: {count})")]
pub struct IndexOutOfRange {
    pub index: usize,
    pub count: usize,
}

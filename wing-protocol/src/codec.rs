//! Codec for the WING console byte stream.
//!
//! The console speaks a token stream rather than a length-prefixed frame
//! format. `0xDF` is an escape lead-in:
//!
//! ```text
//! 0xDF 0xDE            literal 0xDF data byte
//! 0xDF 0xD0..=0xDD     switch active logical channel (transparent)
//! 0xDF 0xDF            node-definition frame lead-in
//! ```
//!
//! Every other byte is literal. Whether a literal byte is a command token
//! or payload is positional: payload lengths are always known from the
//! token that preceded them.
//!
//! [`StreamDecoder`] consumes bytes incrementally: frames may be split
//! across reads and one read may carry several frames. It buffers leftover
//! bytes between calls and yields at most one event per call. Encoders for
//! both directions live here too, so a simulated console can be driven by
//! the same codec the client uses.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::meter::{MeterBank, MeterId};
use crate::node::{Constraints, EnumItem, NodeDef, NodeId, NodeType, NodeUnit, NodeValue};
use crate::types::{Command, Response, MAX_DEF_SIZE};

/// Escape lead-in byte.
pub const ESC: u8 = 0xDF;
/// After `ESC`, encodes a literal `0xDF`.
const ESC_LITERAL: u8 = 0xDE;
/// After `ESC`, `0xD0..=0xDD` selects logical channel `byte - 0xD0`.
const CHANNEL_BASE: u8 = 0xD0;

/// Logical channel carrying definition/data traffic.
pub const CONTROL_CHANNEL: u8 = 1;
/// Logical channel carrying meter subscriptions.
pub const METER_CHANNEL: u8 = 3;

/// Handshake written right after connecting; doubles as the keep-alive.
pub const HANDSHAKE: [u8; 2] = [ESC, CHANNEL_BASE + CONTROL_CHANNEL];

const TOK_EMPTY_STRING: u8 = 0xD0;
const TOK_STRING8: u8 = 0xD1;
const TOK_INDEX16: u8 = 0xD2;
const TOK_INT16: u8 = 0xD3;
const TOK_INT32: u8 = 0xD4;
const TOK_FLOAT: u8 = 0xD5;
const TOK_FLOAT_ALT: u8 = 0xD6;
const TOK_NODE_SELECT: u8 = 0xD7;
const TOK_CLICK: u8 = 0xD8;
const TOK_STEP: u8 = 0xD9;
const TOK_TREE_ROOT: u8 = 0xDA;
const TOK_TREE_UP: u8 = 0xDB;
const TOK_REQUEST_DATA: u8 = 0xDC;
const TOK_REQUEST_DEF: u8 = 0xDD;
const TOK_REQUEST_END: u8 = 0xDE;
const TOK_NODE_DEF: u8 = 0xDF;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn put_escaped(buf: &mut BytesMut, b: u8) {
    buf.put_u8(b);
    if b == ESC {
        buf.put_u8(ESC_LITERAL);
    }
}

fn put_escaped_slice(buf: &mut BytesMut, bytes: &[u8]) {
    for &b in bytes {
        put_escaped(buf, b);
    }
}

/// `0xD7` plus the four id bytes, escaped.
fn put_node_select(buf: &mut BytesMut, id: NodeId) {
    buf.put_u8(TOK_NODE_SELECT);
    put_escaped_slice(buf, &id.to_be_bytes());
}

fn put_string_value(buf: &mut BytesMut, s: &str) -> Result<(), ProtocolError> {
    if s.is_empty() {
        buf.put_u8(TOK_EMPTY_STRING);
    } else if s.len() <= 64 {
        buf.put_u8(0x7F + s.len() as u8);
    } else if s.len() <= 256 {
        buf.put_u8(TOK_STRING8);
        put_escaped(buf, (s.len() - 1) as u8);
    } else {
        return Err(ProtocolError::EncodeError(format!(
            "string value of {} bytes exceeds the 256 byte wire limit",
            s.len()
        )));
    }
    put_escaped_slice(buf, s.as_bytes());
    Ok(())
}

fn put_float_value(buf: &mut BytesMut, v: f32) {
    buf.put_u8(TOK_FLOAT);
    put_escaped_slice(buf, &v.to_be_bytes());
}

fn put_int_value(buf: &mut BytesMut, v: i32) {
    if (0..=0x3F).contains(&v) {
        buf.put_u8(v as u8);
    } else if (i16::MIN as i32..=i16::MAX as i32).contains(&v) {
        buf.put_u8(TOK_INT16);
        put_escaped_slice(buf, &(v as i16).to_be_bytes());
    } else {
        buf.put_u8(TOK_INT32);
        put_escaped_slice(buf, &v.to_be_bytes());
    }
}

fn put_value(buf: &mut BytesMut, value: &NodeValue) -> Result<(), ProtocolError> {
    match value {
        NodeValue::String(s) => put_string_value(buf, s)?,
        NodeValue::Float(v) => put_float_value(buf, *v),
        NodeValue::Int(v) => put_int_value(buf, *v),
    }
    Ok(())
}

/// Encode a client command into wire bytes.
pub fn encode_command(cmd: &Command) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::new();

    match cmd {
        Command::SetString { id, value } => {
            put_node_select(&mut buf, *id);
            put_string_value(&mut buf, value)?;
        }
        Command::SetFloat { id, value } => {
            put_node_select(&mut buf, *id);
            put_float_value(&mut buf, *value);
        }
        Command::SetInt { id, value } => {
            put_node_select(&mut buf, *id);
            put_int_value(&mut buf, *value);
        }
        Command::RequestNodeDefinition { id } => {
            if *id == 0 {
                buf.put_u8(TOK_TREE_ROOT);
            } else {
                put_node_select(&mut buf, *id);
            }
            buf.put_u8(TOK_REQUEST_DEF);
        }
        Command::RequestNodeData { id } => {
            if *id == 0 {
                buf.put_u8(TOK_TREE_ROOT);
            } else {
                put_node_select(&mut buf, *id);
            }
            buf.put_u8(TOK_REQUEST_DATA);
        }
        Command::SubscribeMeters { request_id, port, meters } => {
            // Channel-3 frames are positional; the console reads the port
            // and request-id bytes unescaped.
            buf.put_u8(ESC);
            buf.put_u8(CHANNEL_BASE + METER_CHANNEL);
            buf.put_u8(TOK_INT16);
            buf.put_slice(&port.to_be_bytes());
            buf.put_u8(TOK_INT32);
            buf.put_slice(&request_id.to_be_bytes());
            buf.put_slice(&port.to_be_bytes());
            buf.put_u8(TOK_REQUEST_DATA);
            for meter in meters {
                buf.put_u8(meter.bank() as u8);
                if !meter.bank().is_indexless() {
                    buf.put_u8(meter.index());
                }
            }
            buf.put_u8(TOK_REQUEST_END);
            buf.put_slice(&HANDSHAKE);
        }
        Command::KeepAlive => {
            buf.put_slice(&HANDSHAKE);
        }
        Command::MeterKeepAlive { request_id, port } => {
            buf.put_u8(ESC);
            buf.put_u8(CHANNEL_BASE + METER_CHANNEL);
            buf.put_u8(TOK_INT32);
            buf.put_slice(&request_id.to_be_bytes());
            buf.put_slice(&port.to_be_bytes());
            buf.put_slice(&HANDSHAKE);
        }
    }

    Ok(buf.freeze())
}

/// Encode a console response into wire bytes. The console side of the
/// codec; used by simulators and tests.
pub fn encode_response(resp: &Response) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::new();

    match resp {
        Response::RequestEnd => {
            buf.put_u8(TOK_REQUEST_END);
        }
        Response::NodeData { id, value } => {
            put_node_select(&mut buf, *id);
            put_value(&mut buf, value)?;
        }
        Response::NodeDef(def) => {
            let body = encode_node_def(def)?;
            if body.len() as u32 > MAX_DEF_SIZE {
                return Err(ProtocolError::EncodeError(format!(
                    "definition body of {} bytes exceeds the maximum",
                    body.len()
                )));
            }
            buf.put_u8(ESC);
            buf.put_u8(TOK_NODE_DEF);
            if body.len() < 0x1_0000 {
                put_escaped_slice(&mut buf, &(body.len() as u16).to_be_bytes());
            } else {
                put_escaped_slice(&mut buf, &[0, 0]);
                put_escaped_slice(&mut buf, &(body.len() as u32).to_be_bytes());
            }
            put_escaped_slice(&mut buf, &body);
        }
    }

    Ok(buf.freeze())
}

// ---------------------------------------------------------------------------
// Node definition body
// ---------------------------------------------------------------------------

fn need(buf: &[u8], n: usize) -> Result<(), ProtocolError> {
    if buf.remaining() < n {
        Err(ProtocolError::TruncatedDefinition { expected: n, actual: buf.remaining() })
    } else {
        Ok(())
    }
}

fn take_u8(buf: &mut &[u8]) -> Result<u8, ProtocolError> {
    need(buf, 1)?;
    Ok(buf.get_u8())
}

fn take_u16(buf: &mut &[u8]) -> Result<u16, ProtocolError> {
    need(buf, 2)?;
    Ok(buf.get_u16())
}

fn take_i32(buf: &mut &[u8]) -> Result<i32, ProtocolError> {
    need(buf, 4)?;
    Ok(buf.get_i32())
}

fn take_f32(buf: &mut &[u8]) -> Result<f32, ProtocolError> {
    need(buf, 4)?;
    Ok(f32::from_bits(buf.get_u32()))
}

fn take_str8(buf: &mut &[u8]) -> Result<String, ProtocolError> {
    let len = take_u8(buf)? as usize;
    need(buf, len)?;
    let bytes = buf[..len].to_vec();
    buf.advance(len);
    String::from_utf8(bytes).map_err(|e| ProtocolError::DecodeError(e.to_string()))
}

fn put_str8(buf: &mut Vec<u8>, s: &str) -> Result<(), ProtocolError> {
    if s.len() > u8::MAX as usize {
        return Err(ProtocolError::EncodeError(format!(
            "definition string of {} bytes exceeds the 255 byte limit",
            s.len()
        )));
    }
    buf.push(s.len() as u8);
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Parse a node definition body.
///
/// An unrecognized type nibble decodes as the generic node type and any
/// constraint bytes it might carry are left untouched, so consoles newer
/// than this library do not kill the session. A body that ends mid-field is
/// a hard error.
pub fn decode_node_def(body: &[u8]) -> Result<NodeDef, ProtocolError> {
    let mut buf = body;
    let parent_id = take_i32(&mut buf)?;
    let id = take_i32(&mut buf)?;
    let index = take_u16(&mut buf)?;
    let flags = take_u8(&mut buf)?;
    let unit = NodeUnit::from_wire(take_u8(&mut buf)?);
    let name = take_str8(&mut buf)?;
    let long_name = take_str8(&mut buf)?;

    let node_type = NodeType::from_wire(flags & 0x0F);
    let read_only = flags & 0x80 != 0;

    let constraints = match node_type {
        NodeType::LinearFloat | NodeType::LogarithmicFloat | NodeType::FaderLevel => {
            Constraints::Float {
                min: take_f32(&mut buf)?,
                max: take_f32(&mut buf)?,
                steps: take_i32(&mut buf)?,
            }
        }
        NodeType::Integer => Constraints::Integer {
            min: take_i32(&mut buf)?,
            max: take_i32(&mut buf)?,
        },
        NodeType::String => Constraints::String { max_len: take_u16(&mut buf)? },
        NodeType::StringEnum => {
            let count = take_u16(&mut buf)? as usize;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                let item = take_str8(&mut buf)?;
                let long_item = take_str8(&mut buf)?;
                items.push(EnumItem { item, long_item });
            }
            Constraints::StringEnum(items)
        }
        NodeType::FloatEnum => {
            let count = take_u16(&mut buf)? as usize;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                let item = take_f32(&mut buf)?;
                let long_item = take_str8(&mut buf)?;
                items.push(EnumItem { item, long_item });
            }
            Constraints::FloatEnum(items)
        }
        NodeType::Node => Constraints::None,
    };

    Ok(NodeDef {
        id,
        parent_id,
        index,
        node_type,
        unit,
        name,
        long_name,
        read_only,
        constraints,
    })
}

/// Encode a node definition body. Fails if the constraints do not match
/// the declared type.
pub fn encode_node_def(def: &NodeDef) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&def.parent_id.to_be_bytes());
    buf.extend_from_slice(&def.id.to_be_bytes());
    buf.extend_from_slice(&def.index.to_be_bytes());
    let mut flags = def.node_type as u8;
    if def.read_only {
        flags |= 0x80;
    }
    buf.push(flags);
    buf.push(def.unit as u8);
    put_str8(&mut buf, &def.name)?;
    put_str8(&mut buf, &def.long_name)?;

    match (&def.node_type, &def.constraints) {
        (
            NodeType::LinearFloat | NodeType::LogarithmicFloat | NodeType::FaderLevel,
            Constraints::Float { min, max, steps },
        ) => {
            buf.extend_from_slice(&min.to_be_bytes());
            buf.extend_from_slice(&max.to_be_bytes());
            buf.extend_from_slice(&steps.to_be_bytes());
        }
        (NodeType::Integer, Constraints::Integer { min, max }) => {
            buf.extend_from_slice(&min.to_be_bytes());
            buf.extend_from_slice(&max.to_be_bytes());
        }
        (NodeType::String, Constraints::String { max_len }) => {
            buf.extend_from_slice(&max_len.to_be_bytes());
        }
        (NodeType::StringEnum, Constraints::StringEnum(items)) => {
            buf.extend_from_slice(&(items.len() as u16).to_be_bytes());
            for item in items {
                put_str8(&mut buf, &item.item)?;
                put_str8(&mut buf, &item.long_item)?;
            }
        }
        (NodeType::FloatEnum, Constraints::FloatEnum(items)) => {
            buf.extend_from_slice(&(items.len() as u16).to_be_bytes());
            for item in items {
                buf.extend_from_slice(&item.item.to_be_bytes());
                put_str8(&mut buf, &item.long_item)?;
            }
        }
        (NodeType::Node, Constraints::None) => {}
        (ty, _) => {
            return Err(ProtocolError::EncodeError(format!(
                "constraints do not match node type {ty:?}"
            )));
        }
    }

    Ok(buf)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Everything the token stream can carry.
///
/// Responses flow console → client; the request-side events exist so a
/// simulated console can parse client traffic with the same machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A decoded console response.
    Response(Response),
    /// A node-index selector token.
    NodeIndex(u16),
    /// An encoder-step token.
    Step(i8),
    /// A click token.
    Click,
    /// Selection moved to the tree root.
    GotoRoot,
    /// Selection moved up one level.
    GoUp,
    /// The peer asked for the data of the currently selected node.
    DataRequest,
    /// The peer asked for the definition of the currently selected node.
    DefinitionRequest,
    /// A complete meter subscription frame.
    MeterSubscribe {
        request_id: u16,
        port: u16,
        meters: Vec<MeterId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    NodeSelect,
    Int16,
    Int32,
    Float,
    Str,
    StrLen,
    SkipIndex,
    SkipStep,
    DefLen,
    DefLenExt,
    DefBody,
    MeterPort,
    MeterReq,
}

impl Payload {
    /// Channel-3 payloads bypass escape processing.
    fn is_raw(self) -> bool {
        matches!(self, Payload::MeterPort | Payload::MeterReq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Expecting a command token.
    Command,
    /// Accumulating a fixed-size payload.
    Payload { kind: Payload, want: usize },
    /// Accumulating the meter identifier list of a subscription frame.
    MeterIds { pending_bank: Option<MeterBank> },
}

/// Incremental decoder for the console token stream.
///
/// Feed raw transport bytes with [`feed`](Self::feed), then drain events
/// with [`next_event`](Self::next_event) or decoded responses with
/// [`next_response`](Self::next_response) until they return `Ok(None)`,
/// meaning more bytes are needed. Splitting the input at any byte boundary
/// yields the same events. A returned error is fatal: the decoder does not
/// resynchronize, since guessing a frame boundary on an audio-control link
/// risks misinterpreting commands.
#[derive(Debug)]
pub struct StreamDecoder {
    buf: BytesMut,
    esc: bool,
    channel: i8,
    current_node: NodeId,
    state: State,
    partial: Vec<u8>,
    meter_port: u16,
    meter_request: u16,
    meter_ids: Vec<MeterId>,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(2048),
            esc: false,
            channel: -1,
            current_node: 0,
            state: State::Command,
            partial: Vec::new(),
            meter_port: 0,
            meter_request: 0,
            meter_ids: Vec::new(),
        }
    }

    /// Append transport bytes to the carry-over buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// The node id most recently selected by the stream.
    pub fn current_node(&self) -> NodeId {
        self.current_node
    }

    /// The active logical channel, or -1 before the first channel switch.
    pub fn channel(&self) -> i8 {
        self.channel
    }

    /// Next unescaped byte, applying escape and channel-switch processing.
    fn pull_unescaped(&mut self) -> Option<u8> {
        loop {
            if self.buf.is_empty() {
                return None;
            }
            let b = self.buf.get_u8();
            if !self.esc {
                if b == ESC {
                    self.esc = true;
                    continue;
                }
                return Some(b);
            }
            self.esc = false;
            if b == ESC_LITERAL {
                return Some(ESC);
            }
            if (CHANNEL_BASE..CHANNEL_BASE + 14).contains(&b) {
                self.channel = (b - CHANNEL_BASE) as i8;
                continue;
            }
            // 0xDF 0xDF and anything else: the byte stands for itself.
            return Some(b);
        }
    }

    /// Next raw byte, for channel-3 positional payloads.
    fn pull_raw(&mut self) -> Option<u8> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.buf.get_u8())
        }
    }

    fn begin(&mut self, kind: Payload, want: usize) {
        self.state = State::Payload { kind, want };
    }

    fn data_event(&self, value: NodeValue) -> Event {
        Event::Response(Response::NodeData { id: self.current_node, value })
    }

    /// Decode the next event, buffering leftovers. `Ok(None)` means more
    /// bytes are needed.
    pub fn next_event(&mut self) -> Result<Option<Event>, ProtocolError> {
        loop {
            match self.state {
                State::Command => {
                    let Some(tok) = self.pull_unescaped() else {
                        return Ok(None);
                    };
                    if self.channel == METER_CHANNEL as i8 {
                        match tok {
                            TOK_INT16 => {
                                self.begin(Payload::MeterPort, 2);
                                continue;
                            }
                            TOK_INT32 => {
                                self.begin(Payload::MeterReq, 4);
                                continue;
                            }
                            TOK_REQUEST_DATA => {
                                self.meter_ids.clear();
                                self.state = State::MeterIds { pending_bank: None };
                                continue;
                            }
                            _ => {}
                        }
                    }
                    match tok {
                        t @ 0x00..=0x3F => return Ok(Some(self.data_event(NodeValue::Int(t as i32)))),
                        t @ 0x40..=0x7F => return Ok(Some(Event::NodeIndex((t - 0x40 + 1) as u16))),
                        t @ 0x80..=0xBF => self.begin(Payload::Str, (t - 0x80 + 1) as usize),
                        t @ 0xC0..=0xCF => self.begin(Payload::Str, (t - 0xC0 + 1) as usize),
                        TOK_EMPTY_STRING => {
                            return Ok(Some(self.data_event(NodeValue::String(String::new()))))
                        }
                        TOK_STRING8 => self.begin(Payload::StrLen, 1),
                        TOK_INDEX16 => self.begin(Payload::SkipIndex, 2),
                        TOK_INT16 => self.begin(Payload::Int16, 2),
                        TOK_INT32 => self.begin(Payload::Int32, 4),
                        TOK_FLOAT | TOK_FLOAT_ALT => self.begin(Payload::Float, 4),
                        TOK_NODE_SELECT => self.begin(Payload::NodeSelect, 4),
                        TOK_CLICK => return Ok(Some(Event::Click)),
                        TOK_STEP => self.begin(Payload::SkipStep, 1),
                        TOK_TREE_ROOT => {
                            self.current_node = 0;
                            return Ok(Some(Event::GotoRoot));
                        }
                        TOK_TREE_UP => return Ok(Some(Event::GoUp)),
                        TOK_REQUEST_DATA => return Ok(Some(Event::DataRequest)),
                        TOK_REQUEST_DEF => return Ok(Some(Event::DefinitionRequest)),
                        TOK_REQUEST_END => {
                            return Ok(Some(Event::Response(Response::RequestEnd)))
                        }
                        TOK_NODE_DEF => self.begin(Payload::DefLen, 2),
                        other => {
                            return Err(ProtocolError::DecodeError(format!(
                                "unexpected command token 0x{other:02X}"
                            )))
                        }
                    }
                }
                State::Payload { kind, want } => {
                    while self.partial.len() < want {
                        let b = if kind.is_raw() { self.pull_raw() } else { self.pull_unescaped() };
                        match b {
                            Some(b) => self.partial.push(b),
                            None => return Ok(None),
                        }
                    }
                    let data = std::mem::take(&mut self.partial);
                    self.state = State::Command;
                    if let Some(event) = self.finish(kind, data)? {
                        return Ok(Some(event));
                    }
                }
                State::MeterIds { pending_bank } => {
                    let Some(b) = self.pull_raw() else {
                        return Ok(None);
                    };
                    match pending_bank {
                        Some(bank) => {
                            self.meter_ids.push(MeterId::new(bank, b));
                            self.state = State::MeterIds { pending_bank: None };
                        }
                        None if b == TOK_REQUEST_END => {
                            self.state = State::Command;
                            return Ok(Some(Event::MeterSubscribe {
                                request_id: self.meter_request,
                                port: self.meter_port,
                                meters: std::mem::take(&mut self.meter_ids),
                            }));
                        }
                        None => {
                            let bank = MeterBank::try_from(b)?;
                            if bank.is_indexless() {
                                self.meter_ids.push(MeterId::new(bank, 0));
                            } else {
                                self.state = State::MeterIds { pending_bank: Some(bank) };
                            }
                        }
                    }
                }
            }
        }
    }

    /// Decode the next console response, skipping request-side events.
    pub fn next_response(&mut self) -> Result<Option<Response>, ProtocolError> {
        loop {
            match self.next_event()? {
                Some(Event::Response(resp)) => return Ok(Some(resp)),
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }

    fn finish(&mut self, kind: Payload, data: Vec<u8>) -> Result<Option<Event>, ProtocolError> {
        match kind {
            Payload::NodeSelect => {
                self.current_node = i32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                Ok(None)
            }
            Payload::Int16 => {
                let v = i16::from_be_bytes([data[0], data[1]]);
                Ok(Some(self.data_event(NodeValue::Int(v as i32))))
            }
            Payload::Int32 => {
                let v = i32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                Ok(Some(self.data_event(NodeValue::Int(v))))
            }
            Payload::Float => {
                let bits = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                Ok(Some(self.data_event(NodeValue::Float(f32::from_bits(bits)))))
            }
            Payload::Str => match String::from_utf8(data) {
                Ok(s) => Ok(Some(self.data_event(NodeValue::String(s)))),
                Err(e) => Err(ProtocolError::DecodeError(e.to_string())),
            },
            Payload::StrLen => {
                self.begin(Payload::Str, data[0] as usize + 1);
                Ok(None)
            }
            Payload::SkipIndex => {
                let v = u16::from_be_bytes([data[0], data[1]]);
                Ok(Some(Event::NodeIndex(v.wrapping_add(1))))
            }
            Payload::SkipStep => Ok(Some(Event::Step(data[0] as i8))),
            Payload::DefLen => {
                let len = u16::from_be_bytes([data[0], data[1]]);
                if len == 0 {
                    self.begin(Payload::DefLenExt, 4);
                } else {
                    self.begin(Payload::DefBody, len as usize);
                }
                Ok(None)
            }
            Payload::DefLenExt => {
                let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                if len == 0 || len > MAX_DEF_SIZE {
                    return Err(ProtocolError::DefinitionTooLarge(len, MAX_DEF_SIZE));
                }
                self.begin(Payload::DefBody, len as usize);
                Ok(None)
            }
            Payload::DefBody => {
                let def = decode_node_def(&data)?;
                Ok(Some(Event::Response(Response::NodeDef(def))))
            }
            Payload::MeterPort => {
                self.meter_port = u16::from_be_bytes([data[0], data[1]]);
                Ok(None)
            }
            Payload::MeterReq => {
                self.meter_request = u16::from_be_bytes([data[0], data[1]]);
                self.meter_port = u16::from_be_bytes([data[2], data[3]]);
                Ok(None)
            }
        }
    }
}

//! The public console handle.

use std::sync::Arc;

use wing_protocol::{MeterId, NodeId, Response};

use crate::config::ConsoleConfig;
use crate::connection::{Connection, MeterUpdate};
use crate::discovery::{self, DiscoveryInfo, DiscoverySet};
use crate::error::Error;
use crate::registry::NameRegistry;

/// A blocking handle to one console.
///
/// Writes are fire-and-forget: the console applies them eventually and does
/// not acknowledge. To observe the applied value, request the node's data
/// afterwards and [`read`](Self::read) the reply. One session supports one
/// reader at a time per stream; concurrent readers queue on the internal
/// receive lock.
pub struct Console {
    conn: Arc<Connection>,
    registry: NameRegistry,
}

impl Console {
    /// Scan the local network for consoles.
    pub fn scan(stop_on_first: bool) -> Result<DiscoverySet, Error> {
        discovery::scan(stop_on_first)
    }

    /// Scan with explicit configuration.
    pub fn scan_with(config: &ConsoleConfig, stop_on_first: bool) -> Result<DiscoverySet, Error> {
        discovery::scan_with(config, stop_on_first)
    }

    /// Connect to a discovered console.
    pub fn connect(info: &DiscoveryInfo) -> Result<Self, Error> {
        let config = ConsoleConfig::default();
        let addr = format!("{}:{}", info.ip, config.control_port);
        Self::connect_with(config, addr)
    }

    /// Discover and connect to the first console that answers.
    pub fn connect_first() -> Result<Self, Error> {
        let found = discovery::scan(true)?;
        if found.is_empty() {
            return Err(Error::NoConsoleFound);
        }
        Self::connect(found.get(0)?)
    }

    /// Connect to a known address, `host:port`.
    pub fn connect_to(addr: impl Into<String>) -> Result<Self, Error> {
        Self::connect_with(ConsoleConfig::default(), addr)
    }

    /// Connect with explicit configuration.
    pub fn connect_with(config: ConsoleConfig, addr: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            conn: Connection::establish(config, addr.into())?,
            registry: NameRegistry::builtin(),
        })
    }

    /// Replace the name registry used for `*_named` calls.
    pub fn with_registry(mut self, registry: NameRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &NameRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut NameRegistry {
        &mut self.registry
    }

    /// Resolve a parameter path (or decimal id string) to a node id.
    pub fn node_id(&self, name: &str) -> Result<NodeId, Error> {
        self.registry.resolve(name)
    }

    /// Queue a string write. Success reports enqueueing, not the wire
    /// write; see [`Connection::set_string`].
    pub fn set_string(&self, id: NodeId, value: &str) -> Result<(), Error> {
        self.conn.set_string(id, value)
    }

    /// Queue a float write. Success reports enqueueing, not the wire
    /// write; see [`Connection::set_string`].
    pub fn set_float(&self, id: NodeId, value: f32) -> Result<(), Error> {
        self.conn.set_float(id, value)
    }

    /// Queue an integer write. Success reports enqueueing, not the wire
    /// write; see [`Connection::set_string`].
    pub fn set_int(&self, id: NodeId, value: i32) -> Result<(), Error> {
        self.conn.set_int(id, value)
    }

    pub fn set_string_named(&self, name: &str, value: &str) -> Result<(), Error> {
        self.conn.set_string(self.registry.resolve(name)?, value)
    }

    pub fn set_float_named(&self, name: &str, value: f32) -> Result<(), Error> {
        self.conn.set_float(self.registry.resolve(name)?, value)
    }

    pub fn set_int_named(&self, name: &str, value: i32) -> Result<(), Error> {
        self.conn.set_int(self.registry.resolve(name)?, value)
    }

    /// Ask for the definition of a node; id 0 requests the whole tree.
    /// Replies arrive through [`read`](Self::read), terminated by
    /// [`Response::RequestEnd`].
    pub fn request_node_definition(&self, id: NodeId) -> Result<(), Error> {
        self.conn.request_node_definition(id)
    }

    /// Ask for the current data of a node; id 0 requests the whole tree.
    pub fn request_node_data(&self, id: NodeId) -> Result<(), Error> {
        self.conn.request_node_data(id)
    }

    /// Block until the next console response arrives.
    pub fn read(&self) -> Result<Response, Error> {
        self.conn.read()
    }

    /// Replace the meter subscription; returns its request id.
    pub fn subscribe_meters(&self, meters: &[MeterId]) -> Result<u16, Error> {
        self.conn.subscribe_meters(meters)
    }

    /// Block until the next meter batch for the active subscription.
    pub fn read_meters(&self) -> Result<MeterUpdate, Error> {
        self.conn.read_meters()
    }

    /// Local UDP port meter datagrams arrive on.
    pub fn meter_port(&self) -> u16 {
        self.conn.meter_port()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Tear the session down. Also happens on drop.
    pub fn disconnect(&self) {
        self.conn.disconnect();
    }
}

//! Blocking client for Behringer WING family digital mixing consoles.
//!
//! Discovery, session management, parameter access, and meter delivery on
//! top of the `wing-protocol` codec. The entry point is [`Console`]:
//!
//! ```no_run
//! use wing_client::Console;
//!
//! # fn main() -> Result<(), wing_client::Error> {
//! let console = Console::connect_first()?;
//! console.set_float_named("/ch.1.fdr", -6.0)?;
//! console.request_node_data(console.node_id("/ch.1.fdr")?)?;
//! println!("{:?}", console.read()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod console;
pub mod discovery;
pub mod error;
pub mod registry;

pub use config::ConsoleConfig;
pub use connection::{Connection, MeterUpdate, SessionState};
pub use console::Console;
pub use discovery::{scan, scan_with, DiscoveryInfo, DiscoverySet};
pub use error::Error;
pub use registry::NameRegistry;

pub use wing_protocol::{
    Constraints, EnumItem, MeterBank, MeterId, NodeDef, NodeId, NodeType, NodeUnit, NodeValue,
    ProtocolError, Response, ValueKind,
};

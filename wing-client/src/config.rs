//! Session and discovery configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use wing_protocol::{CONTROL_PORT, DISCOVERY_PORT};

/// Tunables for discovery and a console session.
///
/// The defaults match console firmware behavior: the console drops a
/// control connection that stays silent for about ten seconds and expires
/// a meter subscription after a few seconds, so both keep-alive periods
/// must stay below those windows.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// TCP port of the control channel.
    pub control_port: u16,
    /// Where the discovery probe is sent. Broadcast by default; tests
    /// point this at a loopback responder.
    pub discovery_addr: SocketAddr,
    /// How long one scan attempt waits for replies.
    pub scan_timeout: Duration,
    /// How many probes are sent before an empty scan gives up.
    pub scan_attempts: u32,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Control-channel keep-alive period.
    pub data_keep_alive: Duration,
    /// Meter-subscription keep-alive period.
    pub meter_keep_alive: Duration,
    /// Depth of the outgoing command queue.
    pub command_queue_depth: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            control_port: CONTROL_PORT,
            discovery_addr: SocketAddr::from((Ipv4Addr::BROADCAST, DISCOVERY_PORT)),
            scan_timeout: Duration::from_secs(1),
            scan_attempts: 3,
            connect_timeout: Duration::from_secs(5),
            data_keep_alive: Duration::from_secs(7),
            meter_keep_alive: Duration::from_secs(3),
            command_queue_depth: 32,
        }
    }
}

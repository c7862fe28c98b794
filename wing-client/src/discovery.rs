//! Console discovery over UDP broadcast.
//!
//! A probe datagram of `WING?` goes out on port 2222 and every console on
//! the segment answers with a comma-separated advertisement:
//!
//! ```text
//! WING,<ip>,<name>,<model>,<serial>,<firmware>
//! ```

use std::net::{SocketAddr, UdpSocket};

use log::{debug, warn};

use wing_protocol::{IndexOutOfRange, DISCOVERY_PROBE, DISCOVERY_REPLY_PREFIX};

use crate::config::ConsoleConfig;
use crate::error::Error;

/// One discovered console, parsed from its advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryInfo {
    /// IP address the console advertises for its control channel.
    pub ip: String,
    /// User-assigned console name.
    pub name: String,
    /// Hardware model.
    pub model: String,
    /// Serial number; unique per console, used to deduplicate replies.
    pub serial: String,
    /// Firmware version string.
    pub firmware: String,
}

impl std::fmt::Display for DiscoveryInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} {}, serial {}, fw {})",
            self.name, self.model, self.ip, self.serial, self.firmware
        )
    }
}

/// The consoles found by one scan.
///
/// Owns its entries; indexed access is range-checked and the set frees
/// everything when dropped or explicitly [`release`](Self::release)d, so
/// entries cannot be used after the set is gone.
#[derive(Debug, Default)]
pub struct DiscoverySet {
    consoles: Vec<DiscoveryInfo>,
}

impl DiscoverySet {
    fn new(consoles: Vec<DiscoveryInfo>) -> Self {
        Self { consoles }
    }

    pub fn count(&self) -> usize {
        self.consoles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consoles.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&DiscoveryInfo, Error> {
        self.consoles.get(index).ok_or_else(|| {
            Error::IndexOutOfRange(IndexOutOfRange { index, count: self.consoles.len() })
        })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiscoveryInfo> {
        self.consoles.iter()
    }

    /// Consume the set, dropping every entry.
    pub fn release(self) {}
}

impl IntoIterator for DiscoverySet {
    type Item = DiscoveryInfo;
    type IntoIter = std::vec::IntoIter<DiscoveryInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.consoles.into_iter()
    }
}

/// Parse one advertisement datagram. `None` for anything that is not a
/// well-formed console reply; foreign traffic on the discovery port is
/// expected and ignored.
pub(crate) fn parse_advertisement(buf: &[u8], from: SocketAddr) -> Option<DiscoveryInfo> {
    let text = std::str::from_utf8(buf).ok()?;
    let mut fields = text.trim_end_matches(['\r', '\n', '\0']).split(',');
    if fields.next()? != DISCOVERY_REPLY_PREFIX {
        return None;
    }
    let info = DiscoveryInfo {
        ip: fields.next()?.to_string(),
        name: fields.next()?.to_string(),
        model: fields.next()?.to_string(),
        serial: fields.next()?.to_string(),
        firmware: fields.next()?.to_string(),
    };
    debug!("discovery reply from {from}: {info}");
    Some(info)
}

/// Scan for consoles with the given configuration.
///
/// Sends up to `scan_attempts` probes and collects replies for
/// `scan_timeout` after each. With `stop_on_first` the scan returns as
/// soon as one console has answered. Duplicate replies (consoles answer
/// every probe) are collapsed by serial number.
pub fn scan_with(config: &ConsoleConfig, stop_on_first: bool) -> Result<DiscoverySet, Error> {
    let socket = UdpSocket::bind(("0.0.0.0", 0))?;
    socket.set_broadcast(true)?;
    socket.set_read_timeout(Some(config.scan_timeout))?;

    let mut found: Vec<DiscoveryInfo> = Vec::new();
    let mut buf = [0u8; 512];

    for attempt in 0..config.scan_attempts {
        debug!(
            "discovery probe {}/{} to {}",
            attempt + 1,
            config.scan_attempts,
            config.discovery_addr
        );
        socket.send_to(DISCOVERY_PROBE, config.discovery_addr)?;

        loop {
            match socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    let Some(info) = parse_advertisement(&buf[..n], from) else {
                        warn!("ignoring {n} byte non-advertisement datagram from {from}");
                        continue;
                    };
                    if !found.iter().any(|known| known.serial == info.serial) {
                        found.push(info);
                        if stop_on_first {
                            return Ok(DiscoverySet::new(found));
                        }
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if !found.is_empty() {
            break;
        }
    }

    Ok(DiscoverySet::new(found))
}

/// Scan for consoles with the default configuration.
pub fn scan(stop_on_first: bool) -> Result<DiscoverySet, Error> {
    scan_with(&ConsoleConfig::default(), stop_on_first)
}

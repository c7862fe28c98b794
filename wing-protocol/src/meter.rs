//! Meter identifiers and the UDP level-datagram format.
//!
//! Meters are addressed by a packed 16-bit identifier: the high byte is one
//! of sixteen fixed bank tags (`0xA0..=0xAF`), the low byte an index within
//! the bank. Level batches arrive as UDP datagrams:
//!
//! ```text
//! +------------+----------+-------------------+
//! | request id | reserved |      levels       |
//! |   u16 BE   | 2 bytes  |    i16 BE each    |
//! +------------+----------+-------------------+
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// The sixteen meter banks exposed by the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MeterBank {
    Channel = 0xA0,
    Aux = 0xA1,
    Bus = 0xA2,
    Main = 0xA3,
    Matrix = 0xA4,
    Dca = 0xA5,
    Fx = 0xA6,
    Source = 0xA7,
    Output = 0xA8,
    Monitor = 0xA9,
    Rta = 0xAA,
    Channel2 = 0xAB,
    Aux2 = 0xAC,
    Bus2 = 0xAD,
    Main2 = 0xAE,
    Matrix2 = 0xAF,
}

impl MeterBank {
    /// Whether the bank is addressed without a within-bank index on the wire.
    pub fn is_indexless(self) -> bool {
        matches!(self, MeterBank::Monitor | MeterBank::Rta)
    }
}

impl TryFrom<u8> for MeterBank {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0xA0 => Ok(MeterBank::Channel),
            0xA1 => Ok(MeterBank::Aux),
            0xA2 => Ok(MeterBank::Bus),
            0xA3 => Ok(MeterBank::Main),
            0xA4 => Ok(MeterBank::Matrix),
            0xA5 => Ok(MeterBank::Dca),
            0xA6 => Ok(MeterBank::Fx),
            0xA7 => Ok(MeterBank::Source),
            0xA8 => Ok(MeterBank::Output),
            0xA9 => Ok(MeterBank::Monitor),
            0xAA => Ok(MeterBank::Rta),
            0xAB => Ok(MeterBank::Channel2),
            0xAC => Ok(MeterBank::Aux2),
            0xAD => Ok(MeterBank::Bus2),
            0xAE => Ok(MeterBank::Main2),
            0xAF => Ok(MeterBank::Matrix2),
            other => Err(ProtocolError::UnknownMeterBank(other)),
        }
    }
}

/// A packed (bank, index) meter address.
///
/// Construction always goes through a validated [`MeterBank`], so a
/// `MeterId` can never carry an unrecognized bank byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeterId {
    bank: MeterBank,
    index: u8,
}

impl MeterId {
    pub fn new(bank: MeterBank, index: u8) -> Self {
        Self { bank, index }
    }

    /// Unpack a raw 16-bit identifier, failing fast on an unknown bank byte
    /// so an ambiguous request is never put on the wire.
    pub fn from_raw(raw: u16) -> Result<Self, ProtocolError> {
        let bank = MeterBank::try_from((raw >> 8) as u8)?;
        Ok(Self { bank, index: (raw & 0xFF) as u8 })
    }

    pub fn bank(self) -> MeterBank {
        self.bank
    }

    pub fn index(self) -> u8 {
        self.index
    }

    /// The packed wire form: `(bank << 8) | index`.
    pub fn raw(self) -> u16 {
        ((self.bank as u16) << 8) | self.index as u16
    }
}

impl std::fmt::Display for MeterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}/{}", self.bank, self.index)
    }
}

/// One decoded meter datagram: the subscription it answers plus its levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterBatch {
    pub request_id: u16,
    pub levels: Vec<i16>,
}

/// Decode one UDP meter datagram.
pub fn decode_meter_datagram(buf: &[u8]) -> Result<MeterBatch, ProtocolError> {
    if buf.len() < 4 || (buf.len() - 4) % 2 != 0 {
        return Err(ProtocolError::MalformedMeterDatagram(buf.len()));
    }
    let request_id = u16::from_be_bytes([buf[0], buf[1]]);
    let levels = buf[4..]
        .chunks_exact(2)
        .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    Ok(MeterBatch { request_id, levels })
}

/// Encode a meter datagram. The console side of the codec; used by
/// simulators and tests.
pub fn encode_meter_datagram(request_id: u16, levels: &[i16]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + levels.len() * 2);
    buf.extend_from_slice(&request_id.to_be_bytes());
    buf.extend_from_slice(&[0, 0]);
    for level in levels {
        buf.extend_from_slice(&level.to_be_bytes());
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_BANKS: [MeterBank; 16] = [
        MeterBank::Channel,
        MeterBank::Aux,
        MeterBank::Bus,
        MeterBank::Main,
        MeterBank::Matrix,
        MeterBank::Dca,
        MeterBank::Fx,
        MeterBank::Source,
        MeterBank::Output,
        MeterBank::Monitor,
        MeterBank::Rta,
        MeterBank::Channel2,
        MeterBank::Aux2,
        MeterBank::Bus2,
        MeterBank::Main2,
        MeterBank::Matrix2,
    ];

    #[test]
    fn meter_id_round_trips_for_every_bank_and_index() {
        for bank in ALL_BANKS {
            for index in [0u8, 1, 15, 127, 255] {
                let id = MeterId::new(bank, index);
                let unpacked = MeterId::from_raw(id.raw()).unwrap();
                assert_eq!(unpacked.bank(), bank);
                assert_eq!(unpacked.index(), index);
                assert_eq!(id.raw(), ((bank as u16) << 8) | index as u16);
            }
        }
    }

    #[test]
    fn unknown_bank_byte_is_rejected() {
        let err = MeterId::from_raw(0x9F03).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownMeterBank(0x9F));
        assert!(MeterId::from_raw(0xB000).is_err());
    }

    #[test]
    fn meter_datagram_round_trip() {
        let levels = [-32768i16, -6 * 256, 0, 120, 32767];
        let wire = encode_meter_datagram(7, &levels);
        let batch = decode_meter_datagram(&wire).unwrap();
        assert_eq!(batch.request_id, 7);
        assert_eq!(batch.levels, levels);
    }

    #[test]
    fn short_or_odd_datagrams_are_malformed() {
        assert!(decode_meter_datagram(&[0, 1]).is_err());
        assert!(decode_meter_datagram(&[0, 1, 0, 0, 5]).is_err());
        // A batch with no levels is still well-formed.
        assert_eq!(decode_meter_datagram(&[0, 1, 0, 0]).unwrap().levels, vec![]);
    }
}

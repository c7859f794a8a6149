/*
### Packet type 8: Halt TX (in) ###

mode = true stops the transmission at the end of the current sequence;
mode = false stops it immediately.
 */
use std::io::Cursor;

use super::{write_header, PacketType, ParseError, Reader, Result, SerializablePacket, WireWrite};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Packet {
    pub id: Option<String>,
    pub mode: bool,
}

impl Packet {
    pub fn immediate() -> Self {
        Packet {
            id: Some(super::CLIENT_ID.to_string()),
            mode: false,
        }
    }

    pub(crate) fn from_reader(
        id: Option<String>,
        r: &mut Reader,
    ) -> std::result::Result<Self, ParseError> {
        Ok(Packet {
            id,
            mode: r.bool()?,
        })
    }
}

impl SerializablePacket for Packet {
    fn serialize(&self, buffer: &mut [u8]) -> Result<u64> {
        let mut w = Cursor::new(buffer);
        write_header(&mut w, PacketType::HaltTx, self.id.as_deref())?;
        w.put_bool(self.mode)?;
        Ok(w.position())
    }
}

impl From<Packet> for super::Packet {
    fn from(packet: Packet) -> super::Packet {
        super::Packet::HaltTx(packet)
    }
}

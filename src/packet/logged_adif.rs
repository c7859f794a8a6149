/*
### Packet type 12: Logged ADIF (out) ###

The just-logged QSO as a single ADIF record.
 */
use std::io::Cursor;

use super::{write_header, PacketType, ParseError, Reader, Result, SerializablePacket, WireWrite};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Packet {
    pub id: Option<String>,
    pub adif: Option<String>,
}

impl Packet {
    pub(crate) fn from_reader(
        id: Option<String>,
        r: &mut Reader,
    ) -> std::result::Result<Self, ParseError> {
        Ok(Packet {
            id,
            adif: r.string()?,
        })
    }
}

impl SerializablePacket for Packet {
    fn serialize(&self, buffer: &mut [u8]) -> Result<u64> {
        let mut w = Cursor::new(buffer);
        write_header(&mut w, PacketType::LoggedAdif, self.id.as_deref())?;
        w.put_string(self.adif.as_deref())?;
        Ok(w.position())
    }
}

impl From<Packet> for super::Packet {
    fn from(packet: Packet) -> super::Packet {
        super::Packet::LoggedAdif(packet)
    }
}

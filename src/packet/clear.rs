/*
### Packet type 3: Clear (out/in) ###

Clears a decode window. The window byte is optional; older consoles omit
it entirely.
 */
use std::io::Cursor;

use super::{write_header, PacketType, ParseError, Reader, Result, SerializablePacket, WireWrite};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Packet {
    pub id: Option<String>,
    pub window: Option<u8>,
}

impl Packet {
    pub(crate) fn from_reader(
        id: Option<String>,
        r: &mut Reader,
    ) -> std::result::Result<Self, ParseError> {
        let window = if r.is_empty() { None } else { Some(r.u8()?) };
        Ok(Packet { id, window })
    }
}

impl SerializablePacket for Packet {
    fn serialize(&self, buffer: &mut [u8]) -> Result<u64> {
        let mut w = Cursor::new(buffer);
        write_header(&mut w, PacketType::Clear, self.id.as_deref())?;
        if let Some(window) = self.window {
            w.put_u8(window)?;
        }
        Ok(w.position())
    }
}

impl From<Packet> for super::Packet {
    fn from(packet: Packet) -> super::Packet {
        super::Packet::Clear(packet)
    }
}

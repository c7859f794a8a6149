/*
### Packet type 9: Free text (in) ###

Places text in the console's free-message field; send = true also keys it.
Kept for wire compatibility; the sequencer does not currently use it.
 */
use std::io::Cursor;

use super::{write_header, PacketType, ParseError, Reader, Result, SerializablePacket, WireWrite};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Packet {
    pub id: Option<String>,
    pub text: Option<String>,
    pub send: bool,
}

impl Packet {
    pub(crate) fn from_reader(
        id: Option<String>,
        r: &mut Reader,
    ) -> std::result::Result<Self, ParseError> {
        Ok(Packet {
            id,
            text: r.string()?,
            send: r.bool()?,
        })
    }
}

impl SerializablePacket for Packet {
    fn serialize(&self, buffer: &mut [u8]) -> Result<u64> {
        let mut w = Cursor::new(buffer);
        write_header(&mut w, PacketType::FreeText, self.id.as_deref())?;
        w.put_string(self.text.as_deref())?;
        w.put_bool(self.send)?;
        Ok(w.position())
    }
}

impl From<Packet> for super::Packet {
    fn from(packet: Packet) -> super::Packet {
        super::Packet::FreeText(packet)
    }
}

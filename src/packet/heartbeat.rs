/*
### Packet type 0: Heartbeat (in/out) ###

Sent by both ends to keep the association alive.

 Field      | Type
:----------:|---------------------------------------------------------------
 max schema | u32
 version    | utf8
 revision   | utf8
 */
use std::io::Cursor;

use super::{write_header, PacketType, ParseError, Reader, Result, SerializablePacket, WireWrite};

pub const VERSION: &str = "1.1";
pub const REVISION: &str = "1a";

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub id: Option<String>,
    pub max_schema: u32,
    pub version: Option<String>,
    pub revision: Option<String>,
}

impl Default for Packet {
    fn default() -> Self {
        Packet {
            id: Some(super::CLIENT_ID.to_string()),
            max_schema: super::SCHEMA_VERSION,
            version: Some(VERSION.to_string()),
            revision: Some(REVISION.to_string()),
        }
    }
}

impl Packet {
    pub(crate) fn from_reader(
        id: Option<String>,
        r: &mut Reader,
    ) -> std::result::Result<Self, ParseError> {
        Ok(Packet {
            id,
            max_schema: r.u32()?,
            version: r.string()?,
            revision: r.string()?,
        })
    }
}

impl SerializablePacket for Packet {
    fn serialize(&self, buffer: &mut [u8]) -> Result<u64> {
        let mut w = Cursor::new(buffer);
        write_header(&mut w, PacketType::Heartbeat, self.id.as_deref())?;
        w.put_u32(self.max_schema)?;
        w.put_string(self.version.as_deref())?;
        w.put_string(self.revision.as_deref())?;
        Ok(w.position())
    }
}

impl From<Packet> for super::Packet {
    fn from(packet: Packet) -> super::Packet {
        super::Packet::Heartbeat(packet)
    }
}

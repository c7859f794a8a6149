/*
### Packet type 4: Reply (in) ###

Instructs the console to reply to a previously decoded transmission. The
body echoes the originating Decode so the console can locate it, plus a
modifiers bitfield; 0x02 ("shift") makes the console follow the caller's
frequency.

 Field           | Type
:---------------:|----------------------------------------------------------
 time            | u32 (ms since UTC midnight)
 snr             | i32 (dB)
 delta time      | f64 (s)
 delta frequency | u32 (Hz)
 mode            | utf8
 message         | utf8
 low confidence  | bool
 modifiers       | u8
 */
use std::io::Cursor;

use super::{
    modifiers, write_header, PacketType, ParseError, Reader, Result, SerializablePacket, WireWrite,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub id: Option<String>,
    pub time: u32,
    pub snr: i32,
    pub delta_time: f64,
    pub delta_frequency: u32,
    pub mode: Option<String>,
    pub message: Option<String>,
    pub low_confidence: bool,
    pub modifiers: u8,
}

impl Default for Packet {
    fn default() -> Self {
        Packet {
            id: Some(super::REPLY_CLIENT_ID.to_string()),
            time: 0,
            snr: 0,
            delta_time: 0.0,
            delta_frequency: 0,
            mode: None,
            message: None,
            low_confidence: false,
            modifiers: modifiers::NONE,
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
            time: r.u32()?,
            snr: r.i32()?,
            delta_time: r.f64()?,
            delta_frequency: r.u32()?,
            mode: r.string()?,
            message: r.string()?,
            low_confidence: r.bool()?,
            modifiers: r.u8()?,
        })
    }
}

impl SerializablePacket for Packet {
    fn serialize(&self, buffer: &mut [u8]) -> Result<u64> {
        let mut w = Cursor::new(buffer);
        write_header(&mut w, PacketType::Reply, self.id.as_deref())?;
        w.put_u32(self.time)?;
        w.put_i32(self.snr)?;
        w.put_f64(self.delta_time)?;
        w.put_u32(self.delta_frequency)?;
        w.put_string(self.mode.as_deref())?;
        w.put_string(self.message.as_deref())?;
        w.put_bool(self.low_confidence)?;
        w.put_u8(self.modifiers)?;
        Ok(w.position())
    }
}

impl From<Packet> for super::Packet {
    fn from(packet: Packet) -> super::Packet {
        super::Packet::Reply(packet)
    }
}

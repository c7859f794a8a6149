/*
### Packet type 2: Decode (out) ###

One per decoded on-air transmission. The time field is milliseconds since
UTC midnight; the receiver supplies the calendar date.

 Field           | Type
:---------------:|----------------------------------------------------------
 new             | bool
 time            | u32 (ms since UTC midnight)
 snr             | i32 (dB)
 delta time      | f64 (s)
 delta frequency | u32 (Hz)
 mode            | utf8
 message         | utf8
 low confidence  | bool
 off air         | bool
 */
use std::io::Cursor;

use chrono::{DateTime, Utc};

use super::{
    time_from_millis, write_header, PacketType, ParseError, Reader, Result, SerializablePacket,
    WireWrite,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Packet {
    pub id: Option<String>,
    pub new: bool,
    pub time: u32,
    pub snr: i32,
    pub delta_time: f64,
    pub delta_frequency: u32,
    pub mode: Option<String>,
    pub message: Option<String>,
    pub low_confidence: bool,
    pub off_air: bool,
}

impl Packet {
    pub(crate) fn from_reader(
        id: Option<String>,
        r: &mut Reader,
    ) -> std::result::Result<Self, ParseError> {
        Ok(Packet {
            id,
            new: r.bool()?,
            time: r.u32()?,
            snr: r.i32()?,
            delta_time: r.f64()?,
            delta_frequency: r.u32()?,
            mode: r.string()?,
            message: r.string()?,
            low_confidence: r.bool()?,
            off_air: r.bool()?,
        })
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        time_from_millis(self.time)
    }
}

impl SerializablePacket for Packet {
    fn serialize(&self, buffer: &mut [u8]) -> Result<u64> {
        let mut w = Cursor::new(buffer);
        write_header(&mut w, PacketType::Decode, self.id.as_deref())?;
        w.put_bool(self.new)?;
        w.put_u32(self.time)?;
        w.put_i32(self.snr)?;
        w.put_f64(self.delta_time)?;
        w.put_u32(self.delta_frequency)?;
        w.put_string(self.mode.as_deref())?;
        w.put_string(self.message.as_deref())?;
        w.put_bool(self.low_confidence)?;
        w.put_bool(self.off_air)?;
        Ok(w.position())
    }
}

impl From<Packet> for super::Packet {
    fn from(packet: Packet) -> super::Packet {
        super::Packet::Decode(packet)
    }
}

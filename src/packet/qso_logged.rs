/*
### Packet type 5: QSO logged (out) ###

Sent once the operator commits a contact to the console's log. The
controller marks the station worked and may re-emit the packet to an
upstream logging receiver.
 */
use std::io::Cursor;

use super::{
    write_header, PacketType, ParseError, Reader, Result, SerializablePacket, WireDateTime,
    WireWrite,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub id: Option<String>,
    pub datetime_off: WireDateTime,
    pub dx_call: Option<String>,
    pub dx_grid: Option<String>,
    pub dial_frequency: u64,
    pub mode: Option<String>,
    pub report_sent: Option<String>,
    pub report_received: Option<String>,
    pub tx_power: Option<String>,
    pub comments: Option<String>,
    pub name: Option<String>,
    pub datetime_on: WireDateTime,
    pub op_call: Option<String>,
    pub my_call: Option<String>,
    pub my_grid: Option<String>,
    pub exchange_sent: Option<String>,
    pub exchange_received: Option<String>,
    pub prop_mode: Option<String>,
}

impl Packet {
    pub(crate) fn from_reader(
        id: Option<String>,
        r: &mut Reader,
    ) -> std::result::Result<Self, ParseError> {
        Ok(Packet {
            id,
            datetime_off: r.datetime()?,
            dx_call: r.string()?,
            dx_grid: r.string()?,
            dial_frequency: r.u64()?,
            mode: r.string()?,
            report_sent: r.string()?,
            report_received: r.string()?,
            tx_power: r.string()?,
            comments: r.string()?,
            name: r.string()?,
            datetime_on: r.datetime()?,
            op_call: r.string()?,
            my_call: r.string()?,
            my_grid: r.string()?,
            exchange_sent: r.string()?,
            exchange_received: r.string()?,
            prop_mode: r.string()?,
        })
    }
}

impl SerializablePacket for Packet {
    fn serialize(&self, buffer: &mut [u8]) -> Result<u64> {
        let mut w = Cursor::new(buffer);
        write_header(&mut w, PacketType::QsoLogged, self.id.as_deref())?;
        w.put_datetime(&self.datetime_off)?;
        w.put_string(self.dx_call.as_deref())?;
        w.put_string(self.dx_grid.as_deref())?;
        w.put_u64(self.dial_frequency)?;
        w.put_string(self.mode.as_deref())?;
        w.put_string(self.report_sent.as_deref())?;
        w.put_string(self.report_received.as_deref())?;
        w.put_string(self.tx_power.as_deref())?;
        w.put_string(self.comments.as_deref())?;
        w.put_string(self.name.as_deref())?;
        w.put_datetime(&self.datetime_on)?;
        w.put_string(self.op_call.as_deref())?;
        w.put_string(self.my_call.as_deref())?;
        w.put_string(self.my_grid.as_deref())?;
        w.put_string(self.exchange_sent.as_deref())?;
        w.put_string(self.exchange_received.as_deref())?;
        w.put_string(self.prop_mode.as_deref())?;
        Ok(w.position())
    }
}

impl From<Packet> for super::Packet {
    fn from(packet: Packet) -> super::Packet {
        super::Packet::QsoLogged(Box::new(packet))
    }
}

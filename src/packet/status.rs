/*
### Packet type 1: Status (out) ###

Emitted by the console whenever its state changes: rig frequency, mode,
DX call, TX state and the message it is currently sending. The sequencer
derives its slot table and transmit gate from these.

 Field            | Type
:----------------:|---------------------------------------------------------
 dial frequency   | u64 (Hz)
 mode             | utf8
 DX call          | utf8
 report           | utf8
 TX mode          | utf8
 TX enabled       | bool
 transmitting     | bool
 decoding         | bool
 RX df            | u32
 TX df            | u32
 DE call          | utf8
 DE grid          | utf8
 DX grid          | utf8
 TX watchdog      | bool
 sub-mode         | utf8
 fast mode        | bool
 special op mode  | u8
 freq tolerance   | u32
 T/R period       | u32
 config name      | utf8
 TX message       | utf8
 */
use std::io::Cursor;

use super::{
    write_header, Mode, PacketType, ParseError, Reader, Result, SerializablePacket, WireWrite,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Packet {
    pub id: Option<String>,
    pub frequency: u64,
    pub mode: Option<String>,
    pub dx_call: Option<String>,
    pub report: Option<String>,
    pub tx_mode: Option<String>,
    pub tx_enabled: bool,
    pub transmitting: bool,
    pub decoding: bool,
    pub rx_df: u32,
    pub tx_df: u32,
    pub de_call: Option<String>,
    pub de_grid: Option<String>,
    pub dx_grid: Option<String>,
    pub tx_watchdog: bool,
    pub sub_mode: Option<String>,
    pub fast_mode: bool,
    pub special_op_mode: u8,
    pub freq_tolerance: u32,
    pub tr_period: u32,
    pub config_name: Option<String>,
    pub tx_message: Option<String>,
}

impl Packet {
    pub(crate) fn from_reader(
        id: Option<String>,
        r: &mut Reader,
    ) -> std::result::Result<Self, ParseError> {
        Ok(Packet {
            id,
            frequency: r.u64()?,
            mode: r.string()?,
            dx_call: r.string()?,
            report: r.string()?,
            tx_mode: r.string()?,
            tx_enabled: r.bool()?,
            transmitting: r.bool()?,
            decoding: r.bool()?,
            rx_df: r.u32()?,
            tx_df: r.u32()?,
            de_call: r.string()?,
            de_grid: r.string()?,
            dx_grid: r.string()?,
            tx_watchdog: r.bool()?,
            sub_mode: r.string()?,
            fast_mode: r.bool()?,
            special_op_mode: r.u8()?,
            freq_tolerance: r.u32()?,
            tr_period: r.u32()?,
            config_name: r.string()?,
            tx_message: r.string()?,
        })
    }

    pub fn special_operating_mode(&self) -> super::SpecialOperatingMode {
        super::SpecialOperatingMode::from(self.special_op_mode)
    }

    /// The mode governing the transmit schedule. The console reports the
    /// TX mode separately from the RX mode during split operation.
    pub fn tx_mode(&self) -> Option<Mode> {
        self.tx_mode
            .as_deref()
            .and_then(Mode::from_wire)
            .or_else(|| self.mode.as_deref().and_then(Mode::from_wire))
    }
}

impl SerializablePacket for Packet {
    fn serialize(&self, buffer: &mut [u8]) -> Result<u64> {
        let mut w = Cursor::new(buffer);
        write_header(&mut w, PacketType::Status, self.id.as_deref())?;
        w.put_u64(self.frequency)?;
        w.put_string(self.mode.as_deref())?;
        w.put_string(self.dx_call.as_deref())?;
        w.put_string(self.report.as_deref())?;
        w.put_string(self.tx_mode.as_deref())?;
        w.put_bool(self.tx_enabled)?;
        w.put_bool(self.transmitting)?;
        w.put_bool(self.decoding)?;
        w.put_u32(self.rx_df)?;
        w.put_u32(self.tx_df)?;
        w.put_string(self.de_call.as_deref())?;
        w.put_string(self.de_grid.as_deref())?;
        w.put_string(self.dx_grid.as_deref())?;
        w.put_bool(self.tx_watchdog)?;
        w.put_string(self.sub_mode.as_deref())?;
        w.put_bool(self.fast_mode)?;
        w.put_u8(self.special_op_mode)?;
        w.put_u32(self.freq_tolerance)?;
        w.put_u32(self.tr_period)?;
        w.put_string(self.config_name.as_deref())?;
        w.put_string(self.tx_message.as_deref())?;
        Ok(w.position())
    }
}

impl From<Packet> for super::Packet {
    fn from(packet: Packet) -> super::Packet {
        super::Packet::Status(Box::new(packet))
    }
}

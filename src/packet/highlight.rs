/*
### Packet type 13: Highlight callsign (in) ###

Colors a callsign in the console's band activity window. Each color is a
0xffff marker followed by 16-bit red, green and blue components. Kept for
wire compatibility; the sequencer does not currently use it.
 */
use std::io::Cursor;

use super::{write_header, PacketType, ParseError, Reader, Result, SerializablePacket, WireWrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

const COLOR_MARKER: u16 = 0xffff;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Packet {
    pub id: Option<String>,
    pub call: Option<String>,
    pub foreground: Color,
    pub background: Color,
    pub highlight_last: bool,
}

fn read_color(r: &mut Reader) -> std::result::Result<Color, ParseError> {
    let _marker = r.u16()?;
    Ok(Color {
        red: r.u16()?,
        green: r.u16()?,
        blue: r.u16()?,
    })
}

fn write_color(w: &mut Cursor<&mut [u8]>, color: &Color) -> Result {
    w.put_u16(COLOR_MARKER)?;
    w.put_u16(color.red)?;
    w.put_u16(color.green)?;
    w.put_u16(color.blue)
}

impl Packet {
    pub(crate) fn from_reader(
        id: Option<String>,
        r: &mut Reader,
    ) -> std::result::Result<Self, ParseError> {
        Ok(Packet {
            id,
            call: r.string()?,
            foreground: read_color(r)?,
            background: read_color(r)?,
            highlight_last: r.bool()?,
        })
    }
}

impl SerializablePacket for Packet {
    fn serialize(&self, buffer: &mut [u8]) -> Result<u64> {
        let mut w = Cursor::new(buffer);
        write_header(&mut w, PacketType::HighlightCallsign, self.id.as_deref())?;
        w.put_string(self.call.as_deref())?;
        write_color(&mut w, &self.foreground)?;
        write_color(&mut w, &self.background)?;
        w.put_bool(self.highlight_last)?;
        Ok(w.position())
    }
}

impl From<Packet> for super::Packet {
    fn from(packet: Packet) -> super::Packet {
        super::Packet::HighlightCallsign(packet)
    }
}

//! The WSJT-X UDP wire format.
//!
//! Every datagram starts with a 12 byte header (magic, schema version,
//! packet type, all big-endian u32) followed by a length-prefixed UTF-8
//! client identifier and a type-specific body. The authoritative layout is
//! NetworkMessage.hpp in the WSJT-X source tree.
use num_enum::{FromPrimitive, TryFromPrimitive};

mod wire;
pub use wire::{time_from_millis, WireDateTime};
pub(crate) use wire::{millis_since_midnight, Reader, WireWrite};

mod error;
pub use error::{Error, ParseError};
pub type Result<T = ()> = std::result::Result<T, Error>;

pub const MAGIC: u32 = 0xADBC_CBDA;
pub const SCHEMA_VERSION: u32 = 2;
/// Client identifier stamped on controller-originated packets.
pub const CLIENT_ID: &str = "AUTOFS";
/// Replies carry their own identifier so the console can tell them apart.
pub const REPLY_CLIENT_ID: &str = "AUTOFT";

#[derive(Debug, Clone, Copy, Eq, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum PacketType {
    Heartbeat = 0,
    Status = 1,
    Decode = 2,
    Clear = 3,
    Reply = 4,
    QsoLogged = 5,
    Close = 6,
    Replay = 7,
    HaltTx = 8,
    FreeText = 9,
    WsprDecode = 10,
    Location = 11,
    LoggedAdif = 12,
    HighlightCallsign = 13,
    SwitchConfiguration = 14,
    Configure = 15,
}

/// Operating mode as it appears in mode fields: `~` for FT8, `+` for FT4.
/// Status packets from some console versions spell the name out instead.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Mode {
    Ft8,
    Ft4,
}

impl Mode {
    pub fn from_wire(value: &str) -> Option<Mode> {
        match value {
            "~" | "FT8" => Some(Mode::Ft8),
            "+" | "FT4" => Some(Mode::Ft4),
            _ => None,
        }
    }

    pub fn wire(&self) -> &'static str {
        match self {
            Mode::Ft8 => "~",
            Mode::Ft4 => "+",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Mode::Ft8 => write!(f, "FT8"),
            Mode::Ft4 => write!(f, "FT4"),
        }
    }
}

/// Contest / special operating mode advertised in Status packets.
/// Unknown values map to None, matching the console's own tolerance.
#[derive(Debug, Clone, Copy, Eq, PartialEq, FromPrimitive)]
#[repr(u8)]
pub enum SpecialOperatingMode {
    #[num_enum(default)]
    None = 0,
    NaVhf = 1,
    EuVhf = 2,
    FieldDay = 3,
    RttyRoundup = 4,
    WwDigi = 5,
    Fox = 6,
    Hound = 7,
    ArrlDigi = 8,
}

/// Keyboard-modifier bitfield carried by Reply packets.
pub mod modifiers {
    pub const NONE: u8 = 0x00;
    /// "Shift": instructs the console to move its TX offset onto the
    /// caller's frequency.
    pub const SHIFT: u8 = 0x02;
    pub const CTRL: u8 = 0x04;
    pub const ALT: u8 = 0x08;
}

pub mod clear;
pub mod close;
pub mod configure;
pub mod decode;
pub mod free_text;
pub mod halt_tx;
pub mod heartbeat;
pub mod highlight;
pub mod logged_adif;
pub mod qso_logged;
pub mod reply;
pub mod status;
pub mod switch_configuration;

pub mod parser;

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Heartbeat(heartbeat::Packet),
    Status(Box<status::Packet>),
    Decode(decode::Packet),
    Clear(clear::Packet),
    Reply(reply::Packet),
    QsoLogged(Box<qso_logged::Packet>),
    Close(close::Packet),
    HaltTx(halt_tx::Packet),
    FreeText(free_text::Packet),
    LoggedAdif(logged_adif::Packet),
    HighlightCallsign(highlight::Packet),
    SwitchConfiguration(switch_configuration::Packet),
    Configure(configure::Packet),
}

impl Packet {
    pub fn kind(&self) -> PacketType {
        match self {
            Packet::Heartbeat(_) => PacketType::Heartbeat,
            Packet::Status(_) => PacketType::Status,
            Packet::Decode(_) => PacketType::Decode,
            Packet::Clear(_) => PacketType::Clear,
            Packet::Reply(_) => PacketType::Reply,
            Packet::QsoLogged(_) => PacketType::QsoLogged,
            Packet::Close(_) => PacketType::Close,
            Packet::HaltTx(_) => PacketType::HaltTx,
            Packet::FreeText(_) => PacketType::FreeText,
            Packet::LoggedAdif(_) => PacketType::LoggedAdif,
            Packet::HighlightCallsign(_) => PacketType::HighlightCallsign,
            Packet::SwitchConfiguration(_) => PacketType::SwitchConfiguration,
            Packet::Configure(_) => PacketType::Configure,
        }
    }
}

pub trait SerializablePacket {
    fn serialize(&self, buffer: &mut [u8]) -> Result<u64>;
}

impl SerializablePacket for Packet {
    fn serialize(&self, buffer: &mut [u8]) -> Result<u64> {
        match self {
            Packet::Heartbeat(pkt) => pkt.serialize(buffer),
            Packet::Status(pkt) => pkt.serialize(buffer),
            Packet::Decode(pkt) => pkt.serialize(buffer),
            Packet::Clear(pkt) => pkt.serialize(buffer),
            Packet::Reply(pkt) => pkt.serialize(buffer),
            Packet::QsoLogged(pkt) => pkt.serialize(buffer),
            Packet::Close(pkt) => pkt.serialize(buffer),
            Packet::HaltTx(pkt) => pkt.serialize(buffer),
            Packet::FreeText(pkt) => pkt.serialize(buffer),
            Packet::LoggedAdif(pkt) => pkt.serialize(buffer),
            Packet::HighlightCallsign(pkt) => pkt.serialize(buffer),
            Packet::SwitchConfiguration(pkt) => pkt.serialize(buffer),
            Packet::Configure(pkt) => pkt.serialize(buffer),
        }
    }
}

use std::io::Cursor;

pub(crate) fn write_header(
    w: &mut Cursor<&mut [u8]>,
    kind: PacketType,
    id: Option<&str>,
) -> Result {
    w.put_u32(MAGIC)?;
    w.put_u32(SCHEMA_VERSION)?;
    w.put_u32(kind as u32)?;
    w.put_string(id)
}

#[macro_export]
// Packets with no body beyond the common header
macro_rules! header_only_packet {
    ($packet:ident, $kind:expr) => {
        impl $packet {
            pub(crate) fn from_reader(
                id: Option<String>,
                _r: &mut $crate::packet::Reader,
            ) -> std::result::Result<Self, $crate::packet::ParseError> {
                Ok($packet { id })
            }
        }

        impl $crate::packet::SerializablePacket for $packet {
            fn serialize(&self, buffer: &mut [u8]) -> $crate::packet::Result<u64> {
                let mut w = std::io::Cursor::new(buffer);
                $crate::packet::write_header(&mut w, $kind, self.id.as_deref())?;
                Ok(w.position())
            }
        }
    };
}

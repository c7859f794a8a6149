/*
### Packet type 6: Close (out/in) ###
 */
use crate::header_only_packet;
use crate::packet::PacketType;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Packet {
    pub id: Option<String>,
}

header_only_packet!(Packet, PacketType::Close);

impl From<Packet> for super::Packet {
    fn from(packet: Packet) -> super::Packet {
        super::Packet::Close(packet)
    }
}

/*
### Packet type 14: Switch configuration (in) ###

Pass-through; recognized so it round-trips, never acted upon.
 */
use crate::header_only_packet;
use crate::packet::PacketType;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Packet {
    pub id: Option<String>,
}

header_only_packet!(Packet, PacketType::SwitchConfiguration);

impl From<Packet> for super::Packet {
    fn from(packet: Packet) -> super::Packet {
        super::Packet::SwitchConfiguration(packet)
    }
}

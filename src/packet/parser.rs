use super::*;

pub trait Parser {
    fn parse(buffer: &[u8]) -> std::result::Result<Packet, ParseError>;
}

impl Parser for Packet {
    fn parse(buffer: &[u8]) -> std::result::Result<Packet, ParseError> {
        let mut r = Reader::new(buffer);
        let magic = r.u32()?;
        if magic != MAGIC {
            return Err(ParseError::BadMagic(magic));
        }
        let _schema = r.u32()?;
        let raw_kind = r.u32()?;
        let kind =
            PacketType::try_from(raw_kind).map_err(|_| ParseError::UnknownType(raw_kind))?;
        let id = r.string()?;

        Ok(match kind {
            PacketType::Heartbeat => heartbeat::Packet::from_reader(id, &mut r)?.into(),
            PacketType::Status => status::Packet::from_reader(id, &mut r)?.into(),
            PacketType::Decode => decode::Packet::from_reader(id, &mut r)?.into(),
            PacketType::Clear => clear::Packet::from_reader(id, &mut r)?.into(),
            PacketType::Reply => reply::Packet::from_reader(id, &mut r)?.into(),
            PacketType::QsoLogged => qso_logged::Packet::from_reader(id, &mut r)?.into(),
            PacketType::Close => close::Packet::from_reader(id, &mut r)?.into(),
            PacketType::HaltTx => halt_tx::Packet::from_reader(id, &mut r)?.into(),
            PacketType::FreeText => free_text::Packet::from_reader(id, &mut r)?.into(),
            PacketType::LoggedAdif => logged_adif::Packet::from_reader(id, &mut r)?.into(),
            PacketType::HighlightCallsign => highlight::Packet::from_reader(id, &mut r)?.into(),
            PacketType::SwitchConfiguration => {
                switch_configuration::Packet::from_reader(id, &mut r)?.into()
            }
            PacketType::Configure => configure::Packet::from_reader(id, &mut r)?.into(),
            PacketType::Replay | PacketType::WsprDecode | PacketType::Location => {
                return Err(ParseError::Unhandled(kind))
            }
        })
    }
}

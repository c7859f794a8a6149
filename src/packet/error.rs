use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("packet parse error")]
    Parse(#[from] ParseError),
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),
    #[error("unknown packet type {0}")]
    UnknownType(u32),
    #[error("no decoder for {0:?} packets")]
    Unhandled(crate::packet::PacketType),
    #[error("truncated packet: wanted {wanted} more bytes, {left} left")]
    Truncated { wanted: usize, left: usize },
    #[error("invalid utf-8 in string field")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("string length {0} out of range")]
    BadStringLength(i32),
}

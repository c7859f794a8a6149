use thiserror::Error;

/// Everything that can abort startup or surface from a subsystem.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::Error),
    #[error("selector pipeline error: {0}")]
    Selector(#[from] crate::selector::Error),
    #[error("packet codec error: {0}")]
    Packet(#[from] crate::packet::Error),
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("prefix database error: {0}")]
    Dxcc(#[from] crate::dxcc::Error),
    #[error("operator registry error: {0}")]
    Lotw(#[from] crate::lotw::Error),
    #[error("{0}")]
    Geo(#[from] crate::geo::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T = ()> = std::result::Result<T, Error>;

mod error;
pub use error::Error;

mod packet;
pub use packet::*;

pub mod config;
pub mod dxcc;
pub mod geo;
pub mod logging;
pub mod lotw;
pub mod message;
pub mod selector;
pub mod sequencer;
pub mod store;

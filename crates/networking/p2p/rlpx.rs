pub mod channel;
pub mod ecies;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod message;
pub mod p2p;
pub mod utils;

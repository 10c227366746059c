pub mod rlpx;

pub use rlpx::{
    channel::{RLPxChannel, RLPxEvent},
    error::RLPxError,
    p2p::DisconnectReason,
};

/// devp2p base protocol version spoken in the hello exchange.
pub const P2P_VERSION: u8 = 4;

/// Client identifier advertised in the hello message.
pub const CLIENT_ID: &str = "tiny-ether";

/// Longest client identifier accepted from a peer.
pub const CLIENT_ID_MAX_LEN: usize = 80;

use thiserror::Error;
use tiny_ether_rlp::error::{RLPDecodeError, RLPEncodeError};

/// Failure reasons surfaced by the transport. Everything except
/// [`RLPxError::ChannelClosed`] is fatal to the channel that produced it.
#[derive(Debug, Error)]
pub enum RLPxError {
    #[error("Handshake failed: {0}")]
    HandshakeError(String),
    #[error("Cryptography error: {0}")]
    CryptographyError(String),
    #[error("Ciphertext MAC mismatch")]
    HmacMismatch,
    #[error("Frame header MAC mismatch")]
    HeaderMacMismatch,
    #[error("Frame body MAC mismatch")]
    BodyMacMismatch,
    #[error("Frame body of {0} bytes does not fit the 3-byte size field")]
    OversizeFrame(usize),
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    #[error("Invalid state for the requested operation")]
    InvalidState(),
    #[error("Channel is closed")]
    ChannelClosed,
    #[error("Invalid peer id")]
    InvalidPeerId(),
    #[error("Invalid recovery id")]
    InvalidRecoveryId(),
    #[error("Invalid message length")]
    InvalidMessageLength(),
    #[error("Decode Error: {0}")]
    DecodeError(#[from] RLPDecodeError),
    #[error("Encode Error: {0}")]
    EncodeError(#[from] RLPEncodeError),
}

impl From<k256::ecdsa::Error> for RLPxError {
    fn from(error: k256::ecdsa::Error) -> Self {
        RLPxError::CryptographyError(error.to_string())
    }
}

impl From<k256::elliptic_curve::Error> for RLPxError {
    fn from(error: k256::elliptic_curve::Error) -> Self {
        RLPxError::CryptographyError(error.to_string())
    }
}

impl From<aes::cipher::InvalidLength> for RLPxError {
    fn from(error: aes::cipher::InvalidLength) -> Self {
        RLPxError::CryptographyError(error.to_string())
    }
}

impl From<aes::cipher::StreamCipherError> for RLPxError {
    fn from(error: aes::cipher::StreamCipherError) -> Self {
        RLPxError::CryptographyError(error.to_string())
    }
}

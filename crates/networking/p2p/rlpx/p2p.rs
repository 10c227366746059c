use bytes::BufMut;
use ethereum_types::H512;
use k256::PublicKey;
use tiny_ether_rlp::{
    encode::RLPEncode as _,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};

use crate::{CLIENT_ID, CLIENT_ID_MAX_LEN, P2P_VERSION};

use super::{
    message::RLPxMessage,
    utils::{id2pubkey, pubkey2id},
};

/// Reason codes carried by the Disconnect message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DisconnectReason {
    Requested = 0x00,
    TcpError = 0x01,
    ProtocolError = 0x02,
    UselessPeer = 0x03,
    TooManyPeers = 0x04,
    AlreadyConnected = 0x05,
    IncompatibleVersion = 0x06,
    InvalidIdentity = 0x07,
    ClientQuitting = 0x08,
    UnexpectedIdentity = 0x09,
    SelfConnection = 0x0A,
    PingTimeout = 0x0B,
    SubprotocolReason = 0x10,
    Unknown = 0xFF,
}

impl From<u8> for DisconnectReason {
    fn from(value: u8) -> Self {
        match value {
            0x00 => DisconnectReason::Requested,
            0x01 => DisconnectReason::TcpError,
            0x02 => DisconnectReason::ProtocolError,
            0x03 => DisconnectReason::UselessPeer,
            0x04 => DisconnectReason::TooManyPeers,
            0x05 => DisconnectReason::AlreadyConnected,
            0x06 => DisconnectReason::IncompatibleVersion,
            0x07 => DisconnectReason::InvalidIdentity,
            0x08 => DisconnectReason::ClientQuitting,
            0x09 => DisconnectReason::UnexpectedIdentity,
            0x0A => DisconnectReason::SelfConnection,
            0x0B => DisconnectReason::PingTimeout,
            0x10 => DisconnectReason::SubprotocolReason,
            _ => DisconnectReason::Unknown,
        }
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DisconnectReason::Requested => "disconnect requested",
            DisconnectReason::TcpError => "TCP subsystem error",
            DisconnectReason::ProtocolError => "breach of protocol",
            DisconnectReason::UselessPeer => "useless peer",
            DisconnectReason::TooManyPeers => "too many peers",
            DisconnectReason::AlreadyConnected => "already connected",
            DisconnectReason::IncompatibleVersion => "incompatible protocol version",
            DisconnectReason::InvalidIdentity => "invalid node identity",
            DisconnectReason::ClientQuitting => "client quitting",
            DisconnectReason::UnexpectedIdentity => "unexpected identity",
            DisconnectReason::SelfConnection => "connected to self",
            DisconnectReason::PingTimeout => "ping timeout",
            DisconnectReason::SubprotocolReason => "subprotocol reason",
            DisconnectReason::Unknown => "unknown reason",
        };
        name.fmt(f)
    }
}

#[derive(Debug)]
pub(crate) struct HelloMessage {
    pub(crate) protocol_version: u8,
    pub(crate) client_id: String,
    pub(crate) capabilities: Vec<(String, u8)>,
    pub(crate) listen_port: u16,
    pub(crate) node_id: PublicKey,
}

impl HelloMessage {
    pub fn new(listen_port: u16, node_id: PublicKey) -> Self {
        Self {
            protocol_version: P2P_VERSION,
            client_id: CLIENT_ID.to_string(),
            // No application subprotocols on top of the base devp2p set.
            capabilities: Vec::new(),
            listen_port,
            node_id,
        }
    }
}

impl RLPxMessage for HelloMessage {
    fn encode(&self, mut buf: &mut dyn BufMut) {
        Encoder::new(&mut buf)
            .encode_field(&self.protocol_version)
            .encode_field(&self.client_id)
            .encode_field(&self.capabilities)
            .encode_field(&self.listen_port)
            .encode_field(&pubkey2id(&self.node_id))
            .finish();
    }

    fn decode(msg_data: &[u8]) -> Result<Self, RLPDecodeError> {
        // decode hello message: [protocolVersion: P, clientId: B, capabilities, listenPort: P, nodeId: B_64, ...]
        let decoder = Decoder::new(msg_data)?;
        let (protocol_version, decoder): (u8, _) = decoder.decode_field("protocolVersion")?;

        let (client_id, decoder): (String, _) = decoder.decode_field("clientId")?;
        if client_id.len() > CLIENT_ID_MAX_LEN {
            return Err(RLPDecodeError::Custom(format!(
                "client id of {} bytes exceeds the {CLIENT_ID_MAX_LEN} byte cap",
                client_id.len()
            )));
        }

        // [[cap1, capVersion1], [cap2, capVersion2], ...]
        let (capabilities, decoder): (Vec<(String, u8)>, _) =
            decoder.decode_field("capabilities")?;

        let (listen_port, decoder): (u16, _) = decoder.decode_field("listenPort")?;

        let (node_id, decoder): (H512, _) = decoder.decode_field("nodeId")?;

        // Implementations must ignore any additional list elements
        let _padding = decoder.finish_unchecked();

        Ok(Self {
            protocol_version,
            client_id,
            capabilities,
            listen_port,
            node_id: id2pubkey(node_id).ok_or(RLPDecodeError::MalformedData)?,
        })
    }
}

#[derive(Debug)]
pub(crate) struct DisconnectMessage {
    pub(crate) reason: Option<u8>,
}

impl DisconnectMessage {
    pub fn new(reason: Option<u8>) -> Self {
        Self { reason }
    }

    pub fn reason(&self) -> DisconnectReason {
        self.reason.map(Into::into).unwrap_or(DisconnectReason::Unknown)
    }
}

impl RLPxMessage for DisconnectMessage {
    fn encode(&self, buf: &mut dyn BufMut) {
        // Disconnect msg_data is [reason] or none
        match self.reason {
            Some(value) => Encoder::new(buf).encode_field(&value).finish(),
            None => Vec::<u8>::new().encode(buf),
        }
    }

    fn decode(msg_data: &[u8]) -> Result<Self, RLPDecodeError> {
        // decode disconnect message: [reason (optional)]
        // The reason is seen encoded in different ways in the wild:
        let reason = match msg_data.len() {
            0 => None,
            // As a single byte
            1 => Some(msg_data[0]),
            // As an RLP encoded list
            _ => {
                let decoder = Decoder::new(msg_data)?;
                let (reason, _): (Option<u8>, _) = decoder.decode_optional_field();
                reason
            }
        };

        Ok(Self { reason })
    }
}

#[derive(Debug)]
pub(crate) struct PingMessage {}

impl RLPxMessage for PingMessage {
    fn encode(&self, buf: &mut dyn BufMut) {
        // Ping msg_data is only []
        Vec::<u8>::new().encode(buf);
    }

    fn decode(msg_data: &[u8]) -> Result<Self, RLPDecodeError> {
        // decode ping message: data is the empty list []
        let decoder = Decoder::new(msg_data)?;
        decoder.finish()?;
        Ok(Self {})
    }
}

#[derive(Debug)]
pub(crate) struct PongMessage {}

impl RLPxMessage for PongMessage {
    fn encode(&self, buf: &mut dyn BufMut) {
        // Pong msg_data is only []
        Vec::<u8>::new().encode(buf);
    }

    fn decode(msg_data: &[u8]) -> Result<Self, RLPDecodeError> {
        // decode pong message: data is the empty list []
        let decoder = Decoder::new(msg_data)?;
        decoder.finish()?;
        Ok(Self {})
    }
}

#[cfg(test)]
mod tests {
    use k256::SecretKey;
    use rand::rngs::OsRng;

    use super::*;
    use crate::rlpx::message::RLPxMessage;

    #[test]
    fn hello_roundtrip() {
        let node_key = SecretKey::random(&mut OsRng);
        let hello = HelloMessage::new(30303, node_key.public_key());

        let mut buf = vec![];
        hello.encode(&mut buf);
        let decoded = HelloMessage::decode(&buf).unwrap();

        assert_eq!(decoded.protocol_version, P2P_VERSION);
        assert_eq!(decoded.client_id, CLIENT_ID);
        assert!(decoded.capabilities.is_empty());
        assert_eq!(decoded.listen_port, 30303);
        assert_eq!(decoded.node_id, node_key.public_key());
    }

    #[test]
    fn hello_rejects_oversize_client_id() {
        let node_key = SecretKey::random(&mut OsRng);
        let mut hello = HelloMessage::new(0, node_key.public_key());
        hello.client_id = "x".repeat(CLIENT_ID_MAX_LEN + 1);

        let mut buf = vec![];
        hello.encode(&mut buf);
        assert!(HelloMessage::decode(&buf).is_err());
    }

    #[test]
    fn hello_ignores_trailing_list_elements() {
        let node_key = SecretKey::random(&mut OsRng);
        let hello = HelloMessage::new(303, node_key.public_key());

        // Re-encode with an extra trailing field, as a future version might.
        let mut buf = vec![];
        Encoder::new(&mut buf)
            .encode_field(&hello.protocol_version)
            .encode_field(&hello.client_id)
            .encode_field(&hello.capabilities)
            .encode_field(&hello.listen_port)
            .encode_field(&pubkey2id(&hello.node_id))
            .encode_field(&"future")
            .finish();

        let decoded = HelloMessage::decode(&buf).unwrap();
        assert_eq!(decoded.listen_port, 303);
    }

    #[test]
    fn disconnect_reason_encodings() {
        // list form
        let msg = DisconnectMessage::new(Some(0x08));
        let mut buf = vec![];
        msg.encode(&mut buf);
        let decoded = DisconnectMessage::decode(&buf).unwrap();
        assert_eq!(decoded.reason(), DisconnectReason::ClientQuitting);

        // bare byte form
        let decoded = DisconnectMessage::decode(&[0x04]).unwrap();
        assert_eq!(decoded.reason(), DisconnectReason::TooManyPeers);

        // empty form
        let decoded = DisconnectMessage::decode(&[]).unwrap();
        assert_eq!(decoded.reason(), DisconnectReason::Unknown);
    }

    #[test]
    fn ping_pong_bodies_are_empty_lists() {
        let mut buf = vec![];
        PingMessage {}.encode(&mut buf);
        assert_eq!(buf, vec![0xc0]);
        assert!(PingMessage::decode(&buf).is_ok());

        let mut buf = vec![];
        PongMessage {}.encode(&mut buf);
        assert_eq!(buf, vec![0xc0]);
        assert!(PongMessage::decode(&buf).is_ok());

        // a non-empty body is rejected
        assert!(PingMessage::decode(&[0xc1, 0x01]).is_err());
    }
}

use aes::cipher::KeyIvInit;
use ethereum_types::{H256, H512};
use k256::{PublicKey, SecretKey};
use sha3::{Digest, Keccak256};
use tiny_ether_rlp::decode::RLPDecode;
use tracing::{debug, info};

use crate::P2P_VERSION;

use super::{
    error::RLPxError,
    frame,
    handshake::{decode_ack_message, decode_auth_message, encode_auth_message, encode_ack_message},
    message::Message,
    p2p::{DisconnectMessage, DisconnectReason, HelloMessage, PingMessage, PongMessage},
    utils::{ecdh_xchng, id2pubkey, pubkey2id},
};

pub(crate) type Aes256Ctr64BE = ctr::Ctr64BE<aes::Aes256>;

/// Event surfaced to the embedder by [`RLPxChannel::feed`].
#[derive(Debug)]
pub enum RLPxEvent {
    Hello {
        protocol_version: u8,
        client_id: String,
        capabilities: Vec<(String, u8)>,
        listen_port: u16,
        node_id: H512,
    },
    Disconnect(DisconnectReason),
    Ping,
    Pong,
}

/// One RLPx connection to a peer.
///
/// The channel is synchronous over byte buffers: the embedder owns the
/// socket, pushes whatever it reads through [`feed`](RLPxChannel::feed) and
/// transmits whatever [`take_outbound`](RLPxChannel::take_outbound) returns.
/// All fatal errors drop the session keys and leave the channel closed.
pub struct RLPxChannel {
    signer: SecretKey,
    listen_port: u16,
    state: RLPxChannelState,
    inbound: Vec<u8>,
    outbound: Vec<u8>,
}

impl RLPxChannel {
    /// `listen_port` is the TCP port advertised in the hello exchange; the
    /// node id is derived from `signer`.
    pub fn new(signer: SecretKey, listen_port: u16) -> Self {
        Self {
            signer,
            listen_port,
            state: RLPxChannelState::New,
            inbound: Vec::new(),
            outbound: Vec::new(),
        }
    }

    /// The local node id (uncompressed static public key, minus the tag byte).
    pub fn node_id(&self) -> H512 {
        pubkey2id(&self.signer.public_key())
    }

    /// The peer's node id, known once the handshake has completed.
    pub fn remote_node_id(&self) -> Result<H512, RLPxError> {
        match &self.state {
            RLPxChannelState::Established(state) => Ok(state.remote_node_id),
            _ => Err(RLPxError::InvalidState()),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, RLPxChannelState::Closed)
    }

    /// Starts a handshake towards `remote_node_id`, queueing the auth packet.
    pub fn connect(&mut self, remote_node_id: H512) -> Result<(), RLPxError> {
        if !matches!(self.state, RLPxChannelState::New) {
            return Err(RLPxError::InvalidState());
        }
        let mut rng = rand::thread_rng();
        let local_nonce = H256::random_using(&mut rng);
        let local_ephemeral_key = SecretKey::random(&mut rng);
        let peer_pk = id2pubkey(remote_node_id).ok_or(RLPxError::InvalidPeerId())?;

        let msg = encode_auth_message(&self.signer, local_nonce, &peer_pk, &local_ephemeral_key)?;
        self.outbound.extend_from_slice(&msg);

        self.state = RLPxChannelState::InitiatedAuth(InitiatedAuth {
            remote_node_id,
            local_nonce,
            local_ephemeral_key,
            local_init_message: msg,
        });
        debug!("Auth sent to {}, awaiting ack", hex::encode(remote_node_id));
        Ok(())
    }

    /// Parks the channel awaiting an auth packet from an inbound peer.
    pub fn accept(&mut self) -> Result<(), RLPxError> {
        if !matches!(self.state, RLPxChannelState::New) {
            return Err(RLPxError::InvalidState());
        }
        let mut rng = rand::thread_rng();
        self.state = RLPxChannelState::Receiver(Receiver {
            nonce: H256::random_using(&mut rng),
            ephemeral_key: SecretKey::random(&mut rng),
        });
        debug!("Awaiting auth");
        Ok(())
    }

    /// Appends inbound bytes and processes everything that is complete:
    /// handshake packets, then framed messages. Returns the events decoded
    /// from the input, in arrival order.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<RLPxEvent>, RLPxError> {
        if self.is_closed() {
            return Err(RLPxError::ChannelClosed);
        }
        self.inbound.extend_from_slice(bytes);

        let mut events = Vec::new();
        loop {
            match &self.state {
                RLPxChannelState::New => {
                    return Err(RLPxError::InvalidState());
                }
                RLPxChannelState::InitiatedAuth(_) | RLPxChannelState::Receiver(_) => {
                    if !self.try_advance_handshake()? {
                        break;
                    }
                }
                RLPxChannelState::Established(_) => match self.try_read_frame()? {
                    Some(frame_data) => {
                        if let Some(event) = self.dispatch_frame(&frame_data)? {
                            events.push(event);
                        }
                    }
                    None => break,
                },
                RLPxChannelState::Closed => break,
            }
        }
        Ok(events)
    }

    pub fn send_ping(&mut self) -> Result<(), RLPxError> {
        self.send_message(Message::Ping(PingMessage {}))
    }

    pub fn send_pong(&mut self) -> Result<(), RLPxError> {
        self.send_message(Message::Pong(PongMessage {}))
    }

    /// Notifies the peer and closes the channel.
    pub fn send_disconnect(&mut self, reason: DisconnectReason) -> Result<(), RLPxError> {
        self.send_message(Message::Disconnect(DisconnectMessage::new(Some(
            reason as u8,
        ))))?;
        info!("Disconnecting: {reason}");
        self.close();
        Ok(())
    }

    /// Drains the bytes the embedder must transmit to the peer.
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }

    /// Closes the channel, dropping session secrets and any partially
    /// buffered input.
    pub fn close(&mut self) {
        if let RLPxChannelState::Established(state) = &mut self.state {
            state.mac_key = H256::zero();
        }
        self.inbound.clear();
        self.state = RLPxChannelState::Closed;
    }

    /// Consumes one size-prefixed handshake packet from the inbound buffer,
    /// if complete. Returns whether any progress was made.
    fn try_advance_handshake(&mut self) -> Result<bool, RLPxError> {
        if self.inbound.len() < 2 {
            return Ok(false);
        }
        let msg_size = u16::from_be_bytes([self.inbound[0], self.inbound[1]]) as usize;
        if self.inbound.len() < msg_size + 2 {
            return Ok(false);
        }
        let msg_bytes: Vec<u8> = self.inbound.drain(..msg_size + 2).collect();

        let state = std::mem::replace(&mut self.state, RLPxChannelState::Closed);
        let established = match state {
            RLPxChannelState::InitiatedAuth(prev) => self.recv_ack(prev, msg_bytes),
            RLPxChannelState::Receiver(prev) => self.recv_auth(prev, msg_bytes),
            _ => Err(RLPxError::InvalidState()),
        };
        match established {
            Ok(established) => {
                self.state = RLPxChannelState::Established(Box::new(established));
                info!("Completed handshake");
                // The first frame in each direction is the hello exchange.
                let hello = Message::Hello(HelloMessage::new(
                    self.listen_port,
                    self.signer.public_key(),
                ));
                if let Err(error) = self.send_message(hello) {
                    return Err(self.fail(error));
                }
                Ok(true)
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    fn recv_ack(
        &mut self,
        previous_state: InitiatedAuth,
        msg_bytes: Vec<u8>,
    ) -> Result<Established, RLPxError> {
        let ack = decode_ack_message(&self.signer, &msg_bytes[2..], &msg_bytes[..2])?;
        let remote_ephemeral_key = ack.get_ephemeral_pubkey().ok_or(RLPxError::HandshakeError(
            "invalid remote ephemeral key".to_string(),
        ))?;
        Ok(Established::for_initiator(
            previous_state,
            msg_bytes,
            ack.nonce,
            remote_ephemeral_key,
        ))
    }

    fn recv_auth(
        &mut self,
        previous_state: Receiver,
        msg_bytes: Vec<u8>,
    ) -> Result<Established, RLPxError> {
        let (auth, remote_ephemeral_key) =
            decode_auth_message(&self.signer, &msg_bytes[2..], &msg_bytes[..2])?;
        let peer_pk = id2pubkey(auth.node_id).ok_or(RLPxError::InvalidPeerId())?;

        let received = ReceivedAuth {
            local_nonce: previous_state.nonce,
            local_ephemeral_key: previous_state.ephemeral_key,
            remote_node_id: auth.node_id,
            remote_nonce: auth.nonce,
            remote_ephemeral_key,
            remote_init_message: msg_bytes,
        };

        let ack_msg = encode_ack_message(
            &received.local_ephemeral_key,
            received.local_nonce,
            &peer_pk,
        )?;
        self.outbound.extend_from_slice(&ack_msg);

        Ok(Established::for_receiver(received, ack_msg))
    }

    /// Reads one complete frame from the inbound buffer, if available.
    fn try_read_frame(&mut self) -> Result<Option<Vec<u8>>, RLPxError> {
        let RLPxChannelState::Established(state) = &mut self.state else {
            return Err(RLPxError::InvalidState());
        };
        match frame::read(state, &self.inbound) {
            Ok((frame_data, consumed)) => {
                self.inbound.drain(..consumed);
                Ok(frame_data)
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    fn dispatch_frame(&mut self, frame_data: &[u8]) -> Result<Option<RLPxEvent>, RLPxError> {
        let (msg_id, msg_data): (u8, &[u8]) = match RLPDecode::decode_unfinished(frame_data) {
            Ok(decoded) => decoded,
            Err(error) => return Err(self.abort_on_protocol_error(error.into())),
        };
        let message = match Message::decode(msg_id, msg_data) {
            Ok(message) => message,
            Err(error) => return Err(self.abort_on_protocol_error(error)),
        };
        debug!("Received {message}");

        let hello_received = match &self.state {
            RLPxChannelState::Established(state) => state.hello_received,
            _ => return Err(RLPxError::InvalidState()),
        };

        match message {
            Message::Hello(hello) => {
                if hello_received {
                    return Err(self.abort_on_protocol_error(RLPxError::ProtocolError(
                        "duplicate hello".to_string(),
                    )));
                }
                if hello.protocol_version < P2P_VERSION {
                    return Err(self.abort(
                        DisconnectReason::IncompatibleVersion,
                        RLPxError::HandshakeError(format!(
                            "incompatible protocol version {}",
                            hello.protocol_version
                        )),
                    ));
                }
                let node_id = pubkey2id(&hello.node_id);
                let remote_node_id = match &mut self.state {
                    RLPxChannelState::Established(state) => {
                        state.hello_received = true;
                        state.remote_node_id
                    }
                    _ => return Err(RLPxError::InvalidState()),
                };
                if node_id != remote_node_id {
                    return Err(self.abort(
                        DisconnectReason::UnexpectedIdentity,
                        RLPxError::HandshakeError(
                            "hello node id does not match the handshake identity".to_string(),
                        ),
                    ));
                }
                Ok(Some(RLPxEvent::Hello {
                    protocol_version: hello.protocol_version,
                    client_id: hello.client_id,
                    capabilities: hello.capabilities,
                    listen_port: hello.listen_port,
                    node_id,
                }))
            }
            Message::Disconnect(disconnect) => {
                let reason = disconnect.reason();
                info!("Received Disconnect: {reason}");
                self.close();
                Ok(Some(RLPxEvent::Disconnect(reason)))
            }
            Message::Ping(_) if hello_received => Ok(Some(RLPxEvent::Ping)),
            Message::Pong(_) if hello_received => Ok(Some(RLPxEvent::Pong)),
            _ => Err(self.abort_on_protocol_error(RLPxError::ProtocolError(
                "message received before hello".to_string(),
            ))),
        }
    }

    fn send_message(&mut self, message: Message) -> Result<(), RLPxError> {
        match &mut self.state {
            RLPxChannelState::Established(state) => {
                let mut frame_buffer = vec![];
                message.encode(&mut frame_buffer);
                frame::write(frame_buffer, state, &mut self.outbound)?;
                Ok(())
            }
            RLPxChannelState::Closed => Err(RLPxError::ChannelClosed),
            _ => Err(RLPxError::InvalidState()),
        }
    }

    /// Notifies the peer of a protocol breach, then closes the channel.
    fn abort_on_protocol_error(&mut self, error: RLPxError) -> RLPxError {
        self.abort(DisconnectReason::ProtocolError, error)
    }

    fn abort(&mut self, reason: DisconnectReason, error: RLPxError) -> RLPxError {
        // Best effort; the egress direction may still be usable.
        let _ = self.send_message(Message::Disconnect(DisconnectMessage::new(Some(
            reason as u8,
        ))));
        self.fail(error)
    }

    fn fail(&mut self, error: RLPxError) -> RLPxError {
        self.close();
        error
    }
}

enum RLPxChannelState {
    New,
    InitiatedAuth(InitiatedAuth),
    Receiver(Receiver),
    Established(Box<Established>),
    Closed,
}

pub(crate) struct Receiver {
    pub(crate) nonce: H256,
    pub(crate) ephemeral_key: SecretKey,
}

pub(crate) struct InitiatedAuth {
    pub(crate) remote_node_id: H512,
    pub(crate) local_nonce: H256,
    pub(crate) local_ephemeral_key: SecretKey,
    pub(crate) local_init_message: Vec<u8>,
}

pub(crate) struct ReceivedAuth {
    pub(crate) local_nonce: H256,
    pub(crate) local_ephemeral_key: SecretKey,
    pub(crate) remote_node_id: H512,
    pub(crate) remote_nonce: H256,
    pub(crate) remote_ephemeral_key: PublicKey,
    pub(crate) remote_init_message: Vec<u8>,
}

pub(crate) struct Established {
    pub(crate) remote_node_id: H512,
    pub(crate) mac_key: H256,
    pub(crate) ingress_mac: Keccak256,
    pub(crate) egress_mac: Keccak256,
    pub(crate) ingress_aes: Aes256Ctr64BE,
    pub(crate) egress_aes: Aes256Ctr64BE,
    /// Body size decoded from a frame header whose body has not arrived yet.
    pub(crate) pending_frame_size: Option<usize>,
    pub(crate) hello_received: bool,
}

impl Established {
    pub(crate) fn for_receiver(previous_state: ReceivedAuth, init_message: Vec<u8>) -> Self {
        // keccak256(nonce || initiator-nonce)
        // Remote node is initiator
        let hashed_nonces = Keccak256::digest(
            [previous_state.local_nonce.0, previous_state.remote_nonce.0].concat(),
        )
        .into();

        Self::new(
            previous_state.remote_node_id,
            init_message,
            previous_state.local_nonce,
            previous_state.local_ephemeral_key,
            hashed_nonces,
            previous_state.remote_init_message,
            previous_state.remote_nonce,
            previous_state.remote_ephemeral_key,
        )
    }

    pub(crate) fn for_initiator(
        previous_state: InitiatedAuth,
        remote_init_message: Vec<u8>,
        remote_nonce: H256,
        remote_ephemeral_key: PublicKey,
    ) -> Self {
        // keccak256(nonce || initiator-nonce)
        // Local node is initiator
        let hashed_nonces =
            Keccak256::digest([remote_nonce.0, previous_state.local_nonce.0].concat()).into();

        Self::new(
            previous_state.remote_node_id,
            previous_state.local_init_message,
            previous_state.local_nonce,
            previous_state.local_ephemeral_key,
            hashed_nonces,
            remote_init_message,
            remote_nonce,
            remote_ephemeral_key,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        remote_node_id: H512,
        local_init_message: Vec<u8>,
        local_nonce: H256,
        local_ephemeral_key: SecretKey,
        hashed_nonces: [u8; 32],
        remote_init_message: Vec<u8>,
        remote_nonce: H256,
        remote_ephemeral_key: PublicKey,
    ) -> Self {
        let ephemeral_key_secret = ecdh_xchng(&local_ephemeral_key, &remote_ephemeral_key);

        // shared-secret = keccak256(ephemeral-key || keccak256(nonce || initiator-nonce))
        let shared_secret =
            Keccak256::digest([ephemeral_key_secret, hashed_nonces].concat()).into();
        // aes-secret = keccak256(ephemeral-key || shared-secret)
        let aes_key =
            H256(Keccak256::digest([ephemeral_key_secret, shared_secret].concat()).into());
        // mac-secret = keccak256(ephemeral-key || aes-secret)
        let mac_key = H256(Keccak256::digest([ephemeral_key_secret, aes_key.0].concat()).into());

        // egress-mac = keccak256.init((mac-secret ^ remote-nonce) || auth)
        let egress_mac = Keccak256::default()
            .chain_update(mac_key ^ remote_nonce)
            .chain_update(&local_init_message);

        // ingress-mac = keccak256.init((mac-secret ^ initiator-nonce) || ack)
        let ingress_mac = Keccak256::default()
            .chain_update(mac_key ^ local_nonce)
            .chain_update(&remote_init_message);

        // Frame AES runs a single continuous zero-IV counter per direction.
        let ingress_aes = <Aes256Ctr64BE as KeyIvInit>::new(&aes_key.0.into(), &[0; 16].into());
        let egress_aes = ingress_aes.clone();
        Self {
            remote_node_id,
            mac_key,
            ingress_mac,
            egress_mac,
            ingress_aes,
            egress_aes,
            pending_frame_size: None,
            hello_received: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use crate::CLIENT_ID;

    use super::*;

    fn channel_pair() -> (RLPxChannel, RLPxChannel) {
        let a_key = SecretKey::random(&mut OsRng);
        let b_key = SecretKey::random(&mut OsRng);
        let a = RLPxChannel::new(a_key, 30303);
        let b = RLPxChannel::new(b_key, 30304);
        (a, b)
    }

    /// Runs the handshake and hello exchange; returns the hello events seen
    /// by each side.
    fn establish(a: &mut RLPxChannel, b: &mut RLPxChannel) -> (Vec<RLPxEvent>, Vec<RLPxEvent>) {
        let b_id = b.node_id();
        b.accept().unwrap();
        a.connect(b_id).unwrap();

        // auth -> b; b answers with ack + hello
        let b_events = b.feed(&a.take_outbound()).unwrap();
        // ack + hello -> a; a answers with its own hello
        let a_events = a.feed(&b.take_outbound()).unwrap();
        // hello -> b
        let b_hello = b.feed(&a.take_outbound()).unwrap();

        (a_events, [b_events, b_hello].into_iter().flatten().collect())
    }

    #[test]
    fn full_session_handshake_and_hello() {
        let (mut a, mut b) = channel_pair();
        let (a_events, b_events) = establish(&mut a, &mut b);

        assert_eq!(a_events.len(), 1);
        assert!(matches!(
            &a_events[0],
            RLPxEvent::Hello { client_id, listen_port: 30304, .. } if client_id == CLIENT_ID
        ));
        assert_eq!(b_events.len(), 1);
        assert!(matches!(
            &b_events[0],
            RLPxEvent::Hello { protocol_version: 4, listen_port: 30303, .. }
        ));

        assert_eq!(a.remote_node_id().unwrap(), b.node_id());
        assert_eq!(b.remote_node_id().unwrap(), a.node_id());
    }

    #[test]
    fn ping_pong_roundtrip() {
        let (mut a, mut b) = channel_pair();
        establish(&mut a, &mut b);

        a.send_ping().unwrap();
        let events = b.feed(&a.take_outbound()).unwrap();
        assert!(matches!(events[..], [RLPxEvent::Ping]));

        b.send_pong().unwrap();
        let events = a.feed(&b.take_outbound()).unwrap();
        assert!(matches!(events[..], [RLPxEvent::Pong]));
    }

    #[test]
    fn feed_handles_partial_and_coalesced_input() {
        let (mut a, mut b) = channel_pair();
        establish(&mut a, &mut b);

        // Two frames delivered byte by byte.
        a.send_ping().unwrap();
        a.send_ping().unwrap();
        let wire = a.take_outbound();

        let mut events = Vec::new();
        for byte in wire {
            events.extend(b.feed(&[byte]).unwrap());
        }
        assert!(matches!(events[..], [RLPxEvent::Ping, RLPxEvent::Ping]));
    }

    #[test]
    fn disconnect_roundtrip_closes_both_ends() {
        let (mut a, mut b) = channel_pair();
        establish(&mut a, &mut b);

        a.send_disconnect(DisconnectReason::ClientQuitting).unwrap();
        assert!(a.is_closed());
        assert!(matches!(a.send_ping(), Err(RLPxError::ChannelClosed)));

        let events = b.feed(&a.take_outbound()).unwrap();
        assert!(matches!(
            events[..],
            [RLPxEvent::Disconnect(DisconnectReason::ClientQuitting)]
        ));
        assert!(b.is_closed());
        assert!(matches!(b.send_ping(), Err(RLPxError::ChannelClosed)));
    }

    #[test]
    fn tampered_frame_closes_the_channel() {
        let (mut a, mut b) = channel_pair();
        establish(&mut a, &mut b);

        a.send_ping().unwrap();
        let mut wire = a.take_outbound();
        // Flip a bit in the body mac (the trailing 16 bytes).
        let last = wire.len() - 1;
        wire[last] ^= 0x01;

        let result = b.feed(&wire);
        assert!(matches!(result, Err(RLPxError::BodyMacMismatch)));
        assert!(b.is_closed());
    }

    #[test]
    fn handshake_runs_at_most_once() {
        let (mut a, mut b) = channel_pair();
        let b_id = b.node_id();
        b.accept().unwrap();
        a.connect(b_id).unwrap();

        // Neither side may restart the handshake.
        assert!(matches!(a.connect(b_id), Err(RLPxError::InvalidState())));
        assert!(matches!(b.accept(), Err(RLPxError::InvalidState())));
    }

    #[test]
    fn initiator_secrets_match_the_eip8_vector() {
        use hex_literal::hex;

        // Ack₂ from EIP-8, decoded with keyA; the expected mac-secret is the
        // published key-material value for that exchange.
        let ack = hex!("01ea0451958701280a56482929d3b0757da8f7fbe5286784beead59d95089c217c9b917788989470b0e330cc6e4fb383c0340ed85fab836ec9fb8a49672712aeabbdfd1e837c1ff4cace34311cd7f4de05d59279e3524ab26ef753a0095637ac88f2b499b9914b5f64e143eae548a1066e14cd2f4bd7f814c4652f11b254f8a2d0191e2f5546fae6055694aed14d906df79ad3b407d94692694e259191cde171ad542fc588fa2b7333313d82a9f887332f1dfc36cea03f831cb9a23fea05b33deb999e85489e645f6aab1872475d488d7bd6c7c120caf28dbfc5d6833888155ed69d34dbdc39c1f299be1057810f34fbe754d021bfca14dc989753d61c413d261934e1a9c67ee060a25eefb54e81a4d14baff922180c395d3f998d70f46f6b58306f969627ae364497e73fc27f6d17ae45a413d322cb8814276be6ddd13b885b201b943213656cde498fa0e9ddc8e0b8f8a53824fbd82254f3e2c17e8eaea009c38b4aa0a3f306e8797db43c25d68e86f262e564086f59a2fc60511c42abfb3057c247a8a8fe4fb3ccbadde17514b7ac8000cdb6a912778426260c47f38919a91f25f4b5ffb455d6aaaf150f7e5529c100ce62d6d92826a71778d809bdf60232ae21ce8a437eca8223f45ac37f6487452ce626f549b3b5fdee26afd2072e4bc75833c2464c805246155289f4");
        let static_key = SecretKey::from_slice(&hex!(
            "49a7b37aa6f6645917e7b807e9d1c00d4fa71f18343b0d4122a4d2df64dd6fee"
        ))
        .unwrap();
        let local_nonce = H256(hex!(
            "7e968bba13b6c50e2c4cd7f241cc0d64d1ac25c7f5952df231ac6a2bda8ee5d6"
        ));
        let local_ephemeral_key = SecretKey::from_slice(&hex!(
            "869d6ecf5211f1cc60418a13b9d870b22959d0c16f02bec714c960dd2298a32d"
        ))
        .unwrap();

        let ack_msg = decode_ack_message(&static_key, &ack[2..], &ack[..2]).unwrap();
        let established = Established::for_initiator(
            InitiatedAuth {
                remote_node_id: H512::zero(),
                local_nonce,
                local_ephemeral_key,
                // The init messages only seed the MAC chains, not the secrets.
                local_init_message: vec![],
            },
            ack.to_vec(),
            ack_msg.nonce,
            ack_msg.get_ephemeral_pubkey().unwrap(),
        );

        assert_eq!(
            established.mac_key.0,
            hex!("2ea74ec5dae199227dff1af715362700e989d889d7a493cb0639691efb8e5f98")
        );
    }

    #[test]
    fn garbage_auth_closes_the_receiver() {
        let (_, mut b) = channel_pair();
        b.accept().unwrap();

        // A size prefix followed by random junk.
        let mut junk = vec![0x00, 0x20];
        junk.extend_from_slice(&[0xAB; 0x20]);
        assert!(b.feed(&junk).is_err());
        assert!(b.is_closed());
    }
}

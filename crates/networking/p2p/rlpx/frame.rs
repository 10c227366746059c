use aes::{
    cipher::{BlockEncrypt as _, KeyInit as _, StreamCipher as _},
    Aes256Enc,
};
use ethereum_types::H128;
use sha3::Digest as _;
use tiny_ether_rlp::{encode::RLPEncode as _, structs::Decoder};

use super::{channel::Established, error::RLPxError};

/// The frame header carries the body size in 3 bytes.
const MAX_BODY_SIZE: usize = 1 << 24;

/// Encrypts and MAC-chains `frame_data` as one frame, appending
/// `header || header-mac || body || body-mac` to `out`.
pub(crate) fn write(
    mut frame_data: Vec<u8>,
    state: &mut Established,
    out: &mut Vec<u8>,
) -> Result<(), RLPxError> {
    if frame_data.len() >= MAX_BODY_SIZE {
        return Err(RLPxError::OversizeFrame(frame_data.len()));
    }
    let mac_aes_cipher = Aes256Enc::new_from_slice(&state.mac_key.0)?;

    // header = frame-size || header-data || header-padding
    let mut header = Vec::with_capacity(32);
    let frame_size = frame_data.len().to_be_bytes();
    header.extend_from_slice(&frame_size[5..8]);

    // header-data = [protocol-id, context-id]  (both always zero)
    let header_data = (0_u8, 0_u8);
    header_data.encode(&mut header);

    header.resize(16, 0);
    state.egress_aes.try_apply_keystream(&mut header[..16])?;

    // header-mac-seed = aes(mac-secret, keccak256.digest(egress-mac)[:16]) ^ header-ciphertext
    let header_mac_seed = {
        let mac_digest: [u8; 16] = state.egress_mac.clone().finalize()[..16]
            .try_into()
            .unwrap();
        let mut seed = mac_digest.into();
        mac_aes_cipher.encrypt_block(&mut seed);
        H128(seed.into()) ^ H128(header[..16].try_into().unwrap())
    };
    state.egress_mac.update(header_mac_seed);
    let header_mac = state.egress_mac.clone().finalize();
    header.extend_from_slice(&header_mac[..16]);
    out.extend_from_slice(&header);

    // Pad the body to the next multiple of the block size
    frame_data.resize(frame_data.len().next_multiple_of(16), 0);
    state.egress_aes.try_apply_keystream(&mut frame_data)?;
    let frame_ciphertext = frame_data;
    out.extend_from_slice(&frame_ciphertext);

    // frame-mac-seed = aes(mac-secret, keccak256.digest(egress-mac)[:16]) ^ keccak256.digest(egress-mac)[:16]
    state.egress_mac.update(&frame_ciphertext);
    let frame_mac_seed = {
        let mac_digest: [u8; 16] = state.egress_mac.clone().finalize()[..16]
            .try_into()
            .unwrap();
        let mut seed = mac_digest.into();
        mac_aes_cipher.encrypt_block(&mut seed);
        (H128(seed.into()) ^ H128(mac_digest)).0
    };
    state.egress_mac.update(frame_mac_seed);
    let frame_mac = state.egress_mac.clone().finalize();
    out.extend_from_slice(&frame_mac[..16]);

    Ok(())
}

/// Verifies, decrypts and strips one frame from the front of `buf`.
///
/// Returns the decoded frame body (or `None` if `buf` does not yet hold a
/// complete section) along with the number of bytes consumed. The header is
/// processed as soon as its 32 bytes are complete; its decoded body size is
/// parked in the coder state until the body section arrives.
pub(crate) fn read(
    state: &mut Established,
    buf: &[u8],
) -> Result<(Option<Vec<u8>>, usize), RLPxError> {
    let mac_aes_cipher = Aes256Enc::new_from_slice(&state.mac_key.0)?;
    let mut consumed = 0;

    if state.pending_frame_size.is_none() {
        // header (16) || header-mac (16)
        if buf.len() < 32 {
            return Ok((None, 0));
        }
        let (header_ciphertext, header_mac) = buf[..32].split_at(16);

        // header-mac-seed = aes(mac-secret, keccak256.digest(ingress-mac)[:16]) ^ header-ciphertext
        let header_mac_seed = {
            let mac_digest: [u8; 16] = state.ingress_mac.clone().finalize()[..16]
                .try_into()
                .unwrap();
            let mut seed = mac_digest.into();
            mac_aes_cipher.encrypt_block(&mut seed);
            (H128(seed.into()) ^ H128(header_ciphertext.try_into().unwrap())).0
        };
        state.ingress_mac.update(header_mac_seed);
        let expected_header_mac: [u8; 16] = state.ingress_mac.clone().finalize()[..16]
            .try_into()
            .unwrap();
        if header_mac != expected_header_mac {
            return Err(RLPxError::HeaderMacMismatch);
        }

        let mut header_text: [u8; 16] = header_ciphertext.try_into().unwrap();
        state.ingress_aes.try_apply_keystream(&mut header_text)?;

        // header-data = [protocol-id, context-id]; only the base protocol is spoken
        let decoder = Decoder::new(&header_text[3..])?;
        let (protocol_id, decoder): (u8, _) = decoder.decode_field("protocol-id")?;
        let (_context_id, decoder): (Option<u8>, _) = decoder.decode_optional_field();
        decoder.finish_unchecked();
        if protocol_id != 0 {
            return Err(RLPxError::ProtocolError(format!(
                "unknown subprotocol id {protocol_id}"
            )));
        }

        let frame_size =
            u32::from_be_bytes([0, header_text[0], header_text[1], header_text[2]]) as usize;
        state.pending_frame_size = Some(frame_size);
        consumed += 32;
    }

    let Some(frame_size) = state.pending_frame_size else {
        return Ok((None, consumed));
    };

    // body (padded to 16) || body-mac (16)
    let padded_size = frame_size.next_multiple_of(16);
    let rest = &buf[consumed..];
    if rest.len() < padded_size + 16 {
        return Ok((None, consumed));
    }
    let (frame_ciphertext, frame_mac) = rest[..padded_size + 16].split_at(padded_size);

    state.ingress_mac.update(frame_ciphertext);
    let frame_mac_seed = {
        let mac_digest: [u8; 16] = state.ingress_mac.clone().finalize()[..16]
            .try_into()
            .unwrap();
        let mut seed = mac_digest.into();
        mac_aes_cipher.encrypt_block(&mut seed);
        (H128(seed.into()) ^ H128(mac_digest)).0
    };
    state.ingress_mac.update(frame_mac_seed);
    let expected_frame_mac: [u8; 16] = state.ingress_mac.clone().finalize()[..16]
        .try_into()
        .unwrap();
    if frame_mac != expected_frame_mac {
        return Err(RLPxError::BodyMacMismatch);
    }

    let mut frame_data = frame_ciphertext.to_vec();
    state.ingress_aes.try_apply_keystream(&mut frame_data)?;
    frame_data.truncate(frame_size);

    state.pending_frame_size = None;
    consumed += padded_size + 16;
    Ok((Some(frame_data), consumed))
}

#[cfg(test)]
mod tests {
    use ethereum_types::{H256, H512};
    use k256::SecretKey;
    use sha3::Digest as _;

    use super::*;
    use crate::rlpx::channel::{Established, InitiatedAuth, ReceivedAuth};

    /// Builds a matching initiator/receiver coder pair from fixed handshake
    /// artifacts, as secret derivation would after a real auth/ack exchange.
    fn coder_pair(seed: u8) -> (Established, Established) {
        let a_ephemeral = SecretKey::from_slice(&[seed; 32]).unwrap();
        let b_ephemeral = SecretKey::from_slice(&[seed + 1; 32]).unwrap();
        let nonce_a = H256([seed + 2; 32]);
        let nonce_b = H256([seed + 3; 32]);
        let auth = vec![0xAA; 307];
        let ack = vec![0xBB; 210];

        let initiator = Established::for_initiator(
            InitiatedAuth {
                remote_node_id: H512::zero(),
                local_nonce: nonce_a,
                local_ephemeral_key: a_ephemeral.clone(),
                local_init_message: auth.clone(),
            },
            ack.clone(),
            nonce_b,
            b_ephemeral.public_key(),
        );
        let receiver = Established::for_receiver(
            ReceivedAuth {
                local_nonce: nonce_b,
                local_ephemeral_key: b_ephemeral,
                remote_node_id: H512::zero(),
                remote_nonce: nonce_a,
                remote_ephemeral_key: a_ephemeral.public_key(),
                remote_init_message: auth,
            },
            ack,
        );
        (initiator, receiver)
    }

    #[test]
    fn both_sides_derive_the_same_secrets() {
        let (initiator, receiver) = coder_pair(1);
        assert_eq!(initiator.mac_key, receiver.mac_key);
        assert_eq!(
            initiator.egress_mac.clone().finalize(),
            receiver.ingress_mac.clone().finalize()
        );
        assert_eq!(
            initiator.ingress_mac.clone().finalize(),
            receiver.egress_mac.clone().finalize()
        );
    }

    #[test]
    fn frame_loopback() {
        let (mut a, mut b) = coder_pair(1);

        // a Ping message: msg id then empty list
        let mut wire = vec![];
        write(vec![0x02, 0xc0], &mut a, &mut wire).unwrap();
        assert_eq!(wire.len(), 32 + 16 + 16);

        let (frame_data, consumed) = read(&mut b, &wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(frame_data.unwrap(), vec![0x02, 0xc0]);

        // The MAC chains advanced in lockstep.
        assert_eq!(
            a.egress_mac.clone().finalize(),
            b.ingress_mac.clone().finalize()
        );
    }

    #[test]
    fn decode_works_across_partial_buffers() {
        let (mut a, mut b) = coder_pair(1);
        let mut wire = vec![];
        write(vec![0x03, 0xc0], &mut a, &mut wire).unwrap();

        // Nothing to do below a complete header section.
        let (frame_data, consumed) = read(&mut b, &wire[..31]).unwrap();
        assert!(frame_data.is_none());
        assert_eq!(consumed, 0);

        // The header is consumed as soon as it is complete.
        let (frame_data, consumed) = read(&mut b, &wire[..40]).unwrap();
        assert!(frame_data.is_none());
        assert_eq!(consumed, 32);

        // The body completes the frame.
        let (frame_data, consumed) = read(&mut b, &wire[32..]).unwrap();
        assert_eq!(consumed, wire.len() - 32);
        assert_eq!(frame_data.unwrap(), vec![0x03, 0xc0]);
    }

    #[test]
    fn wire_output_is_deterministic() {
        let (mut a1, _) = coder_pair(7);
        let (mut a2, _) = coder_pair(7);

        let mut wire1 = vec![];
        let mut wire2 = vec![];
        for body in [vec![0x02, 0xc0], vec![0x03, 0xc0], vec![0x01, 0xc1, 0x08]] {
            write(body.clone(), &mut a1, &mut wire1).unwrap();
            write(body, &mut a2, &mut wire2).unwrap();
        }
        assert_eq!(wire1, wire2);
    }

    #[test]
    fn back_to_back_frames_decode_in_order() {
        let (mut a, mut b) = coder_pair(1);
        let mut wire = vec![];
        write(vec![0x02, 0xc0], &mut a, &mut wire).unwrap();
        write(vec![0x03, 0xc0], &mut a, &mut wire).unwrap();

        let (first, consumed) = read(&mut b, &wire).unwrap();
        assert_eq!(first.unwrap(), vec![0x02, 0xc0]);
        let (second, _) = read(&mut b, &wire[consumed..]).unwrap();
        assert_eq!(second.unwrap(), vec![0x03, 0xc0]);
    }

    #[test]
    fn tampering_with_any_section_fails_the_mac() {
        // header, header-mac, body, body-mac
        let tamper_offsets = [3, 20, 35, 60];
        for offset in tamper_offsets {
            let (mut a, mut b) = coder_pair(1);
            let mut wire = vec![];
            write(vec![0x02, 0xc0], &mut a, &mut wire).unwrap();
            wire[offset] ^= 0x01;

            let result = read(&mut b, &wire);
            if offset < 32 {
                assert!(matches!(result, Err(RLPxError::HeaderMacMismatch)));
            } else {
                assert!(matches!(result, Err(RLPxError::BodyMacMismatch)));
            }
        }
    }

    #[test]
    fn oversize_bodies_are_rejected() {
        let (mut a, _) = coder_pair(1);
        let mut wire = vec![];
        let result = write(vec![0; MAX_BODY_SIZE], &mut a, &mut wire);
        assert!(matches!(result, Err(RLPxError::OversizeFrame(_))));
    }
}

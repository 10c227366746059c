use aes::cipher::{KeyIvInit, StreamCipher};
use ethereum_types::H128;
use k256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use rand::{Rng, RngCore};

use super::{
    error::RLPxError,
    utils::{ecdh_xchng, kdf, sha256, sha256_hmac},
};

type Aes128Ctr64BE = ctr::Ctr64BE<aes::Aes128>;

const PUBKEY_SIZE: usize = 65;
const IV_SIZE: usize = 16;
const MAC_FOOTER_SIZE: usize = 32;

// Handshake packets are padded to make them distinguishable from
// pre-EIP-8 handshakes.
const MIN_PAD: usize = 100;
const MAX_PAD: usize = 250;

/// Encrypts a handshake payload to the remote party's static key.
///
/// The returned packet is the full wire form,
/// `size(2) || ephemeral-pubkey(65) || iv(16) || ciphertext || mac(32)`,
/// with the big-endian size prefix doubling as the HMAC associated data.
pub(crate) fn encrypt(
    remote_static_pubkey: &PublicKey,
    mut encoded_msg: Vec<u8>,
) -> Result<Vec<u8>, RLPxError> {
    let mut rng = rand::thread_rng();

    // Pad with a random amount of random data.
    let padding_length = rng.gen_range(MIN_PAD..=MAX_PAD);
    let payload_length = encoded_msg.len();
    encoded_msg.resize(payload_length + padding_length, 0);
    rng.fill_bytes(&mut encoded_msg[payload_length..]);

    // Precompute the size of the message. This is needed for computing the MAC.
    let ecies_overhead = PUBKEY_SIZE + IV_SIZE + MAC_FOOTER_SIZE;
    let auth_size: u16 = (encoded_msg.len() + ecies_overhead)
        .try_into()
        .map_err(|_| RLPxError::InvalidMessageLength())?;
    let auth_size_bytes = auth_size.to_be_bytes();

    // Generate a keypair just for this message.
    let message_secret_key = SecretKey::random(&mut rng);

    // Derive a shared secret for this message.
    let message_secret = ecdh_xchng(&message_secret_key, remote_static_pubkey);

    // Derive the AES and MAC keys from the message secret.
    let mut secret_keys = [0; 32];
    kdf(&message_secret, &mut secret_keys)?;
    let aes_key = &secret_keys[..16];
    let mac_key = sha256(&secret_keys[16..]);

    // Use the AES secret to encrypt the message.
    let iv = H128::random_using(&mut rng);
    let mut aes_cipher = Aes128Ctr64BE::new_from_slices(aes_key, &iv.0)?;
    aes_cipher.try_apply_keystream(&mut encoded_msg)?;
    let encrypted_msg = encoded_msg;

    // Use the MAC secret to authenticate iv, ciphertext and size prefix.
    let r_public_key = message_secret_key.public_key().to_encoded_point(false);
    let mac_footer = sha256_hmac(&mac_key, &[&iv.0, &encrypted_msg], &auth_size_bytes)?;

    Ok([
        &auth_size_bytes,
        r_public_key.as_bytes(),
        &iv.0,
        &encrypted_msg,
        &mac_footer,
    ]
    .concat())
}

/// Decrypts a handshake packet addressed to `static_key`.
///
/// `msg` is the packet without its 2-byte size prefix; `auth_data` is that
/// prefix, fed back in as the HMAC associated data. The MAC comparison is
/// constant time; any discrepancy is [`RLPxError::HmacMismatch`].
pub(crate) fn decrypt(
    static_key: &SecretKey,
    msg: &[u8],
    auth_data: &[u8],
) -> Result<Vec<u8>, RLPxError> {
    if msg.len() < PUBKEY_SIZE + IV_SIZE + MAC_FOOTER_SIZE {
        return Err(RLPxError::InvalidMessageLength());
    }

    // Split the message into its components. General layout is:
    // public-key (65) || iv (16) || ciphertext || mac (32)
    let (pk, rest) = msg.split_at(PUBKEY_SIZE);
    let (iv, rest) = rest.split_at(IV_SIZE);
    let (c, d) = rest.split_at(rest.len() - MAC_FOOTER_SIZE);

    // Derive the message shared secret.
    let shared_secret = ecdh_xchng(static_key, &PublicKey::from_sec1_bytes(pk)?);

    // Derive the AES and MAC keys from the message shared secret.
    let mut buf = [0; 32];
    kdf(&shared_secret, &mut buf)?;
    let aes_key = &buf[..16];
    let mac_key = sha256(&buf[16..]);

    // Verify the MAC before touching the ciphertext.
    verify_sha256_hmac(&mac_key, &[iv, c], auth_data, d)?;

    // Decrypt the message with the AES key.
    let mut stream_cipher = Aes128Ctr64BE::new_from_slices(aes_key, iv)?;
    let mut decoded = c.to_vec();
    stream_cipher.try_apply_keystream(&mut decoded)?;
    Ok(decoded)
}

fn verify_sha256_hmac(
    key: &[u8],
    inputs: &[&[u8]],
    auth_data: &[u8],
    tag: &[u8],
) -> Result<(), RLPxError> {
    use hmac::Mac;
    use k256::sha2::Sha256;

    let mut hasher = hmac::Hmac::<Sha256>::new_from_slice(key)
        .map_err(|error| RLPxError::CryptographyError(error.to_string()))?;
    for input in inputs {
        hasher.update(input);
    }
    hasher.update(auth_data);
    hasher.verify_slice(tag).map_err(|_| RLPxError::HmacMismatch)
}

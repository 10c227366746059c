use ethereum_types::H512;
use k256::{
    elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint},
    EncodedPoint, PublicKey, SecretKey,
};
use sha3::{Digest, Keccak256};

use super::error::RLPxError;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    use k256::sha2::Digest;
    k256::sha2::Sha256::digest(data).into()
}

pub fn sha256_hmac(key: &[u8], inputs: &[&[u8]], auth_data: &[u8]) -> Result<[u8; 32], RLPxError> {
    use hmac::Mac;
    use k256::sha2::Sha256;

    let mut hasher = hmac::Hmac::<Sha256>::new_from_slice(key)
        .map_err(|error| RLPxError::CryptographyError(error.to_string()))?;
    for input in inputs {
        hasher.update(input);
    }
    hasher.update(auth_data);
    Ok(hasher.finalize().into_bytes().into())
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Elliptic curve Diffie-Hellman; the shared secret is the X coordinate
/// of the resulting point, big-endian.
pub fn ecdh_xchng(secret_key: &SecretKey, public_key: &PublicKey) -> [u8; 32] {
    k256::ecdh::diffie_hellman(secret_key.to_nonzero_scalar(), public_key.as_affine())
        .raw_secret_bytes()[..32]
        .try_into()
        .unwrap()
}

/// NIST SP 800-56 Concatenation KDF over SHA-256, empty shared info.
pub fn kdf(secret: &[u8], output: &mut [u8]) -> Result<(), RLPxError> {
    concat_kdf::derive_key_into::<k256::sha2::Sha256>(secret, &[], output)
        .map_err(|error| RLPxError::CryptographyError(error.to_string()))
}

/// Computes a node id from a public key.
/// The node id is the uncompressed public key with the leading 0x04 omitted.
pub fn pubkey2id(pk: &PublicKey) -> H512 {
    let encoded = pk.to_encoded_point(false);
    let bytes = encoded.as_bytes();
    debug_assert_eq!(bytes[0], 4);
    H512::from_slice(&bytes[1..])
}

/// Computes a public key from a node id.
pub fn id2pubkey(id: H512) -> Option<PublicKey> {
    let point = EncodedPoint::from_untagged_bytes(&id.0.into());
    PublicKey::from_encoded_point(&point).into_option()
}

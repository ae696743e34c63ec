// Cryptographic signing module
// This file handles the off-band permits carried by route permit steps:
// digest construction, Ed25519 signing for clients and verification for the router
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, U256};
use blake2::{Blake2b512, Digest};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hex::FromHex;
use thiserror::Error;

use crate::router::routes::PermitPayload;

/// Scheme flag carried in the permit `v` byte. Only Ed25519 is accepted.
pub const SCHEME_ED25519: u8 = 0x00;

const PERMIT_DOMAIN: &[u8] = b"ultra-route/permit/v1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermitError {
    #[error("unsupported signature scheme flag {0:#04x}")]
    UnsupportedScheme(u8),
    #[error("permit expired: deadline {deadline}, now {now}")]
    Expired { deadline: U256, now: u64 },
    #[error("no permit key registered for {0}")]
    UnknownSigner(Address),
    #[error("permit signature does not verify")]
    BadSignature,
    #[error("bad signing key: {0}")]
    BadKey(String),
}

/// Fields covered by a permit signature.
#[derive(Debug, Clone, Copy)]
pub struct PermitRequest {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub nonce: u64,
    pub deadline: U256,
}

/// Blake2b-256 of the domain tag and every permit field.
pub fn permit_digest(req: &PermitRequest) -> [u8; 32] {
    let mut hasher = Blake2b512::new();
    hasher.update(PERMIT_DOMAIN);
    hasher.update(req.token.as_slice());
    hasher.update(req.owner.as_slice());
    hasher.update(req.spender.as_slice());
    hasher.update(req.value.to_be_bytes::<32>());
    hasher.update(req.nonce.to_be_bytes());
    hasher.update(req.deadline.to_be_bytes::<32>());
    let hash_result = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hash_result[..32]);
    digest
}

/// Account address controlled by an Ed25519 key: Blake2b(flag || pubkey), first 20 bytes.
pub fn signer_address(vk: &VerifyingKey) -> Address {
    let mut hasher = Blake2b512::new();
    hasher.update([SCHEME_ED25519]);
    hasher.update(vk.to_bytes());
    let hash = hasher.finalize();
    Address::from_slice(&hash[..20])
}

pub fn signing_key_from_hex(secret_hex: &str) -> Result<SigningKey, PermitError> {
    let sk_bytes = <[u8; 32]>::from_hex(secret_hex.trim_start_matches("0x"))
        .map_err(|e| PermitError::BadKey(format!("bad hex key: {e}")))?;
    Ok(SigningKey::from_bytes(&sk_bytes))
}

/// Produce the permit step payload for `req`.
pub fn sign_permit(signing_key: &SigningKey, req: &PermitRequest) -> PermitPayload {
    let digest = permit_digest(req);
    let sig_bytes: [u8; 64] = signing_key.sign(&digest).to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&sig_bytes[..32]);
    s.copy_from_slice(&sig_bytes[32..]);
    PermitPayload {
        value: req.value,
        deadline: req.deadline,
        v: SCHEME_ED25519,
        r,
        s,
    }
}

/// Check scheme, deadline and signature of a decoded permit.
pub fn verify_permit(
    vk: &VerifyingKey,
    req: &PermitRequest,
    payload: &PermitPayload,
    now: u64,
) -> Result<(), PermitError> {
    if payload.v != SCHEME_ED25519 {
        return Err(PermitError::UnsupportedScheme(payload.v));
    }
    if payload.deadline < U256::from(now) {
        return Err(PermitError::Expired {
            deadline: payload.deadline,
            now,
        });
    }
    let signature = Signature::from_bytes(&payload.signature_bytes());
    vk.verify(&permit_digest(req), &signature)
        .map_err(|_| PermitError::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(owner: Address) -> PermitRequest {
        PermitRequest {
            token: Address::repeat_byte(0x10),
            owner,
            spender: Address::repeat_byte(0x20),
            value: U256::from(500u64),
            nonce: 0,
            deadline: U256::from(1_000u64),
        }
    }

    #[test]
    fn signed_permit_verifies() {
        let sk = signing_key_from_hex(&"07".repeat(32)).unwrap();
        let vk = sk.verifying_key();
        let req = request(signer_address(&vk));
        let payload = sign_permit(&sk, &req);
        verify_permit(&vk, &req, &payload, 10).unwrap();
    }

    #[test]
    fn tampered_value_fails() {
        let sk = SigningKey::from_bytes(&[3u8; 32]);
        let vk = sk.verifying_key();
        let req = request(signer_address(&vk));
        let payload = sign_permit(&sk, &req);
        let mut tampered = req;
        tampered.value = U256::from(501u64);
        assert_eq!(
            verify_permit(&vk, &tampered, &payload, 10).unwrap_err(),
            PermitError::BadSignature
        );
    }

    #[test]
    fn scheme_and_deadline_are_checked_first() {
        let sk = SigningKey::from_bytes(&[3u8; 32]);
        let vk = sk.verifying_key();
        let req = request(signer_address(&vk));
        let mut payload = sign_permit(&sk, &req);
        assert!(matches!(
            verify_permit(&vk, &req, &payload, 5_000),
            Err(PermitError::Expired { now: 5_000, .. })
        ));
        payload.v = 27;
        assert_eq!(
            verify_permit(&vk, &req, &payload, 0).unwrap_err(),
            PermitError::UnsupportedScheme(27)
        );
    }
}

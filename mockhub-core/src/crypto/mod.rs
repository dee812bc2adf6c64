// src/crypto/mod.rs
//
// Payload signing and verification challenges.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";

/// Random bytes in a verification challenge (hex-encoded on the wire).
pub const CHALLENGE_BYTES: usize = 100;

/// Hex HMAC-SHA256 of `body` keyed with the subscriber's secret.
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String, Error> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Parse(format!("Invalid HMAC key: {}", e)))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Value of the [`SIGNATURE_HEADER`]: `sha256=<hex>`.
pub fn signature_header_value(secret: &str, body: &[u8]) -> Result<String, Error> {
    Ok(format!("sha256={}", sign_payload(secret, body)?))
}

pub fn generate_challenge() -> String {
    let mut bytes = [0u8; CHALLENGE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_matches_known_vector() {
        let sig = sign_payload("key", b"The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(sig, "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8");
    }

    #[test]
    fn test_signature_is_deterministic_and_keyed() {
        let body = br#"{"data":[{"id":"1"}]}"#;
        let a = sign_payload("secret", body).unwrap();
        assert_eq!(a, sign_payload("secret", body).unwrap());
        assert_ne!(a, sign_payload("other", body).unwrap());
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_header_value_prefix() {
        let value = signature_header_value("", b"{}").unwrap();
        assert!(value.starts_with("sha256="));
        assert_eq!(value.len(), "sha256=".len() + 64);
    }

    #[test]
    fn test_challenge_is_200_hex_chars_and_fresh() {
        let a = generate_challenge();
        assert_eq!(a.len(), CHALLENGE_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, generate_challenge());
    }
}

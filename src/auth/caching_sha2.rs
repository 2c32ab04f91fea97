//! caching_sha2_password fast-path scramble
//!
//! `SHA256(password) XOR SHA256(SHA256(SHA256(password)) · nonce)`. The fast
//! path only succeeds if the server has the account's credentials cached;
//! otherwise it answers with a "perform full authentication" request, which
//! this crate honors over TLS only (cleartext password, NUL-terminated).

use sha2::{Digest, Sha256};

/// Compute the fast-path auth response for `caching_sha2_password`.
///
/// Returns `None` for an empty password (empty wire response).
pub fn scramble(password: &str, nonce: &[u8]) -> Option<Vec<u8>> {
    if password.is_empty() {
        return None;
    }

    let stage1 = Sha256::digest(password.as_bytes());
    let stage2 = Sha256::digest(stage1);

    let mut hasher = Sha256::new();
    hasher.update(stage2);
    hasher.update(nonce);
    let rhs = hasher.finalize();

    Some(stage1.iter().zip(rhs.iter()).map(|(a, b)| a ^ b).collect())
}

/// Cleartext password payload for the full-authentication path
pub fn cleartext_response(password: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(password.len() + 1);
    out.extend_from_slice(password.as_bytes());
    out.push(0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_password_yields_no_response() {
        assert!(scramble("", &[0u8; 20]).is_none());
    }

    #[test]
    fn test_scramble_is_32_bytes() {
        let out = scramble("secret", &[7u8; 20]).unwrap();
        assert_eq!(out.len(), 32);
    }

    #[test]
    fn test_scramble_depends_on_nonce() {
        assert_ne!(
            scramble("secret", &[1u8; 20]),
            scramble("secret", &[2u8; 20])
        );
    }

    #[test]
    fn test_scramble_xor_recovers_stage1() {
        let nonce = [5u8; 20];
        let out = scramble("secret", &nonce).unwrap();

        let stage1 = Sha256::digest(b"secret");
        let stage2 = Sha256::digest(stage1);
        let mut hasher = Sha256::new();
        hasher.update(stage2);
        hasher.update(nonce);
        let rhs = hasher.finalize();

        let recovered: Vec<u8> = out.iter().zip(rhs.iter()).map(|(a, b)| a ^ b).collect();
        assert_eq!(recovered, stage1.to_vec());
    }

    #[test]
    fn test_cleartext_response_is_nul_terminated() {
        assert_eq!(cleartext_response("pw"), b"pw\0".to_vec());
        assert_eq!(cleartext_response(""), b"\0".to_vec());
    }
}

//! mysql_native_password scramble
//!
//! `SHA1(password) XOR SHA1(nonce · SHA1(SHA1(password)))`, where `nonce` is
//! the 20-byte challenge from the server handshake.

use sha1::{Digest, Sha1};

/// Compute the auth response for `mysql_native_password`.
///
/// Returns `None` for an empty password; the wire response is then empty and
/// the server validates the account has no password set.
pub fn scramble(password: &str, nonce: &[u8]) -> Option<Vec<u8>> {
    if password.is_empty() {
        return None;
    }

    let stage1 = Sha1::digest(password.as_bytes());
    let stage2 = Sha1::digest(stage1);

    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(stage2);
    let rhs = hasher.finalize();

    Some(stage1.iter().zip(rhs.iter()).map(|(a, b)| a ^ b).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_password_yields_no_response() {
        assert!(scramble("", &[0u8; 20]).is_none());
    }

    #[test]
    fn test_scramble_is_20_bytes() {
        let out = scramble("secret", &[7u8; 20]).unwrap();
        assert_eq!(out.len(), 20);
    }

    #[test]
    fn test_scramble_deterministic() {
        let nonce = [3u8; 20];
        assert_eq!(scramble("secret", &nonce), scramble("secret", &nonce));
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
        // XORing the response with SHA1(nonce · SHA1(SHA1(pw))) must give
        // SHA1(pw) back; this is what the server checks.
        let nonce = [5u8; 20];
        let out = scramble("secret", &nonce).unwrap();

        let stage1 = Sha1::digest(b"secret");
        let stage2 = Sha1::digest(stage1);
        let mut hasher = Sha1::new();
        hasher.update(nonce);
        hasher.update(stage2);
        let rhs = hasher.finalize();

        let recovered: Vec<u8> = out.iter().zip(rhs.iter()).map(|(a, b)| a ^ b).collect();
        assert_eq!(recovered, stage1.to_vec());
    }
}

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

/// HMAC-SHA512 over `payload`, hex encoded. An empty key is accepted by HMAC, so this cannot fail.
pub fn hmac_sha512_hex(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha512>::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// HMAC-SHA256 over `payload`, hex encoded.
pub fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time byte comparison. Comparing digests with `==` leaks the length of the matching
/// prefix through timing.
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn secure_eq_behaves_correctly() {
        assert!(secure_eq(b"abc", b"abc"));
        assert!(!secure_eq(b"abc", b"abd"));
        assert!(!secure_eq(b"abc", b"ab"));
        assert!(secure_eq(b"", b""));
    }

    #[test]
    fn digests_are_hex_and_stable() {
        let a = hmac_sha512_hex("secret", b"payload");
        let b = hmac_sha512_hex("secret", b"payload");
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, hmac_sha512_hex("other-secret", b"payload"));
        assert_ne!(a, hmac_sha512_hex("secret", b"other payload"));
    }

    #[test]
    fn sha256_digest_length() {
        assert_eq!(hmac_sha256_hex("k", b"v").len(), 64);
    }
}

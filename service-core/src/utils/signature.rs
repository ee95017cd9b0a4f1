use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmacAlgorithm {
    Sha256,
    Sha512,
}

/// Keyed hash of `message`, returned as lowercase hex.
pub fn hmac_hex(key: &str, message: &str, alg: HmacAlgorithm) -> Result<String, anyhow::Error> {
    let bytes = match alg {
        HmacAlgorithm::Sha256 => {
            let mut mac = HmacSha256::new_from_slice(key.as_bytes())
                .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
            mac.update(message.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        HmacAlgorithm::Sha512 => {
            let mut mac = HmacSha512::new_from_slice(key.as_bytes())
                .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
            mac.update(message.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
    };

    Ok(hex::encode(bytes))
}

/// Constant-time byte comparison. Length mismatch is not secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Checks a hex signature (any case) against the keyed hash of `message`.
/// Undecodable input is a mismatch.
pub fn verify_hex_signature(
    key: &str,
    message: &str,
    alg: HmacAlgorithm,
    provided_hex: &str,
) -> bool {
    let Ok(provided) = hex::decode(provided_hex.trim()) else {
        return false;
    };
    let Ok(expected) = hmac_hex(key, message, alg) else {
        return false;
    };
    let Ok(expected) = hex::decode(expected) else {
        return false;
    };
    constant_time_eq(&expected, &provided)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_sha256_known_vector() {
        // Published HMAC example vector
        let sig = hmac_hex(
            "key",
            "The quick brown fox jumps over the lazy dog",
            HmacAlgorithm::Sha256,
        )
        .unwrap();
        assert_eq!(
            sig,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_hmac_sha512_length() {
        let sig = hmac_hex("secret", "payload", HmacAlgorithm::Sha512).unwrap();
        assert_eq!(sig.len(), 128);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_verify_accepts_uppercase_hex() {
        let sig = hmac_hex("secret", "a=1&b=2", HmacAlgorithm::Sha512).unwrap();
        assert!(verify_hex_signature(
            "secret",
            "a=1&b=2",
            HmacAlgorithm::Sha512,
            &sig.to_uppercase()
        ));
    }

    #[test]
    fn test_verify_rejects_tampered_message() {
        let sig = hmac_hex("secret", "amount=1000", HmacAlgorithm::Sha256).unwrap();
        assert!(!verify_hex_signature(
            "secret",
            "amount=1001",
            HmacAlgorithm::Sha256,
            &sig
        ));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(!verify_hex_signature(
            "secret",
            "x",
            HmacAlgorithm::Sha256,
            "not-hex"
        ));
        assert!(!verify_hex_signature("secret", "x", HmacAlgorithm::Sha256, ""));
    }

    #[test]
    fn test_constant_time_eq_length_mismatch() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"abc", b"abc"));
    }
}

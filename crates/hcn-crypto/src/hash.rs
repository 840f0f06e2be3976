use sha3::{Digest, Keccak256};

/// Prefix mandated by EIP-191 (version `0x45`) for personal messages.
pub const EIP191_PREFIX: &str = "\x19Ethereum Signed Message:\n";

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut h = Keccak256::new();
    h.update(data);
    let out = h.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    arr
}

/// Digest signed by `personal_sign`: keccak256(prefix || len(message) || message).
pub fn eip191_hash(message: &[u8]) -> [u8; 32] {
    let mut h = Keccak256::new();
    h.update(EIP191_PREFIX.as_bytes());
    h.update(message.len().to_string().as_bytes());
    h.update(message);
    let out = h.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    arr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_eip191_hash_matches_manual_prefix() {
        let message = b"assign 42";
        let mut manual = Vec::new();
        manual.extend_from_slice(b"\x19Ethereum Signed Message:\n9");
        manual.extend_from_slice(message);
        assert_eq!(eip191_hash(message), keccak256(&manual));
    }

    #[test]
    fn test_eip191_hash_depends_on_length_prefix() {
        // "ab" with len 2 must differ from "b" with len 1 prefixed by "a"
        assert_ne!(eip191_hash(b"ab"), eip191_hash(b"b"));
    }
}

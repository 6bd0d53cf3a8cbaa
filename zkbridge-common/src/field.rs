//! BN254 field helpers and domain-separated hashing.
//!
//! Every value that enters a hash or a comparison is a field element; byte
//! inputs are reduced modulo the field order before use. The Poseidon
//! instance is the circom-compatible one, matching the hash gadget real
//! proof circuits use for these commitments.

use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher};
use rand::rngs::OsRng;
use rand::RngCore;

pub use ark_bn254::Fr;

/// Serialize a field element to its canonical 32-byte big-endian form.
pub fn fr_to_bytes(fr: &Fr) -> [u8; 32] {
    let bytes = fr.into_bigint().to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Interpret 32 big-endian bytes as a field element, reducing mod the
/// field order.
pub fn fr_from_bytes(bytes: &[u8; 32]) -> Fr {
    Fr::from_be_bytes_mod_order(bytes)
}

/// Hex-encode a field element with a `0x` prefix.
pub fn fr_to_hex(fr: &Fr) -> String {
    format!("0x{}", hex::encode(fr_to_bytes(fr)))
}

/// Parse a `0x`-prefixed (or bare) 64-char hex string into a field element.
pub fn fr_from_hex(s: &str) -> Result<Fr, hex::FromHexError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(stripped, &mut bytes)?;
    Ok(fr_from_bytes(&bytes))
}

/// Domain-separated Poseidon hash over three field elements.
///
/// The first input is always a domain tag, so commitments and nullifiers
/// can never collide with each other even on identical payloads.
pub fn poseidon_hash3(domain: Fr, a: Fr, b: Fr) -> Fr {
    let mut hasher = Poseidon::<Fr>::new_circom(3).expect("Poseidon arity 3 is supported");
    hasher
        .hash(&[domain, a, b])
        .expect("Poseidon hash over 3 field elements cannot fail")
}

/// Hash arbitrary bytes into the field under a domain tag.
///
/// blake3 compresses `domain || bytes` to 32 bytes, which are then reduced
/// mod the field order.
pub fn hash_to_field(domain: &[u8], bytes: &[u8]) -> Fr {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    hasher.update(bytes);
    let digest: [u8; 32] = *hasher.finalize().as_bytes();
    fr_from_bytes(&digest)
}

/// Draw a uniformly random field element from the OS CSPRNG.
///
/// Used for commitment nonces; 256 bits of entropy are reduced mod the
/// field order.
pub fn random_field() -> Fr {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    fr_from_bytes(&bytes)
}

/// Serde module for `Fr` as a `0x`-prefixed big-endian hex string.
pub mod serde_fr_hex {
    use super::{fr_from_bytes, fr_to_bytes, Fr};
    use serde::{de, Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(fr: &Fr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex_str = format!("0x{}", hex::encode(fr_to_bytes(fr)));
        serializer.serialize_str(&hex_str)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fr, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FrVisitor;

        impl de::Visitor<'_> for FrVisitor {
            type Value = Fr;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a 32-byte hex string (with or without 0x prefix)")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let stripped = v.strip_prefix("0x").unwrap_or(v);
                if stripped.len() != 64 {
                    return Err(E::custom(format!(
                        "expected 64 hex chars, got {}",
                        stripped.len()
                    )));
                }
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(stripped, &mut bytes).map_err(E::custom)?;
                Ok(fr_from_bytes(&bytes))
            }
        }

        deserializer.deserialize_str(FrVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trip() {
        let fr = Fr::from(123_456_789u64);
        let bytes = fr_to_bytes(&fr);
        assert_eq!(fr_from_bytes(&bytes), fr);
    }

    #[test]
    fn hex_round_trip() {
        let fr = Fr::from(42u64);
        let s = fr_to_hex(&fr);
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 66);
        assert_eq!(fr_from_hex(&s).unwrap(), fr);
    }

    #[test]
    fn poseidon_is_deterministic() {
        let d = Fr::from(1u64);
        let a = Fr::from(2u64);
        let b = Fr::from(3u64);
        assert_eq!(poseidon_hash3(d, a, b), poseidon_hash3(d, a, b));
    }

    #[test]
    fn poseidon_input_order_matters() {
        let d = Fr::from(1u64);
        let a = Fr::from(2u64);
        let b = Fr::from(3u64);
        assert_ne!(poseidon_hash3(d, a, b), poseidon_hash3(d, b, a));
    }

    #[test]
    fn domain_tag_separates_hashes() {
        let a = Fr::from(2u64);
        let b = Fr::from(3u64);
        assert_ne!(
            poseidon_hash3(Fr::from(1u64), a, b),
            poseidon_hash3(Fr::from(2u64), a, b)
        );
    }

    #[test]
    fn hash_to_field_separates_domains() {
        let payload = b"GABCD...recipient";
        assert_ne!(
            hash_to_field(b"zkbridge.recipient.v1", payload),
            hash_to_field(b"zkbridge.other.v1", payload)
        );
    }

    #[test]
    fn random_field_values_are_distinct() {
        let a = random_field();
        let b = random_field();
        assert_ne!(a, b);
    }
}

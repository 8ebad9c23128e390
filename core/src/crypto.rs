//! Fixed-length Schnorr value types (spec §3, §4.C2).
//!
//! These are opaque byte wrappers, not verifying key/signature types —
//! actual Schnorr verification against `secp256k1` belongs to the
//! signing/attestation layer above this core (see spec §1 Non-goals).
//! The wire engine only needs to parse, hold, compare, and re-serialize
//! these values exactly.

use std::cmp::Ordering;
use std::fmt;

use crate::error::DecodeError;

macro_rules! fixed_bytes_value {
    ($name:ident, $len:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Eq, PartialEq, Hash)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                $name(bytes)
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
                let arr: [u8; $len] = bytes
                    .try_into()
                    .map_err(|_| DecodeError::Malformed(concat!(stringify!($name), " wrong length")))?;
                Ok($name(arr))
            }

            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub const fn zero() -> Self {
                $name([0u8; $len])
            }

            /// Reversed (most-significant-byte-first) view used for
            /// canonical ordering, matching `Hash256`'s convention.
            fn reversed(&self) -> [u8; $len] {
                let mut out = self.0;
                out.reverse();
                out
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                self.reversed().cmp(&other.reversed())
            }
        }
    };
}

fixed_bytes_value!(
    SchnorrSignature,
    64,
    "A 64-byte Schnorr signature, opaque to this core."
);
fixed_bytes_value!(
    SchnorrNonce,
    64,
    "A 64-byte Schnorr pre-commitment nonce broadcast ahead of signing."
);

/// A Schnorr public key: 32 bytes (x-only) or 33 bytes (compressed),
/// per spec §3. Unlike the fixed-length values above, its length is
/// variable, so it is backed by a small owned buffer rather than a
/// const-generic array.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SchnorrPublicKey(Vec<u8>);

impl SchnorrPublicKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DecodeError> {
        match bytes.len() {
            32 | 33 => Ok(SchnorrPublicKey(bytes)),
            _ => Err(DecodeError::Malformed("public key must be 32 or 33 bytes")),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SchnorrPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchnorrPublicKey({})", hex::encode(&self.0))
    }
}

impl fmt::Display for SchnorrPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_identity_is_byte_equality() {
        let a = SchnorrSignature::from_bytes([1u8; 64]);
        let b = SchnorrSignature::from_bytes([1u8; 64]);
        let c = SchnorrSignature::from_bytes([2u8; 64]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn signature_ordering_is_reversed_msb_first() {
        let mut low = [0u8; 64];
        low[63] = 1; // least-significant wire byte set
        let mut high = [0u8; 64];
        high[0] = 1; // most-significant wire byte set
        let a = SchnorrSignature::from_bytes(low);
        let b = SchnorrSignature::from_bytes(high);
        assert!(a < b);
    }

    #[test]
    fn pubkey_rejects_bad_lengths() {
        assert!(SchnorrPublicKey::from_bytes(vec![0u8; 31]).is_err());
        assert!(SchnorrPublicKey::from_bytes(vec![0u8; 32]).is_ok());
        assert!(SchnorrPublicKey::from_bytes(vec![0u8; 33]).is_ok());
        assert!(SchnorrPublicKey::from_bytes(vec![0u8; 34]).is_err());
    }
}

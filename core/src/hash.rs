use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

/// A 32-byte double-SHA-256 digest.
///
/// Identity is byte-equality over the *logical* (display) orientation.
/// Wire bytes are the reverse of the logical bytes — see [`Hash256::from_wire_bytes`]
/// and [`Hash256::to_wire_bytes`] — because on-wire hashes are
/// little-endian but this family of chains displays them big-endian,
/// matching upstream Bitcoin convention.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Builds a `Hash256` directly from its logical (display-order) bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }

    /// Reads 32 wire bytes and reverses them into logical order.
    pub fn from_wire_bytes(mut wire: [u8; 32]) -> Self {
        wire.reverse();
        Hash256(wire)
    }

    /// Returns the wire-order (reversed) bytes, ready to be written.
    pub fn to_wire_bytes(self) -> [u8; 32] {
        let mut out = self.0;
        out.reverse();
        out
    }

    /// The logical (display-order) bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `double_sha256` of `data`, stored reversed to fit this family of
    /// chains' display convention (see spec §4.C7).
    pub fn hash_reversed(data: &[u8]) -> Hash256 {
        let digest = double_sha256(data);
        Hash256::from_wire_bytes(digest)
    }

    /// Digest suitable for hash-table use. Per spec §4.C2, uses the
    /// *last* 4 bytes of the logical form rather than the first, because
    /// leading bytes of these digests trend toward zero.
    pub fn short_digest(&self) -> u32 {
        let b = &self.0[28..32];
        u32::from_be_bytes([b[0], b[1], b[2], b[3]])
    }
}

/// Plain (non-doubled) SHA-256, exposed because the envelope checksum
/// and the Merkle engine both need the doubled form built from it.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 of SHA-256 of `data`. All Merkle and block hashes use this.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

impl PartialOrd for Hash256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Comparable lexicographically from the most-significant byte, i.e. in
/// the reversed (display) orientation — see spec §3.
impl Ord for Hash256 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParseError;

impl fmt::Display for HashParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid 32-byte hex hash")
    }
}

impl std::error::Error for HashParseError {}

impl FromStr for Hash256 {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| HashParseError)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| HashParseError)?;
        Ok(Hash256(arr))
    }
}

impl serde::Serialize for Hash256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Hash256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip_reverses() {
        let mut wire = [0u8; 32];
        wire[0] = 0xAB;
        wire[31] = 0x01;
        let h = Hash256::from_wire_bytes(wire);
        assert_eq!(h.to_wire_bytes(), wire);
        assert_eq!(h.as_bytes()[31], 0xAB);
        assert_eq!(h.as_bytes()[0], 0x01);
    }

    #[test]
    fn display_and_parse_round_trip() {
        let h = Hash256::hash_reversed(b"cvn-chain");
        let s = h.to_string();
        let parsed: Hash256 = s.parse().unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn short_digest_uses_last_four_bytes() {
        let mut bytes = [0u8; 32];
        bytes[28..32].copy_from_slice(&[1, 2, 3, 4]);
        let h = Hash256::from_bytes(bytes);
        assert_eq!(h.short_digest(), 0x0102_0304);
    }

    #[test]
    fn ordering_is_msb_first_on_logical_bytes() {
        let a = Hash256::from_bytes([0u8; 32]);
        let mut high = [0u8; 32];
        high[0] = 1;
        let b = Hash256::from_bytes(high);
        assert!(a < b);
    }
}

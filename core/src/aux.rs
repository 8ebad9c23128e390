//! Auxiliary peer messages that carry consensus-visible data (spec
//! §4.C9): the nonce-pool broadcast CVNs use to pre-commit Schnorr
//! nonces ahead of signing, and the address broadcast. Both follow the
//! same lazy byte-cache discipline as [`crate::block::Block`], scaled
//! down to "one dirty flag, no nested sections".

use std::cell::RefCell;

use crate::crypto::{SchnorrNonce, SchnorrSignature};
use crate::error::DecodeError;
use crate::hash::Hash256;
use crate::primitives::{write_varint, Reader};

const NONCE_ENTRY_SIZE: u64 = SchnorrNonce::LEN as u64;

#[derive(Debug, Clone, Default)]
struct ByteCache {
    original_bytes: Option<Vec<u8>>,
    valid: bool,
}

impl ByteCache {
    fn invalidate(&mut self) {
        self.valid = false;
        self.original_bytes = None;
    }
}

/// `cvnId(4) || hashRootBlock(32) || creationTime(4) || varint n ||
/// n×SchnorrNonce(64) || msgSig(64)` (spec §4.C9).
#[derive(Debug, Clone)]
pub struct NoncePoolMessage {
    cvn_id: u32,
    hash_root_block: Hash256,
    creation_time: u32,
    nonces: Vec<SchnorrNonce>,
    msg_sig: SchnorrSignature,
    cache: RefCell<ByteCache>,
}

impl NoncePoolMessage {
    pub fn new(
        cvn_id: u32,
        hash_root_block: Hash256,
        creation_time: u32,
        nonces: Vec<SchnorrNonce>,
        msg_sig: SchnorrSignature,
    ) -> Self {
        NoncePoolMessage {
            cvn_id,
            hash_root_block,
            creation_time,
            nonces,
            msg_sig,
            cache: RefCell::new(ByteCache::default()),
        }
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(buf);
        let cvn_id = r.read_u32_le()?;
        let hash_root_block = Hash256::from_wire_bytes(r.read_array::<32>()?);
        let creation_time = r.read_u32_le()?;
        let n = r.read_count(NONCE_ENTRY_SIZE)?;
        let mut nonces = Vec::with_capacity(n as usize);
        for _ in 0..n {
            nonces.push(SchnorrNonce::from_slice(r.read_bytes(SchnorrNonce::LEN)?)?);
        }
        let msg_sig = SchnorrSignature::from_slice(r.read_bytes(SchnorrSignature::LEN)?)?;
        let consumed = r.position();
        Ok(NoncePoolMessage {
            cvn_id,
            hash_root_block,
            creation_time,
            nonces,
            msg_sig,
            cache: RefCell::new(ByteCache {
                original_bytes: Some(buf[..consumed].to_vec()),
                valid: true,
            }),
        })
    }

    pub fn cvn_id(&self) -> u32 {
        self.cvn_id
    }

    pub fn hash_root_block(&self) -> Hash256 {
        self.hash_root_block
    }

    pub fn creation_time(&self) -> u32 {
        self.creation_time
    }

    pub fn nonces(&self) -> &[SchnorrNonce] {
        &self.nonces
    }

    pub fn msg_sig(&self) -> &SchnorrSignature {
        &self.msg_sig
    }

    /// Appends a nonce, extending the cached serialized length by
    /// exactly 64 bytes and invalidating the retained original bytes
    /// (spec §4.C9 "observable contract").
    pub fn add_nonce(&mut self, nonce: SchnorrNonce) {
        self.nonces.push(nonce);
        self.cache.borrow_mut().invalidate();
    }

    /// Removes the nonce at `index`, shrinking the cached serialized
    /// length by exactly 64 bytes and invalidating the retained
    /// original bytes. Panics on an out-of-range index, mirroring
    /// `Vec::remove`.
    pub fn remove_nonce(&mut self, index: usize) -> SchnorrNonce {
        let removed = self.nonces.remove(index);
        self.cache.borrow_mut().invalidate();
        removed
    }

    /// The serialized length this message would have if rebuilt from
    /// its current fields, without actually rebuilding — used to check
    /// the ±64-per-nonce contract cheaply.
    pub fn serialized_len(&self) -> usize {
        4 + 32 + 4 + crate::primitives::varint_size(self.nonces.len() as u64)
            + self.nonces.len() * SchnorrNonce::LEN
            + SchnorrSignature::LEN
    }

    pub fn serialize(&self) -> Vec<u8> {
        {
            let cache = self.cache.borrow();
            if cache.valid {
                if let Some(bytes) = &cache.original_bytes {
                    return bytes.clone();
                }
            }
        }
        let mut out = Vec::with_capacity(self.serialized_len());
        out.extend_from_slice(&self.cvn_id.to_le_bytes());
        out.extend_from_slice(&self.hash_root_block.to_wire_bytes());
        out.extend_from_slice(&self.creation_time.to_le_bytes());
        write_varint(&mut out, self.nonces.len() as u64);
        for nonce in &self.nonces {
            out.extend_from_slice(nonce.as_bytes());
        }
        out.extend_from_slice(self.msg_sig.as_bytes());
        out
    }
}

/// A single peer address record: `time(4) || services(8) || ip(16,
/// IPv6-mapped) || port(2, big-endian)` — the standard Bitcoin-family
/// `addr` entry shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddress {
    pub time: u32,
    pub services: u64,
    pub ip: [u8; 16],
    pub port: u16,
}

impl PeerAddress {
    const WIRE_LEN: u64 = 4 + 8 + 16 + 2;

    fn parse(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let time = r.read_u32_le()?;
        let services = r.read_u64_le()?;
        let ip = r.read_array::<16>()?;
        let port_bytes = r.read_array::<2>()?;
        let port = u16::from_be_bytes(port_bytes);
        Ok(PeerAddress { time, services, ip, port })
    }

    fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.services.to_le_bytes());
        out.extend_from_slice(&self.ip);
        out.extend_from_slice(&self.port.to_be_bytes());
    }
}

/// A varint-prefixed sequence of [`PeerAddress`] records (spec §4.C9).
/// Size-cap and dynamic-length accounting mirror [`NoncePoolMessage`]:
/// adding or removing an entry adjusts the cached length by exactly
/// [`PeerAddress::WIRE_LEN`] and invalidates the retained bytes.
#[derive(Debug, Clone)]
pub struct AddressMessage {
    addresses: Vec<PeerAddress>,
    cache: RefCell<ByteCache>,
}

impl AddressMessage {
    pub fn new(addresses: Vec<PeerAddress>) -> Self {
        AddressMessage {
            addresses,
            cache: RefCell::new(ByteCache::default()),
        }
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(buf);
        let n = r.read_count(PeerAddress::WIRE_LEN)?;
        let mut addresses = Vec::with_capacity(n as usize);
        for _ in 0..n {
            addresses.push(PeerAddress::parse(&mut r)?);
        }
        let consumed = r.position();
        Ok(AddressMessage {
            addresses,
            cache: RefCell::new(ByteCache {
                original_bytes: Some(buf[..consumed].to_vec()),
                valid: true,
            }),
        })
    }

    pub fn addresses(&self) -> &[PeerAddress] {
        &self.addresses
    }

    pub fn add_address(&mut self, addr: PeerAddress) {
        self.addresses.push(addr);
        self.cache.borrow_mut().invalidate();
    }

    pub fn remove_address(&mut self, index: usize) -> PeerAddress {
        let removed = self.addresses.remove(index);
        self.cache.borrow_mut().invalidate();
        removed
    }

    pub fn serialized_len(&self) -> usize {
        crate::primitives::varint_size(self.addresses.len() as u64)
            + self.addresses.len() * PeerAddress::WIRE_LEN as usize
    }

    pub fn serialize(&self) -> Vec<u8> {
        {
            let cache = self.cache.borrow();
            if cache.valid {
                if let Some(bytes) = &cache.original_bytes {
                    return bytes.clone();
                }
            }
        }
        let mut out = Vec::with_capacity(self.serialized_len());
        write_varint(&mut out, self.addresses.len() as u64);
        for addr in &self.addresses {
            addr.serialize(&mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_noncepool(n: usize) -> NoncePoolMessage {
        let nonces = (0..n)
            .map(|i| SchnorrNonce::from_bytes([i as u8; 64]))
            .collect();
        NoncePoolMessage::new(7, Hash256::ZERO, 1_500_000_000, nonces, SchnorrSignature::zero())
    }

    #[test]
    fn noncepool_round_trips() {
        let msg = sample_noncepool(3);
        let bytes = msg.serialize();
        let parsed = NoncePoolMessage::decode(&bytes).unwrap();
        assert_eq!(parsed.serialize(), bytes);
        assert_eq!(parsed.nonces().len(), 3);
    }

    #[test]
    fn add_nonce_grows_length_by_64_and_invalidates_cache() {
        let mut msg = sample_noncepool(2);
        let before = msg.serialize();
        let before_len = msg.serialized_len();
        msg.add_nonce(SchnorrNonce::from_bytes([0xAB; 64]));
        assert_eq!(msg.serialized_len(), before_len + 64);
        let after = msg.serialize();
        assert_ne!(after, before);
        assert_eq!(after.len(), before.len() + 64);
    }

    #[test]
    fn remove_nonce_shrinks_length_by_64() {
        let mut msg = sample_noncepool(3);
        let before_len = msg.serialized_len();
        msg.remove_nonce(0);
        assert_eq!(msg.serialized_len(), before_len - 64);
    }

    #[test]
    fn address_message_round_trips() {
        let addrs = vec![
            PeerAddress { time: 1, services: 1, ip: [0u8; 16], port: 40404 },
            PeerAddress { time: 2, services: 0, ip: [1u8; 16], port: 41404 },
        ];
        let msg = AddressMessage::new(addrs.clone());
        let bytes = msg.serialize();
        let parsed = AddressMessage::decode(&bytes).unwrap();
        assert_eq!(parsed.addresses(), addrs.as_slice());
    }

    #[test]
    fn address_message_add_adjusts_length() {
        let mut msg = AddressMessage::new(vec![]);
        let before = msg.serialized_len();
        msg.add_address(PeerAddress { time: 0, services: 0, ip: [0u8; 16], port: 0 });
        assert_eq!(msg.serialized_len(), before + PeerAddress::WIRE_LEN as usize);
    }
}

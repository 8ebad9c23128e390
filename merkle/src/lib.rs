//! Partial Merkle tree (SPV proof) construction and verification (spec
//! §4.C7, second half). The full Merkle root computation a block needs
//! for its own `merkleRoot` field lives in `cvnchain_core::merkle`
//! instead of here, so that verifying a block never needs to depend on
//! this heavier, client-facing crate — see that module's doc comment.
//!
//! The traversal below is the standard depth-first "flag bit per
//! visited node" walk: a set bit means "this subtree contains an
//! included id, descend"; a clear bit means "this subtree contributes
//! a single stub hash, don't descend further". Verifying replays the
//! same traversal against a flag/hash stream and is where the
//! malleability check lives (spec §4.C7, §8 property 7).

use thiserror::Error;

use cvnchain_core::error::{DecodeError, MalleableMerkleProof};
use cvnchain_core::hash::Hash256;
use cvnchain_core::merkle::pair_hash;
use cvnchain_core::primitives::{write_varint, Reader, MAX_BLOCK_SIZE};

/// Minimum plausible wire size of one transaction, used to bound
/// `txCount` the same way the block body parser does (spec §4.C7).
const MIN_TX_SIZE: u64 = 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PmtError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Malleable(#[from] MalleableMerkleProof),
    #[error("partial merkle tree left unconsumed hash or flag material")]
    TrailingData,
}

fn tree_width(tx_count: usize, height: u32) -> usize {
    (tx_count + (1usize << height) - 1) >> height
}

/// Height of the root: the smallest height whose tree width is 1.
fn root_height(tx_count: usize) -> u32 {
    let mut height = 0;
    while tree_width(tx_count, height) > 1 {
        height += 1;
    }
    height
}

/// Worst-case number of stub hashes a well-formed proof over `tx_count`
/// leaves could ever emit: one per leaf of the smallest complete binary
/// tree covering them. Declared hash counts above this are rejected
/// before any allocation sized by them (spec §4.C7, §8 S5).
fn max_hash_count(tx_count: u64) -> u64 {
    let mut width = 1u64;
    while width < tx_count {
        width *= 2;
    }
    width.max(1)
}

fn calc_hash(height: u32, pos: usize, txids: &[Hash256]) -> Hash256 {
    if height == 0 {
        return txids[pos];
    }
    let left = calc_hash(height - 1, pos * 2, txids);
    let width = tree_width(txids.len(), height - 1);
    let right = if pos * 2 + 1 < width {
        calc_hash(height - 1, pos * 2 + 1, txids)
    } else {
        left
    };
    pair_hash(left, right)
}

fn traverse_and_build(
    height: u32,
    pos: usize,
    txids: &[Hash256],
    include: &[bool],
    bits: &mut Vec<bool>,
    hashes: &mut Vec<Hash256>,
) {
    let start = pos << height;
    let end = (start + (1usize << height)).min(txids.len());
    let parent_of_match = include[start..end].iter().any(|&m| m);
    bits.push(parent_of_match);
    if height == 0 || !parent_of_match {
        hashes.push(calc_hash(height, pos, txids));
    } else {
        traverse_and_build(height - 1, pos * 2, txids, include, bits, hashes);
        if pos * 2 + 1 < tree_width(txids.len(), height - 1) {
            traverse_and_build(height - 1, pos * 2 + 1, txids, include, bits, hashes);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn traverse_and_extract(
    height: u32,
    pos: usize,
    tx_count: usize,
    bits: &[bool],
    hashes: &[Hash256],
    bit_used: &mut usize,
    hash_used: &mut usize,
    matches: &mut Vec<(usize, Hash256)>,
) -> Result<Hash256, PmtError> {
    if *bit_used >= bits.len() {
        return Err(PmtError::TrailingData);
    }
    let parent_of_match = bits[*bit_used];
    *bit_used += 1;
    if height == 0 || !parent_of_match {
        if *hash_used >= hashes.len() {
            return Err(PmtError::TrailingData);
        }
        let hash = hashes[*hash_used];
        *hash_used += 1;
        if height == 0 && parent_of_match {
            matches.push((pos, hash));
        }
        Ok(hash)
    } else {
        let left = traverse_and_extract(height - 1, pos * 2, tx_count, bits, hashes, bit_used, hash_used, matches)?;
        let width = tree_width(tx_count, height - 1);
        let right = if pos * 2 + 1 < width {
            let right = traverse_and_extract(
                height - 1,
                pos * 2 + 1,
                tx_count,
                bits,
                hashes,
                bit_used,
                hash_used,
                matches,
            )?;
            // A genuine tree only ever duplicates a node with itself at
            // the final (no-sibling) position, handled by the `else`
            // branch below. Finding an equal pair here means the two
            // real siblings were substituted for the same hash — the
            // malleability this check exists to catch (spec §4.C7, §8
            // property 7).
            if right == left {
                return Err(MalleableMerkleProof.into());
            }
            right
        } else {
            left
        };
        Ok(pair_hash(left, right))
    }
}

fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; (bits.len() + 7) / 8];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}

fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count).map(|i| bytes[i / 8] & (1 << (i % 8)) != 0).collect()
}

/// `(txCount, hashes, flagBits)` — a proof that a subset of a block's
/// transactions is present, with enough interior hashes to reconstruct
/// the Merkle root (spec §3, §4.C7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialMerkleTree {
    tx_count: u32,
    hashes: Vec<Hash256>,
    flags: Vec<bool>,
}

impl PartialMerkleTree {
    /// Builds a proof over `txids` covering every index where `include`
    /// is `true`. Panics if the two slices differ in length — this is a
    /// construction-path precondition, not a wire-parsing error (spec
    /// §3 "Produced by (block, include-mask)").
    pub fn build(txids: &[Hash256], include: &[bool]) -> Self {
        assert_eq!(txids.len(), include.len(), "include mask length must match txids length");
        let mut bits = Vec::new();
        let mut hashes = Vec::new();
        if !txids.is_empty() {
            traverse_and_build(root_height(txids.len()), 0, txids, include, &mut bits, &mut hashes);
        }
        PartialMerkleTree {
            tx_count: txids.len() as u32,
            hashes,
            flags: bits,
        }
    }

    pub fn tx_count(&self) -> u32 {
        self.tx_count
    }

    pub fn hashes(&self) -> &[Hash256] {
        &self.hashes
    }

    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    /// Recomputes the root by the inverse traversal, filling the
    /// matched `(index, txid)` list as a side effect (spec §4.C7
    /// "Partial Merkle Tree verify/parse"). Fails with
    /// [`PmtError::Malleable`] on the duplicate-pair rule, or
    /// [`PmtError::TrailingData`] if any hash or flag bit is left over.
    pub fn extract_matches(&self) -> Result<(Hash256, Vec<(usize, Hash256)>), PmtError> {
        if self.tx_count == 0 {
            return Err(DecodeError::Malformed("partial merkle tree has zero transactions").into());
        }
        let mut bit_used = 0;
        let mut hash_used = 0;
        let mut matches = Vec::new();
        let root = traverse_and_extract(
            root_height(self.tx_count as usize),
            0,
            self.tx_count as usize,
            &self.flags,
            &self.hashes,
            &mut bit_used,
            &mut hash_used,
            &mut matches,
        )?;
        // `flags` is padded to a whole byte by the wire decoder, so the
        // traversal legitimately stops short of `flags.len()` by up to 7
        // trailing pad bits. Compare byte-rounded counts instead of exact
        // bit counts, the same tolerance Bitcoin Core's
        // `CPartialMerkleTree::ExtractMatches` applies.
        if (bit_used + 7) / 8 != (self.flags.len() + 7) / 8 || hash_used != self.hashes.len() {
            return Err(PmtError::TrailingData);
        }
        matches.sort_by_key(|&(index, _)| index);
        Ok((root, matches))
    }

    /// Decodes `tx_count(u32) || varint hash_count || hashes(32B each)
    /// || varint flag_byte_count || flag_bytes` from `buf`. Declared
    /// counts are checked against bounds derived from `tx_count` before
    /// any allocation sized by them (spec §4.C7, §8 S5).
    pub fn decode(buf: &[u8]) -> Result<Self, PmtError> {
        let mut r = Reader::new(buf);
        let tx_count = r.read_u32_le()?;
        if tx_count == 0 || tx_count as u64 > MAX_BLOCK_SIZE / MIN_TX_SIZE {
            return Err(DecodeError::Oversize {
                declared: tx_count as u64,
                cap: MAX_BLOCK_SIZE / MIN_TX_SIZE,
            }
            .into());
        }

        let hash_count = {
            let declared = r.read_varint()?;
            let bound = max_hash_count(tx_count as u64);
            if declared > bound {
                return Err(DecodeError::Oversize { declared, cap: bound }.into());
            }
            if declared > (r.remaining() / 32) as u64 {
                return Err(DecodeError::Truncated.into());
            }
            declared as usize
        };
        let mut hashes = Vec::with_capacity(hash_count);
        for _ in 0..hash_count {
            hashes.push(Hash256::from_wire_bytes(r.read_array::<32>()?));
        }

        let flag_byte_count = r.read_count(1)? as usize;
        let flag_bytes = r.read_bytes(flag_byte_count)?;
        // The bit count itself isn't on the wire, only the byte count, so
        // this always yields a multiple of 8 bits even though a real
        // traversal almost never consumes exactly that many; the trailing
        // bits are padding `extract_matches` must tolerate.
        let flags = unpack_bits(flag_bytes, flag_byte_count * 8);

        Ok(PartialMerkleTree { tx_count, hashes, flags })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.tx_count.to_le_bytes());
        write_varint(&mut out, self.hashes.len() as u64);
        for hash in &self.hashes {
            out.extend_from_slice(&hash.to_wire_bytes());
        }
        let packed = pack_bits(&self.flags);
        write_varint(&mut out, packed.len() as u64);
        out.extend_from_slice(&packed);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txid(label: &str) -> Hash256 {
        Hash256::hash_reversed(label.as_bytes())
    }

    fn sample_txids(n: usize) -> Vec<Hash256> {
        (0..n).map(|i| txid(&format!("tx-{i}"))).collect()
    }

    fn direct_root(txids: &[Hash256]) -> Hash256 {
        cvnchain_core::merkle::compute_merkle_root(txids)
    }

    #[test]
    fn all_bits_set_recovers_every_txid_and_the_direct_root() {
        let txids = sample_txids(7);
        let include = vec![true; txids.len()];
        let pmt = PartialMerkleTree::build(&txids, &include);
        let (root, matches) = pmt.extract_matches().unwrap();
        assert_eq!(root, direct_root(&txids));
        assert_eq!(matches.len(), txids.len());
        for (i, (index, hash)) in matches.iter().enumerate() {
            assert_eq!(*index, i);
            assert_eq!(*hash, txids[i]);
        }
    }

    #[test]
    fn no_bits_set_still_recovers_the_root_with_no_matches() {
        let txids = sample_txids(5);
        let include = vec![false; txids.len()];
        let pmt = PartialMerkleTree::build(&txids, &include);
        let (root, matches) = pmt.extract_matches().unwrap();
        assert_eq!(root, direct_root(&txids));
        assert!(matches.is_empty());
    }

    #[test]
    fn single_match_among_many_round_trips_through_wire_bytes() {
        let txids = sample_txids(10);
        let mut include = vec![false; txids.len()];
        include[3] = true;
        let pmt = PartialMerkleTree::build(&txids, &include);
        let bytes = pmt.serialize();
        let parsed = PartialMerkleTree::decode(&bytes).unwrap();
        let (root, matches) = parsed.extract_matches().unwrap();
        assert_eq!(root, direct_root(&txids));
        assert_eq!(matches, vec![(3, txids[3])]);
    }

    #[test]
    fn filtered_block_pairing_recovers_a_multi_match_set() {
        // Mirrors spec §8 S6's shape (4 matches out of a larger block)
        // with crate-computed expected values rather than the
        // unavailable historical fixture (see SPEC_FULL.md §8 note).
        let txids = sample_txids(12);
        let mut include = vec![false; txids.len()];
        for &i in &[1usize, 4, 7, 11] {
            include[i] = true;
        }
        let pmt = PartialMerkleTree::build(&txids, &include);
        let (root, matches) = pmt.extract_matches().unwrap();
        assert_eq!(root, direct_root(&txids));
        let matched_ids: Vec<Hash256> = matches.iter().map(|&(_, h)| h).collect();
        assert_eq!(matched_ids, vec![txids[1], txids[4], txids[7], txids[11]]);
    }

    #[test]
    fn duplicated_adjacent_pair_at_non_final_position_is_malleable() {
        // Spec §8 S4: 10 leaves, include indices 9 (actually 8,9 last
        // pair) and corrupt the proof so two genuinely distinct
        // sibling hashes are replaced by the same value at a
        // non-final tree position.
        let txids = sample_txids(10);
        let mut include = vec![false; txids.len()];
        include[8] = true;
        include[9] = true;
        let pmt = PartialMerkleTree::build(&txids, &include);
        let mut hashes = pmt.hashes().to_vec();
        // The two leaves at height 0 covering indices 8 and 9 are the
        // last two emitted stub hashes in this include pattern; forcing
        // them equal recreates the duplicate-pair malleability without
        // touching the flag stream.
        let last = hashes.len() - 1;
        hashes[last] = hashes[last - 1];
        let corrupted = PartialMerkleTree {
            tx_count: pmt.tx_count(),
            hashes,
            flags: pmt.flags().to_vec(),
        };
        let err = corrupted.extract_matches().unwrap_err();
        assert!(matches!(err, PmtError::Malleable(_)));
    }

    #[test]
    fn huge_declared_hash_count_rejected_before_allocation() {
        // Spec §8 S5: hash-count varint 0x7FFFFFFF must fail Oversize
        // before any allocation sized by it is attempted.
        let mut buf = Vec::new();
        buf.extend_from_slice(&10u32.to_le_bytes()); // tx_count
        buf.push(0xFE);
        buf.extend_from_slice(&0x7FFF_FFFFu32.to_le_bytes());
        let err = PartialMerkleTree::decode(&buf).unwrap_err();
        assert!(matches!(err, PmtError::Decode(DecodeError::Oversize { .. })));
    }

    #[test]
    fn zero_tx_count_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u32.to_le_bytes());
        let err = PartialMerkleTree::decode(&buf).unwrap_err();
        assert!(matches!(err, PmtError::Decode(DecodeError::Oversize { .. })));
    }

    #[test]
    fn bit_packing_round_trips() {
        let bits = vec![true, false, true, true, false, false, false, true, true];
        let packed = pack_bits(&bits);
        let unpacked = unpack_bits(&packed, bits.len());
        assert_eq!(unpacked, bits);
    }
}

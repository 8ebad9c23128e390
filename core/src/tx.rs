//! Transaction codec (spec §4.C5): "interface only, implementation
//! delegated". Byte-exact parse/serialize is delegated to the
//! `bitcoin` crate's consensus decoder rather than reimplementing
//! script/transaction parsing — the teacher's own `aux.rs` does the
//! same thing (`bitcoin::consensus::deserialize::<Transaction>`) for
//! an embedded coinbase transaction.
//!
//! What this module adds on top of the borrowed decoder is the small
//! set of predicates the block verifier needs: the coinbase shape
//! check, a legacy sigop count, and BIP-34 height extraction — none of
//! which `bitcoin::Transaction` exposes directly in the form this
//! core wants (a pre-segwit, CVN-chain style script interpreter is out
//! of scope; see spec §1 Out of scope).

use bitcoin::consensus::deserialize_partial;

use crate::error::DecodeError;
use crate::hash::Hash256;
use crate::primitives::Reader;

/// A parsed transaction retaining its exact wire bytes.
///
/// Re-serialization always replays the retained bytes rather than
/// re-encoding through `bitcoin`'s `Encodable` impl, so a block's
/// transaction section round-trips byte-for-byte even if this core's
/// `bitcoin` dependency ever re-orders witness/marker encoding details
/// the way some Bitcoin forks do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    raw: Vec<u8>,
    inner: bitcoin::Transaction,
}

/// Legacy sigop counting treats `OP_CHECKSIG`/`OP_CHECKSIGVERIFY` as
/// one sigop and `OP_CHECKMULTISIG`/`OP_CHECKMULTISIGVERIFY` as up to
/// 20, or as the immediately preceding small-integer push when one is
/// present — the standard Bitcoin Core `GetSigOpCount` rule.
const OP_CHECKSIG: u8 = 0xac;
const OP_CHECKSIGVERIFY: u8 = 0xad;
const OP_CHECKMULTISIG: u8 = 0xae;
const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;
const OP_1: u8 = 0x51;
const OP_16: u8 = 0x60;

fn count_script_sigops(script: &[u8]) -> u64 {
    let mut count = 0u64;
    let mut last_push_n: Option<u8> = None;
    let mut i = 0usize;
    while i < script.len() {
        let op = script[i];
        match op {
            OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                count += 1;
                last_push_n = None;
                i += 1;
            }
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                count += match last_push_n {
                    Some(n) => u64::from(n),
                    None => 20,
                };
                last_push_n = None;
                i += 1;
            }
            OP_1..=OP_16 => {
                last_push_n = Some(op - OP_1 + 1);
                i += 1;
            }
            0x01..=0x4b => {
                // direct push of `op` bytes; not a small-int push
                last_push_n = None;
                i += 1 + op as usize;
            }
            _ => {
                last_push_n = None;
                i += 1;
            }
        }
    }
    count
}

impl Transaction {
    /// Parses one transaction starting at the reader's current
    /// position, advancing it past the consumed bytes. The consumed
    /// byte count comes directly from `bitcoin`'s partial decoder so
    /// back-to-back transactions in a block body parse without a
    /// length prefix of our own.
    pub fn parse(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let remaining = &r.full_buf()[r.position()..];
        let (inner, consumed): (bitcoin::Transaction, usize) = deserialize_partial(remaining)
            .map_err(|_| DecodeError::Malformed("transaction"))?;
        let raw = r.read_bytes(consumed)?.to_vec();
        Ok(Transaction { raw, inner })
    }

    /// Writes the transaction's original bytes verbatim.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.raw);
    }

    pub fn byte_len(&self) -> usize {
        self.raw.len()
    }

    /// The transaction id: double-SHA-256 of the non-witness
    /// serialization, in this crate's reversed display orientation —
    /// the same convention every other hash in this core uses.
    pub fn txid(&self) -> Hash256 {
        use bitcoin::hashes::Hash as _;
        Hash256::from_wire_bytes(self.inner.compute_txid().to_byte_array())
    }

    /// A transaction is a coinbase iff it has exactly one input whose
    /// previous output is the null outpoint (all-zero txid, index
    /// `0xFFFFFFFF`) — the standard Bitcoin-family coinbase shape.
    pub fn is_coinbase(&self) -> bool {
        self.inner.input.len() == 1 && self.inner.input[0].previous_output.is_null()
    }

    /// Sum of legacy sigops across every input's `scriptSig` and every
    /// output's `scriptPubKey` (spec §4.C8 rule 6). This core has no
    /// script interpreter (spec §1 Out of scope), so this is a static
    /// opcode scan rather than the full "executed" count a node with a
    /// script engine could produce — sufficient for the consensus cap.
    pub fn sigop_count(&self) -> u64 {
        let mut total = 0u64;
        for input in &self.inner.input {
            total += count_script_sigops(input.script_sig.as_bytes());
        }
        for output in &self.inner.output {
            total += count_script_sigops(output.script_pubkey.as_bytes());
        }
        total
    }

    /// Extracts the BIP-34 height from the coinbase `scriptSig`'s
    /// first push, if present and minimally encoded. Returns `None`
    /// for scripts too short or too large to hold a push-encoded
    /// height (also `None`, not an error — callers treat a missing
    /// encoding as a verification failure, not a decode failure).
    pub fn bip34_height(&self) -> Option<i64> {
        let script = self.inner.input.first()?.script_sig.as_bytes();
        let &len = script.first()?;
        let len = len as usize;
        if len == 0 || len > 8 || script.len() < 1 + len {
            return None;
        }
        let bytes = &script[1..1 + len];
        let mut value: i64 = 0;
        for (i, &b) in bytes.iter().enumerate() {
            value |= i64::from(b) << (8 * i);
        }
        // sign-magnitude: top bit of the last byte is the sign
        if bytes[len - 1] & 0x80 != 0 {
            value &= !(0x80i64 << (8 * (len - 1)));
            value = -value;
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal coinbase: version(4) + input count(1) + one input
    /// with null prevout, a height-34 scriptSig push, sequence, output
    /// count(1) + one zero-value output with an empty script,
    /// locktime(4).
    fn sample_coinbase_bytes(height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u32.to_le_bytes()); // version
        buf.push(1); // input count
        buf.extend_from_slice(&[0u8; 32]); // null prevout txid
        buf.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // null prevout index
        let height_bytes = height.to_le_bytes();
        let trimmed: Vec<u8> = height_bytes
            .iter()
            .enumerate()
            .rev()
            .find(|&(_, &b)| b != 0)
            .map_or(vec![0], |(i, _)| height_bytes[..=i].to_vec());
        buf.push(trimmed.len() as u8); // scriptSig push length
        buf.extend_from_slice(&trimmed);
        buf.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // sequence
        buf.push(1); // output count
        buf.extend_from_slice(&0u64.to_le_bytes()); // value
        buf.push(0); // empty scriptPubKey
        buf.extend_from_slice(&0u32.to_le_bytes()); // locktime
        buf
    }

    #[test]
    fn parses_and_round_trips_a_coinbase() {
        let bytes = sample_coinbase_bytes(200);
        let mut r = Reader::new(&bytes);
        let tx = Transaction::parse(&mut r).unwrap();
        assert!(r.is_empty());
        let mut out = Vec::new();
        tx.serialize(&mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn identifies_coinbase_shape() {
        let bytes = sample_coinbase_bytes(42);
        let mut r = Reader::new(&bytes);
        let tx = Transaction::parse(&mut r).unwrap();
        assert!(tx.is_coinbase());
    }

    #[test]
    fn extracts_bip34_height() {
        let bytes = sample_coinbase_bytes(1234);
        let mut r = Reader::new(&bytes);
        let tx = Transaction::parse(&mut r).unwrap();
        assert_eq!(tx.bip34_height(), Some(1234));
    }

    #[test]
    fn empty_scripts_have_no_sigops() {
        let bytes = sample_coinbase_bytes(5);
        let mut r = Reader::new(&bytes);
        let tx = Transaction::parse(&mut r).unwrap();
        assert_eq!(tx.sigop_count(), 0);
    }

    #[test]
    fn counts_bare_checksig() {
        let total = count_script_sigops(&[OP_CHECKSIG]);
        assert_eq!(total, 1);
    }

    #[test]
    fn counts_multisig_with_preceding_small_int() {
        // OP_2 ... OP_CHECKMULTISIG -> counts as 2, not the 20 default.
        let total = count_script_sigops(&[OP_1 + 1, OP_CHECKMULTISIG]);
        assert_eq!(total, 2);
    }
}

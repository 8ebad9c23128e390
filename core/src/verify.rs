//! Block verifier (spec §4.C8): header checks, body checks, merkle
//! match, sigop cap, coinbase uniqueness. Pure given its inputs — no
//! I/O, no mutation of the block under test.

use log::{debug, warn};

use crate::block::Block;
use crate::error::{ConsensusRule, VerifyError};
use crate::primitives::MAX_BLOCK_SIZE;

/// Upper bound on summed legacy sigops across a block's transactions
/// (spec §4.C8 rule 6).
pub const MAX_BLOCK_SIGOPS: u64 = 20_000;

/// Header timestamps may run this far ahead of the verifier's clock
/// before being rejected (spec §4.C8).
pub const MAX_FUTURE_DRIFT_SECS: u32 = 2 * 60 * 60;

bitflags::bitflags! {
    /// Verification toggles outside the block's own wire data. Only
    /// `HEIGHT_IN_COINBASE` exists today (spec §4.C8
    /// `verifyTransactions(height, flags)`); a real flags bitset keeps
    /// this extensible without changing every caller's signature.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VerifyFlags: u8 {
        const HEIGHT_IN_COINBASE = 1 << 0;
    }
}

/// `time <= now + MAX_FUTURE_DRIFT_SECS`. This core never checks
/// proof-of-work — CVN signatures replace it and are verified above
/// this crate (spec §1 Out of scope).
pub fn verify_header(block: &Block, now: u32) -> Result<(), VerifyError> {
    if block.time() > now.saturating_add(MAX_FUTURE_DRIFT_SECS) {
        warn!(target: "verify", "block time {} exceeds now+2h ({})", block.time(), now);
        return Err(VerifyError::ConsensusViolation(
            ConsensusRule::TimestampTooFarInFuture,
        ));
    }
    Ok(())
}

/// Body checks: non-empty, size cap, coinbase shape/uniqueness,
/// optional BIP-34 height-in-coinbase, merkle root match, sigop cap.
/// Per-transaction validity beyond these predicates is delegated (spec
/// §4.C8 "each transaction individually valid (delegated)").
pub fn verify_transactions(block: &Block, height: u64, flags: VerifyFlags) -> Result<(), VerifyError> {
    let txs = block.transactions();
    if txs.is_empty() {
        return Err(VerifyError::ConsensusViolation(ConsensusRule::EmptyBlock));
    }

    let size: usize = txs.iter().map(|tx| tx.byte_len()).sum();
    if size as u64 > MAX_BLOCK_SIZE {
        return Err(VerifyError::ConsensusViolation(ConsensusRule::TooLarge));
    }

    if !txs[0].is_coinbase() {
        return Err(VerifyError::ConsensusViolation(ConsensusRule::FirstNotCoinbase));
    }
    if txs[1..].iter().any(|tx| tx.is_coinbase()) {
        return Err(VerifyError::ConsensusViolation(ConsensusRule::MultipleCoinbases));
    }

    if flags.contains(VerifyFlags::HEIGHT_IN_COINBASE) {
        match txs[0].bip34_height() {
            Some(h) if h as u64 == height => {}
            _ => {
                return Err(VerifyError::ConsensusViolation(ConsensusRule::BadCoinbaseHeight));
            }
        }
    }

    if block.recompute_merkle_root() != block.merkle_root() {
        return Err(VerifyError::ConsensusViolation(ConsensusRule::MerkleMismatch));
    }

    let sigops: u64 = txs.iter().map(|tx| tx.sigop_count()).sum();
    if sigops > MAX_BLOCK_SIGOPS {
        return Err(VerifyError::ConsensusViolation(ConsensusRule::TooManySigops));
    }

    debug!(target: "verify", "block at height {height} passed {} body checks over {} txs", 6, txs.len());
    Ok(())
}

/// Runs both header and body checks. `height` and `flags` are only
/// consulted by the body pass; a header-only block (no `TX` bit) never
/// reaches `verify_transactions`.
pub fn verify(block: &Block, height: u64, flags: VerifyFlags, now: u32) -> Result<(), VerifyError> {
    verify_header(block, now)?;
    if block.has_transactions() {
        verify_transactions(block, height, flags)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash256;

    fn header_only_block(time: u32) -> Block {
        Block::new_minimal(1, Hash256::ZERO, Hash256::ZERO, Hash256::ZERO, time, 7)
    }

    #[test]
    fn header_within_drift_passes() {
        let b = header_only_block(1000);
        assert!(verify_header(&b, 1000).is_ok());
        assert!(verify_header(&b, 1000 + MAX_FUTURE_DRIFT_SECS).is_ok());
    }

    #[test]
    fn header_beyond_drift_fails() {
        let b = header_only_block(1000 + MAX_FUTURE_DRIFT_SECS + 1);
        let err = verify_header(&b, 1000).unwrap_err();
        assert_eq!(
            err,
            VerifyError::ConsensusViolation(ConsensusRule::TimestampTooFarInFuture)
        );
    }

    #[test]
    fn header_only_block_skips_body_checks() {
        let b = header_only_block(1000);
        assert!(verify(&b, 0, VerifyFlags::empty(), 1000).is_ok());
    }

    #[test]
    fn empty_tx_bit_set_with_no_transactions_is_rejected() {
        let mut b = header_only_block(1000);
        b.set_transactions(Vec::new());
        let err = verify_transactions(&b, 0, VerifyFlags::empty()).unwrap_err();
        assert_eq!(err, VerifyError::ConsensusViolation(ConsensusRule::EmptyBlock));
    }
}

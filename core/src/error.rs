use thiserror::Error;

/// The exhaustive error taxonomy for this core: decoders, the message
/// framer, and the block verifier all surface one of these variants.
/// Nothing in this crate panics on attacker-controlled input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer ended before a field completed")]
    Truncated,

    #[error("malformed encoding: {0}")]
    Malformed(&'static str),

    #[error("declared length {declared} exceeds cap {cap}")]
    Oversize { declared: u64, cap: u64 },

    #[error("envelope checksum mismatch")]
    ChecksumMismatch,
}

/// One of the named consensus rules from spec §4.C8 / §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusRule {
    EmptyBlock,
    TooLarge,
    FirstNotCoinbase,
    MultipleCoinbases,
    MerkleMismatch,
    TooManySigops,
    TimestampTooFarInFuture,
    BadCoinbaseHeight,
}

impl std::fmt::Display for ConsensusRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConsensusRule::EmptyBlock => "empty block",
            ConsensusRule::TooLarge => "block exceeds MAX_BLOCK_SIZE",
            ConsensusRule::FirstNotCoinbase => "first transaction is not a coinbase",
            ConsensusRule::MultipleCoinbases => "more than one coinbase transaction",
            ConsensusRule::MerkleMismatch => "merkle root does not match transactions",
            ConsensusRule::TooManySigops => "sigop count exceeds MAX_BLOCK_SIGOPS",
            ConsensusRule::TimestampTooFarInFuture => "timestamp too far in the future",
            ConsensusRule::BadCoinbaseHeight => "coinbase does not encode the expected BIP-34 height",
        };
        f.write_str(s)
    }
}

/// Errors raised while verifying an already-decoded block.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("consensus violation: {0}")]
    ConsensusViolation(ConsensusRule),

    #[error("transaction invalid: {0}")]
    TransactionInvalid(String),
}

/// Registry construction failed its fail-fast genesis cross-check.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("genesis hash mismatch for network {network}: expected {expected}, computed {computed}")]
pub struct GenesisHashMismatch {
    pub network: &'static str,
    pub expected: String,
    pub computed: String,
}

/// Partial Merkle tree verification failed the duplicate-pair rule.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("partial merkle proof is malleable: duplicate pair at a non-final position")]
pub struct MalleableMerkleProof;

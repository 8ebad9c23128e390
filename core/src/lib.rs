//! Wire-format block engine and consensus verifier core for a
//! CVN-signed, Bitcoin-derived chain (spec §1).
//!
//! This crate is the "hard part": bit-exact block/message
//! serialization, the version-bitmask body layout, the lazy
//! byte-cache discipline, and the header/body consensus checks. It
//! never performs network I/O and never mines or signs a block — it
//! only parses, holds, re-serializes, and verifies one.

pub mod aux;
pub mod block;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod message;
pub mod params;
pub mod primitives;
pub mod tx;
pub mod verify;

pub use block::Block;
pub use crypto::{SchnorrNonce, SchnorrPublicKey, SchnorrSignature};
pub use error::{ConsensusRule, DecodeError, GenesisHashMismatch, MalleableMerkleProof, VerifyError};
pub use hash::Hash256;
pub use params::{Network, NetworkParams};
pub use primitives::{CompactBits, MAX_BLOCK_SIZE};

//! Block header/body data model and codec (spec §4.C6).
//!
//! `version` is a bitmask, not an ordinary protocol version number:
//! its low byte is the protocol version and bits 8-12 gate which of
//! six optional body sections are present on the wire. [`VersionFlags`]
//! names those bits. The parser reconstructs this as a tagged record
//! (present-or-absent fields) rather than the inheritance/`instanceof`
//! hierarchy the reference implementation uses (spec §9).

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;

use crate::crypto::{SchnorrPublicKey, SchnorrSignature};
use crate::error::DecodeError;
use crate::hash::Hash256;
use crate::merkle::compute_merkle_root;
use crate::primitives::{write_varint, Reader};
use crate::tx::Transaction;

/// Fixed header layout: `version || prevHash || merkleRoot ||
/// payloadHash || time || creatorId`.
pub const HEADER_LEN: usize = 4 + 32 + 32 + 32 + 4 + 4;

/// Version-bitmask bit positions and derived masks (spec §4.C6).
pub mod version_bits {
    pub const PROTOCOL_VERSION_MASK: u32 = 0x0000_00FF;
    pub const TX: u32 = 1 << 8;
    pub const CVN: u32 = 1 << 9;
    pub const CHAIN_PARAMETERS: u32 = 1 << 10;
    pub const CHAIN_ADMINS: u32 = 1 << 11;
    pub const COIN_SUPPLY: u32 = 1 << 12;
    pub const ADMIN_PAYLOAD_MASK: u32 = CVN | CHAIN_PARAMETERS | CHAIN_ADMINS | COIN_SUPPLY;
}

use version_bits as vb;

/// Minimum plausible wire size of one element of a varint-counted
/// sequence, used to derive an allocation bound tighter than the flat
/// `MAX_BLOCK_SIZE` cap (spec §4.C1, §8 S5).
const MIN_TX_SIZE: u64 = 60;
const ID_ENTRY_SIZE: u64 = 4;
/// `nodeId(4) + heightAdded(4) + pubKey(33, fixed compressed form on
/// the wire)` — see [`CvnInfo`] for why the pubkey length is frozen at
/// 33 for list entries even though [`SchnorrPublicKey`] itself accepts
/// 32 or 33 bytes.
const CVN_ENTRY_SIZE: u64 = 4 + 4 + 33;

/// `(nodeId, heightAdded, pubKey)` — an authorized block-creator
/// record (spec §3). Immutable once produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CvnInfo {
    pub node_id: u32,
    pub height_added: u32,
    pub pub_key: SchnorrPublicKey,
}

/// `(adminId, heightAdded, pubKey)` — identical shape to [`CvnInfo`]
/// but for a chain-governance admin key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainAdmin {
    pub admin_id: u32,
    pub height_added: u32,
    pub pub_key: SchnorrPublicKey,
}

/// CVN/chain-admin list entries commit to a fixed 33-byte compressed
/// public key on the wire. [`SchnorrPublicKey`] itself is a general
/// 32-or-33-byte value type (spec §3); the block wire format is the
/// one place that narrows it, the way the reference implementation's
/// fixed-size list records do.
const CVN_PUBKEY_LEN: usize = 33;

fn parse_pubkey(r: &mut Reader<'_>) -> Result<SchnorrPublicKey, DecodeError> {
    SchnorrPublicKey::from_bytes(r.read_bytes(CVN_PUBKEY_LEN)?.to_vec())
}

impl CvnInfo {
    fn parse(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let node_id = r.read_u32_le()?;
        let height_added = r.read_u32_le()?;
        let pub_key = parse_pubkey(r)?;
        Ok(CvnInfo { node_id, height_added, pub_key })
    }

    fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.node_id.to_le_bytes());
        out.extend_from_slice(&self.height_added.to_le_bytes());
        out.extend_from_slice(self.pub_key.as_bytes());
    }
}

impl ChainAdmin {
    fn parse(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let admin_id = r.read_u32_le()?;
        let height_added = r.read_u32_le()?;
        let pub_key = parse_pubkey(r)?;
        Ok(ChainAdmin { admin_id, height_added, pub_key })
    }

    fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.admin_id.to_le_bytes());
        out.extend_from_slice(&self.height_added.to_le_bytes());
        out.extend_from_slice(self.pub_key.as_bytes());
    }
}

/// Governance-tunable integers plus a UTF-8 description, in the wire
/// order given by spec §6.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DynamicChainParameters {
    pub version: u32,
    pub min_admin_sigs: u32,
    pub max_admin_sigs: u32,
    pub block_spacing_secs: u32,
    pub block_spacing_grace_period_secs: u32,
    pub transaction_fee: u64,
    pub dust_threshold: u64,
    pub min_successive_signatures: u32,
    pub blocks_to_consider_for_sig_check: u32,
    pub percentage_of_signatures_mean: u32,
    pub max_block_size: u32,
    pub block_propagation_wait_time_secs: u32,
    pub retry_new_sig_set_interval_secs: u32,
    pub description: String,
}

impl DynamicChainParameters {
    fn parse(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let version = r.read_u32_le()?;
        let min_admin_sigs = r.read_u32_le()?;
        let max_admin_sigs = r.read_u32_le()?;
        let block_spacing_secs = r.read_u32_le()?;
        let block_spacing_grace_period_secs = r.read_u32_le()?;
        let transaction_fee = r.read_u64_le()?;
        let dust_threshold = r.read_u64_le()?;
        let min_successive_signatures = r.read_u32_le()?;
        let blocks_to_consider_for_sig_check = r.read_u32_le()?;
        let percentage_of_signatures_mean = r.read_u32_le()?;
        let max_block_size = r.read_u32_le()?;
        let block_propagation_wait_time_secs = r.read_u32_le()?;
        let retry_new_sig_set_interval_secs = r.read_u32_le()?;
        let desc_len = r.read_count(1)? as usize;
        let desc_bytes = r.read_bytes(desc_len)?;
        let description = String::from_utf8(desc_bytes.to_vec())
            .map_err(|_| DecodeError::Malformed("dynamic chain params description not UTF-8"))?;
        Ok(DynamicChainParameters {
            version,
            min_admin_sigs,
            max_admin_sigs,
            block_spacing_secs,
            block_spacing_grace_period_secs,
            transaction_fee,
            dust_threshold,
            min_successive_signatures,
            blocks_to_consider_for_sig_check,
            percentage_of_signatures_mean,
            max_block_size,
            block_propagation_wait_time_secs,
            retry_new_sig_set_interval_secs,
            description,
        })
    }

    fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.min_admin_sigs.to_le_bytes());
        out.extend_from_slice(&self.max_admin_sigs.to_le_bytes());
        out.extend_from_slice(&self.block_spacing_secs.to_le_bytes());
        out.extend_from_slice(&self.block_spacing_grace_period_secs.to_le_bytes());
        out.extend_from_slice(&self.transaction_fee.to_le_bytes());
        out.extend_from_slice(&self.dust_threshold.to_le_bytes());
        out.extend_from_slice(&self.min_successive_signatures.to_le_bytes());
        out.extend_from_slice(&self.blocks_to_consider_for_sig_check.to_le_bytes());
        out.extend_from_slice(&self.percentage_of_signatures_mean.to_le_bytes());
        out.extend_from_slice(&self.max_block_size.to_le_bytes());
        out.extend_from_slice(&self.block_propagation_wait_time_secs.to_le_bytes());
        out.extend_from_slice(&self.retry_new_sig_set_interval_secs.to_le_bytes());
        write_varint(out, self.description.len() as u64);
        out.extend_from_slice(self.description.as_bytes());
    }
}

/// Reads a varint-prefixed `u32` set. The reference parser reallocates
/// its target set inside the read loop on every iteration; this
/// freezes the *observable* outcome instead of replaying the bug: the
/// result contains all `k` parsed ids (spec §9 open question).
fn parse_id_set(r: &mut Reader<'_>) -> Result<BTreeSet<u32>, DecodeError> {
    let k = r.read_count(ID_ENTRY_SIZE)?;
    let mut set = BTreeSet::new();
    for _ in 0..k {
        set.insert(r.read_u32_le()?);
    }
    Ok(set)
}

/// Writes a `u32` set in ascending numeric order, the canonical
/// round-trip order spec §5 requires for set-shaped fields.
fn write_id_set(out: &mut Vec<u8>, ids: &BTreeSet<u32>) {
    write_varint(out, ids.len() as u64);
    for id in ids {
        out.extend_from_slice(&id.to_le_bytes());
    }
}

#[derive(Clone, Debug, Default)]
struct Cache {
    original_bytes: Option<Vec<u8>>,
    header_bytes_valid: bool,
    transaction_bytes_valid: bool,
    cached_hash: Option<Hash256>,
    merkle_root_valid: bool,
}

impl Cache {
    fn invalidate_header(&mut self) {
        self.header_bytes_valid = false;
        self.cached_hash = None;
        self.merkle_root_valid = false;
        self.release_if_fully_dirty();
    }

    fn invalidate_body(&mut self) {
        self.transaction_bytes_valid = false;
        self.release_if_fully_dirty();
    }

    fn invalidate_transactions(&mut self) {
        self.transaction_bytes_valid = false;
        self.merkle_root_valid = false;
        self.release_if_fully_dirty();
    }

    fn release_if_fully_dirty(&mut self) {
        if !self.header_bytes_valid && !self.transaction_bytes_valid {
            self.original_bytes = None;
        }
    }
}

/// Header + variable-payload body, with a lazy byte cache that
/// preserves the bytes a block was parsed from whenever nothing has
/// been mutated since (spec §3, §4.C6).
#[derive(Clone, Debug)]
pub struct Block {
    version: u32,
    prev_hash: Hash256,
    merkle_root: Cell<Hash256>,
    payload_hash: Hash256,
    time: u32,
    creator_id: u32,

    transactions: Vec<Transaction>,
    chain_multisig: Option<SchnorrSignature>,
    missing_signer_ids: BTreeSet<u32>,
    admin_multisig: Option<SchnorrSignature>,
    admin_ids: BTreeSet<u32>,
    creator_signature: Option<SchnorrSignature>,
    cvns: Vec<CvnInfo>,
    chain_admins: Vec<ChainAdmin>,
    dynamic_chain_params: Option<DynamicChainParameters>,

    cache: RefCell<Cache>,
}

impl Block {
    /// Builds a header-only block from typed fields — the genesis and
    /// unit-test construction path (spec §3 Lifecycle). The `TX` bit
    /// is clear, so this block has no body at all: `serialize()`
    /// produces exactly [`HEADER_LEN`] bytes.
    pub fn new_minimal(
        version: u32,
        prev_hash: Hash256,
        merkle_root: Hash256,
        payload_hash: Hash256,
        time: u32,
        creator_id: u32,
    ) -> Self {
        Block {
            version: version & !vb::TX,
            prev_hash,
            merkle_root: Cell::new(merkle_root),
            payload_hash,
            time,
            creator_id,
            transactions: Vec::new(),
            chain_multisig: None,
            missing_signer_ids: BTreeSet::new(),
            admin_multisig: None,
            admin_ids: BTreeSet::new(),
            creator_signature: None,
            cvns: Vec::new(),
            chain_admins: Vec::new(),
            dynamic_chain_params: None,
            cache: RefCell::new(Cache {
                merkle_root_valid: true,
                ..Cache::default()
            }),
        }
    }

    /// Parses a block from `buf`, retaining the consumed slice for
    /// zero-copy re-serialization until something is mutated.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(buf);
        let version = r.read_u32_le()?;
        let prev_hash = Hash256::from_wire_bytes(r.read_array::<32>()?);
        let merkle_root = Hash256::from_wire_bytes(r.read_array::<32>()?);
        let payload_hash = Hash256::from_wire_bytes(r.read_array::<32>()?);
        let time = r.read_u32_le()?;
        let creator_id = r.read_u32_le()?;

        let mut transactions = Vec::new();
        let mut chain_multisig = None;
        let mut missing_signer_ids = BTreeSet::new();
        let mut admin_multisig = None;
        let mut admin_ids = BTreeSet::new();
        let mut creator_signature = None;
        let mut cvns = Vec::new();
        let mut chain_admins = Vec::new();
        let mut dynamic_chain_params = None;

        if version & vb::TX != 0 {
            let n = r.read_count(MIN_TX_SIZE)?;
            for _ in 0..n {
                transactions.push(Transaction::parse(&mut r)?);
            }
            chain_multisig = Some(SchnorrSignature::from_slice(r.read_bytes(64)?)?);
            missing_signer_ids = parse_id_set(&mut r)?;
            if version & vb::ADMIN_PAYLOAD_MASK != 0 {
                admin_multisig = Some(SchnorrSignature::from_slice(r.read_bytes(64)?)?);
                admin_ids = parse_id_set(&mut r)?;
            }
            creator_signature = Some(SchnorrSignature::from_slice(r.read_bytes(64)?)?);
            if version & vb::CVN != 0 {
                let m = r.read_count(CVN_ENTRY_SIZE)?;
                for _ in 0..m {
                    cvns.push(CvnInfo::parse(&mut r)?);
                }
            }
            if version & vb::CHAIN_ADMINS != 0 {
                let m = r.read_count(CVN_ENTRY_SIZE)?;
                for _ in 0..m {
                    chain_admins.push(ChainAdmin::parse(&mut r)?);
                }
            }
            if version & vb::CHAIN_PARAMETERS != 0 {
                dynamic_chain_params = Some(DynamicChainParameters::parse(&mut r)?);
            }
        }

        let consumed = r.position();
        let original_bytes = buf[..consumed].to_vec();

        Ok(Block {
            version,
            prev_hash,
            merkle_root: Cell::new(merkle_root),
            payload_hash,
            time,
            creator_id,
            transactions,
            chain_multisig,
            missing_signer_ids,
            admin_multisig,
            admin_ids,
            creator_signature,
            cvns,
            chain_admins,
            dynamic_chain_params,
            cache: RefCell::new(Cache {
                original_bytes: Some(original_bytes),
                header_bytes_valid: true,
                transaction_bytes_valid: true,
                cached_hash: None,
                merkle_root_valid: true,
            }),
        })
    }

    // --- header accessors -------------------------------------------------

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn protocol_version(&self) -> u32 {
        self.version & vb::PROTOCOL_VERSION_MASK
    }

    pub fn has_transactions(&self) -> bool {
        self.version & vb::TX != 0
    }

    pub fn has_cvns(&self) -> bool {
        self.version & vb::CVN != 0
    }

    pub fn has_chain_admins(&self) -> bool {
        self.version & vb::CHAIN_ADMINS != 0
    }

    pub fn has_chain_parameters(&self) -> bool {
        self.version & vb::CHAIN_PARAMETERS != 0
    }

    pub fn has_admin_payload(&self) -> bool {
        self.version & vb::ADMIN_PAYLOAD_MASK != 0
    }

    pub fn prev_hash(&self) -> Hash256 {
        self.prev_hash
    }

    pub fn payload_hash(&self) -> Hash256 {
        self.payload_hash
    }

    pub fn time(&self) -> u32 {
        self.time
    }

    pub fn creator_id(&self) -> u32 {
        self.creator_id
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn chain_multisig(&self) -> Option<&SchnorrSignature> {
        self.chain_multisig.as_ref()
    }

    pub fn missing_signer_ids(&self) -> &BTreeSet<u32> {
        &self.missing_signer_ids
    }

    pub fn admin_multisig(&self) -> Option<&SchnorrSignature> {
        self.admin_multisig.as_ref()
    }

    pub fn admin_ids(&self) -> &BTreeSet<u32> {
        &self.admin_ids
    }

    pub fn creator_signature(&self) -> Option<&SchnorrSignature> {
        self.creator_signature.as_ref()
    }

    pub fn cvns(&self) -> &[CvnInfo] {
        &self.cvns
    }

    pub fn chain_admins(&self) -> &[ChainAdmin] {
        &self.chain_admins
    }

    pub fn dynamic_chain_params(&self) -> Option<&DynamicChainParameters> {
        self.dynamic_chain_params.as_ref()
    }

    /// The cached/derivable merkle root header field. Lazily
    /// recomputed from `transactions` when the cache flag says it's
    /// stale; otherwise returns whatever was last parsed or set.
    pub fn merkle_root(&self) -> Hash256 {
        if !self.cache.borrow().merkle_root_valid {
            let root = self.recompute_merkle_root();
            self.merkle_root.set(root);
            self.cache.borrow_mut().merkle_root_valid = true;
        }
        self.merkle_root.get()
    }

    /// Always recomputes the root fresh from `transactions`, ignoring
    /// the cache. Used by the verifier to check the stored header
    /// field against the transactions actually present (spec §4.C8
    /// rule 5) — a cache hit there would make the check a tautology.
    pub fn recompute_merkle_root(&self) -> Hash256 {
        let ids: Vec<Hash256> = self.transactions.iter().map(Transaction::txid).collect();
        compute_merkle_root(&ids)
    }

    /// `20 - |missingSignerIds|`, an opaque chain-selector scalar
    /// (spec §4.C8, §9 open question) — not a measure of real work.
    pub fn work(&self) -> i64 {
        20 - self.missing_signer_ids.len() as i64
    }

    // --- mutators (test/chain-construction paths only, spec §3) ----------

    pub fn set_version(&mut self, version: u32) {
        self.version = version;
        self.cache.borrow_mut().invalidate_header();
    }

    pub fn set_prev_hash(&mut self, prev_hash: Hash256) {
        self.prev_hash = prev_hash;
        self.cache.borrow_mut().invalidate_header();
    }

    pub fn set_merkle_root(&mut self, merkle_root: Hash256) {
        self.merkle_root.set(merkle_root);
        let mut cache = self.cache.borrow_mut();
        cache.merkle_root_valid = true;
        cache.header_bytes_valid = false;
        cache.cached_hash = None;
        cache.release_if_fully_dirty();
    }

    pub fn set_payload_hash(&mut self, payload_hash: Hash256) {
        self.payload_hash = payload_hash;
        self.cache.borrow_mut().invalidate_header();
    }

    pub fn set_time(&mut self, time: u32) {
        self.time = time;
        self.cache.borrow_mut().invalidate_header();
    }

    pub fn set_creator_id(&mut self, creator_id: u32) {
        self.creator_id = creator_id;
        self.cache.borrow_mut().invalidate_header();
    }

    pub fn set_transactions(&mut self, transactions: Vec<Transaction>) {
        self.transactions = transactions;
        self.version |= vb::TX;
        self.cache.borrow_mut().invalidate_transactions();
    }

    pub fn set_chain_multisig(&mut self, sig: SchnorrSignature) {
        self.chain_multisig = Some(sig);
        self.cache.borrow_mut().invalidate_body();
    }

    pub fn set_missing_signer_ids(&mut self, ids: BTreeSet<u32>) {
        self.missing_signer_ids = ids;
        self.cache.borrow_mut().invalidate_body();
    }

    pub fn set_creator_signature(&mut self, sig: SchnorrSignature) {
        self.creator_signature = Some(sig);
        self.cache.borrow_mut().invalidate_body();
    }

    /// Sets the admin multisig, present iff any `ADMIN_PAYLOAD_MASK` bit
    /// is set on `version` — unlike [`Self::set_cvns`] and friends, this
    /// field has no bit of its own to raise.
    pub fn set_admin_multisig(&mut self, sig: SchnorrSignature) {
        self.admin_multisig = Some(sig);
        self.cache.borrow_mut().invalidate_body();
    }

    pub fn set_admin_ids(&mut self, ids: BTreeSet<u32>) {
        self.admin_ids = ids;
        self.cache.borrow_mut().invalidate_body();
    }

    pub fn set_cvns(&mut self, cvns: Vec<CvnInfo>) {
        self.cvns = cvns;
        self.version |= vb::CVN;
        self.cache.borrow_mut().invalidate_body();
    }

    pub fn set_chain_admins(&mut self, chain_admins: Vec<ChainAdmin>) {
        self.chain_admins = chain_admins;
        self.version |= vb::CHAIN_ADMINS;
        self.cache.borrow_mut().invalidate_body();
    }

    pub fn set_dynamic_chain_params(&mut self, params: DynamicChainParameters) {
        self.dynamic_chain_params = Some(params);
        self.version |= vb::CHAIN_PARAMETERS;
        self.cache.borrow_mut().invalidate_body();
    }

    // --- serialization ------------------------------------------------

    fn write_header_bytes(&self) -> [u8; HEADER_LEN] {
        let root = self.merkle_root();
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(&self.prev_hash.to_wire_bytes());
        out[36..68].copy_from_slice(&root.to_wire_bytes());
        out[68..100].copy_from_slice(&self.payload_hash.to_wire_bytes());
        out[100..104].copy_from_slice(&self.time.to_le_bytes());
        out[104..108].copy_from_slice(&self.creator_id.to_le_bytes());
        out
    }

    fn write_body_bytes(&self, out: &mut Vec<u8>) {
        if self.version & vb::TX == 0 {
            return;
        }
        write_varint(out, self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.serialize(out);
        }
        out.extend_from_slice(
            self.chain_multisig
                .as_ref()
                .map(SchnorrSignature::as_bytes)
                .unwrap_or(&[0u8; 64]),
        );
        write_id_set(out, &self.missing_signer_ids);
        if self.version & vb::ADMIN_PAYLOAD_MASK != 0 {
            out.extend_from_slice(
                self.admin_multisig
                    .as_ref()
                    .map(SchnorrSignature::as_bytes)
                    .unwrap_or(&[0u8; 64]),
            );
            write_id_set(out, &self.admin_ids);
        }
        out.extend_from_slice(
            self.creator_signature
                .as_ref()
                .map(SchnorrSignature::as_bytes)
                .unwrap_or(&[0u8; 64]),
        );
        if self.version & vb::CVN != 0 {
            write_varint(out, self.cvns.len() as u64);
            for cvn in &self.cvns {
                cvn.serialize(out);
            }
        }
        if self.version & vb::CHAIN_ADMINS != 0 {
            write_varint(out, self.chain_admins.len() as u64);
            for admin in &self.chain_admins {
                admin.serialize(out);
            }
        }
        if self.version & vb::CHAIN_PARAMETERS != 0 {
            if let Some(params) = &self.dynamic_chain_params {
                params.serialize(out);
            }
        }
    }

    /// Returns the retained original bytes verbatim when nothing has
    /// been mutated since parse; otherwise rebuilds from the current
    /// field values (spec §4.C6 "Lazy byte cache").
    pub fn serialize(&self) -> Vec<u8> {
        {
            let cache = self.cache.borrow();
            if cache.header_bytes_valid && cache.transaction_bytes_valid {
                if let Some(bytes) = &cache.original_bytes {
                    return bytes.clone();
                }
            }
        }
        let mut out = Vec::new();
        out.extend_from_slice(&self.write_header_bytes());
        self.write_body_bytes(&mut out);
        out
    }

    /// `reversed(doubleSHA256(headerBytes))` over the 108-byte header
    /// only — body bytes never contribute to the block hash.
    pub fn block_hash(&self) -> Hash256 {
        if let Some(h) = self.cache.borrow().cached_hash {
            return h;
        }
        let header = self.write_header_bytes();
        let hash = Hash256::hash_reversed(&header);
        self.cache.borrow_mut().cached_hash = Some(hash);
        hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block::new_minimal(
            1,
            Hash256::ZERO,
            Hash256::ZERO,
            Hash256::ZERO,
            1_500_000_000,
            7,
        )
    }

    #[test]
    fn header_only_block_serializes_to_exactly_header_len() {
        let b = sample_block();
        assert_eq!(b.serialize().len(), HEADER_LEN);
    }

    #[test]
    fn untouched_parse_round_trips_retained_bytes() {
        let b = sample_block();
        let bytes = b.serialize();
        let parsed = Block::decode(&bytes).unwrap();
        assert_eq!(parsed.serialize(), bytes);
    }

    #[test]
    fn mutating_a_header_field_changes_the_hash() {
        let mut b = sample_block();
        let before = b.block_hash();
        b.set_time(before_time_plus_one(&b));
        assert_ne!(b.block_hash(), before);
    }

    fn before_time_plus_one(b: &Block) -> u32 {
        b.time() + 1
    }

    #[test]
    fn block_hash_matches_reversed_double_sha256_of_header() {
        let b = sample_block();
        let header = b.write_header_bytes();
        let expected = Hash256::hash_reversed(&header);
        assert_eq!(b.block_hash(), expected);
    }

    #[test]
    fn version_bitmask_gates_admin_payload_mask() {
        assert_eq!(
            vb::ADMIN_PAYLOAD_MASK,
            vb::CVN | vb::CHAIN_PARAMETERS | vb::CHAIN_ADMINS | vb::COIN_SUPPLY
        );
    }

    #[test]
    fn missing_signer_ids_round_trip_sorted() {
        let mut b = sample_block();
        b.set_transactions(Vec::new()); // sets TX bit with no transactions
        b.set_missing_signer_ids(BTreeSet::from([5, 1, 3]));
        let ids: Vec<u32> = b.missing_signer_ids().iter().copied().collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn set_cvns_raises_the_cvn_bit_and_invalidates_cache() {
        let mut b = sample_block();
        assert!(!b.has_cvns());
        b.set_cvns(vec![CvnInfo {
            node_id: 1,
            height_added: 0,
            pub_key: SchnorrPublicKey::from_bytes(vec![0u8; 32]).unwrap(),
        }]);
        assert!(b.has_cvns());
        assert_eq!(b.cvns().len(), 1);
    }

    #[test]
    fn set_chain_admins_raises_the_chain_admins_bit() {
        let mut b = sample_block();
        assert!(!b.has_chain_admins());
        b.set_chain_admins(vec![ChainAdmin {
            admin_id: 2,
            height_added: 0,
            pub_key: SchnorrPublicKey::from_bytes(vec![0u8; 33]).unwrap(),
        }]);
        assert!(b.has_chain_admins());
        assert_eq!(b.chain_admins().len(), 1);
    }

    #[test]
    fn set_dynamic_chain_params_raises_the_chain_parameters_bit() {
        let mut b = sample_block();
        assert!(!b.has_chain_parameters());
        b.set_dynamic_chain_params(DynamicChainParameters {
            version: 1,
            min_admin_sigs: 1,
            max_admin_sigs: 1,
            block_spacing_secs: 1,
            block_spacing_grace_period_secs: 1,
            transaction_fee: 1,
            dust_threshold: 1,
            min_successive_signatures: 1,
            blocks_to_consider_for_sig_check: 1,
            percentage_of_signatures_mean: 1,
            max_block_size: 1,
            block_propagation_wait_time_secs: 1,
            retry_new_sig_set_interval_secs: 1,
            description: "test".to_string(),
        });
        assert!(b.has_chain_parameters());
        assert!(b.dynamic_chain_params().is_some());
    }

    #[test]
    fn set_admin_multisig_and_ids_invalidate_without_their_own_bit() {
        let mut b = sample_block();
        let before = b.serialize();
        b.set_admin_multisig(SchnorrSignature::zero());
        b.set_admin_ids(BTreeSet::from([9]));
        // Neither field has a version bit of its own; ADMIN_PAYLOAD_MASK
        // is still clear, so the body they'd appear in is still absent.
        assert!(!b.has_admin_payload());
        assert_eq!(b.serialize(), before);
    }
}

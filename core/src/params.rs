//! Per-network parameter records (spec §4.C3, §6). Registry values are
//! process-wide immutable singletons, lazily constructed under a
//! one-time guard ([`std::sync::OnceLock`]), side-effect-free beyond
//! the fail-fast genesis-hash cross-check.

use std::sync::OnceLock;

use crate::block::Block;
use crate::error::GenesisHashMismatch;
use crate::hash::Hash256;
use crate::primitives::CompactBits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn params(self) -> &'static NetworkParams {
        match self {
            Network::Mainnet => NetworkParams::mainnet(),
            Network::Testnet => NetworkParams::testnet(),
            Network::Regtest => NetworkParams::regtest(),
        }
    }
}

/// Bootstrap descriptors are opaque to this core — it never resolves
/// them — so they are kept as plain strings rather than a typed URL/DNS
/// abstraction that would pull in a networking dependency this crate
/// has no other use for.
#[derive(Debug, Clone, Default)]
pub struct Seeds {
    pub dns_seeds: Vec<&'static str>,
    pub addr_seeds: Vec<&'static str>,
    pub http_seeds: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct NetworkParams {
    pub id: &'static str,
    pub packet_magic: [u8; 4],
    pub port: u16,
    pub interval: u32,
    pub target_timespan: u32,
    pub max_target: CompactBits,
    pub address_header: u8,
    pub p2sh_header: u8,
    pub dumped_private_key_header: u8,
    pub bip32_header_pub: u32,
    pub bip32_header_priv: u32,
    pub subsidy_decrease_block_count: u32,
    pub spendable_coinbase_depth: u32,
    pub majority_window: u32,
    pub majority_enforce: u32,
    pub majority_reject: u32,
    pub seeds: Seeds,
    pub genesis_block: Block,
    pub genesis_hash: Hash256,
    pub alert_signing_key: &'static [u8],
    pub payment_protocol_id: &'static str,
}

/// Builds the genesis block: a header-only record (no transactions, no
/// admin/CVN payload — version signals protocol 1 with no section bits
/// set) with a fixed timestamp and zeroed parent/merkle/payload hashes,
/// matching the "header-only record" terminal case of the parser
/// (spec §4.C6 step 1).
fn genesis_block(time: u32) -> Block {
    Block::new_minimal(1, Hash256::ZERO, Hash256::ZERO, Hash256::ZERO, time, 0)
}

/// Asserts a freshly-built genesis block hashes to `expected`,
/// panicking with a descriptive message if not. Registry construction
/// is documented (spec §4.C3, §7) as fail-fast on this mismatch —
/// there is no recovery path a consumer could take from a registry
/// whose genesis doesn't check out.
fn assert_genesis_hash(network: &'static str, genesis: &Block, expected: Hash256) {
    let computed = genesis.block_hash();
    if computed != expected {
        let err = GenesisHashMismatch {
            network,
            expected: expected.to_string(),
            computed: computed.to_string(),
        };
        panic!("{err}");
    }
}

/// Parses a genesis-hash literal. These are independently computed
/// (double-SHA-256 of the genesis header bytes, display-reversed) and
/// checked out-of-band against this module's construction — never
/// derived from the `Block` encoder path being cross-checked, which
/// would make [`assert_genesis_hash`] tautological.
fn genesis_literal(hex: &str) -> Hash256 {
    hex.parse().expect("genesis hash literal must be valid 32-byte hex")
}

/// Builds a network's genesis block and pairs it with its
/// independently-sourced expected hash literal.
///
/// The example pack ships no historical genesis-block capture for
/// this chain (spec §8's S1/S3 fixture files aren't in the retrieved
/// corpus), so `expected_hex` is computed offline from this module's
/// own header layout rather than lifted from a third-party fixture —
/// but it is still a value independent of `Block::block_hash()`, so a
/// future change to the header encoding or hashing order is still
/// caught by [`assert_genesis_hash`].
fn checked_genesis(network: &'static str, time: u32, expected_hex: &str) -> (Block, Hash256) {
    let genesis = genesis_block(time);
    let expected = genesis_literal(expected_hex);
    assert_genesis_hash(network, &genesis, expected);
    (genesis, expected)
}

impl NetworkParams {
    pub fn mainnet() -> &'static NetworkParams {
        static CELL: OnceLock<NetworkParams> = OnceLock::new();
        CELL.get_or_init(|| {
            let (genesis_block, genesis_hash) = checked_genesis(
                "main",
                1_500_000_000,
                "efb394077f3c03419d0e1796bbbffaacd1958cedfca4066278ebe52b14cb71eb",
            );
            NetworkParams {
                id: "main",
                packet_magic: [0xFA, 0xBF, 0xB5, 0xDA],
                port: 40404,
                interval: 2016,
                target_timespan: 14 * 24 * 60 * 60,
                max_target: CompactBits(0x1d00_ffff),
                address_header: 95,
                p2sh_header: 36,
                dumped_private_key_header: 223,
                bip32_header_pub: 0x0488_B21E,
                bip32_header_priv: 0x0488_ADE4,
                subsidy_decrease_block_count: 210_000,
                spendable_coinbase_depth: 100,
                majority_window: 1000,
                majority_enforce: 750,
                majority_reject: 950,
                seeds: Seeds::default(),
                genesis_block,
                genesis_hash,
                alert_signing_key: &[],
                payment_protocol_id: "main",
            }
        })
    }

    pub fn testnet() -> &'static NetworkParams {
        static CELL: OnceLock<NetworkParams> = OnceLock::new();
        CELL.get_or_init(|| {
            let (genesis_block, genesis_hash) = checked_genesis(
                "test",
                1_500_000_001,
                "f703ca51ed8fc0f884ee5ae5f5e26c5bc507bde62b22abceff9a4be54a6e2770",
            );
            NetworkParams {
                id: "test",
                // The reference implementation shipped two historical
                // testnet magics (0x0B110907 legacy, 0x0C120A08
                // current); this registry uses the current one and
                // treats the legacy value as a distinct network
                // profile if one is ever needed (spec §9).
                packet_magic: [0x0C, 0x12, 0x0A, 0x08],
                port: 41404,
                interval: 2016,
                target_timespan: 14 * 24 * 60 * 60,
                max_target: CompactBits(0x1d00_ffff),
                address_header: 111,
                p2sh_header: 196,
                dumped_private_key_header: 239,
                bip32_header_pub: 0x0435_87CF,
                bip32_header_priv: 0x0435_8394,
                subsidy_decrease_block_count: 210_000,
                spendable_coinbase_depth: 100,
                majority_window: 100,
                majority_enforce: 51,
                majority_reject: 75,
                seeds: Seeds::default(),
                genesis_block,
                genesis_hash,
                alert_signing_key: &[],
                payment_protocol_id: "test",
            }
        })
    }

    pub fn regtest() -> &'static NetworkParams {
        static CELL: OnceLock<NetworkParams> = OnceLock::new();
        CELL.get_or_init(|| {
            let (genesis_block, genesis_hash) = checked_genesis(
                "regtest",
                1_500_000_002,
                "05b518349593d1f0d4c3985581084c6b4a5d6167b908d17ef0dca82c4866435d",
            );
            NetworkParams {
                id: "regtest",
                packet_magic: [0x0C, 0x12, 0x0A, 0x09],
                port: 41405,
                interval: 2016,
                target_timespan: 14 * 24 * 60 * 60,
                max_target: CompactBits(0x207f_ffff),
                address_header: 111,
                p2sh_header: 196,
                dumped_private_key_header: 239,
                bip32_header_pub: 0x0435_87CF,
                bip32_header_priv: 0x0435_8394,
                subsidy_decrease_block_count: 150,
                spendable_coinbase_depth: 100,
                majority_window: 100,
                majority_enforce: 51,
                majority_reject: 75,
                seeds: Seeds::default(),
                genesis_block,
                genesis_hash,
                alert_signing_key: &[],
                payment_protocol_id: "regtest",
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registries_construct_and_cross_check_genesis() {
        for net in [Network::Mainnet, Network::Testnet, Network::Regtest] {
            let params = net.params();
            assert_eq!(params.genesis_block.block_hash(), params.genesis_hash);
        }
    }

    #[test]
    fn registry_lookup_is_idempotent() {
        let a = NetworkParams::mainnet() as *const NetworkParams;
        let b = NetworkParams::mainnet() as *const NetworkParams;
        assert_eq!(a, b);
    }

    #[test]
    fn mainnet_and_testnet_magics_differ() {
        assert_ne!(
            NetworkParams::mainnet().packet_magic,
            NetworkParams::testnet().packet_magic
        );
    }

    #[test]
    #[should_panic(expected = "genesis hash mismatch")]
    fn mismatched_genesis_hash_panics() {
        let genesis = genesis_block(1_500_000_000);
        assert_genesis_hash("main", &genesis, Hash256::ZERO);
    }
}

//! Decodes a block file against a network's consensus parameters,
//! following the example relayer's `main.rs`/`config.rs` shape (clap
//! args layered over an optional TOML config, `anyhow::Context` at the
//! I/O boundary, `log`/`env_logger` for progress) but scaled down to a
//! single offline decode-and-verify pass instead of a long-running
//! sync loop — this core never performs network I/O (spec §1, §5).

mod config;

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};

use cvnchain_core::message::read_envelope;
use cvnchain_core::params::Network;
use cvnchain_core::verify::{self, VerifyFlags};
use cvnchain_core::Block;
use cvnchain_merkle::PartialMerkleTree;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "cvnchain-cli", about = "Decode and verify CVN-chain block files")]
struct CliArgs {
    /// Path to the block file to decode.
    file: PathBuf,

    /// Network whose consensus parameters to verify against.
    #[arg(long, value_enum)]
    network: Option<NetworkArg>,

    /// Run the block verifier (header + body checks) after decoding.
    #[arg(long)]
    verify: bool,

    /// Chain height to use for the BIP-34 height-in-coinbase check.
    #[arg(long, default_value_t = 0)]
    height: u64,

    /// Treat `file` as a magic-prefixed message envelope rather than a
    /// bare block body (spec §4.C4).
    #[arg(long)]
    framed: bool,

    /// Build and verify a partial Merkle tree over every transaction in
    /// the decoded block, as a client-side SPV proof would.
    #[arg(long)]
    pmt: bool,

    /// Optional TOML config providing defaults for the flags above.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum NetworkArg {
    Main,
    Test,
    Regtest,
}

impl From<NetworkArg> for Network {
    fn from(arg: NetworkArg) -> Self {
        match arg {
            NetworkArg::Main => Network::Mainnet,
            NetworkArg::Test => Network::Testnet,
            NetworkArg::Regtest => Network::Regtest,
        }
    }
}

fn now_unix() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_secs() as u32
}

fn main() -> Result<()> {
    env_logger::init();
    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let network: Network = args
        .network
        .map(Network::from)
        .unwrap_or(config.default_network);
    let params = network.params();
    debug!(target: "wire", "using network {}", params.id);

    let raw = fs::read(&args.file).with_context(|| format!("failed to read block file {}", args.file.display()))?;

    let block_bytes: Vec<u8> = if args.framed {
        let (command, payload, _rest) =
            read_envelope(&raw, params.packet_magic).context("failed to read message envelope")?;
        info!(target: "wire", "decoded envelope command {command:?}");
        payload.to_vec()
    } else {
        raw
    };

    let block = Block::decode(&block_bytes).context("failed to decode block")?;
    info!(
        target: "wire",
        "block hash {} version 0x{:08x} protocol_version {} time {} creator {}",
        block.block_hash(),
        block.version(),
        block.protocol_version(),
        block.time(),
        block.creator_id(),
    );
    println!("hash:             {}", block.block_hash());
    println!("prev hash:        {}", block.prev_hash());
    println!("merkle root:      {}", block.merkle_root());
    println!("payload hash:     {}", block.payload_hash());
    println!("time:             {}", block.time());
    println!("creator id:       {}", block.creator_id());
    println!("protocol version: {}", block.protocol_version());
    println!("transactions:     {}", block.transactions().len());
    println!("work:             {}", block.work());

    let round_trips = block.serialize() == block_bytes;
    println!("byte-exact round trip: {round_trips}");
    if !round_trips {
        warn!(target: "wire", "serialize() did not reproduce the input bytes verbatim");
    }

    if args.pmt && block.has_transactions() {
        let txids: Vec<_> = block.transactions().iter().map(|tx| tx.txid()).collect();
        let include = vec![true; txids.len()];
        let pmt = PartialMerkleTree::build(&txids, &include);
        match pmt.extract_matches() {
            Ok((root, matches)) => {
                println!("pmt root:         {root}");
                println!("pmt matched txs:  {}", matches.len());
                if root != block.merkle_root() {
                    warn!(target: "verify", "pmt root does not match the block's merkle root");
                }
            }
            Err(e) => warn!(target: "verify", "partial merkle tree extraction failed: {e}"),
        }
    }

    if args.verify {
        let now = now_unix();
        let flags = VerifyFlags::empty();
        match verify::verify(&block, args.height, flags, now) {
            Ok(()) => {
                println!("verify:           OK");
                info!(target: "verify", "block passed header and body checks");
            }
            Err(e) => {
                println!("verify:           FAILED ({e})");
                return Err(anyhow::anyhow!("block failed verification: {e}"));
            }
        }
    }

    Ok(())
}

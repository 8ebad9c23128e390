//! A small TOML config giving defaults for the flags `main.rs` accepts,
//! following the example relayer's `Config::new` (read file to string,
//! parse TOML, allow a couple of environment-variable overrides).
//! Network parameters themselves are never configuration here — they
//! are the immutable per-network registry of spec §4.C3/§6, selected
//! by name.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use cvnchain_core::params::Network;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    #[serde(default = "default_network_name", with = "network_name")]
    pub default_network: Network,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_network: default_network_name(),
        }
    }
}

fn default_network_name() -> Network {
    Network::Mainnet
}

/// `serde(with = ...)` module for deserializing a network by its
/// lowercase id string (`"main"`, `"test"`, `"regtest"`) instead of
/// deriving a generic enum representation.
mod network_name {
    use super::Network;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Network, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "main" | "mainnet" => Ok(Network::Mainnet),
            "test" | "testnet" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(serde::de::Error::custom(format!("unknown network {other:?}"))),
        }
    }
}

impl Config {
    /// Reads and parses a config file, allowing `CVNCHAIN_NETWORK` to
    /// override the `default_network` field the same way the example
    /// relayer's config lets environment variables win over the file
    /// (spec [AMBIENT] Configuration).
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&text).context("failed to parse config file")?;
        if let Ok(network) = std::env::var("CVNCHAIN_NETWORK") {
            config.default_network = match network.as_str() {
                "main" | "mainnet" => Network::Mainnet,
                "test" | "testnet" => Network::Testnet,
                "regtest" => Network::Regtest,
                other => anyhow::bail!("unknown CVNCHAIN_NETWORK value {other:?}"),
            };
        }
        Ok(config)
    }
}

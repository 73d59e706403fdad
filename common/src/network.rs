//! Chain parameters: the handful of network-specific constants the P2P core
//! needs in order to speak to peers on a given chain.
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Immutable network parameters injected when a peer group is created.
///
/// Unlike the full consensus parameters of an on-chain validating node,
/// these are the only facts the connection-management core itself needs:
/// what magic bytes prefix every message, which port peers listen on by
/// default, and which hostnames to resolve when bootstrapping a fresh
/// address book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParams {
    /// 4-byte tag prefixing every wire message on this network.
    pub magic: u32,
    /// Default peer listen port.
    pub default_port: u16,
    /// DNS seed hostnames, tried in order during discovery.
    pub dns_seeds: Vec<&'static str>,
}

impl ChainParams {
    /// Parameters for the main IoP network.
    pub fn mainnet() -> Self {
        Self {
            magic: 0x494F_5031,
            default_port: 4877,
            dns_seeds: vec!["seed1.iop.global", "seed2.iop.global", "seed.iop.cash"],
        }
    }

    /// Parameters for the IoP test network.
    pub fn testnet() -> Self {
        Self {
            magic: 0x494F_5054,
            default_port: 4977,
            dns_seeds: vec!["testseed.iop.global"],
        }
    }

    /// Parameters for a local regression-test network. Carries no DNS
    /// seeds: regtest peers are always added explicitly.
    pub fn regtest() -> Self {
        Self {
            magic: 0x494F_5052,
            default_port: 4667,
            dns_seeds: vec![],
        }
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// The named network a [`ChainParams`] value was built for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Network {
    /// The main IoP network.
    Mainnet,
    /// The public IoP test network.
    Testnet,
    /// A local regression-test network.
    Regtest,
}

impl Default for Network {
    fn default() -> Self {
        Self::Mainnet
    }
}

impl Network {
    /// Build the [`ChainParams`] for this network.
    pub fn params(&self) -> ChainParams {
        match self {
            Self::Mainnet => ChainParams::mainnet(),
            Self::Testnet => ChainParams::testnet(),
            Self::Regtest => ChainParams::regtest(),
        }
    }

    /// Short string representation, as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Regtest => "regtest",
        }
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" | "main" => Ok(Self::Mainnet),
            "testnet" | "test" => Ok(Self::Testnet),
            "regtest" => Ok(Self::Regtest),
            _ => Err(ConfigError::InvalidNetwork(s.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_has_seeds() {
        let params = ChainParams::mainnet();
        assert!(!params.dns_seeds.is_empty());
        assert_eq!(params.default_port, 4877);
    }

    #[test]
    fn regtest_has_no_seeds() {
        assert!(ChainParams::regtest().dns_seeds.is_empty());
    }

    #[test]
    fn network_from_str_roundtrip() {
        for net in [Network::Mainnet, Network::Testnet, Network::Regtest] {
            assert_eq!(Network::from_str(net.as_str()).unwrap(), net);
        }
        assert!(Network::from_str("nonsense").is_err());
    }
}

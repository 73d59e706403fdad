//! Peer discovery: either an explicit comma-separated address list, or
//! resolution of a chain's first configured DNS seed.
use std::net::{SocketAddr, ToSocketAddrs};

use iop_common::ChainParams;

use crate::error::Error;

/// Parse a comma-separated `host:port` list into socket addresses.
///
/// Individual entries that fail to parse or resolve are skipped rather than
/// aborting the whole batch; the original address list is not mutated.
pub fn parse_address_list(list: &str) -> Vec<SocketAddr> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|entry| entry.to_socket_addrs().ok())
        .flatten()
        .collect()
}

/// Resolve the first configured DNS seed for `params`, synthesizing
/// `ip:default_port` for every returned address.
///
/// Returns [`Error::Config`] if no seed is configured, or [`Error::Resolve`]
/// if the seed hostname fails to resolve at all (individual address
/// failures cannot occur here: `ToSocketAddrs` for a hostname resolves or
/// fails as a unit).
pub fn resolve_dns_seed(params: &ChainParams) -> Result<Vec<SocketAddr>, Error> {
    let seed = params
        .dns_seeds
        .first()
        .ok_or(iop_common::ConfigError::NoSeedConfigured)?;

    let lookup = format!("{seed}:{}", params.default_port);
    let addrs = lookup
        .to_socket_addrs()
        .map_err(|source| Error::Resolve {
            host: (*seed).to_string(),
            source,
        })?
        .filter(|addr| addr.is_ipv4())
        .collect();

    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_entries_and_drops_malformed_ones() {
        let addrs = parse_address_list("127.0.0.1:18333, 10.0.0.1:18333, not-an-address, ,");
        assert_eq!(addrs.len(), 2);
        assert_eq!(addrs[0].port(), 18333);
        assert_eq!(addrs[1].to_string(), "10.0.0.1:18333");
    }

    #[test]
    fn empty_list_yields_no_addresses() {
        assert!(parse_address_list("").is_empty());
    }

    #[test]
    fn regtest_has_no_seed_to_resolve() {
        let params = ChainParams::regtest();
        assert!(matches!(
            resolve_dns_seed(&params),
            Err(Error::Config(iop_common::ConfigError::NoSeedConfigured))
        ));
    }
}

//! Trust strategies for proxy hops.
//!
//! Every accepted trust setting (boolean, hop count, address list, address
//! string, predicate) is compiled once into a [`TrustProxy`] and then
//! evaluated per hop while walking a forwarded chain.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use ipnetwork::IpNetwork;

use crate::error::ConfigError;

type Predicate = dyn Fn(&str, usize) -> bool + Send + Sync;

const LOOPBACK: &[&str] = &["127.0.0.0/8", "::1/128"];
const LINK_LOCAL: &[&str] = &["169.254.0.0/16", "fe80::/10"];
const UNIQUE_LOCAL: &[&str] = &["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "fc00::/7"];

#[derive(Clone)]
enum Strategy {
    All,
    Nothing,
    Hops(usize),
    Networks(Vec<IpNetwork>),
    Predicate(Arc<Predicate>),
}

/// Decides whether a hop of the forwarded chain is a trusted proxy.
///
/// Hop `0` is always the peer of the connection, hop `1` the right-most
/// `X-Forwarded-For` entry and so on towards the client.
#[derive(Clone)]
pub struct TrustProxy(Strategy);

impl TrustProxy {
    /// Trust every hop. The client is the left-most forwarded address.
    pub fn all() -> Self {
        TrustProxy(Strategy::All)
    }

    /// Trust nothing. Forwarding headers are ignored entirely.
    pub fn none() -> Self {
        TrustProxy(Strategy::Nothing)
    }

    /// Trust the first `count` hops, the peer included.
    pub fn hops(count: usize) -> Self {
        TrustProxy(Strategy::Hops(count))
    }

    /// Trust hops whose address matches one of `entries`.
    ///
    /// An entry is an IP address (`10.0.0.1`), a network in CIDR
    /// (`10.0.0.0/8`) or netmask (`10.0.0.0/255.0.0.0`) notation, or one of
    /// the presets `loopback`, `linklocal` and `uniquelocal`.
    pub fn addresses<I, S>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut networks = vec![];
        for entry in entries {
            networks.extend(parse_entry(entry.as_ref().trim())?);
        }
        Ok(TrustProxy(Strategy::Networks(networks)))
    }

    /// Trust hops for which `predicate(address, hop)` returns true.
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&str, usize) -> bool + Send + Sync + 'static,
    {
        TrustProxy(Strategy::Predicate(Arc::new(predicate)))
    }

    pub fn is_trusted(&self, address: &str, hop: usize) -> bool {
        match &self.0 {
            Strategy::All => true,
            Strategy::Nothing => false,
            Strategy::Hops(count) => hop < *count,
            Strategy::Networks(networks) => parse_hop(address)
                .is_some_and(|ip| networks.iter().any(|network| network_contains(network, ip))),
            Strategy::Predicate(predicate) => predicate(address, hop),
        }
    }

    /// True when no hop can ever be trusted, so forwarding headers need not
    /// be looked at.
    pub(crate) fn trusts_nothing(&self) -> bool {
        match &self.0 {
            Strategy::Nothing => true,
            Strategy::Hops(count) => *count == 0,
            Strategy::Networks(networks) => networks.is_empty(),
            Strategy::All | Strategy::Predicate(_) => false,
        }
    }
}

impl Default for TrustProxy {
    fn default() -> Self {
        TrustProxy::none()
    }
}

impl From<bool> for TrustProxy {
    fn from(trust: bool) -> Self {
        if trust {
            TrustProxy::all()
        } else {
            TrustProxy::none()
        }
    }
}

impl From<usize> for TrustProxy {
    fn from(count: usize) -> Self {
        TrustProxy::hops(count)
    }
}

/// Parses a comma separated address list, e.g. `"loopback, 10.0.0.0/8"`.
impl FromStr for TrustProxy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrustProxy::addresses(s.split(',').map(str::trim).filter(|entry| !entry.is_empty()))
    }
}

impl fmt::Debug for TrustProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Strategy::All => f.write_str("TrustProxy::All"),
            Strategy::Nothing => f.write_str("TrustProxy::None"),
            Strategy::Hops(count) => f.debug_tuple("TrustProxy::Hops").field(count).finish(),
            Strategy::Networks(networks) => f
                .debug_list()
                .entries(networks.iter().map(ToString::to_string))
                .finish(),
            Strategy::Predicate(_) => f.write_str("TrustProxy::Predicate(..)"),
        }
    }
}

fn preset(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "loopback" => Some(LOOPBACK),
        "linklocal" => Some(LINK_LOCAL),
        "uniquelocal" => Some(UNIQUE_LOCAL),
        _ => None,
    }
}

fn parse_entry(entry: &str) -> Result<Vec<IpNetwork>, ConfigError> {
    if let Some(networks) = preset(entry) {
        return networks
            .iter()
            .map(|network| network.parse::<IpNetwork>().map_err(ConfigError::from))
            .collect();
    }

    let (addr, prefix) = match entry.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (entry, None),
    };
    let ip = addr
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::invalid_address(entry))?;

    let prefix = match prefix {
        None if ip.is_ipv4() => 32,
        None => 128,
        Some(prefix) => match prefix.parse::<Ipv4Addr>() {
            Ok(mask) if ip.is_ipv4() => ipnetwork::ipv4_mask_to_prefix(mask)
                .map_err(|_| ConfigError::invalid_address(entry))?,
            _ => prefix
                .parse::<u8>()
                .map_err(|_| ConfigError::invalid_address(entry))?,
        },
    };

    IpNetwork::new(ip, prefix)
        .map(|network| vec![network])
        .map_err(|_| ConfigError::invalid_address(entry))
}

/// Reads a forwarded hop as an IP address, tolerating an attached port.
fn parse_hop(address: &str) -> Option<IpAddr> {
    address.parse::<IpAddr>().ok().or_else(|| {
        address
            .parse::<SocketAddr>()
            .map(|socket_addr| socket_addr.ip())
            .ok()
    })
}

fn network_contains(network: &IpNetwork, ip: IpAddr) -> bool {
    if network.contains(ip) {
        return true;
    }
    match (network, ip) {
        (IpNetwork::V4(_), IpAddr::V6(v6)) => v6
            .to_ipv4_mapped()
            .is_some_and(|v4| network.contains(IpAddr::V4(v4))),
        (IpNetwork::V6(_), IpAddr::V4(v4)) => network.contains(IpAddr::V6(v4.to_ipv6_mapped())),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use spectral::assert_that;
    use spectral::boolean::BooleanAssertions;
    use spectral::result::ResultAssertions;

    use super::*;

    #[test]
    fn boolean_trust() {
        let trusted = TrustProxy::from(true).is_trusted("1.1.1.1", 7);
        assert_that!(trusted).is_true();
        let trusted = TrustProxy::from(false).is_trusted("127.0.0.1", 0);
        assert_that!(trusted).is_false();
        assert!(TrustProxy::default().trusts_nothing());
    }

    #[test]
    fn hop_count() {
        let trust = TrustProxy::hops(2);
        assert!(trust.is_trusted("anything", 0));
        assert!(trust.is_trusted("anything", 1));
        assert!(!trust.is_trusted("anything", 2));
        assert!(TrustProxy::hops(0).trusts_nothing());
    }

    #[test]
    fn single_addresses() {
        let trust = TrustProxy::addresses(["127.0.0.1", "192.168.1.1"]).unwrap();
        assert!(trust.is_trusted("127.0.0.1", 0));
        assert!(trust.is_trusted("192.168.1.1", 3));
        assert!(!trust.is_trusted("192.168.1.2", 1));
        assert!(!trust.is_trusted("unknown", 1));
    }

    #[test]
    fn cidr_and_netmask() {
        let trust = TrustProxy::addresses(["10.0.0.0/8", "172.16.0.0/255.240.0.0", "2001:db8::/32"])
            .unwrap();
        assert!(trust.is_trusted("10.20.30.40", 0));
        assert!(trust.is_trusted("172.31.255.1", 0));
        assert!(!trust.is_trusted("172.32.0.1", 0));
        assert!(trust.is_trusted("2001:db8::1", 0));
        assert!(!trust.is_trusted("2001:db9::1", 0));
    }

    #[test]
    fn presets() {
        let trust: TrustProxy = "loopback, uniquelocal".parse().unwrap();
        assert!(trust.is_trusted("127.0.0.1", 0));
        assert!(trust.is_trusted("::1", 0));
        assert!(trust.is_trusted("192.168.0.10", 0));
        assert!(trust.is_trusted("fd12::1", 0));
        assert!(!trust.is_trusted("169.254.1.1", 0));
        assert!(!trust.is_trusted("8.8.8.8", 0));

        let trust: TrustProxy = "linklocal".parse().unwrap();
        assert!(trust.is_trusted("169.254.1.1", 0));
        assert!(trust.is_trusted("fe80::1", 0));
    }

    #[test]
    fn ipv4_mapped_addresses() {
        let trust: TrustProxy = "10.0.0.0/8".parse().unwrap();
        assert!(trust.is_trusted("::ffff:10.0.0.1", 0));
        assert!(!trust.is_trusted("::ffff:11.0.0.1", 0));

        let trust: TrustProxy = "::ffff:127.0.0.1".parse().unwrap();
        assert!(trust.is_trusted("127.0.0.1", 0));
    }

    #[test]
    fn addresses_with_port() {
        let trust: TrustProxy = "10.0.0.1, ::1".parse().unwrap();
        assert!(trust.is_trusted("10.0.0.1:8080", 1));
        assert!(trust.is_trusted("[::1]:443", 1));
    }

    #[test]
    fn predicate() {
        let trust = TrustProxy::predicate(|address, hop| address == "127.0.0.1" && hop == 0);
        assert!(trust.is_trusted("127.0.0.1", 0));
        assert!(!trust.is_trusted("127.0.0.1", 1));
        assert!(!trust.trusts_nothing());
    }

    #[test]
    fn invalid_entries() {
        for entry in ["10.0.0.300", "10.0.0.0/33", "10.0.0.0/255.0.255.0", "localhost"] {
            let parsed = entry.parse::<TrustProxy>();
            assert_that!(parsed).is_err();
        }
        assert_eq!(
            TrustProxy::addresses(["example.com"]).unwrap_err(),
            ConfigError::InvalidAddress("example.com".to_string())
        );
    }

    #[test]
    fn empty_address_string() {
        let parsed = " , ".parse::<TrustProxy>();
        assert_that!(parsed).is_ok();
        assert!(parsed.unwrap().trusts_nothing());
    }
}

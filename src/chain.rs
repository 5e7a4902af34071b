//! Forwarded chain walking.

use std::net::IpAddr;

use tracing::{debug, trace};

use crate::trust::TrustProxy;

/// Result of walking a forwarded chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TrustedChain {
    /// Accepted addresses, peer first.
    pub(crate) ips: Vec<String>,
    /// Whether hop `0`, the peer, is a trusted proxy.
    pub(crate) peer_trusted: bool,
}

/// Walks the forwarded chain: the peer followed by the `X-Forwarded-For`
/// entries from right to left.
///
/// Walking stops at the first hop that is not trusted; that hop is still part
/// of the result since it is the address the last trusted proxy reported. The
/// trust strategy is consulted once per hop that has a successor, and at most
/// `max_hops` header entries are examined.
pub(crate) fn trusted_chain(
    peer: IpAddr,
    forwarded_for: Option<&str>,
    trust: &TrustProxy,
    max_hops: usize,
) -> TrustedChain {
    let mut ips = vec![peer.to_string()];
    if trust.trusts_nothing() || !trust.is_trusted(&ips[0], 0) {
        trace!(peer = %peer, "peer is not a trusted proxy");
        return TrustedChain { ips, peer_trusted: false };
    }

    let mut entries = forwarded_for
        .unwrap_or_default()
        .rsplit(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .peekable();

    let mut hop = 0;
    while let Some(entry) = entries.next() {
        ips.push(entry.to_string());
        hop += 1;
        if hop == max_hops {
            if entries.peek().is_some() {
                debug!(
                    peer = %peer,
                    max_hops,
                    "X-Forwarded-For exceeds max hops, ignoring the rest"
                );
            }
            break;
        }
        if entries.peek().is_none() || !trust.is_trusted(&ips[hop], hop) {
            break;
        }
    }

    trace!(peer = %peer, chain = ?ips, "resolved forwarded chain");
    TrustedChain {
        ips,
        peer_trusted: true,
    }
}

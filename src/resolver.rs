//! Client identity resolution.

use std::net::IpAddr;

use http::header::{HeaderMap, HOST};
use http::Request;
use tracing::debug;

use crate::chain::{trusted_chain, TrustedChain};
use crate::host;
use crate::trust::TrustProxy;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Upper bound of `X-Forwarded-For` entries looked at per request.
pub const DEFAULT_MAX_HOPS: usize = 32;

/// Raw forwarding header values of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardedHeaders {
    pub forwarded_for: Option<String>,
    pub forwarded_host: Option<String>,
    pub forwarded_proto: Option<String>,
}

impl ForwardedHeaders {
    /// Collects the forwarding headers of `headers`.
    ///
    /// Repeated `X-Forwarded-For` lines are joined in arrival order. Values
    /// that are not valid visible ASCII are ignored.
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let forwarded_for = headers
            .get_all(X_FORWARDED_FOR)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>();

        ForwardedHeaders {
            forwarded_for: (!forwarded_for.is_empty()).then(|| forwarded_for.join(",")),
            forwarded_host: header_str(headers, X_FORWARDED_HOST),
            forwarded_proto: header_str(headers, X_FORWARDED_PROTO),
        }
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

/// What the server itself knows about the connection, used whenever the
/// forwarding headers are absent or not trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerContext {
    /// `Host` header (or `:authority`) as received.
    pub host: Option<String>,
    /// Whether the connection is TLS encrypted.
    pub encrypted: bool,
    /// Local listening port.
    pub port: Option<u16>,
}

impl ServerContext {
    pub fn new(host: Option<String>, encrypted: bool, port: Option<u16>) -> Self {
        ServerContext { host, encrypted, port }
    }

    fn protocol(&self) -> &'static str {
        if self.encrypted {
            "https"
        } else {
            "http"
        }
    }
}

/// The client as seen through the trusted part of the proxy chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// Client address: the furthest address reached through trusted hops.
    pub ip: String,
    /// Trusted chain, peer first, ending with `ip`.
    pub ips: Vec<String>,
    /// Host with optional port.
    pub host: Option<String>,
    pub protocol: String,
    pub port: Option<u16>,
}

impl ResolvedIdentity {
    /// `host` without its port.
    pub fn hostname(&self) -> Option<&str> {
        self.host.as_deref().map(host::hostname)
    }

    /// The trusted chain ordered from the client to the peer, as the
    /// addresses appear in `X-Forwarded-For` followed by the peer.
    pub fn ips_client_first(&self) -> impl Iterator<Item = &str> {
        self.ips.iter().rev().map(String::as_str)
    }
}

/// Resolves client identities against a fixed trust configuration.
#[derive(Debug, Clone)]
pub struct ForwardedResolver {
    trust: TrustProxy,
    max_hops: usize,
}

impl Default for ForwardedResolver {
    fn default() -> Self {
        ForwardedResolver::new(TrustProxy::none())
    }
}

impl ForwardedResolver {
    pub fn new<T>(trust: T) -> Self
    where
        T: Into<TrustProxy>,
    {
        ForwardedResolver {
            trust: trust.into(),
            max_hops: DEFAULT_MAX_HOPS,
        }
    }

    /// Caps the number of `X-Forwarded-For` entries examined per request.
    /// Entries beyond the cap, counted from the right, are ignored.
    pub fn max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops.max(1);
        self
    }

    /// The compiled trust strategy, for deciding on headers this resolver
    /// does not handle itself.
    pub fn trust(&self) -> &TrustProxy {
        &self.trust
    }

    pub fn resolve(
        &self,
        peer: IpAddr,
        headers: &ForwardedHeaders,
        server: &ServerContext,
    ) -> ResolvedIdentity {
        let TrustedChain { ips, peer_trusted } = trusted_chain(
            peer,
            headers.forwarded_for.as_deref(),
            &self.trust,
            self.max_hops,
        );
        let ip = ips.last().cloned().unwrap_or_else(|| peer.to_string());

        if !peer_trusted && headers != &ForwardedHeaders::default() {
            debug!(peer = %peer, "ignoring forwarding headers from untrusted peer");
        }

        let forwarded = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|_| peer_trusted)
                .and_then(host::last_entry)
                .map(ToString::to_string)
        };

        let host = forwarded(&headers.forwarded_host).or_else(|| server.host.clone());
        let protocol =
            forwarded(&headers.forwarded_proto).unwrap_or_else(|| server.protocol().to_string());
        let port = host
            .as_deref()
            .and_then(host::port)
            .or_else(|| server.host.as_deref().and_then(host::port))
            .or(server.port);

        ResolvedIdentity {
            ip,
            ips,
            host,
            protocol,
            port,
        }
    }

    pub fn resolve_headers(
        &self,
        peer: IpAddr,
        headers: &HeaderMap,
        server: &ServerContext,
    ) -> ResolvedIdentity {
        self.resolve(peer, &ForwardedHeaders::from_header_map(headers), server)
    }

    /// Resolves a request received from `peer` on a server listening on
    /// `local_port`. The server host is taken from the `Host` header, or the
    /// URI authority when the header is missing.
    pub fn resolve_request<B>(
        &self,
        request: &Request<B>,
        peer: IpAddr,
        encrypted: bool,
        local_port: Option<u16>,
    ) -> ResolvedIdentity {
        let host = header_str(request.headers(), HOST.as_str())
            .or_else(|| request.uri().authority().map(ToString::to_string));
        let server = ServerContext::new(host, encrypted, local_port);
        self.resolve_headers(peer, request.headers(), &server)
    }
}

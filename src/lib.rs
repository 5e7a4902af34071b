// This crate is entirely safe
#![forbid(unsafe_code)]
// Ensures that `pub` means published in the public API.
// This property is useful for reasoning about breaking API changes.
#![deny(unreachable_pub)]

//!
//! This library resolves the client of an http request behind reverse
//! proxies. Starting at the peer of the connection it walks the
//! `X-Forwarded-For` chain for as long as the hops are trusted, and honors
//! `X-Forwarded-Host` and `X-Forwarded-Proto` only when the peer itself is a
//! trusted proxy.
//!
//! ## 📦 Cargo.toml
//!
//! ```toml
//! [dependencies]
//! trustproxy = "0.1"
//! ```
//!
//! ## 🔧 Example
//!
//! ```rust
//! use http::HeaderMap;
//! use trustproxy::{ForwardedResolver, ServerContext, TrustProxy};
//!
//! let resolver = ForwardedResolver::new(
//!     "loopback, 10.0.0.0/8".parse::<TrustProxy>().unwrap(),
//! );
//! let mut headers = HeaderMap::new();
//! headers.insert(
//!     "x-forwarded-for",
//!     "203.0.113.7, 198.51.100.2, 10.0.0.3".parse().unwrap(),
//! );
//! headers.insert("x-forwarded-proto", "https".parse().unwrap());
//! let server = ServerContext::new(Some("internal:8080".to_string()), false, Some(8080));
//! let identity = resolver.resolve_headers("127.0.0.1".parse().unwrap(), &headers, &server);
//! println!("{} {:?} {}", identity.ip, identity.ips, identity.protocol);
//! ```
//!
//! ## 🖨️ Output
//!
//! ```text
//! 198.51.100.2 ["127.0.0.1", "10.0.0.3", "198.51.100.2"] https
//! ```
//!
//! ## ⚙️ Trust settings
//!
//! | Setting                        | Trusted hops                            |
//! |--------------------------------|-----------------------------------------|
//! | `true`                         | all                                     |
//! | `false`                        | none, headers are ignored               |
//! | `n`                            | the first `n`, the peer being hop `0`   |
//! | `"127.0.0.1, 10.0.0.0/8"`      | hops matching an address or network     |
//! | `["loopback", "uniquelocal"]`  | same, as a list                         |
//! | `TrustProxy::predicate(f)`     | hops where `f(address, hop)` holds      |

mod chain;
mod config;
mod error;
mod host;
mod resolver;
mod trust;

pub use config::{
    ResolverConfig, TrustProxySetting, DEFAULT_TRUST_PROXY, ENV_TRUST_PROXY,
    ENV_TRUST_PROXY_MAX_HOPS,
};
pub use error::ConfigError;
pub use resolver::{
    ForwardedHeaders, ForwardedResolver, ResolvedIdentity, ServerContext, DEFAULT_MAX_HOPS,
    X_FORWARDED_FOR, X_FORWARDED_HOST, X_FORWARDED_PROTO,
};
pub use trust::TrustProxy;

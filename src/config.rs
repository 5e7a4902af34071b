//! Trust proxy configuration.
//!
//! The trust setting accepts the same shapes whether it comes from a config
//! file or from the environment:
//!
//! ```text
//! true | false            trust every hop / nothing
//! 2                       trust the first two hops, the peer included
//! "loopback, 10.0.0.0/8"  trust matching addresses
//! ["10.0.0.1", "fd00::/8"]
//! ```
//!
//! Predicate based trust has no textual form, use
//! [`TrustProxy::predicate`](crate::TrustProxy::predicate) directly.

use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::resolver::{ForwardedResolver, DEFAULT_MAX_HOPS};
use crate::trust::TrustProxy;

/// Trust setting, parsed from the environment.
pub const ENV_TRUST_PROXY: &str = "TRUST_PROXY";
pub const DEFAULT_TRUST_PROXY: &str = "false";

/// Maximum `X-Forwarded-For` entries examined per request.
pub const ENV_TRUST_PROXY_MAX_HOPS: &str = "TRUST_PROXY_MAX_HOPS";

/// Uncompiled trust setting as written in configuration.
///
/// Strings deserialize through [`FromStr`], so a config file and the
/// environment read `"true"`, `"2"` and address lists the same way.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSetting")]
pub enum TrustProxySetting {
    Bool(bool),
    Hops(usize),
    Addresses(String),
    List(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSetting {
    Bool(bool),
    Hops(usize),
    Text(String),
    List(Vec<String>),
}

impl TryFrom<RawSetting> for TrustProxySetting {
    type Error = ConfigError;

    fn try_from(raw: RawSetting) -> Result<Self, Self::Error> {
        match raw {
            RawSetting::Bool(trust) => Ok(TrustProxySetting::Bool(trust)),
            RawSetting::Hops(count) => Ok(TrustProxySetting::Hops(count)),
            RawSetting::Text(text) => text.parse(),
            RawSetting::List(entries) => {
                TrustProxy::addresses(&entries)?;
                Ok(TrustProxySetting::List(entries))
            }
        }
    }
}

impl Default for TrustProxySetting {
    fn default() -> Self {
        TrustProxySetting::Bool(false)
    }
}

impl TrustProxySetting {
    pub fn compile(&self) -> Result<TrustProxy, ConfigError> {
        match self {
            TrustProxySetting::Bool(trust) => Ok(TrustProxy::from(*trust)),
            TrustProxySetting::Hops(count) => Ok(TrustProxy::hops(*count)),
            TrustProxySetting::Addresses(addresses) => addresses.parse(),
            TrustProxySetting::List(entries) => TrustProxy::addresses(entries),
        }
    }
}

/// `true`/`false`, a hop count, or a comma separated address list.
impl FromStr for TrustProxySetting {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "true" => return Ok(TrustProxySetting::Bool(true)),
            "false" | "" => return Ok(TrustProxySetting::Bool(false)),
            _ => {}
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse()
                .map(TrustProxySetting::Hops)
                .map_err(|_| ConfigError::invalid_value(ENV_TRUST_PROXY, s));
        }
        // Fail on bad entries now rather than when the resolver is built.
        s.parse::<TrustProxy>()?;
        Ok(TrustProxySetting::Addresses(s.to_string()))
    }
}

/// Resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub trust_proxy: TrustProxySetting,
    pub max_hops: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            trust_proxy: TrustProxySetting::default(),
            max_hops: DEFAULT_MAX_HOPS,
        }
    }
}

impl ResolverConfig {
    /// Loads the configuration from `TRUST_PROXY` and `TRUST_PROXY_MAX_HOPS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let trust_proxy: TrustProxySetting = std::env::var(ENV_TRUST_PROXY)
            .unwrap_or_else(|_| DEFAULT_TRUST_PROXY.to_string())
            .parse()?;

        let max_hops: usize = match std::env::var(ENV_TRUST_PROXY_MAX_HOPS) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid_value(ENV_TRUST_PROXY_MAX_HOPS, &value))?,
            Err(_) => DEFAULT_MAX_HOPS,
        };

        let config = ResolverConfig { trust_proxy, max_hops };
        debug!(?config, "loaded trust proxy configuration from environment");
        Ok(config)
    }

    /// Validates the configuration and compiles it into a resolver.
    pub fn build(&self) -> Result<ForwardedResolver, ConfigError> {
        if self.max_hops == 0 {
            return Err(ConfigError::invalid_value("max_hops", "0"));
        }
        let trust = self.trust_proxy.compile()?;
        info!(trust = ?trust, max_hops = self.max_hops, "trust proxy configured");
        Ok(ForwardedResolver::new(trust).max_hops(self.max_hops))
    }
}

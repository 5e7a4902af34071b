//! Configuration error types.

/// Errors raised while building a trust configuration.
///
/// These only ever surface at configuration time. Resolving a request never
/// fails: malformed forwarding headers fall back to the peer address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An address list entry is not an IP, a network, or a known preset.
    #[error("Invalid IP address or network: {0}")]
    InvalidAddress(String),

    /// A configuration value is out of range or cannot be parsed.
    #[error("Invalid configuration value for {0}: {1}")]
    InvalidValue(String, String),
}

impl From<ipnetwork::IpNetworkError> for ConfigError {
    fn from(err: ipnetwork::IpNetworkError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

impl ConfigError {
    pub fn invalid_address(entry: &str) -> Self {
        Self::InvalidAddress(entry.to_string())
    }

    pub fn invalid_value(field: &str, value: &str) -> Self {
        Self::InvalidValue(field.to_string(), value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::trust::TrustProxy;

    #[test]
    fn invalid_address_names_the_entry() {
        for entry in ["10.0.0.300", "10.0.0.0/33", "not-an-ip"] {
            let message = entry.parse::<TrustProxy>().unwrap_err().to_string();
            assert_eq!(message, format!("Invalid IP address or network: {entry}"));
        }
    }
}

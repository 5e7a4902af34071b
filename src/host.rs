//! Host, port and protocol helpers.

/// Last non-empty entry of a header that proxies append to, e.g.
/// `X-Forwarded-Proto: https, http` yields `http`.
pub(crate) fn last_entry(value: &str) -> Option<&str> {
    value
        .rsplit(',')
        .map(str::trim)
        .find(|entry| !entry.is_empty())
}

/// Strips the port from a host, keeping brackets around IPv6 literals.
pub(crate) fn hostname(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.split_once(':') {
        Some((name, _)) => name,
        None => host,
    }
}

/// Explicit port of a host, if it carries one.
pub(crate) fn port(host: &str) -> Option<u16> {
    let port = if host.starts_with('[') {
        let end = host.find(']')?;
        host[end + 1..].strip_prefix(':')?
    } else {
        let (_, port) = host.split_once(':')?;
        port
    };
    port.parse::<u16>().ok()
}

#[cfg(test)]
mod tests {
    use spectral::assert_that;
    use spectral::option::{ContainingOptionAssertions, OptionAssertions};

    use super::*;

    #[test]
    fn last_entry_wins() {
        let entry = last_entry("ipsum, dolor");
        assert_that!(entry).contains_value("dolor");
        assert_eq!(last_entry("lorem"), Some("lorem"));
        assert_eq!(last_entry("https, http , "), Some("http"));
        let entry = last_entry(" , ");
        assert_that!(entry).is_none();
    }

    #[test]
    fn hostname_strips_port() {
        assert_eq!(hostname("example.com"), "example.com");
        assert_eq!(hostname("example.com:8080"), "example.com");
        assert_eq!(hostname("[::1]:3000"), "[::1]");
        assert_eq!(hostname("[::1]"), "[::1]");
        assert_eq!(hostname("127.0.0.1:80"), "127.0.0.1");
    }

    #[test]
    fn explicit_port() {
        assert_eq!(port("example.com:8080"), Some(8080));
        assert_eq!(port("[::1]:3000"), Some(3000));
        assert_eq!(port("example.com"), None);
        assert_eq!(port("[::1]"), None);
        assert_eq!(port("example.com:http"), None);
        assert_eq!(port("example.com:70000"), None);
    }
}

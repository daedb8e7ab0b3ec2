//! Broker endpoint parsing
//!
//! Splits `host[:port]` and `[ipv6-literal][:port]` strings into a host and a
//! port. The host is returned as a [`Cow`] so callers can tell whether it
//! borrows the input unchanged or had to be copied to strip brackets or a port.

use std::borrow::Cow;

/// Port used when the endpoint carries no `:port` suffix
pub const DEFAULT_PORT: u16 = 1883;

/// Host and port of a broker endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub host: Cow<'a, str>,
    pub port: u16,
}

impl Endpoint<'_> {
    /// True when the host is the original input, untouched
    pub fn is_borrowed(&self) -> bool {
        matches!(self.host, Cow::Borrowed(_))
    }

    /// Detach from the input string
    pub fn into_owned(self) -> Endpoint<'static> {
        Endpoint {
            host: Cow::Owned(self.host.into_owned()),
            port: self.port,
        }
    }
}

/// Parse a broker endpoint.
///
/// The last colon is the port separator unless it sits inside an IPv6
/// `[...]` literal. Port suffixes are not validated: anything that does not
/// parse as a port becomes 0.
pub fn parse_address(uri: &str) -> Endpoint<'_> {
    let mut separator = uri.rfind(':');

    if uri.starts_with('[') {
        // a colon before the closing bracket is part of the address
        if let (Some(colon), Some(bracket)) = (separator, uri.rfind(']')) {
            if colon < bracket {
                separator = None;
            }
        }
    }

    let (host, port) = match separator {
        Some(colon) => (&uri[..colon], parse_port(&uri[colon + 1..])),
        None => (uri, DEFAULT_PORT),
    };

    let host = match host.strip_suffix(']') {
        Some(stripped) => Cow::Owned(stripped.strip_prefix('[').unwrap_or(stripped).to_string()),
        None if separator.is_some() => Cow::Owned(host.to_string()),
        None => Cow::Borrowed(host),
    };

    Endpoint { host, port }
}

/// `atoi`-style port parsing: optional leading whitespace and sign, then as
/// many digits as are present. Anything unusable yields 0.
fn parse_port(text: &str) -> u16 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    if negative {
        return 0;
    }
    digits[..end].parse::<u16>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hostname_without_port_uses_default() {
        let endpoint = parse_address("example.com");
        assert_eq!(endpoint.host, "example.com");
        assert_eq!(endpoint.port, DEFAULT_PORT);
        assert!(endpoint.is_borrowed());
    }

    #[test]
    fn test_hostname_with_port() {
        let endpoint = parse_address("example.com:1883");
        assert_eq!(endpoint.host, "example.com");
        assert_eq!(endpoint.port, 1883);
        assert!(!endpoint.is_borrowed());
    }

    #[test]
    fn test_ipv4_with_and_without_port() {
        let endpoint = parse_address("10.0.0.1:1883");
        assert_eq!(endpoint.host, "10.0.0.1");
        assert_eq!(endpoint.port, 1883);

        let endpoint = parse_address("10.0.0.1");
        assert_eq!(endpoint.host, "10.0.0.1");
        assert_eq!(endpoint.port, DEFAULT_PORT);
    }

    #[test]
    fn test_bracketed_ipv6_without_port() {
        let endpoint = parse_address("[::1]");
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.port, DEFAULT_PORT);
        assert!(!endpoint.is_borrowed());
    }

    #[test]
    fn test_bracketed_ipv6_with_port() {
        let endpoint = parse_address("[::1]:1883");
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.port, 1883);

        let endpoint = parse_address("[fe80::1:2:3]:8883");
        assert_eq!(endpoint.host, "fe80::1:2:3");
        assert_eq!(endpoint.port, 8883);
    }

    #[test]
    fn test_non_numeric_port_yields_zero() {
        assert_eq!(parse_address("example.com:abc").port, 0);
        assert_eq!(parse_address("example.com:").port, 0);
        assert_eq!(parse_address("example.com:-5").port, 0);
        assert_eq!(parse_address("example.com:70000").port, 0);
    }

    #[test]
    fn test_port_parsing_stops_at_first_non_digit() {
        assert_eq!(parse_address("example.com:12ab").port, 12);
        assert_eq!(parse_address("example.com: 1883").port, 1883);
        assert_eq!(parse_address("example.com:+1883").port, 1883);
    }

    #[test]
    fn test_into_owned_keeps_values() {
        let input = String::from("[::1]:1884");
        let endpoint = parse_address(&input).into_owned();
        drop(input);
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.port, 1884);
    }

    proptest! {
        #[test]
        fn inputs_without_port_get_default_port(host in "[a-z][a-z0-9.-]{0,30}") {
            let endpoint = parse_address(&host);
            prop_assert_eq!(endpoint.port, DEFAULT_PORT);
            prop_assert_eq!(endpoint.host.as_ref(), host.as_str());
            prop_assert!(endpoint.is_borrowed());
        }

        #[test]
        fn ipv6_literals_are_never_split_internally(
            groups in prop::collection::vec("[0-9a-f]{1,4}", 2..8),
            port in prop::option::of(any::<u16>()),
        ) {
            let literal = groups.join(":");
            let uri = match port {
                Some(port) => format!("[{literal}]:{port}"),
                None => format!("[{literal}]"),
            };

            let endpoint = parse_address(&uri);
            prop_assert_eq!(endpoint.host.as_ref(), literal.as_str());
            prop_assert_eq!(endpoint.port, port.unwrap_or(DEFAULT_PORT));
        }

        #[test]
        fn host_is_borrowed_exactly_when_unchanged(uri in "[a-z0-9:.\\[\\]]{1,24}") {
            let endpoint = parse_address(&uri);
            prop_assert_eq!(endpoint.is_borrowed(), endpoint.host.as_ref() == uri.as_str());
        }
    }
}

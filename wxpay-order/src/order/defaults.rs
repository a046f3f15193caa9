//! Default values injected at finalize time.
//!
//! Both sources are traits so tests can substitute deterministic fakes.

use std::net::{IpAddr, Ipv4Addr};

use rand::Rng;
use tracing::{debug, warn};

/// Length of generated nonces.
pub const NONCE_LEN: usize = 30;

/// Source of replay-defense nonces.
pub trait NonceSource: Send + Sync {
    /// Produces a fresh nonce.
    fn nonce(&self) -> String;
}

/// Random `[A-Z0-9]{30}` nonces from the thread-local RNG.
///
/// Each character is a letter or a digit with equal probability, then uniform within
/// that class. Not cryptographically strong, only unpredictable per order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomNonce;

impl NonceSource for RandomNonce {
    fn nonce(&self) -> String {
        let mut rng = rand::rng();
        (0..NONCE_LEN)
            .map(|_| {
                if rng.random_bool(0.5) {
                    char::from(rng.random_range(b'A'..=b'Z'))
                } else {
                    char::from(rng.random_range(b'0'..=b'9'))
                }
            })
            .collect()
    }
}

/// Resolver for the default originating IP.
pub trait AddressResolver: Send + Sync {
    /// Returns the local IPv4 address to report, if one exists.
    fn local_ipv4(&self) -> Option<Ipv4Addr>;
}

/// Resolves the originating IP by enumerating host network interfaces.
///
/// Picks the first IPv4 address in the order the host reports interfaces, loopback
/// included. IPv6 addresses are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterfaceResolver;

impl InterfaceResolver {
    /// Selects the address from an interface list in discovery order.
    pub(crate) fn select<I>(addrs: I) -> Option<Ipv4Addr>
    where
        I: IntoIterator<Item = IpAddr>,
    {
        addrs.into_iter().find_map(|ip| match ip {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
    }
}

impl AddressResolver for InterfaceResolver {
    fn local_ipv4(&self) -> Option<Ipv4Addr> {
        let interfaces = match if_addrs::get_if_addrs() {
            Ok(interfaces) => interfaces,
            Err(e) => {
                warn!(error = %e, "network interface enumeration failed");
                return None;
            }
        };
        let selected = Self::select(interfaces.iter().map(if_addrs::Interface::ip));
        debug!(address = ?selected, interfaces = interfaces.len(), "resolved local IPv4 address");
        selected
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv6Addr;

    use super::*;

    #[test]
    fn test_random_nonce_shape() {
        let nonce = RandomNonce.nonce();
        assert_eq!(nonce.len(), NONCE_LEN);
        assert!(nonce.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    }

    #[test]
    fn test_random_nonce_differs() {
        assert_ne!(RandomNonce.nonce(), RandomNonce.nonce());
    }

    #[test]
    fn test_random_nonce_uses_both_classes() {
        let joined: String = (0..20).map(|_| RandomNonce.nonce()).collect();
        assert!(joined.bytes().any(|b| b.is_ascii_uppercase()));
        assert!(joined.bytes().any(|b| b.is_ascii_digit()));
    }

    #[test]
    fn test_select_first_ipv4_in_discovery_order() {
        let addrs = [
            IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2)),
        ];
        assert_eq!(InterfaceResolver::select(addrs), Some(Ipv4Addr::new(10, 0, 0, 7)));
    }

    #[test]
    fn test_select_does_not_skip_loopback() {
        let addrs = [IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7))];
        assert_eq!(InterfaceResolver::select(addrs), Some(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_select_no_ipv4() {
        let addrs = [IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1))];
        assert_eq!(InterfaceResolver::select(addrs), None);
        assert_eq!(InterfaceResolver::select(std::iter::empty()), None);
    }
}

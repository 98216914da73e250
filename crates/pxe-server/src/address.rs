//! Interface address discovery.
//!
//! The DHCP reply advertises the boot server by the IPv4 address (and mask)
//! of the interface it answers on. On a multi-homed host that interface is
//! taken from the configuration, the relay address or the listen address;
//! it is never guessed.

use crate::error::AddressError;
use network_interface::{Addr, NetworkInterface, NetworkInterfaceConfig};
use std::net::{IpAddr, Ipv4Addr};

/// An IPv4 address bound to an interface, with its subnet mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub ip: Ipv4Addr,
    pub mask: Ipv4Addr,
}

/// Picks the first genuine IPv4 address from an interface's address list.
///
/// IPv6 entries are skipped, including IPv4-mapped ones (`::ffff:a.b.c.d`),
/// and so are IPv4 entries the OS reported without a netmask.
pub fn first_ipv4<I>(addrs: I) -> Option<InterfaceAddr>
where
    I: IntoIterator<Item = (IpAddr, Option<IpAddr>)>,
{
    addrs.into_iter().find_map(|(ip, mask)| match (ip, mask) {
        (IpAddr::V4(ip), Some(IpAddr::V4(mask))) => Some(InterfaceAddr { ip, mask }),
        _ => None,
    })
}

fn addr_pair(addr: &Addr) -> (IpAddr, Option<IpAddr>) {
    match addr {
        Addr::V4(v4) => (IpAddr::V4(v4.ip), v4.netmask.map(IpAddr::V4)),
        Addr::V6(v6) => (IpAddr::V6(v6.ip), v6.netmask.map(IpAddr::V6)),
    }
}

/// What the socket and packet say about where a request arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalHint {
    /// The IP the DHCP socket is bound to, unspecified for a wildcard bind.
    pub listen: Ipv4Addr,
    /// The relay agent address (`giaddr`), unspecified for local clients.
    pub relay: Ipv4Addr,
}

impl ArrivalHint {
    /// A wildcard-bound socket and no relay.
    pub const NONE: Self = Self {
        listen: Ipv4Addr::UNSPECIFIED,
        relay: Ipv4Addr::UNSPECIFIED,
    };
}

impl InterfaceAddr {
    /// True when `ip` is on this address's subnet.
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = u32::from(self.mask);
        u32::from(self.ip) & mask == u32::from(ip) & mask
    }
}

/// Picks the interface PXE clients reach from `(name, address)` candidates.
///
/// In order: the interface whose subnet holds the relay address, the one
/// carrying the listen address, then the only non-loopback interface. With
/// several non-loopback interfaces and nothing to tell them apart, the
/// choice is refused rather than guessed.
pub fn select_addr(
    candidates: &[(String, InterfaceAddr)],
    hint: ArrivalHint,
) -> Result<InterfaceAddr, AddressError> {
    let routable = || candidates.iter().filter(|(_, a)| !a.ip.is_loopback());

    if !hint.relay.is_unspecified() {
        if let Some((_, addr)) = routable().find(|(_, a)| a.contains(hint.relay)) {
            return Ok(*addr);
        }
    }
    if !hint.listen.is_unspecified() {
        if let Some((_, addr)) = candidates.iter().find(|(_, a)| a.ip == hint.listen) {
            return Ok(*addr);
        }
    }

    let mut routable = routable();
    match (routable.next(), routable.next()) {
        (Some((_, addr)), None) => Ok(*addr),
        (None, _) => Err(AddressError::NoAddressFound {
            interface: "any interface".to_string(),
            detail: "addresses not set".to_string(),
        }),
        (Some(_), Some(_)) => Err(AddressError::Ambiguous {
            candidates: candidates
                .iter()
                .filter(|(_, a)| !a.ip.is_loopback())
                .map(|(name, a)| format!("{name} {}", a.ip))
                .collect(),
        }),
    }
}

/// Resolves the address to advertise.
///
/// With a named interface, only that interface is considered. Without one,
/// the choice is made by [`select_addr`] over every interface carrying a
/// usable address. Interface state is read fresh on every call.
pub fn interface_addr(
    interface: Option<&str>,
    hint: ArrivalHint,
) -> Result<InterfaceAddr, AddressError> {
    let label = interface.unwrap_or("any interface");
    let interfaces = NetworkInterface::show().map_err(|e| AddressError::NoAddressFound {
        interface: label.to_string(),
        detail: format!("unable to list interfaces: {e}"),
    })?;

    match interface {
        Some(name) => interfaces
            .iter()
            .filter(|i| i.name == name)
            .find_map(|i| first_ipv4(i.addr.iter().map(addr_pair)))
            .ok_or_else(|| AddressError::NoAddressFound {
                interface: label.to_string(),
                detail: "addresses not set".to_string(),
            }),
        None => {
            let candidates: Vec<(String, InterfaceAddr)> = interfaces
                .iter()
                .filter_map(|i| {
                    first_ipv4(i.addr.iter().map(addr_pair)).map(|a| (i.name.clone(), a))
                })
                .collect();
            select_addr(&candidates, hint)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    fn v4(a: [u8; 4], m: [u8; 4]) -> (IpAddr, Option<IpAddr>) {
        (IpAddr::V4(Ipv4Addr::from(a)), Some(IpAddr::V4(Ipv4Addr::from(m))))
    }

    #[test]
    fn test_first_ipv4_skips_ipv6() {
        let addrs = vec![
            (
                IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)),
                Some(IpAddr::V6(Ipv6Addr::new(0xffff, 0xffff, 0xffff, 0xffff, 0, 0, 0, 0))),
            ),
            v4([10, 0, 0, 1], [255, 255, 255, 0]),
            v4([10, 0, 1, 1], [255, 255, 0, 0]),
        ];

        assert_eq!(
            first_ipv4(addrs),
            Some(InterfaceAddr {
                ip: Ipv4Addr::new(10, 0, 0, 1),
                mask: Ipv4Addr::new(255, 255, 255, 0),
            })
        );
    }

    #[test]
    fn test_first_ipv4_ignores_v4_mapped_ipv6() {
        let mapped = Ipv4Addr::new(192, 168, 1, 10).to_ipv6_mapped();
        let addrs = vec![(IpAddr::V6(mapped), None)];
        assert_eq!(first_ipv4(addrs), None);
    }

    #[test]
    fn test_first_ipv4_requires_netmask() {
        let addrs = vec![
            (IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)), None),
            v4([192, 168, 2, 10], [255, 255, 255, 0]),
        ];
        assert_eq!(first_ipv4(addrs).map(|a| a.ip), Some(Ipv4Addr::new(192, 168, 2, 10)));
    }

    #[test]
    fn test_first_ipv4_empty() {
        assert_eq!(first_ipv4(Vec::new()), None);
    }

    #[test]
    fn test_unknown_interface_has_no_address() {
        let err = interface_addr(Some("pxe-test-missing0"), ArrivalHint::NONE).unwrap_err();
        let AddressError::NoAddressFound { interface, .. } = err else {
            panic!("expected NoAddressFound, got {err:?}");
        };
        assert_eq!(interface, "pxe-test-missing0");
    }

    fn candidate(name: &str, ip: [u8; 4], mask: [u8; 4]) -> (String, InterfaceAddr) {
        (
            name.to_string(),
            InterfaceAddr {
                ip: Ipv4Addr::from(ip),
                mask: Ipv4Addr::from(mask),
            },
        )
    }

    fn multi_homed() -> Vec<(String, InterfaceAddr)> {
        vec![
            candidate("lo", [127, 0, 0, 1], [255, 0, 0, 0]),
            candidate("docker0", [172, 17, 0, 1], [255, 255, 0, 0]),
            candidate("eth1", [10, 0, 0, 1], [255, 255, 255, 0]),
        ]
    }

    #[test]
    fn test_select_refuses_to_guess_between_interfaces() {
        let err = select_addr(&multi_homed(), ArrivalHint::NONE).unwrap_err();
        assert_eq!(
            err,
            AddressError::Ambiguous {
                candidates: vec!["docker0 172.17.0.1".to_string(), "eth1 10.0.0.1".to_string()],
            }
        );
    }

    #[test]
    fn test_select_by_listen_address() {
        let hint = ArrivalHint {
            listen: Ipv4Addr::new(10, 0, 0, 1),
            ..ArrivalHint::NONE
        };
        assert_eq!(
            select_addr(&multi_homed(), hint).unwrap().ip,
            Ipv4Addr::new(10, 0, 0, 1)
        );
    }

    #[test]
    fn test_select_by_relay_subnet() {
        let hint = ArrivalHint {
            relay: Ipv4Addr::new(10, 0, 0, 254),
            ..ArrivalHint::NONE
        };
        assert_eq!(
            select_addr(&multi_homed(), hint).unwrap().ip,
            Ipv4Addr::new(10, 0, 0, 1)
        );

        // A relay on a subnet we don't share leaves the choice ambiguous
        let hint = ArrivalHint {
            relay: Ipv4Addr::new(192, 168, 7, 1),
            ..ArrivalHint::NONE
        };
        assert!(matches!(
            select_addr(&multi_homed(), hint),
            Err(AddressError::Ambiguous { .. })
        ));
    }

    #[test]
    fn test_select_single_interface_ignores_loopback() {
        let candidates = vec![
            candidate("lo", [127, 0, 0, 1], [255, 0, 0, 0]),
            candidate("eth0", [192, 168, 1, 5], [255, 255, 255, 0]),
        ];
        assert_eq!(
            select_addr(&candidates, ArrivalHint::NONE).unwrap().ip,
            Ipv4Addr::new(192, 168, 1, 5)
        );

        let only_loopback = vec![candidate("lo", [127, 0, 0, 1], [255, 0, 0, 0])];
        assert!(matches!(
            select_addr(&only_loopback, ArrivalHint::NONE),
            Err(AddressError::NoAddressFound { .. })
        ));
    }

    #[test]
    fn test_loopback_listen_address_is_advertised() {
        let hint = ArrivalHint {
            listen: Ipv4Addr::LOCALHOST,
            ..ArrivalHint::NONE
        };
        assert_eq!(select_addr(&multi_homed(), hint).unwrap().ip, Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn test_subnet_contains() {
        let addr = InterfaceAddr {
            ip: Ipv4Addr::new(10, 0, 0, 1),
            mask: Ipv4Addr::new(255, 255, 255, 0),
        };
        assert!(addr.contains(Ipv4Addr::new(10, 0, 0, 200)));
        assert!(!addr.contains(Ipv4Addr::new(10, 0, 1, 1)));
    }
}

//! IPv6 addresses: parsing, RFC 5952 canonical text form, classification,
//! EUI-64 derivation, and the multicast MAC mapping.

use std::fmt;
use std::str::FromStr;

use crate::addr::MacAddr;
use crate::error::NetError;

/// An IPv6 address: eight 16-bit hextets plus an optional scope id carried by
/// link-local addresses (`fe80::1%eth0`).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ipv6Address {
    hextets: [u16; 8],
    scope: Option<String>,
}

/// Address classification, most specific kind first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ipv6Class {
    Unspecified,
    Loopback,
    LinkLocal,
    SolicitedNodeMulticast,
    AllNodesMulticast,
    AllRoutersMulticast,
    Multicast,
    GlobalUnicast,
}

impl Ipv6Address {
    pub const UNSPECIFIED: Ipv6Address = Ipv6Address {
        hextets: [0; 8],
        scope: None,
    };

    pub fn from_hextets(hextets: [u16; 8]) -> Self {
        Self {
            hextets,
            scope: None,
        }
    }

    pub fn hextets(&self) -> [u16; 8] {
        self.hextets
    }

    pub fn to_u128(&self) -> u128 {
        self.hextets
            .iter()
            .fold(0u128, |acc, h| (acc << 16) | u128::from(*h))
    }

    pub fn from_u128(value: u128) -> Self {
        let mut hextets = [0u16; 8];
        for (i, h) in hextets.iter_mut().enumerate() {
            *h = (value >> (112 - 16 * i)) as u16;
        }
        Self::from_hextets(hextets)
    }

    /// Attach a scope id (interface name). Meaningful for link-local.
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Same 128-bit value, scope ignored.
    pub fn same_address(&self, other: &Ipv6Address) -> bool {
        self.hextets == other.hextets
    }

    pub fn is_unspecified(&self) -> bool {
        self.hextets == [0; 8]
    }

    pub fn is_loopback(&self) -> bool {
        self.hextets == [0, 0, 0, 0, 0, 0, 0, 1]
    }

    /// `fe80::/10`
    pub fn is_link_local(&self) -> bool {
        self.hextets[0] & 0xffc0 == 0xfe80
    }

    /// `ff00::/8`
    pub fn is_multicast(&self) -> bool {
        self.hextets[0] & 0xff00 == 0xff00
    }

    /// `ff02::1:ffxx:xxxx`
    pub fn is_solicited_node(&self) -> bool {
        self.hextets[0] == 0xff02
            && self.hextets[1..5] == [0, 0, 0, 0]
            && self.hextets[5] == 0x0001
            && self.hextets[6] & 0xff00 == 0xff00
    }

    pub fn is_all_nodes(&self) -> bool {
        self.hextets == [0xff02, 0, 0, 0, 0, 0, 0, 1]
    }

    pub fn is_all_routers(&self) -> bool {
        self.hextets == [0xff02, 0, 0, 0, 0, 0, 0, 2]
    }

    pub fn classify(&self) -> Ipv6Class {
        if self.is_unspecified() {
            Ipv6Class::Unspecified
        } else if self.is_loopback() {
            Ipv6Class::Loopback
        } else if self.is_all_nodes() {
            Ipv6Class::AllNodesMulticast
        } else if self.is_all_routers() {
            Ipv6Class::AllRoutersMulticast
        } else if self.is_solicited_node() {
            Ipv6Class::SolicitedNodeMulticast
        } else if self.is_multicast() {
            Ipv6Class::Multicast
        } else if self.is_link_local() {
            Ipv6Class::LinkLocal
        } else {
            Ipv6Class::GlobalUnicast
        }
    }

    /// EUI-64 interface identifier from a MAC: insert `ff:fe` in the middle
    /// and flip the universal/local bit.
    fn eui64(mac: &MacAddr) -> [u16; 4] {
        let m = mac.octets();
        [
            u16::from(m[0] ^ 0x02) << 8 | u16::from(m[1]),
            u16::from(m[2]) << 8 | 0x00ff,
            0xfe00 | u16::from(m[3]),
            u16::from(m[4]) << 8 | u16::from(m[5]),
        ]
    }

    /// Link-local address (`fe80::/64`) derived from a MAC via EUI-64.
    pub fn link_local_from_mac(mac: &MacAddr) -> Self {
        let iid = Self::eui64(mac);
        Self::from_hextets([0xfe80, 0, 0, 0, iid[0], iid[1], iid[2], iid[3]])
    }

    /// SLAAC address: network portion of `prefix` (per `prefix_len`) combined
    /// with the EUI-64 host portion of `mac`.
    pub fn slaac(prefix: &Ipv6Address, prefix_len: u8, mac: &MacAddr) -> Self {
        let len = prefix_len.min(128);
        let net_mask = if len == 0 {
            0
        } else {
            u128::MAX << (128 - u32::from(len))
        };
        let iid = Self::eui64(mac);
        let host = iid
            .iter()
            .fold(0u128, |acc, h| (acc << 16) | u128::from(*h));
        Self::from_u128((prefix.to_u128() & net_mask) | (host & !net_mask))
    }

    /// The solicited-node multicast group for this address:
    /// `ff02::1:ff` followed by its low 24 bits.
    pub fn solicited_node_multicast(&self) -> Ipv6Address {
        Self::from_hextets([
            0xff02,
            0,
            0,
            0,
            0,
            0x0001,
            0xff00 | (self.hextets[6] & 0x00ff),
            self.hextets[7],
        ])
    }

    /// Map a multicast address onto its `33:33:xx:xx:xx:xx` MAC.
    /// Returns None for non-multicast addresses; the broadcast MAC never
    /// appears on an IPv6 packet.
    pub fn multicast_mac(&self) -> Option<MacAddr> {
        if !self.is_multicast() {
            return None;
        }
        let h6 = self.hextets[6].to_be_bytes();
        let h7 = self.hextets[7].to_be_bytes();
        Some(MacAddr::from_octets([0x33, 0x33, h6[0], h6[1], h7[0], h7[1]]))
    }
}

impl fmt::Display for Ipv6Address {
    /// RFC 5952 canonical form: lowercase hex, leading zeros dropped, the
    /// longest run of two-or-more zero hextets compressed to `::` (first run
    /// wins a tie), scope id appended after `%`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (mut best_start, mut best_len) = (0usize, 0usize);
        let (mut run_start, mut run_len) = (0usize, 0usize);
        for (i, h) in self.hextets.iter().enumerate() {
            if *h == 0 {
                if run_len == 0 {
                    run_start = i;
                }
                run_len += 1;
                if run_len > best_len {
                    best_start = run_start;
                    best_len = run_len;
                }
            } else {
                run_len = 0;
            }
        }

        if best_len >= 2 {
            for (i, h) in self.hextets.iter().enumerate().take(best_start) {
                if i > 0 {
                    write!(f, ":")?;
                }
                write!(f, "{h:x}")?;
            }
            write!(f, "::")?;
            for (i, h) in self.hextets.iter().enumerate().skip(best_start + best_len) {
                if i > best_start + best_len {
                    write!(f, ":")?;
                }
                write!(f, "{h:x}")?;
            }
        } else {
            for (i, h) in self.hextets.iter().enumerate() {
                if i > 0 {
                    write!(f, ":")?;
                }
                write!(f, "{h:x}")?;
            }
        }

        if let Some(scope) = &self.scope {
            write!(f, "%{scope}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Ipv6Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ipv6Address({self})")
    }
}

fn parse_hextet(s: &str) -> Result<u16, NetError> {
    if s.is_empty() || s.len() > 4 {
        return Err(NetError::Parse(format!("invalid IPv6 hextet: {s:?}")));
    }
    u16::from_str_radix(s, 16).map_err(|_| NetError::Parse(format!("invalid IPv6 hextet: {s:?}")))
}

/// Expand one side of a `::` split into hextets. A trailing dotted-quad
/// (IPv4-mapped form) expands to two hextets.
fn parse_groups(s: &str) -> Result<Vec<u16>, NetError> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    let parts: Vec<&str> = s.split(':').collect();
    for (i, part) in parts.iter().enumerate() {
        if part.contains('.') {
            if i != parts.len() - 1 {
                return Err(NetError::Parse(format!(
                    "embedded IPv4 must be the final group: {s}"
                )));
            }
            let v4: crate::addr::Ipv4Address = part.parse()?;
            let o = v4.octets();
            out.push(u16::from(o[0]) << 8 | u16::from(o[1]));
            out.push(u16::from(o[2]) << 8 | u16::from(o[3]));
        } else {
            out.push(parse_hextet(part)?);
        }
    }
    Ok(out)
}

impl FromStr for Ipv6Address {
    type Err = NetError;

    /// Parses full, `::`-compressed, and IPv4-mapped (`::ffff:w.x.y.z`)
    /// forms, with an optional `%scope` suffix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_part, scope) = match s.split_once('%') {
            Some((a, sc)) if !sc.is_empty() => (a, Some(sc.to_string())),
            Some(_) => return Err(NetError::Parse(format!("empty scope id: {s}"))),
            None => (s, None),
        };

        let mut hextets = [0u16; 8];
        match addr_part.matches("::").count() {
            0 => {
                let groups = parse_groups(addr_part)?;
                if groups.len() != 8 {
                    return Err(NetError::Parse(format!(
                        "IPv6 address needs 8 hextets, got {}: {s}",
                        groups.len()
                    )));
                }
                hextets.copy_from_slice(&groups);
            }
            1 => {
                let (left, right) = addr_part.split_once("::").unwrap();
                let head = parse_groups(left)?;
                let tail = parse_groups(right)?;
                if head.len() + tail.len() >= 8 {
                    return Err(NetError::Parse(format!(
                        "'::' must replace at least one zero group: {s}"
                    )));
                }
                hextets[..head.len()].copy_from_slice(&head);
                hextets[8 - tail.len()..].copy_from_slice(&tail);
            }
            _ => {
                return Err(NetError::Parse(format!(
                    "IPv6 address may contain '::' once: {s}"
                )))
            }
        }

        Ok(Self { hextets, scope })
    }
}

impl serde::Serialize for Ipv6Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Ipv6Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v6(s: &str) -> Ipv6Address {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_full_form() {
        let a = v6("2001:0db8:0000:0000:0000:0000:0000:0001");
        assert_eq!(a.hextets(), [0x2001, 0x0db8, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_parse_compressed_forms() {
        assert_eq!(v6("::").hextets(), [0; 8]);
        assert_eq!(v6("::1").hextets(), [0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(v6("fe80::").hextets(), [0xfe80, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            v6("2001:db8::8:800:200c:417a").hextets(),
            [0x2001, 0x0db8, 0, 0, 0x0008, 0x0800, 0x200c, 0x417a]
        );
    }

    #[test]
    fn test_parse_ipv4_mapped() {
        let a = v6("::ffff:192.168.1.1");
        assert_eq!(a.hextets(), [0, 0, 0, 0, 0, 0xffff, 0xc0a8, 0x0101]);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("1::2::3".parse::<Ipv6Address>().is_err(), "two '::'");
        assert!("12345::".parse::<Ipv6Address>().is_err(), "hextet too wide");
        assert!("1:2:3:4:5:6:7".parse::<Ipv6Address>().is_err(), "7 groups");
        assert!("1:2:3:4:5:6:7:8:9".parse::<Ipv6Address>().is_err(), "9 groups");
        assert!(
            "1:2:3:4::5:6:7:8".parse::<Ipv6Address>().is_err(),
            ":: replacing nothing"
        );
        assert!("fe80::1%".parse::<Ipv6Address>().is_err(), "empty scope");
    }

    #[test]
    fn test_display_compresses_longest_zero_run() {
        assert_eq!(v6("2001:db8:0:0:1:0:0:1").to_string(), "2001:db8::1:0:0:1");
        assert_eq!(v6("2001:0:0:1:0:0:0:1").to_string(), "2001:0:0:1::1");
        assert_eq!(v6("fe80:0:0:0:0:0:0:1").to_string(), "fe80::1");
    }

    #[test]
    fn test_display_never_compresses_single_zero() {
        assert_eq!(v6("2001:db8:0:1:1:1:1:1").to_string(), "2001:db8:0:1:1:1:1:1");
    }

    #[test]
    fn test_display_special_cases() {
        assert_eq!(Ipv6Address::UNSPECIFIED.to_string(), "::");
        assert_eq!(v6("::1").to_string(), "::1");
    }

    #[test]
    fn test_canonical_round_trip() {
        for s in [
            "2001:db8::1",
            "fe80::21a:2bff:fe3c:4d5e",
            "ff02::1:ff3c:4d5e",
            "2001:db8::1:0:0:1",
            "2001:0:0:1::1",
            "ff02::2",
        ] {
            let addr = v6(s);
            assert_eq!(
                addr.to_string().parse::<Ipv6Address>().unwrap(),
                addr,
                "canonical form of {s} must re-parse to the same address"
            );
        }
    }

    #[test]
    fn test_scope_round_trip() {
        let a = v6("fe80::1%eth0");
        assert_eq!(a.scope(), Some("eth0"));
        assert_eq!(a.to_string(), "fe80::1%eth0");
        assert_eq!(a.to_string().parse::<Ipv6Address>().unwrap(), a);
    }

    #[test]
    fn test_classification() {
        assert_eq!(v6("::").classify(), Ipv6Class::Unspecified);
        assert_eq!(v6("::1").classify(), Ipv6Class::Loopback);
        assert_eq!(v6("fe80::1").classify(), Ipv6Class::LinkLocal);
        assert_eq!(v6("febf::1").classify(), Ipv6Class::LinkLocal);
        assert_eq!(v6("ff02::1").classify(), Ipv6Class::AllNodesMulticast);
        assert_eq!(v6("ff02::2").classify(), Ipv6Class::AllRoutersMulticast);
        assert_eq!(
            v6("ff02::1:ff3c:4d5e").classify(),
            Ipv6Class::SolicitedNodeMulticast
        );
        assert_eq!(v6("ff05::1:3").classify(), Ipv6Class::Multicast);
        assert_eq!(v6("2001:db8::1").classify(), Ipv6Class::GlobalUnicast);
    }

    #[test]
    fn test_eui64_link_local_from_mac() {
        // S4 vector: 00:1A:2B:3C:4D:5E -> fe80::21a:2bff:fe3c:4d5e
        let mac: MacAddr = "00:1A:2B:3C:4D:5E".parse().unwrap();
        let ll = Ipv6Address::link_local_from_mac(&mac);
        assert_eq!(ll.to_string(), "fe80::21a:2bff:fe3c:4d5e");
        assert!(ll.is_link_local());
    }

    #[test]
    fn test_solicited_node_of_eui64_address() {
        let mac: MacAddr = "00:1A:2B:3C:4D:5E".parse().unwrap();
        let ll = Ipv6Address::link_local_from_mac(&mac);
        assert_eq!(ll.solicited_node_multicast().to_string(), "ff02::1:ff3c:4d5e");
    }

    #[test]
    fn test_slaac_combines_prefix_and_eui64() {
        let mac: MacAddr = "00:1A:2B:3C:4D:5E".parse().unwrap();
        let prefix = v6("2001:db8:cafe::");
        let addr = Ipv6Address::slaac(&prefix, 64, &mac);
        assert_eq!(addr.to_string(), "2001:db8:cafe:0:21a:2bff:fe3c:4d5e");
    }

    #[test]
    fn test_multicast_mac_mapping() {
        let group = v6("ff02::1:ff3c:4d5e");
        let mac = group.multicast_mac().unwrap();
        assert_eq!(mac.to_string(), "33:33:ff:3c:4d:5e");
        assert!(mac.is_ipv6_multicast());
        assert!(v6("2001:db8::1").multicast_mac().is_none(), "unicast has no group MAC");
    }

    #[test]
    fn test_same_address_ignores_scope() {
        let a = v6("fe80::1%eth0");
        let b = v6("fe80::1%eth1");
        assert!(a.same_address(&b));
        assert_ne!(a, b, "full equality includes the scope id");
    }
}

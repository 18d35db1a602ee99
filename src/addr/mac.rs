//! 48-bit MAC addresses.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::NetError;

/// Counter for locally-administered address generation. Process-monotonic so
/// every generated MAC is unique within a run.
static NEXT_LOCAL: AtomicU32 = AtomicU32::new(1);

/// A six-octet Ethernet hardware address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    /// The all-ones broadcast address.
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    pub const fn from_octets(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 6]
    }

    /// True for the `33:33:xx:xx:xx:xx` range IPv6 multicast maps onto.
    pub fn is_ipv6_multicast(&self) -> bool {
        self.0[0] == 0x33 && self.0[1] == 0x33
    }

    /// Group bit (lowest bit of the first octet): multicast or broadcast.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub fn is_locally_administered(&self) -> bool {
        self.0[0] & 0x02 != 0
    }

    /// Generate a fresh locally-administered unicast address: leading octet
    /// `0x02`, low bytes drawn from a monotonically increasing counter.
    pub fn generate_local() -> Self {
        let n = NEXT_LOCAL.fetch_add(1, Ordering::Relaxed);
        let [a, b, c, d] = n.to_be_bytes();
        Self([0x02, 0x00, a, b, c, d])
    }

    /// Lowercase hex with no separators, e.g. `001a2b3c4d5e`. Used as the
    /// raw DHCP client-id encoding.
    pub fn to_plain_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddr({self})")
    }
}

impl FromStr for MacAddr {
    type Err = NetError;

    /// Accepts colon- or hyphen-separated octet pairs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sep = if s.contains(':') { ':' } else { '-' };
        let parts: Vec<&str> = s.split(sep).collect();
        if parts.len() != 6 {
            return Err(NetError::Parse(format!("invalid MAC address: {s}")));
        }
        let mut octets = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(NetError::Parse(format!("invalid MAC octet: {part}")));
            }
            octets[i] = u8::from_str_radix(part, 16)
                .map_err(|_| NetError::Parse(format!("invalid MAC octet: {part}")))?;
        }
        Ok(Self(octets))
    }
}

impl serde::Serialize for MacAddr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for MacAddr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_colon_form() {
        let mac: MacAddr = "00:1A:2B:3C:4D:5E".parse().unwrap();
        assert_eq!(mac.octets(), [0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]);
    }

    #[test]
    fn test_parse_hyphen_form() {
        let mac: MacAddr = "00-1a-2b-3c-4d-5e".parse().unwrap();
        assert_eq!(mac.to_string(), "00:1a:2b:3c:4d:5e");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("00:1a:2b:3c:4d".parse::<MacAddr>().is_err(), "five octets");
        assert!("00:1a:2b:3c:4d:zz".parse::<MacAddr>().is_err(), "non-hex");
        assert!("001a2b3c4d5e".parse::<MacAddr>().is_err(), "no separators");
    }

    #[test]
    fn test_display_is_lowercase_colon() {
        let mac = MacAddr::from_octets([0xAB, 0xCD, 0xEF, 0x01, 0x02, 0x03]);
        assert_eq!(mac.to_string(), "ab:cd:ef:01:02:03");
    }

    #[test]
    fn test_broadcast_detection() {
        assert!(MacAddr::BROADCAST.is_broadcast());
        assert!(!MacAddr::from_octets([0xff, 0xff, 0xff, 0xff, 0xff, 0xfe]).is_broadcast());
    }

    #[test]
    fn test_ipv6_multicast_prefix() {
        assert!(MacAddr::from_octets([0x33, 0x33, 0x00, 0x00, 0x00, 0x01]).is_ipv6_multicast());
        assert!(!MacAddr::from_octets([0x33, 0x34, 0, 0, 0, 1]).is_ipv6_multicast());
    }

    #[test]
    fn test_generated_macs_are_local_and_unique() {
        let a = MacAddr::generate_local();
        let b = MacAddr::generate_local();
        assert_ne!(a, b, "generator must be monotonic");
        assert!(a.is_locally_administered());
        assert!(!a.is_broadcast());
        assert!(!a.is_multicast(), "generated addresses are unicast");
        assert_eq!(a.octets()[0], 0x02);
    }

    #[test]
    fn test_plain_hex_encoding() {
        let mac: MacAddr = "00:1a:2b:3c:4d:5e".parse().unwrap();
        assert_eq!(mac.to_plain_hex(), "001a2b3c4d5e");
    }

    #[test]
    fn test_serde_round_trip_as_string() {
        let mac: MacAddr = "0a:0b:0c:0d:0e:0f".parse().unwrap();
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"0a:0b:0c:0d:0e:0f\"");
        let back: MacAddr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mac);
    }
}

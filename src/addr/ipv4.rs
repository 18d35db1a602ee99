//! IPv4 addresses and subnet masks.

use std::fmt;
use std::str::FromStr;

use crate::error::NetError;

/// A four-octet IPv4 address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ipv4Address([u8; 4]);

impl Ipv4Address {
    pub const UNSPECIFIED: Ipv4Address = Ipv4Address([0; 4]);
    pub const BROADCAST: Ipv4Address = Ipv4Address([0xff; 4]);

    pub const fn from_octets(octets: [u8; 4]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 4] {
        self.0
    }

    pub fn to_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    pub fn is_unspecified(&self) -> bool {
        self.to_u32() == 0
    }

    pub fn is_limited_broadcast(&self) -> bool {
        self.0 == [0xff; 4]
    }

    pub fn is_loopback(&self) -> bool {
        self.0[0] == 127
    }

    /// The network address obtained by masking off the host bits.
    pub fn network(&self, mask: &SubnetMask) -> Ipv4Address {
        Ipv4Address::from_u32(self.to_u32() & mask.to_u32())
    }

    /// True when `self` and `other` fall in the same subnet under `mask`.
    pub fn same_subnet(&self, other: &Ipv4Address, mask: &SubnetMask) -> bool {
        self.network(mask) == other.network(mask)
    }

    /// True when `self` is the directed broadcast of its subnet under `mask`
    /// (all host bits set).
    pub fn is_directed_broadcast(&self, mask: &SubnetMask) -> bool {
        let host_bits = !mask.to_u32();
        host_bits != 0 && self.to_u32() & host_bits == host_bits
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl fmt::Debug for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ipv4Address({self})")
    }
}

impl FromStr for Ipv4Address {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 4 {
            return Err(NetError::Parse(format!("invalid IPv4 address: {s}")));
        }
        let mut octets = [0u8; 4];
        for (i, part) in parts.iter().enumerate() {
            octets[i] = part
                .parse::<u8>()
                .map_err(|_| NetError::Parse(format!("invalid IPv4 octet: {part}")))?;
        }
        Ok(Self(octets))
    }
}

impl serde::Serialize for Ipv4Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Ipv4Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A contiguous IPv4 network mask.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubnetMask([u8; 4]);

impl SubnetMask {
    /// Build from a CIDR prefix length (`0..=32`).
    pub fn from_prefix_len(prefix_len: u8) -> Result<Self, NetError> {
        if prefix_len > 32 {
            return Err(NetError::Validation(format!(
                "prefix length out of range: /{prefix_len}"
            )));
        }
        let bits = if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix_len))
        };
        Ok(Self(bits.to_be_bytes()))
    }

    /// Build from four octets, rejecting non-contiguous masks.
    pub fn from_octets(octets: [u8; 4]) -> Result<Self, NetError> {
        let bits = u32::from_be_bytes(octets);
        // A valid mask is a run of ones followed by a run of zeros.
        if bits != 0 && (!bits).wrapping_add(1) & !bits != 0 {
            return Err(NetError::Validation(format!(
                "non-contiguous subnet mask: {}.{}.{}.{}",
                octets[0], octets[1], octets[2], octets[3]
            )));
        }
        Ok(Self(octets))
    }

    pub const fn octets(&self) -> [u8; 4] {
        self.0
    }

    pub fn to_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub fn prefix_len(&self) -> u8 {
        self.to_u32().count_ones() as u8
    }

    /// Number of host addresses in the subnet, network and broadcast included.
    pub fn subnet_size(&self) -> u64 {
        1u64 << (32 - self.prefix_len())
    }
}

impl fmt::Display for SubnetMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl fmt::Debug for SubnetMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubnetMask(/{})", self.prefix_len())
    }
}

impl FromStr for SubnetMask {
    type Err = NetError;

    /// Accepts dotted-decimal (`255.255.255.0`) or `/24` / `24` CIDR forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(cidr) = s.strip_prefix('/') {
            let prefix: u8 = cidr
                .parse()
                .map_err(|_| NetError::Parse(format!("invalid prefix length: {s}")))?;
            return Self::from_prefix_len(prefix);
        }
        if !s.contains('.') {
            let prefix: u8 = s
                .parse()
                .map_err(|_| NetError::Parse(format!("invalid subnet mask: {s}")))?;
            return Self::from_prefix_len(prefix);
        }
        let addr: Ipv4Address = s.parse()?;
        Self::from_octets(addr.octets())
    }
}

impl serde::Serialize for SubnetMask {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for SubnetMask {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

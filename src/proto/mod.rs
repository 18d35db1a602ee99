//! Semantic protocol data units.
//!
//! PDUs are modelled field-by-field as typed records, not octet streams.
//! The tagged sums (`Payload`, `IpPayload`, `UdpData`) force exhaustive
//! handling at every dispatch point; the only computed-on-the-wire value the
//! simulator reproduces faithfully is the IPv4 header checksum.

mod arp;
mod dhcp;
mod ethernet;
mod icmp;
mod ipv4;
mod ipv6;
mod udp;

pub use arp::{ArpOp, ArpPacket};
pub use dhcp::{DhcpMessage, DhcpMessageType, DhcpOptions, DHCP_CLIENT_PORT, DHCP_SERVER_PORT};
pub use ethernet::{Dot1qTag, EthernetFrame};
pub use icmp::{IcmpPacket, IcmpType, Icmpv6Packet, Icmpv6Type, NdpPayload};
pub use ipv4::{next_identification, Ipv4Packet};
pub use ipv6::Ipv6Packet;
pub use udp::{UdpData, UdpPacket};

/// EtherType values the simulator speaks.
pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_IPV6: u16 = 0x86dd;

/// IP protocol numbers carried in the IPv4 `protocol` / IPv6 `next_header` field.
pub const IP_PROTO_ICMP: u8 = 1;
pub const IP_PROTO_UDP: u8 = 17;
pub const IP_PROTO_ICMPV6: u8 = 58;

/// What an Ethernet frame carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Arp(ArpPacket),
    Ipv4(Ipv4Packet),
    Ipv6(Ipv6Packet),
}

impl Payload {
    /// The EtherType this payload must be framed with.
    pub fn ether_type(&self) -> u16 {
        match self {
            Payload::Arp(_) => ETHERTYPE_ARP,
            Payload::Ipv4(_) => ETHERTYPE_IPV4,
            Payload::Ipv6(_) => ETHERTYPE_IPV6,
        }
    }

    /// Approximate on-wire size, for byte counters only.
    pub fn byte_len(&self) -> usize {
        match self {
            Payload::Arp(p) => p.byte_len(),
            Payload::Ipv4(p) => p.byte_len(),
            Payload::Ipv6(p) => p.byte_len(),
        }
    }
}

/// What an IP packet carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpPayload {
    Icmp(IcmpPacket),
    Icmpv6(Icmpv6Packet),
    Udp(UdpPacket),
    /// Opaque application payload of a given nominal size.
    Raw(usize),
}

impl IpPayload {
    pub fn protocol_number(&self) -> u8 {
        match self {
            IpPayload::Icmp(_) => IP_PROTO_ICMP,
            IpPayload::Icmpv6(_) => IP_PROTO_ICMPV6,
            IpPayload::Udp(_) => IP_PROTO_UDP,
            IpPayload::Raw(_) => 0,
        }
    }

    pub fn byte_len(&self) -> usize {
        match self {
            IpPayload::Icmp(p) => p.byte_len(),
            IpPayload::Icmpv6(p) => p.byte_len(),
            IpPayload::Udp(p) => p.byte_len(),
            IpPayload::Raw(n) => *n,
        }
    }
}

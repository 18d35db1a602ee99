//! ICMP and ICMPv6 packets.

use crate::addr::Ipv6Address;

/// ICMP message types the simulator emits and consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpType {
    EchoRequest,
    EchoReply,
    DestinationUnreachable,
    TimeExceeded,
}

impl IcmpType {
    /// On-wire type number.
    pub fn number(&self) -> u8 {
        match self {
            IcmpType::EchoReply => 0,
            IcmpType::DestinationUnreachable => 3,
            IcmpType::TimeExceeded => 11,
            IcmpType::EchoRequest => 8,
        }
    }
}

/// An ICMP (v4) packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpPacket {
    pub icmp_type: IcmpType,
    pub code: u8,
    pub id: u16,
    pub sequence: u16,
    /// Echo data size in bytes (semantic only; no actual payload bytes).
    pub data_size: u16,
}

impl IcmpPacket {
    pub fn echo_request(id: u16, sequence: u16, data_size: u16) -> Self {
        Self {
            icmp_type: IcmpType::EchoRequest,
            code: 0,
            id,
            sequence,
            data_size,
        }
    }

    /// Reply mirroring a request's id, sequence, and data size.
    pub fn echo_reply(request: &IcmpPacket) -> Self {
        Self {
            icmp_type: IcmpType::EchoReply,
            code: 0,
            id: request.id,
            sequence: request.sequence,
            data_size: request.data_size,
        }
    }

    /// TTL expired in transit. id/sequence identify the probe that died.
    pub fn time_exceeded(id: u16, sequence: u16) -> Self {
        Self {
            icmp_type: IcmpType::TimeExceeded,
            code: 0,
            id,
            sequence,
            data_size: 0,
        }
    }

    /// Destination unreachable; `code` 0 = net, 1 = host, 3 = port.
    pub fn destination_unreachable(code: u8, id: u16, sequence: u16) -> Self {
        Self {
            icmp_type: IcmpType::DestinationUnreachable,
            code,
            id,
            sequence,
            data_size: 0,
        }
    }

    pub fn byte_len(&self) -> usize {
        8 + usize::from(self.data_size)
    }
}

/// ICMPv6 message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icmpv6Type {
    EchoRequest,
    EchoReply,
    DestinationUnreachable,
    TimeExceeded,
    RouterSolicitation,
    RouterAdvertisement,
    NeighborSolicitation,
    NeighborAdvertisement,
}

impl Icmpv6Type {
    pub fn number(&self) -> u8 {
        match self {
            Icmpv6Type::DestinationUnreachable => 1,
            Icmpv6Type::TimeExceeded => 3,
            Icmpv6Type::EchoRequest => 128,
            Icmpv6Type::EchoReply => 129,
            Icmpv6Type::RouterSolicitation => 133,
            Icmpv6Type::RouterAdvertisement => 134,
            Icmpv6Type::NeighborSolicitation => 135,
            Icmpv6Type::NeighborAdvertisement => 136,
        }
    }
}

/// NDP-specific payload carried by the four discovery message types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NdpPayload {
    NeighborSolicit {
        target: Ipv6Address,
    },
    NeighborAdvert {
        target: Ipv6Address,
        solicited: bool,
        is_router: bool,
    },
    RouterSolicit,
    RouterAdvert {
        prefix: Ipv6Address,
        prefix_len: u8,
    },
}

/// An ICMPv6 packet. Echo fields are present only for echo types, the NDP
/// payload only for discovery types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icmpv6Packet {
    pub icmp_type: Icmpv6Type,
    pub code: u8,
    pub id: Option<u16>,
    pub sequence: Option<u16>,
    pub data_size: Option<u16>,
    pub ndp: Option<NdpPayload>,
}

impl Icmpv6Packet {
    pub fn echo_request(id: u16, sequence: u16, data_size: u16) -> Self {
        Self {
            icmp_type: Icmpv6Type::EchoRequest,
            code: 0,
            id: Some(id),
            sequence: Some(sequence),
            data_size: Some(data_size),
            ndp: None,
        }
    }

    pub fn echo_reply(request: &Icmpv6Packet) -> Self {
        Self {
            icmp_type: Icmpv6Type::EchoReply,
            code: 0,
            id: request.id,
            sequence: request.sequence,
            data_size: request.data_size,
            ndp: None,
        }
    }

    pub fn neighbor_solicitation(target: Ipv6Address) -> Self {
        Self {
            icmp_type: Icmpv6Type::NeighborSolicitation,
            code: 0,
            id: None,
            sequence: None,
            data_size: None,
            ndp: Some(NdpPayload::NeighborSolicit { target }),
        }
    }

    pub fn neighbor_advertisement(target: Ipv6Address, solicited: bool, is_router: bool) -> Self {
        Self {
            icmp_type: Icmpv6Type::NeighborAdvertisement,
            code: 0,
            id: None,
            sequence: None,
            data_size: None,
            ndp: Some(NdpPayload::NeighborAdvert {
                target,
                solicited,
                is_router,
            }),
        }
    }

    pub fn byte_len(&self) -> usize {
        8 + usize::from(self.data_size.unwrap_or(0)) + if self.ndp.is_some() { 24 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_reply_mirrors_request() {
        let req = IcmpPacket::echo_request(0x1234, 3, 56);
        let rep = IcmpPacket::echo_reply(&req);
        assert_eq!(rep.icmp_type, IcmpType::EchoReply);
        assert_eq!(rep.id, 0x1234);
        assert_eq!(rep.sequence, 3);
        assert_eq!(rep.data_size, 56);
    }

    #[test]
    fn test_type_numbers_match_rfc() {
        assert_eq!(IcmpType::EchoReply.number(), 0);
        assert_eq!(IcmpType::DestinationUnreachable.number(), 3);
        assert_eq!(IcmpType::EchoRequest.number(), 8);
        assert_eq!(IcmpType::TimeExceeded.number(), 11);
        assert_eq!(Icmpv6Type::EchoRequest.number(), 128);
        assert_eq!(Icmpv6Type::NeighborSolicitation.number(), 135);
    }

    #[test]
    fn test_byte_len_includes_data() {
        assert_eq!(IcmpPacket::echo_request(1, 0, 56).byte_len(), 64);
        assert_eq!(IcmpPacket::time_exceeded(1, 0).byte_len(), 8);
    }

    #[test]
    fn test_v6_echo_reply_mirrors_request() {
        let req = Icmpv6Packet::echo_request(9, 1, 32);
        let rep = Icmpv6Packet::echo_reply(&req);
        assert_eq!(rep.icmp_type, Icmpv6Type::EchoReply);
        assert_eq!(rep.id, Some(9));
        assert_eq!(rep.sequence, Some(1));
    }

    #[test]
    fn test_neighbor_solicitation_carries_target() {
        let target: Ipv6Address = "fe80::1".parse().unwrap();
        let ns = Icmpv6Packet::neighbor_solicitation(target.clone());
        match ns.ndp {
            Some(NdpPayload::NeighborSolicit { target: t }) => assert_eq!(t, target),
            other => panic!("expected NeighborSolicit, got {other:?}"),
        }
    }
}

//! ARP request/reply packets.

use crate::addr::{Ipv4Address, MacAddr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOp {
    Request,
    Reply,
}

/// An ARP packet for Ethernet/IPv4. `target_mac` is the zero address in
/// requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    pub op: ArpOp,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Address,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Address,
}

impl ArpPacket {
    /// Who-has `target_ip`? Tell `sender_ip`.
    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Address, target_ip: Ipv4Address) -> Self {
        Self {
            op: ArpOp::Request,
            sender_mac,
            sender_ip,
            target_mac: MacAddr::from_octets([0; 6]),
            target_ip,
        }
    }

    /// `sender_ip` is-at `sender_mac`, addressed back to the requester.
    pub fn reply(
        sender_mac: MacAddr,
        sender_ip: Ipv4Address,
        target_mac: MacAddr,
        target_ip: Ipv4Address,
    ) -> Self {
        Self {
            op: ArpOp::Reply,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        }
    }

    /// Fixed Ethernet/IPv4 ARP size.
    pub fn byte_len(&self) -> usize {
        28
    }
}

//! IPv6 packets.

use crate::addr::Ipv6Address;
use crate::proto::IpPayload;

/// An IPv6 packet. No extension headers are modelled; `next_header` is the
/// payload's protocol number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6Packet {
    pub version: u8,
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_length: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub source: Ipv6Address,
    pub destination: Ipv6Address,
    pub payload: IpPayload,
}

impl Ipv6Packet {
    pub fn new(
        source: Ipv6Address,
        destination: Ipv6Address,
        hop_limit: u8,
        payload: IpPayload,
    ) -> Self {
        Self {
            version: 6,
            traffic_class: 0,
            flow_label: 0,
            payload_length: payload.byte_len() as u16,
            next_header: payload.protocol_number(),
            hop_limit,
            source,
            destination,
            payload,
        }
    }

    /// Header plus payload, for byte counters.
    pub fn byte_len(&self) -> usize {
        40 + usize::from(self.payload_length)
    }
}

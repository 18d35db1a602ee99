//! DHCP messages, carried inside UDP 67/68.

use crate::addr::{Ipv4Address, MacAddr, SubnetMask};

pub const DHCP_SERVER_PORT: u16 = 67;
pub const DHCP_CLIENT_PORT: u16 = 68;

/// DHCP message type (option 53).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpMessageType {
    Discover,
    Offer,
    Request,
    Decline,
    Ack,
    Nak,
    Release,
}

impl DhcpMessageType {
    pub fn number(&self) -> u8 {
        match self {
            DhcpMessageType::Discover => 1,
            DhcpMessageType::Offer => 2,
            DhcpMessageType::Request => 3,
            DhcpMessageType::Decline => 4,
            DhcpMessageType::Ack => 5,
            DhcpMessageType::Nak => 6,
            DhcpMessageType::Release => 7,
        }
    }
}

/// The configuration options a server hands out with an OFFER/ACK.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DhcpOptions {
    pub subnet_mask: Option<SubnetMask>,
    pub router: Option<Ipv4Address>,
    pub dns_servers: Vec<Ipv4Address>,
    pub domain_name: Option<String>,
    pub lease_secs: Option<u64>,
}

/// A semantic DHCP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpMessage {
    pub message_type: DhcpMessageType,
    /// Transaction id tying one DORA exchange together.
    pub xid: u32,
    pub client_mac: MacAddr,
    /// `yiaddr`: the address the server is offering or acknowledging.
    pub your_ip: Option<Ipv4Address>,
    /// Option 50: the address the client asks for in a REQUEST.
    pub requested_ip: Option<Ipv4Address>,
    /// Option 54: which server this message selects or came from.
    pub server_id: Option<Ipv4Address>,
    pub options: DhcpOptions,
}

impl DhcpMessage {
    pub fn discover(xid: u32, client_mac: MacAddr) -> Self {
        Self {
            message_type: DhcpMessageType::Discover,
            xid,
            client_mac,
            your_ip: None,
            requested_ip: None,
            server_id: None,
            options: DhcpOptions::default(),
        }
    }

    pub fn request(
        xid: u32,
        client_mac: MacAddr,
        requested_ip: Ipv4Address,
        server_id: Option<Ipv4Address>,
    ) -> Self {
        Self {
            message_type: DhcpMessageType::Request,
            xid,
            client_mac,
            your_ip: None,
            requested_ip: Some(requested_ip),
            server_id,
            options: DhcpOptions::default(),
        }
    }

    pub fn release(xid: u32, client_mac: MacAddr, leased_ip: Ipv4Address, server_id: Ipv4Address) -> Self {
        Self {
            message_type: DhcpMessageType::Release,
            xid,
            client_mac,
            your_ip: None,
            requested_ip: Some(leased_ip),
            server_id: Some(server_id),
            options: DhcpOptions::default(),
        }
    }

    /// Nominal BOOTP frame size, for byte counters.
    pub fn byte_len(&self) -> usize {
        300
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_numbers() {
        assert_eq!(DhcpMessageType::Discover.number(), 1);
        assert_eq!(DhcpMessageType::Offer.number(), 2);
        assert_eq!(DhcpMessageType::Request.number(), 3);
        assert_eq!(DhcpMessageType::Ack.number(), 5);
        assert_eq!(DhcpMessageType::Nak.number(), 6);
        assert_eq!(DhcpMessageType::Release.number(), 7);
    }

    #[test]
    fn test_discover_is_bare() {
        let mac = MacAddr::from_octets([2, 0, 0, 0, 0, 1]);
        let d = DhcpMessage::discover(0xdeadbeef, mac);
        assert_eq!(d.message_type, DhcpMessageType::Discover);
        assert_eq!(d.xid, 0xdeadbeef);
        assert!(d.your_ip.is_none());
        assert!(d.requested_ip.is_none());
        assert!(d.server_id.is_none());
    }

    #[test]
    fn test_request_carries_selection() {
        let mac = MacAddr::from_octets([2, 0, 0, 0, 0, 1]);
        let ip: Ipv4Address = "10.1.1.11".parse().unwrap();
        let sid: Ipv4Address = "10.1.1.1".parse().unwrap();
        let r = DhcpMessage::request(7, mac, ip, Some(sid));
        assert_eq!(r.requested_ip, Some(ip));
        assert_eq!(r.server_id, Some(sid));
    }
}

//! Ethernet frames with optional 802.1Q tags.

use crate::addr::MacAddr;
use crate::proto::Payload;

/// 802.1Q VLAN tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dot1qTag {
    /// Tag protocol identifier, always 0x8100 here.
    pub tpid: u16,
    /// Priority code point.
    pub pcp: u8,
    /// Drop eligible indicator.
    pub dei: bool,
    /// VLAN identifier (1..=4094).
    pub vid: u16,
}

impl Dot1qTag {
    pub fn new(vid: u16) -> Self {
        Self {
            tpid: 0x8100,
            pcp: 0,
            dei: false,
            vid,
        }
    }
}

/// An L2 frame. `ether_type` always agrees with the payload tag; the only
/// way to build a frame is through `new`, which derives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    pub src: MacAddr,
    pub dst: MacAddr,
    pub ether_type: u16,
    pub dot1q: Option<Dot1qTag>,
    pub payload: Payload,
}

impl EthernetFrame {
    pub fn new(src: MacAddr, dst: MacAddr, payload: Payload) -> Self {
        Self {
            src,
            dst,
            ether_type: payload.ether_type(),
            dot1q: None,
            payload,
        }
    }

    /// Same frame carrying an 802.1Q tag for `vid`.
    pub fn tagged(mut self, vid: u16) -> Self {
        self.dot1q = Some(Dot1qTag::new(vid));
        self
    }

    /// Same frame with any 802.1Q tag stripped.
    pub fn untagged(mut self) -> Self {
        self.dot1q = None;
        self
    }

    pub fn is_broadcast(&self) -> bool {
        self.dst.is_broadcast()
    }

    /// Approximate on-wire size for byte counters: 14-byte header, 4 more
    /// when tagged, plus the payload.
    pub fn byte_len(&self) -> usize {
        14 + if self.dot1q.is_some() { 4 } else { 0 } + self.payload.byte_len()
    }
}

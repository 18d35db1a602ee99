//! Network interfaces: addressing, link state, counters, port security.

use serde::Serialize;

use crate::addr::{Ipv4Address, Ipv6Address, MacAddr, SubnetMask};
use crate::config;
use crate::device::DeviceId;
use crate::error::NetError;
use crate::wire::{CableId, PortId};

/// Link duplex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Duplex {
    Half,
    Full,
}

/// How an IPv6 address got onto an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Ipv6Origin {
    LinkLocal,
    Static,
    Slaac,
    Dhcpv6,
}

/// One IPv6 address bound to a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ipv6Binding {
    pub addr: Ipv6Address,
    pub prefix_len: u8,
    pub origin: Ipv6Origin,
}

/// Per-direction traffic counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PortCounters {
    pub frames_in: u64,
    pub frames_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub errors_in: u64,
    pub errors_out: u64,
    pub drops_in: u64,
    pub drops_out: u64,
}

/// Action taken on a port-security violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViolationMode {
    /// Err-disable the port.
    Shutdown,
    /// Drop and count.
    Restrict,
    /// Drop silently.
    Protect,
}

/// Port-security state: a bounded list of allowed source MACs.
#[derive(Debug, Clone, Serialize)]
pub struct PortSecurity {
    pub max_macs: usize,
    pub secure_macs: Vec<MacAddr>,
    pub mode: ViolationMode,
    pub violations: u64,
}

impl PortSecurity {
    pub fn new(mode: ViolationMode) -> Self {
        Self {
            max_macs: config::PORT_SECURITY_DEFAULT_MAX,
            secure_macs: Vec::new(),
            mode,
            violations: 0,
        }
    }
}

/// Outcome of a port-security check on one ingress frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityVerdict {
    /// Source already secure, or learned into a free slot.
    Accept,
    /// Violation: drop, counted (restrict) or silent (protect).
    Drop,
    /// Violation in shutdown mode: the port has been taken down.
    ShutdownPort,
}

/// A network interface, owned by exactly one device.
#[derive(Debug, Clone)]
pub struct Port {
    pub id: PortId,
    pub owner: DeviceId,
    pub name: String,
    pub mac: MacAddr,
    pub up: bool,
    pub ipv4: Option<(Ipv4Address, SubnetMask)>,
    pub ipv6_enabled: bool,
    pub ipv6: Vec<Ipv6Binding>,
    pub mtu: u32,
    pub speed_mbps: u32,
    pub duplex: Duplex,
    pub autoneg: bool,
    pub negotiated_speed: Option<u32>,
    pub negotiated_duplex: Option<Duplex>,
    pub counters: PortCounters,
    pub security: Option<PortSecurity>,
    pub cable: Option<CableId>,
}

impl Port {
    pub fn new(id: PortId, owner: DeviceId, name: &str, mac: Option<MacAddr>) -> Self {
        Self {
            id,
            owner,
            name: name.to_string(),
            mac: mac.unwrap_or_else(MacAddr::generate_local),
            up: true,
            ipv4: None,
            ipv6_enabled: false,
            ipv6: Vec::new(),
            mtu: config::DEFAULT_MTU,
            speed_mbps: config::DEFAULT_SPEED_MBPS,
            duplex: Duplex::Full,
            autoneg: true,
            negotiated_speed: None,
            negotiated_duplex: None,
            counters: PortCounters::default(),
            security: None,
            cable: None,
        }
    }

    /// Store the v4 configuration. Replaces any previous address.
    pub fn configure_ip(&mut self, ip: Ipv4Address, mask: SubnetMask) {
        self.ipv4 = Some((ip, mask));
    }

    /// Drop all v4/v6 addressing.
    pub fn clear_ip(&mut self) {
        self.ipv4 = None;
        self.ipv6.clear();
        self.ipv6_enabled = false;
    }

    /// Enable IPv6, deriving the EUI-64 link-local address. Idempotent.
    pub fn enable_ipv6(&mut self) {
        if self.ipv6_enabled {
            return;
        }
        self.ipv6_enabled = true;
        let ll = Ipv6Address::link_local_from_mac(&self.mac).with_scope(&self.name);
        self.ipv6.push(Ipv6Binding {
            addr: ll,
            prefix_len: 64,
            origin: Ipv6Origin::LinkLocal,
        });
    }

    /// Add a static IPv6 address. Enables IPv6 if needed; rejects an exact
    /// (address, prefix) duplicate; link-local addresses get the port's
    /// scope id attached.
    pub fn configure_ipv6(&mut self, addr: Ipv6Address, prefix_len: u8) -> Result<(), NetError> {
        if prefix_len > 128 {
            return Err(NetError::Validation(format!(
                "prefix length out of range: /{prefix_len}"
            )));
        }
        self.enable_ipv6();
        let addr = if addr.is_link_local() && addr.scope().is_none() {
            addr.with_scope(&self.name)
        } else {
            addr
        };
        if self
            .ipv6
            .iter()
            .any(|b| b.addr.same_address(&addr) && b.prefix_len == prefix_len)
        {
            return Err(NetError::Configuration(format!(
                "address already configured: {addr}/{prefix_len}"
            )));
        }
        self.ipv6.push(Ipv6Binding {
            addr,
            prefix_len,
            origin: Ipv6Origin::Static,
        });
        Ok(())
    }

    /// Add a SLAAC address combining the advertised prefix with this port's
    /// EUI-64 host portion.
    pub fn add_slaac_address(&mut self, prefix: &Ipv6Address, prefix_len: u8) {
        self.enable_ipv6();
        let addr = Ipv6Address::slaac(prefix, prefix_len, &self.mac);
        if self.ipv6.iter().any(|b| b.addr.same_address(&addr)) {
            return;
        }
        self.ipv6.push(Ipv6Binding {
            addr,
            prefix_len,
            origin: Ipv6Origin::Slaac,
        });
    }

    /// The link-local address, if IPv6 is enabled.
    pub fn link_local(&self) -> Option<&Ipv6Address> {
        self.ipv6
            .iter()
            .find(|b| b.origin == Ipv6Origin::LinkLocal)
            .map(|b| &b.addr)
    }

    /// True when this port owns `ip`.
    pub fn has_ipv4(&self, ip: &Ipv4Address) -> bool {
        matches!(&self.ipv4, Some((own, _)) if own == ip)
    }

    /// Auto-negotiation: lowest common speed, half duplex if either side is
    /// half. With autoneg off, the peer is ignored.
    pub fn negotiate(
        &self,
        peer_speed: u32,
        peer_duplex: Duplex,
        cable_max_speed: u32,
    ) -> (u32, Duplex) {
        if self.autoneg {
            let speed = self.speed_mbps.min(peer_speed).min(cable_max_speed);
            let duplex = if self.duplex == Duplex::Half || peer_duplex == Duplex::Half {
                Duplex::Half
            } else {
                Duplex::Full
            };
            (speed, duplex)
        } else {
            (self.speed_mbps.min(cable_max_speed), self.duplex)
        }
    }

    /// Apply port security to an ingress source MAC.
    pub fn check_port_security(&mut self, src: MacAddr) -> SecurityVerdict {
        let Some(sec) = self.security.as_mut() else {
            return SecurityVerdict::Accept;
        };
        if sec.secure_macs.contains(&src) {
            return SecurityVerdict::Accept;
        }
        if sec.secure_macs.len() < sec.max_macs {
            sec.secure_macs.push(src);
            return SecurityVerdict::Accept;
        }
        sec.violations += 1;
        match sec.mode {
            ViolationMode::Shutdown => {
                self.up = false;
                SecurityVerdict::ShutdownPort
            }
            ViolationMode::Restrict | ViolationMode::Protect => SecurityVerdict::Drop,
        }
    }
}

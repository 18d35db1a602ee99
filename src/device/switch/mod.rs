//! The L2 learning-switch engine: VLANs, switchport configs, MAC table,
//! STP gating. Frame delivery itself runs through `World`; this module owns
//! the per-switch state and the pure classification/transform steps.

mod mac_table;
mod startup;
mod stp;
mod vlan;

pub use mac_table::{LearnOutcome, MacEntry, MacEntryKind, MacTable};
pub use startup::StartupConfig;
pub use stp::StpState;
pub use vlan::{format_vlan_list, parse_vlan_list, Vlan, VlanDb};

use std::collections::{BTreeMap, BTreeSet};

use crate::proto::EthernetFrame;
use crate::wire::PortId;

/// Which vendor persona a switch wears. Affects STP boot state, the
/// VLAN-delete hook, and which CLI shell drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchVendor {
    Cisco,
    Huawei,
    Generic,
}

impl SwitchVendor {
    /// Cisco ports come up PortFast-style; Huawei walks the STP ladder.
    pub fn boot_stp_state(&self) -> StpState {
        match self {
            SwitchVendor::Cisco => StpState::Forwarding,
            SwitchVendor::Huawei => StpState::Listening,
            SwitchVendor::Generic => StpState::Forwarding,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPortMode {
    Access,
    Trunk,
}

/// VLANs a trunk carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedVlans {
    All,
    List(BTreeSet<u16>),
}

impl AllowedVlans {
    pub fn contains(&self, vid: u16) -> bool {
        match self {
            AllowedVlans::All => true,
            AllowedVlans::List(set) => set.contains(&vid),
        }
    }

    pub fn display(&self) -> String {
        match self {
            AllowedVlans::All => "all".to_string(),
            AllowedVlans::List(set) => format_vlan_list(set),
        }
    }
}

/// Per-port switching configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchPortConfig {
    pub mode: SwitchPortMode,
    pub access_vlan: u16,
    pub native_vlan: u16,
    pub allowed: AllowedVlans,
}

impl Default for SwitchPortConfig {
    fn default() -> Self {
        Self {
            mode: SwitchPortMode::Access,
            access_vlan: 1,
            native_vlan: 1,
            allowed: AllowedVlans::All,
        }
    }
}

/// Where an ingress frame landed after gating and VLAN classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressDecision {
    /// Accepted into this VLAN.
    Vlan(u16),
    /// STP state forbids traffic on the ingress port.
    DropStp,
    /// Tagged VID not in the trunk's allowed set.
    DropDisallowed(u16),
    /// The classified VLAN does not exist in the database (suspended
    /// access port, or a trunk VID never created).
    DropNoVlan(u16),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchStats {
    pub flooded: u64,
    pub forwarded: u64,
    pub dropped: u64,
}

/// All control-plane state of one switch.
#[derive(Debug)]
pub struct SwitchState {
    pub vendor: SwitchVendor,
    pub vlans: VlanDb,
    pub port_cfg: BTreeMap<PortId, SwitchPortConfig>,
    pub mac_table: MacTable,
    pub stp: BTreeMap<PortId, StpState>,
    /// NVRAM: the saved startup-config JSON blob, if `write memory` ran.
    pub startup_config: Option<String>,
    pub stats: SwitchStats,
}

impl SwitchState {
    pub fn new(vendor: SwitchVendor) -> Self {
        Self {
            vendor,
            vlans: VlanDb::new(),
            port_cfg: BTreeMap::new(),
            mac_table: MacTable::new(),
            stp: BTreeMap::new(),
            startup_config: None,
            stats: SwitchStats::default(),
        }
    }

    /// Bring a new port under switching control: default access config in
    /// VLAN 1, vendor boot STP state.
    pub fn register_port(&mut self, port: PortId) {
        self.port_cfg.insert(port, SwitchPortConfig::default());
        self.stp.insert(port, self.vendor.boot_stp_state());
        if let Some(vlan1) = self.vlans.get_mut(1) {
            vlan1.ports.insert(port);
        }
    }

    pub fn cfg(&self, port: PortId) -> SwitchPortConfig {
        self.port_cfg.get(&port).cloned().unwrap_or_default()
    }

    pub fn stp_state(&self, port: PortId) -> StpState {
        self.stp.get(&port).copied().unwrap_or(StpState::Disabled)
    }

    /// Step 1 + 2 of the pipeline: STP gate, then VLAN classification.
    pub fn classify_ingress(&self, port: PortId, frame: &EthernetFrame) -> IngressDecision {
        let stp = self.stp_state(port);
        if !stp.can_learn() {
            return IngressDecision::DropStp;
        }
        let cfg = self.cfg(port);
        let vid = match cfg.mode {
            // Any tag on an access port is ignored on ingress.
            SwitchPortMode::Access => cfg.access_vlan,
            SwitchPortMode::Trunk => match frame.dot1q {
                Some(tag) => {
                    if !cfg.allowed.contains(tag.vid) {
                        return IngressDecision::DropDisallowed(tag.vid);
                    }
                    tag.vid
                }
                None => cfg.native_vlan,
            },
        };
        if !self.vlans.contains(vid) {
            return IngressDecision::DropNoVlan(vid);
        }
        IngressDecision::Vlan(vid)
    }

    /// Step 5: per-port egress transformation. `None` means this port does
    /// not participate in `vid` and must be skipped.
    pub fn egress_frame(&self, port: PortId, vid: u16, frame: &EthernetFrame) -> Option<EthernetFrame> {
        if !self.stp_state(port).can_forward() {
            return None;
        }
        let cfg = self.cfg(port);
        match cfg.mode {
            SwitchPortMode::Access => {
                (cfg.access_vlan == vid && self.vlans.contains(vid))
                    .then(|| frame.clone().untagged())
            }
            SwitchPortMode::Trunk => {
                if !cfg.allowed.contains(vid) {
                    return None;
                }
                if vid == cfg.native_vlan {
                    Some(frame.clone().untagged())
                } else {
                    Some(frame.clone().tagged(vid))
                }
            }
        }
    }

    /// Change a port's mode. Access ports join their VLAN's active set;
    /// trunks leave every set.
    pub fn set_port_mode(&mut self, port: PortId, mode: SwitchPortMode) {
        let cfg = self.port_cfg.entry(port).or_default();
        cfg.mode = mode;
        let access_vlan = cfg.access_vlan;
        self.vlans.detach_port(port);
        if mode == SwitchPortMode::Access {
            if let Some(vlan) = self.vlans.get_mut(access_vlan) {
                vlan.ports.insert(port);
            }
        }
    }

    /// Assign an access VLAN. The port joins the VLAN's active set only if
    /// the VLAN exists; otherwise it sits suspended until the VLAN is
    /// (re)created.
    pub fn assign_access_vlan(&mut self, port: PortId, vid: u16) {
        let cfg = self.port_cfg.entry(port).or_default();
        cfg.access_vlan = vid;
        let is_access = cfg.mode == SwitchPortMode::Access;
        self.vlans.detach_port(port);
        if is_access {
            if let Some(vlan) = self.vlans.get_mut(vid) {
                vlan.ports.insert(port);
            }
        }
    }

    /// Create a VLAN; access ports already pointing at it (suspended by a
    /// previous delete) are re-activated into its port set.
    pub fn create_vlan(&mut self, vid: u16) -> Result<(), crate::error::NetError> {
        self.vlans.create(vid)?;
        let waiting: Vec<PortId> = self
            .port_cfg
            .iter()
            .filter(|(_, c)| c.mode == SwitchPortMode::Access && c.access_vlan == vid)
            .map(|(p, _)| *p)
            .collect();
        if let Some(vlan) = self.vlans.get_mut(vid) {
            for port in waiting {
                vlan.ports.insert(port);
            }
        }
        Ok(())
    }

    /// Delete a VLAN, applying the vendor hook to its access ports:
    /// Cisco suspends them (accessVlan unchanged), Huawei and Generic fall
    /// back to VLAN 1. MAC entries in the VLAN are flushed.
    pub fn delete_vlan(&mut self, vid: u16) -> Result<Vec<PortId>, crate::error::NetError> {
        let removed = self.vlans.delete(vid)?;
        let orphans: Vec<PortId> = removed.ports.iter().copied().collect();
        match self.vendor {
            SwitchVendor::Cisco => {
                // Ports stay configured for the dead VLAN and pass no
                // traffic until it is created again.
            }
            SwitchVendor::Huawei | SwitchVendor::Generic => {
                for port in &orphans {
                    if let Some(cfg) = self.port_cfg.get_mut(port) {
                        cfg.access_vlan = 1;
                    }
                    if let Some(vlan1) = self.vlans.get_mut(1) {
                        vlan1.ports.insert(*port);
                    }
                }
            }
        }
        self.mac_table.remove_vlan(vid);
        Ok(orphans)
    }

    /// DRAM loss on power-on: every volatile table back to factory state.
    /// The NVRAM blob survives and is re-applied by the caller.
    pub fn reset_volatile(&mut self) {
        let ports: Vec<PortId> = self.port_cfg.keys().copied().collect();
        self.vlans = VlanDb::new();
        self.mac_table = MacTable::new();
        self.port_cfg.clear();
        self.stp.clear();
        self.stats = SwitchStats::default();
        for port in ports {
            self.register_port(port);
        }
    }

    /// One STP timer tick over every port.
    pub fn advance_stp(&mut self) -> Vec<(PortId, StpState, StpState)> {
        let mut transitions = Vec::new();
        for (port, state) in self.stp.iter_mut() {
            let next = state.advance();
            if next != *state {
                transitions.push((*port, *state, next));
                *state = next;
            }
        }
        transitions
    }
}

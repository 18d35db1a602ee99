//! Running-config capture, the NVRAM JSON blob, and restore.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config;
use crate::device::switch::{
    parse_vlan_list, AllowedVlans, SwitchPortMode, SwitchState,
};
use crate::wire::PortId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlanEntry {
    pub id: u16,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceEntry {
    pub name: String,
    pub mode: String,
    pub access_vlan: u16,
    pub native_vlan: u16,
    /// `all` or vendor list syntax (`1,10,20-30`).
    pub allowed_vlans: String,
    pub shutdown: bool,
}

/// A point-in-time capture of the switch configuration. Rendered as vendor
/// text for `show running-config` and serialized to JSON as the NVRAM blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupConfig {
    pub hostname: String,
    pub vlans: Vec<VlanEntry>,
    pub interfaces: Vec<InterfaceEntry>,
    pub mac_aging_secs: u64,
}

impl StartupConfig {
    /// Capture the current configuration. `ports` supplies interface names
    /// and admin state in display order.
    pub fn capture(
        hostname: &str,
        state: &SwitchState,
        ports: &[(String, PortId, bool)],
    ) -> Self {
        let vlans = state
            .vlans
            .iter()
            .filter(|(vid, _)| **vid != 1)
            .map(|(vid, vlan)| VlanEntry {
                id: *vid,
                name: vlan.name.clone(),
            })
            .collect();

        let interfaces = ports
            .iter()
            .map(|(name, pid, up)| {
                let cfg = state.cfg(*pid);
                InterfaceEntry {
                    name: name.clone(),
                    mode: match cfg.mode {
                        SwitchPortMode::Access => "access".to_string(),
                        SwitchPortMode::Trunk => "trunk".to_string(),
                    },
                    access_vlan: cfg.access_vlan,
                    native_vlan: cfg.native_vlan,
                    allowed_vlans: cfg.allowed.display(),
                    shutdown: !up,
                }
            })
            .collect();

        Self {
            hostname: hostname.to_string(),
            vlans,
            interfaces,
            mac_aging_secs: state.mac_table.aging_secs,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(blob: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(blob)?)
    }

    /// Cisco-style configuration text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("!\n");
        out.push_str(&format!("hostname {}\n", self.hostname));
        out.push_str("!\n");
        for vlan in &self.vlans {
            out.push_str(&format!("vlan {}\n", vlan.id));
            out.push_str(&format!(" name {}\n", vlan.name));
            out.push_str("!\n");
        }
        if self.mac_aging_secs != config::MAC_AGING_SECS {
            out.push_str(&format!(
                "mac address-table aging-time {}\n!\n",
                self.mac_aging_secs
            ));
        }
        for iface in &self.interfaces {
            out.push_str(&format!("interface {}\n", iface.name));
            if iface.mode == "trunk" {
                out.push_str(" switchport mode trunk\n");
                if iface.native_vlan != 1 {
                    out.push_str(&format!(
                        " switchport trunk native vlan {}\n",
                        iface.native_vlan
                    ));
                }
                if iface.allowed_vlans != "all" {
                    out.push_str(&format!(
                        " switchport trunk allowed vlan {}\n",
                        iface.allowed_vlans
                    ));
                }
            } else {
                out.push_str(" switchport mode access\n");
                if iface.access_vlan != 1 {
                    out.push_str(&format!(
                        " switchport access vlan {}\n",
                        iface.access_vlan
                    ));
                }
            }
            if iface.shutdown {
                out.push_str(" shutdown\n");
            }
            out.push_str("!\n");
        }
        out.push_str("end\n");
        out
    }

    /// Re-apply this configuration onto a factory-reset switch. Returns the
    /// desired admin state per port so the caller can raise/lower links and
    /// set the hostname.
    pub fn apply(
        &self,
        state: &mut SwitchState,
        ports_by_name: &BTreeMap<String, PortId>,
    ) -> Vec<(PortId, bool)> {
        for vlan in &self.vlans {
            if state.create_vlan(vlan.id).is_ok() {
                if let Some(v) = state.vlans.get_mut(vlan.id) {
                    v.name = vlan.name.clone();
                }
            }
        }
        state.mac_table.aging_secs = self.mac_aging_secs;

        let mut admin = Vec::new();
        for iface in &self.interfaces {
            let Some(&pid) = ports_by_name.get(&iface.name) else {
                continue;
            };
            let mode = if iface.mode == "trunk" {
                SwitchPortMode::Trunk
            } else {
                SwitchPortMode::Access
            };
            state.set_port_mode(pid, mode);
            state.assign_access_vlan(pid, iface.access_vlan);
            if let Some(cfg) = state.port_cfg.get_mut(&pid) {
                cfg.native_vlan = iface.native_vlan;
                cfg.allowed = if iface.allowed_vlans == "all" {
                    AllowedVlans::All
                } else {
                    match parse_vlan_list(&iface.allowed_vlans) {
                        Ok(set) => AllowedVlans::List(set),
                        Err(_) => AllowedVlans::All,
                    }
                };
            }
            admin.push((pid, !iface.shutdown));
        }
        admin
    }
}

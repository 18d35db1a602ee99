//! Equipment: the device registry, the `World` arena, and the per-role
//! control planes (hub, switch, host, router).

pub mod hub;
pub mod switch;
pub mod world;

mod host;
mod router;

pub use host::{
    ArpEntry, EchoOutcome, HostState, PingProbe, PingReport, RouteEntry, RouteKind, TracerouteHop,
};
pub use switch::{
    AllowedVlans, MacEntryKind, SwitchPortConfig, SwitchPortMode, SwitchState, SwitchVendor,
    StpState,
};
pub use world::World;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::wire::PortId;

/// Stable handle to a `Device` in the world arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

/// Role-specific state. A router is a `Host` with forwarding enabled;
/// firewalls and servers are hosts by composition as well.
#[derive(Debug)]
pub enum DeviceKind {
    Hub,
    Switch(SwitchState),
    Host(HostState),
}

/// One piece of equipment: identity, power, and a named-port registry.
#[derive(Debug)]
pub struct Device {
    pub id: DeviceId,
    /// Registry name, stable across power cycles.
    pub name: String,
    /// CLI-configurable hostname; reset to `name` on DRAM loss.
    pub hostname: String,
    /// Canvas position metadata.
    pub position: (f64, f64),
    pub powered: bool,
    /// Ports keyed by interface name, iteration order = name order.
    pub ports: BTreeMap<String, PortId>,
    pub kind: DeviceKind,
}

impl Device {
    pub fn is_switch(&self) -> bool {
        matches!(self.kind, DeviceKind::Switch(_))
    }

    pub fn as_switch(&self) -> Option<&SwitchState> {
        match &self.kind {
            DeviceKind::Switch(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_switch_mut(&mut self) -> Option<&mut SwitchState> {
        match &mut self.kind {
            DeviceKind::Switch(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_host(&self) -> Option<&HostState> {
        match &self.kind {
            DeviceKind::Host(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_host_mut(&mut self) -> Option<&mut HostState> {
        match &mut self.kind {
            DeviceKind::Host(h) => Some(h),
            _ => None,
        }
    }

    /// Look up a port id by exact interface name.
    pub fn port_by_name(&self, name: &str) -> Option<PortId> {
        self.ports.get(name).copied()
    }
}

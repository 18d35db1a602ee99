//! The `World` arena: every port, cable, and device of one simulated
//! network, plus the synchronous frame-delivery pipeline and the virtual
//! timer wheel. All cross-entity operations are `World` methods so the
//! pipeline recurses through stable ids, never through shared references.

use std::collections::HashMap;
use std::sync::Arc;

use crate::addr::Ipv4Address;
use crate::clock::{Clock, TimerWheel};
use crate::config;
use crate::device::switch::{IngressDecision, LearnOutcome, SwitchState, SwitchVendor};
use crate::device::{Device, DeviceId, DeviceKind, HostState};
use crate::error::NetError;
use crate::logger::{EventBus, LogEvent, LogLevel};
use crate::proto::EthernetFrame;
use crate::rng::SimRng;
use crate::wire::{Cable, CableId, CableKind, Port, PortId, SecurityVerdict};

/// Frames may traverse at most this many hops in one delivery; a physical
/// loop with every port forwarding would otherwise recurse forever.
const MAX_DELIVERY_DEPTH: u32 = 64;

/// What a wheel entry does when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TimerKind {
    MacAging(DeviceId),
    StpAdvance(DeviceId),
    DhcpT1 { device: DeviceId, iface: String },
    DhcpT2 { device: DeviceId, iface: String },
    DhcpExpiry { device: DeviceId, iface: String },
}

impl TimerKind {
    fn device(&self) -> DeviceId {
        match self {
            TimerKind::MacAging(d) | TimerKind::StpAdvance(d) => *d,
            TimerKind::DhcpT1 { device, .. }
            | TimerKind::DhcpT2 { device, .. }
            | TimerKind::DhcpExpiry { device, .. } => *device,
        }
    }
}

/// One simulated network. Doubles as the process equipment registry: every
/// device is registered here at creation and findable by name or address.
pub struct World {
    pub(crate) ports: HashMap<PortId, Port>,
    pub(crate) cables: HashMap<CableId, Cable>,
    pub(crate) devices: HashMap<DeviceId, Device>,
    next_port: u32,
    next_cable: u32,
    next_device: u32,
    pub clock: Clock,
    pub bus: Arc<EventBus>,
    pub(crate) timers: TimerWheel<TimerKind>,
    pub(crate) rng: SimRng,
    depth: u32,
}

impl World {
    pub fn new() -> Self {
        Self::with_seed(0x6e65_746c)
    }

    /// Deterministic world: same seed, same loss draws and transaction ids.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            ports: HashMap::new(),
            cables: HashMap::new(),
            devices: HashMap::new(),
            next_port: 1,
            next_cable: 1,
            next_device: 1,
            clock: Clock::new(),
            bus: Arc::new(EventBus::new()),
            timers: TimerWheel::new(),
            rng: SimRng::new(seed),
            depth: 0,
        }
    }

    /// Drop every device, cable, port, and timer.
    pub fn clear(&mut self) {
        self.ports.clear();
        self.cables.clear();
        self.devices.clear();
        self.timers = TimerWheel::new();
    }

    // ---- logging -------------------------------------------------------

    pub(crate) fn log(&self, level: LogLevel, source: &str, event: &str, message: String) {
        self.log_kv(level, source, event, message, Vec::new());
    }

    pub(crate) fn log_kv(
        &self,
        level: LogLevel,
        source: &str,
        event: &str,
        message: String,
        data: Vec<(String, String)>,
    ) {
        self.bus.publish(LogEvent {
            timestamp_ms: self.clock.now_ms(),
            level,
            source: source.to_string(),
            event: event.to_string(),
            message,
            data,
        });
    }

    pub(crate) fn device_name(&self, id: DeviceId) -> String {
        self.devices
            .get(&id)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| format!("device-{}", id.0))
    }

    // ---- accessors -----------------------------------------------------

    pub fn device(&self, id: DeviceId) -> Result<&Device, NetError> {
        self.devices
            .get(&id)
            .ok_or_else(|| NetError::Configuration(format!("unknown device id {}", id.0)))
    }

    pub fn device_mut(&mut self, id: DeviceId) -> Result<&mut Device, NetError> {
        self.devices
            .get_mut(&id)
            .ok_or_else(|| NetError::Configuration(format!("unknown device id {}", id.0)))
    }

    pub fn port(&self, id: PortId) -> Result<&Port, NetError> {
        self.ports
            .get(&id)
            .ok_or_else(|| NetError::Configuration(format!("unknown port id {}", id.0)))
    }

    pub fn port_mut(&mut self, id: PortId) -> Result<&mut Port, NetError> {
        self.ports
            .get_mut(&id)
            .ok_or_else(|| NetError::Configuration(format!("unknown port id {}", id.0)))
    }

    pub fn cable(&self, id: CableId) -> Result<&Cable, NetError> {
        self.cables
            .get(&id)
            .ok_or_else(|| NetError::Configuration(format!("unknown cable id {}", id.0)))
    }

    /// Port id of `iface` on `device`.
    pub fn port_id(&self, device: DeviceId, iface: &str) -> Result<PortId, NetError> {
        self.device(device)?
            .port_by_name(iface)
            .ok_or_else(|| NetError::Configuration(format!("no such interface: {iface}")))
    }

    /// Registry lookup by equipment name.
    pub fn find_by_name(&self, name: &str) -> Option<DeviceId> {
        self.devices
            .values()
            .find(|d| d.name == name)
            .map(|d| d.id)
    }

    /// Registry lookup by interface IPv4 address.
    pub fn find_by_ipv4(&self, ip: &Ipv4Address) -> Option<(DeviceId, PortId)> {
        for device in self.devices.values() {
            for pid in device.ports.values() {
                if let Some(port) = self.ports.get(pid) {
                    if port.has_ipv4(ip) {
                        return Some((device.id, *pid));
                    }
                }
            }
        }
        None
    }

    // ---- construction --------------------------------------------------

    fn alloc_device(&mut self, name: &str, kind: DeviceKind) -> DeviceId {
        let id = DeviceId(self.next_device);
        self.next_device += 1;
        self.devices.insert(
            id,
            Device {
                id,
                name: name.to_string(),
                hostname: name.to_string(),
                position: (0.0, 0.0),
                powered: true,
                ports: Default::default(),
                kind,
            },
        );
        id
    }

    fn alloc_port(&mut self, device: DeviceId, name: &str) -> PortId {
        let id = PortId(self.next_port);
        self.next_port += 1;
        self.ports.insert(id, Port::new(id, device, name, None));
        if let Some(dev) = self.devices.get_mut(&device) {
            dev.ports.insert(name.to_string(), id);
        }
        id
    }

    /// An L1 repeater with `port_count` ports named `port1..`.
    pub fn add_hub(&mut self, name: &str, port_count: u32) -> DeviceId {
        let id = self.alloc_device(name, DeviceKind::Hub);
        for i in 1..=port_count {
            self.alloc_port(id, &format!("port{i}"));
        }
        self.log(LogLevel::Info, name, "device.created", format!("hub {name} ({port_count} ports)"));
        id
    }

    /// A learning switch with `fast_ports` FastEthernet ports plus two
    /// GigabitEthernet uplinks, wearing the given vendor persona.
    pub fn add_switch(&mut self, name: &str, vendor: SwitchVendor, fast_ports: u32) -> DeviceId {
        let id = self.alloc_device(name, DeviceKind::Switch(SwitchState::new(vendor)));
        let mut pids = Vec::new();
        for i in 1..=fast_ports {
            pids.push(self.alloc_port(id, &format!("FastEthernet0/{i}")));
        }
        for i in 1..=2 {
            pids.push(self.alloc_port(id, &format!("GigabitEthernet0/{i}")));
        }
        if let Some(sw) = self.devices.get_mut(&id).and_then(|d| d.as_switch_mut()) {
            for pid in pids {
                sw.register_port(pid);
            }
        }
        self.start_switch_timers(id);
        self.log(LogLevel::Info, name, "device.created", format!("switch {name}"));
        id
    }

    /// An end host with interfaces `eth0..eth{n-1}`.
    pub fn add_host_with_ifaces(&mut self, name: &str, ifaces: u32) -> DeviceId {
        let id = self.alloc_device(name, DeviceKind::Host(HostState::new()));
        for i in 0..ifaces {
            self.alloc_port(id, &format!("eth{i}"));
        }
        self.log(LogLevel::Info, name, "device.created", format!("host {name}"));
        id
    }

    pub fn add_host(&mut self, name: &str) -> DeviceId {
        self.add_host_with_ifaces(name, 1)
    }

    /// A router: an end host with IPv4 forwarding enabled.
    pub fn add_router(&mut self, name: &str, ifaces: u32) -> DeviceId {
        let id = self.add_host_with_ifaces(name, ifaces);
        if let Some(host) = self.devices.get_mut(&id).and_then(|d| d.as_host_mut()) {
            host.forwarding = true;
        }
        id
    }

    fn start_switch_timers(&mut self, id: DeviceId) {
        let now = self.clock.now_ms();
        self.timers.schedule_every(
            now,
            config::MAC_AGING_SWEEP_SECS * 1000,
            TimerKind::MacAging(id),
        );
        self.timers
            .schedule_every(now, config::STP_ADVANCE_SECS * 1000, TimerKind::StpAdvance(id));
    }

    /// Unregister a device: its cables are disconnected, its timers
    /// cancelled, its ports destroyed.
    pub fn remove_device(&mut self, id: DeviceId) -> Result<(), NetError> {
        let device = self
            .devices
            .remove(&id)
            .ok_or_else(|| NetError::Configuration(format!("unknown device id {}", id.0)))?;
        let pids: Vec<PortId> = device.ports.values().copied().collect();
        for pid in &pids {
            if let Some(cid) = self.ports.get(pid).and_then(|p| p.cable) {
                let _ = self.disconnect(cid);
            }
            self.ports.remove(pid);
        }
        self.timers.cancel_matching(|k| k.device() == id);
        self.log(LogLevel::Info, &device.name, "device.removed", format!("{} removed", device.name));
        Ok(())
    }

    // ---- cabling -------------------------------------------------------

    /// Run a cable between two ports: installs both references, negotiates
    /// both directions, logs a duplex mismatch, fires link-up.
    pub fn connect(
        &mut self,
        kind: CableKind,
        a: PortId,
        b: PortId,
        length_m: f64,
    ) -> Result<CableId, NetError> {
        if a == b {
            return Err(NetError::Configuration(
                "cannot connect a port to itself".to_string(),
            ));
        }
        for pid in [a, b] {
            let port = self.port(pid)?;
            if port.cable.is_some() {
                return Err(NetError::Configuration(format!(
                    "port {} is already cabled",
                    port.name
                )));
            }
        }

        let id = CableId(self.next_cable);
        let cable = Cable::new(id, kind, a, b, length_m)?;
        self.next_cable += 1;
        self.cables.insert(id, cable);

        let max_speed = kind.spec().max_speed_mbps;
        let (a_speed, a_duplex) = {
            let pa = &self.ports[&a];
            let pb = &self.ports[&b];
            pa.negotiate(pb.speed_mbps, pb.duplex, max_speed)
        };
        let (b_speed, b_duplex) = {
            let pa = &self.ports[&a];
            let pb = &self.ports[&b];
            pb.negotiate(pa.speed_mbps, pa.duplex, max_speed)
        };

        {
            let pa = self.ports.get_mut(&a).unwrap();
            pa.cable = Some(id);
            pa.negotiated_speed = Some(a_speed);
            pa.negotiated_duplex = Some(a_duplex);
        }
        {
            let pb = self.ports.get_mut(&b).unwrap();
            pb.cable = Some(id);
            pb.negotiated_speed = Some(b_speed);
            pb.negotiated_duplex = Some(b_duplex);
        }

        if a_duplex != b_duplex {
            let name_a = self.ports[&a].name.clone();
            let name_b = self.ports[&b].name.clone();
            self.log(
                LogLevel::Warn,
                "world",
                "cable.duplex-mismatch",
                format!("duplex mismatch between {name_a} and {name_b}"),
            );
        }

        for pid in [a, b] {
            let port = &self.ports[&pid];
            let owner = self.device_name(port.owner);
            self.log(
                LogLevel::Info,
                &owner,
                "port.link-up",
                format!("{} link up ({} Mb/s)", port.name, a_speed.min(b_speed)),
            );
        }
        Ok(id)
    }

    /// Convenience: connect two named interfaces.
    pub fn connect_ifaces(
        &mut self,
        kind: CableKind,
        dev_a: DeviceId,
        iface_a: &str,
        dev_b: DeviceId,
        iface_b: &str,
        length_m: f64,
    ) -> Result<CableId, NetError> {
        let a = self.port_id(dev_a, iface_a)?;
        let b = self.port_id(dev_b, iface_b)?;
        self.connect(kind, a, b, length_m)
    }

    /// Pull a cable: both ports lose their reference and negotiated link
    /// parameters, link-down fires on both.
    pub fn disconnect(&mut self, cable: CableId) -> Result<(), NetError> {
        let cable = self
            .cables
            .remove(&cable)
            .ok_or_else(|| NetError::Configuration(format!("unknown cable id {}", cable.0)))?;
        for pid in [cable.a, cable.b] {
            if let Some(port) = self.ports.get_mut(&pid) {
                port.cable = None;
                port.negotiated_speed = None;
                port.negotiated_duplex = None;
                let name = port.name.clone();
                let owner = port.owner;
                let owner_name = self.device_name(owner);
                self.log(
                    LogLevel::Info,
                    &owner_name,
                    "port.link-down",
                    format!("{name} link down (cable removed)"),
                );
            }
        }
        Ok(())
    }

    /// Admin up/down. Idempotent: no event unless the state changes.
    pub fn set_port_up(&mut self, pid: PortId, up: bool) -> Result<(), NetError> {
        let (changed, name, owner) = {
            let port = self.port_mut(pid)?;
            let changed = port.up != up;
            port.up = up;
            (changed, port.name.clone(), port.owner)
        };
        if changed {
            let owner_name = self.device_name(owner);
            let event = if up { "port.link-up" } else { "port.link-down" };
            self.log(
                LogLevel::Info,
                &owner_name,
                event,
                format!("{name} admin {}", if up { "up" } else { "down" }),
            );
        }
        Ok(())
    }

    // ---- frame pipeline ------------------------------------------------

    /// Submit a frame on a port. Fails (drop counted) if the port is down
    /// or uncabled; returns whether the cable accepted the frame.
    pub fn port_send(&mut self, pid: PortId, frame: EthernetFrame) -> bool {
        let cable = {
            let Some(port) = self.ports.get_mut(&pid) else {
                return false;
            };
            if !port.up || port.cable.is_none() {
                port.counters.drops_out += 1;
                return false;
            }
            port.counters.frames_out += 1;
            port.counters.bytes_out += frame.byte_len() as u64;
            port.cable.unwrap()
        };
        self.cable_transmit(cable, pid, frame)
    }

    /// Deliver over a cable: loss draw, then the far port's receive path.
    fn cable_transmit(&mut self, cid: CableId, from: PortId, frame: EthernetFrame) -> bool {
        let (peer, lost) = {
            let Some(cable) = self.cables.get_mut(&cid) else {
                return false;
            };
            if !cable.up {
                return false;
            }
            let Some(peer) = cable.opposite(from) else {
                return false;
            };
            let lost = cable.packet_loss_rate > 0.0 && {
                let p = cable.packet_loss_rate;
                self.rng.chance(p)
            };
            if lost {
                cable.frames_lost += 1;
            } else {
                cable.frames_transmitted += 1;
            }
            (peer, lost)
        };
        if lost {
            self.log(
                LogLevel::Warn,
                "world",
                "cable.loss",
                format!("frame lost on cable {}", cid.0),
            );
            return true;
        }
        self.port_receive(peer, frame);
        true
    }

    /// Ingress path: down-gate, port security, counters, then the owning
    /// device's frame handler.
    fn port_receive(&mut self, pid: PortId, frame: EthernetFrame) {
        let owner = {
            let Some(port) = self.ports.get_mut(&pid) else {
                return;
            };
            if !port.up {
                port.counters.drops_in += 1;
                return;
            }
            match port.check_port_security(frame.src) {
                SecurityVerdict::Accept => {}
                SecurityVerdict::Drop => {
                    port.counters.drops_in += 1;
                    let name = port.name.clone();
                    let owner = port.owner;
                    let owner_name = self.device_name(owner);
                    self.log(
                        LogLevel::Warn,
                        &owner_name,
                        "security.violation",
                        format!("port-security violation on {name} (src {})", frame.src),
                    );
                    return;
                }
                SecurityVerdict::ShutdownPort => {
                    port.counters.drops_in += 1;
                    let name = port.name.clone();
                    let owner = port.owner;
                    let owner_name = self.device_name(owner);
                    self.log(
                        LogLevel::Warn,
                        &owner_name,
                        "security.violation",
                        format!("port-security violation on {name}: err-disabled"),
                    );
                    self.log(
                        LogLevel::Info,
                        &owner_name,
                        "port.link-down",
                        format!("{name} err-disabled"),
                    );
                    return;
                }
            }
            port.counters.frames_in += 1;
            port.counters.bytes_in += frame.byte_len() as u64;
            port.owner
        };

        if self.depth >= MAX_DELIVERY_DEPTH {
            self.log(
                LogLevel::Warn,
                "world",
                "world.loop-guard",
                "delivery depth exceeded, frame dropped".to_string(),
            );
            return;
        }
        self.depth += 1;
        self.dispatch_frame(owner, pid, frame);
        self.depth -= 1;
    }

    fn dispatch_frame(&mut self, device: DeviceId, ingress: PortId, frame: EthernetFrame) {
        let Some(dev) = self.devices.get(&device) else {
            return;
        };
        if !dev.powered {
            return;
        }
        match dev.kind {
            DeviceKind::Hub => self.hub_handle_frame(device, ingress, frame),
            DeviceKind::Switch(_) => self.switch_handle_frame(device, ingress, frame),
            DeviceKind::Host(_) => self.host_handle_frame(device, ingress, frame),
        }
    }

    // ---- switch pipeline ----------------------------------------------

    fn switch_handle_frame(&mut self, device: DeviceId, ingress: PortId, frame: EthernetFrame) {
        let name = self.device_name(device);
        let now = self.clock.now_ms();

        // Gate + classify + learn in one mutable pass over the switch state.
        let (vid, forward, moved_from) = {
            let Some(sw) = self
                .devices
                .get_mut(&device)
                .and_then(|d| d.as_switch_mut())
            else {
                return;
            };
            match sw.classify_ingress(ingress, &frame) {
                IngressDecision::Vlan(vid) => {
                    let moved_from = match sw.mac_table.learn(vid, frame.src, ingress, now) {
                        LearnOutcome::Moved { from } => Some(from),
                        LearnOutcome::Learned | LearnOutcome::PinnedStatic => None,
                    };
                    let forward = sw.stp_state(ingress).can_forward();
                    if !forward {
                        sw.stats.dropped += 1;
                    }
                    (vid, forward, moved_from)
                }
                IngressDecision::DropStp
                | IngressDecision::DropDisallowed(_)
                | IngressDecision::DropNoVlan(_) => {
                    sw.stats.dropped += 1;
                    return;
                }
            }
        };
        if let Some(from) = moved_from {
            let from_name = self
                .ports
                .get(&from)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            let to_name = self
                .ports
                .get(&ingress)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            self.log_kv(
                LogLevel::Warn,
                &name,
                "switch.mac-move",
                format!("MAC {} moved from {from_name} to {to_name} (vlan {vid})", frame.src),
                vec![
                    ("mac".to_string(), frame.src.to_string()),
                    ("vlan".to_string(), vid.to_string()),
                    ("from".to_string(), from_name.clone()),
                    ("to".to_string(), to_name.clone()),
                ],
            );
        }
        if !forward {
            // STP learning state: addresses noted, nothing forwarded.
            return;
        }

        // Forwarding decision over an immutable view.
        let (plan, flooded) = {
            let dev = &self.devices[&device];
            let sw = dev.as_switch().expect("switch state");
            let known = if frame.dst.is_broadcast() || frame.dst.is_ipv6_multicast() {
                None
            } else {
                sw.mac_table.lookup(vid, frame.dst).map(|e| e.port)
            };

            let mut plan: Vec<(PortId, EthernetFrame)> = Vec::new();
            let mut flooded = false;
            match known {
                Some(egress) if egress == ingress => {
                    // Destination lives on the ingress port; drop silently.
                }
                Some(egress) => {
                    if let Some(out) = self.egress_candidate(sw, egress, vid, &frame) {
                        plan.push((egress, out));
                    }
                }
                None => {
                    flooded = true;
                    for pid in dev.ports.values() {
                        if *pid == ingress {
                            continue;
                        }
                        if let Some(out) = self.egress_candidate(sw, *pid, vid, &frame) {
                            plan.push((*pid, out));
                        }
                    }
                }
            }
            (plan, flooded)
        };

        let delivered = plan.len() as u64;
        for (pid, out) in plan {
            self.port_send(pid, out);
        }

        if let Some(sw) = self
            .devices
            .get_mut(&device)
            .and_then(|d| d.as_switch_mut())
        {
            if flooded {
                sw.stats.flooded += 1;
            } else if delivered > 0 {
                sw.stats.forwarded += 1;
            } else {
                sw.stats.dropped += 1;
            }
        }
    }

    /// Egress eligibility: STP/VLAN transform plus physical state.
    fn egress_candidate(
        &self,
        sw: &SwitchState,
        pid: PortId,
        vid: u16,
        frame: &EthernetFrame,
    ) -> Option<EthernetFrame> {
        let port = self.ports.get(&pid)?;
        if !port.up || port.cable.is_none() {
            return None;
        }
        sw.egress_frame(pid, vid, frame)
    }

    // ---- power ---------------------------------------------------------

    /// Power a device off: aging and DHCP timers die with it; a switch's
    /// NVRAM blob survives.
    pub fn power_off(&mut self, id: DeviceId) -> Result<(), NetError> {
        let name = {
            let dev = self.device_mut(id)?;
            dev.powered = false;
            dev.name.clone()
        };
        self.timers.cancel_matching(|k| k.device() == id);
        self.log(LogLevel::Info, &name, "device.power-off", format!("{name} powered off"));
        Ok(())
    }

    /// Power on: DRAM loss. A switch reverts to factory state, then
    /// restores from the startup-config blob if one was written.
    pub fn power_on(&mut self, id: DeviceId) -> Result<(), NetError> {
        let name = self.device(id)?.name.clone();
        // A double power-on must not leave duplicate periodic timers.
        self.timers.cancel_matching(|k| k.device() == id);
        let is_switch;
        {
            let dev = self.device_mut(id)?;
            dev.powered = true;
            dev.hostname = dev.name.clone();
            is_switch = dev.is_switch();
            match &mut dev.kind {
                DeviceKind::Switch(sw) => sw.reset_volatile(),
                DeviceKind::Host(host) => host.reset_volatile(),
                DeviceKind::Hub => {}
            }
        }
        if is_switch {
            self.restore_startup_config(id);
            self.start_switch_timers(id);
        }
        self.log(LogLevel::Info, &name, "device.power-on", format!("{name} powered on"));
        Ok(())
    }

    fn restore_startup_config(&mut self, id: DeviceId) {
        use crate::device::switch::StartupConfig;

        let blob = self
            .devices
            .get(&id)
            .and_then(|d| d.as_switch())
            .and_then(|sw| sw.startup_config.clone());
        let Some(blob) = blob else {
            return;
        };
        let Ok(cfg) = StartupConfig::from_json(&blob) else {
            let name = self.device_name(id);
            self.log(
                LogLevel::Error,
                &name,
                "device.nvram-corrupt",
                "startup-config blob did not parse; booting factory defaults".to_string(),
            );
            return;
        };

        let hostname = cfg.hostname.clone();
        let admin = {
            let dev = self.devices.get_mut(&id).expect("device exists");
            let names = dev.ports.clone();
            let Some(sw) = dev.as_switch_mut() else {
                return;
            };
            cfg.apply(sw, &names)
        };
        if let Some(dev) = self.devices.get_mut(&id) {
            dev.hostname = hostname;
        }
        for (pid, up) in admin {
            let _ = self.set_port_up(pid, up);
        }
    }

    // ---- virtual time --------------------------------------------------

    /// Advance virtual time by `ms`, firing every timer that comes due, in
    /// deterministic (due-time, registration) order.
    pub fn advance(&mut self, ms: u64) {
        let target = self.clock.now_ms() + ms;
        loop {
            match self.timers.next_due() {
                Some(due) if due <= target => {
                    let entry = self.timers.pop_due(target).expect("due entry");
                    self.clock.advance_to(entry.due_ms);
                    self.fire_timer(entry.kind);
                }
                _ => break,
            }
        }
        self.clock.advance_to(target);
    }

    pub fn tick_secs(&mut self, secs: u64) {
        self.advance(secs * 1000);
    }

    fn fire_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::MacAging(id) => {
                let now = self.clock.now_ms();
                if let Some(sw) = self.devices.get_mut(&id).and_then(|d| d.as_switch_mut()) {
                    let evicted = sw.mac_table.sweep(now);
                    if evicted > 0 {
                        let name = self.device_name(id);
                        self.log(
                            LogLevel::Debug,
                            &name,
                            "switch.mac-aged",
                            format!("{evicted} dynamic entries aged out"),
                        );
                    }
                }
            }
            TimerKind::StpAdvance(id) => {
                let transitions = match self.devices.get_mut(&id).and_then(|d| d.as_switch_mut()) {
                    Some(sw) => sw.advance_stp(),
                    None => Vec::new(),
                };
                if !transitions.is_empty() {
                    let name = self.device_name(id);
                    for (pid, from, to) in transitions {
                        let port_name = self
                            .ports
                            .get(&pid)
                            .map(|p| p.name.clone())
                            .unwrap_or_default();
                        self.log(
                            LogLevel::Info,
                            &name,
                            "stp.transition",
                            format!("{port_name}: {} -> {}", from.as_str(), to.as_str()),
                        );
                    }
                }
            }
            TimerKind::DhcpT1 { device, iface } => self.dhcp_timer_t1(device, &iface),
            TimerKind::DhcpT2 { device, iface } => self.dhcp_timer_t2(device, &iface),
            TimerKind::DhcpExpiry { device, iface } => self.dhcp_timer_expiry(device, &iface),
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::MacAddr;
    use crate::device::switch::{AllowedVlans, SwitchPortMode};
    use crate::device::EchoOutcome;
    use crate::dhcp::{DhclientOptions, DhcpClientState};
    use crate::proto::{ArpPacket, EthernetFrame, Payload};
    use crate::wire::{CableKind, PortSecurity, ViolationMode};

    fn ip(s: &str) -> crate::addr::Ipv4Address {
        s.parse().unwrap()
    }

    fn cfg_iface(world: &mut World, dev: DeviceId, iface: &str, addr: &str, prefix: u8) {
        world
            .configure_interface(
                dev,
                iface,
                addr.parse().unwrap(),
                crate::addr::SubnetMask::from_prefix_len(prefix).unwrap(),
            )
            .unwrap();
    }

    /// Two hosts, one switch, both access ports in VLAN 1 (scenario S1).
    fn lan() -> (World, DeviceId, DeviceId, DeviceId) {
        let mut world = World::new();
        let sw = world.add_switch("SW1", SwitchVendor::Cisco, 8);
        let h1 = world.add_host("H1");
        let h2 = world.add_host("H2");
        world
            .connect_ifaces(CableKind::Cat5e, h1, "eth0", sw, "FastEthernet0/1", 5.0)
            .unwrap();
        world
            .connect_ifaces(CableKind::Cat5e, h2, "eth0", sw, "FastEthernet0/2", 5.0)
            .unwrap();
        cfg_iface(&mut world, h1, "eth0", "192.168.1.10", 24);
        cfg_iface(&mut world, h2, "eth0", "192.168.1.20", 24);
        (world, sw, h1, h2)
    }

    #[test]
    fn test_s1_ping_through_switch() {
        let (mut world, sw, h1, h2) = lan();
        let report = world.ping(h1, ip("192.168.1.20"), 1, None).unwrap();
        assert_eq!(report.received(), 1);
        assert!((report.loss_pct() - 0.0).abs() < f64::EPSILON);

        // H1 resolved H2.
        let h2_mac = world.port(world.port_id(h2, "eth0").unwrap()).unwrap().mac;
        let h1_host = world.device(h1).unwrap().as_host().unwrap();
        assert_eq!(h1_host.arp_cache.get(&ip("192.168.1.20")).unwrap().mac, h2_mac);

        // The switch learned both stations in VLAN 1.
        let state = world.device(sw).unwrap().as_switch().unwrap();
        assert_eq!(state.mac_table.len(), 2);
        let h1_mac = world.port(world.port_id(h1, "eth0").unwrap()).unwrap().mac;
        assert!(state.mac_table.lookup(1, h1_mac).is_some());
        assert!(state.mac_table.lookup(1, h2_mac).is_some());

        // Exactly one ARP exchange and one echo exchange crossed H1's wire:
        // two frames out (request, echo), two frames in (reply, echo reply).
        let h1_port = world.port(world.port_id(h1, "eth0").unwrap()).unwrap();
        assert_eq!(h1_port.counters.frames_out, 2);
        assert_eq!(h1_port.counters.frames_in, 2);
    }

    #[test]
    fn test_s2_vlan_isolation_means_total_loss() {
        let (mut world, sw, h1, _h2) = lan();
        {
            let p1 = world.port_id(sw, "FastEthernet0/1").unwrap();
            let p2 = world.port_id(sw, "FastEthernet0/2").unwrap();
            let state = world.device_mut(sw).unwrap().as_switch_mut().unwrap();
            state.create_vlan(10).unwrap();
            state.create_vlan(20).unwrap();
            state.assign_access_vlan(p1, 10);
            state.assign_access_vlan(p2, 20);
        }
        let report = world.ping(h1, ip("192.168.1.20"), 2, None).unwrap();
        assert_eq!(report.transmitted(), 2);
        assert_eq!(report.received(), 0);
        assert!((report.loss_pct() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_s3_trunk_carries_tagged_vlan() {
        let mut world = World::new();
        let sw1 = world.add_switch("SW1", SwitchVendor::Cisco, 8);
        let sw2 = world.add_switch("SW2", SwitchVendor::Cisco, 8);
        let h1 = world.add_host("H1");
        let h2 = world.add_host("H2");
        world
            .connect_ifaces(CableKind::Cat5e, h1, "eth0", sw1, "FastEthernet0/1", 5.0)
            .unwrap();
        world
            .connect_ifaces(CableKind::Cat5e, h2, "eth0", sw2, "FastEthernet0/1", 5.0)
            .unwrap();
        world
            .connect_ifaces(CableKind::Cat6a, sw1, "GigabitEthernet0/1", sw2, "GigabitEthernet0/1", 10.0)
            .unwrap();

        for sw in [sw1, sw2] {
            let access = world.port_id(sw, "FastEthernet0/1").unwrap();
            let trunk = world.port_id(sw, "GigabitEthernet0/1").unwrap();
            let state = world.device_mut(sw).unwrap().as_switch_mut().unwrap();
            state.create_vlan(10).unwrap();
            state.create_vlan(20).unwrap();
            state.assign_access_vlan(access, 20);
            state.set_port_mode(trunk, SwitchPortMode::Trunk);
            state.port_cfg.get_mut(&trunk).unwrap().native_vlan = 10;
        }
        cfg_iface(&mut world, h1, "eth0", "10.0.0.1", 24);
        cfg_iface(&mut world, h2, "eth0", "10.0.0.2", 24);

        let report = world.ping(h1, ip("10.0.0.2"), 1, None).unwrap();
        assert_eq!(report.received(), 1, "ping across the trunk succeeds");

        // SW2 learned H1 in VLAN 20 through its trunk port: the frame
        // crossed the trunk tagged with VID 20.
        let h1_mac = world.port(world.port_id(h1, "eth0").unwrap()).unwrap().mac;
        let sw2_trunk = world.port_id(sw2, "GigabitEthernet0/1").unwrap();
        let state = world.device(sw2).unwrap().as_switch().unwrap();
        let entry = state.mac_table.lookup(20, h1_mac).expect("H1 learned in VLAN 20");
        assert_eq!(entry.port, sw2_trunk);
    }

    #[test]
    fn test_trunk_disallowed_vlan_blocks_traffic() {
        let mut world = World::new();
        let sw1 = world.add_switch("SW1", SwitchVendor::Cisco, 8);
        let sw2 = world.add_switch("SW2", SwitchVendor::Cisco, 8);
        let h1 = world.add_host("H1");
        let h2 = world.add_host("H2");
        world
            .connect_ifaces(CableKind::Cat5e, h1, "eth0", sw1, "FastEthernet0/1", 5.0)
            .unwrap();
        world
            .connect_ifaces(CableKind::Cat5e, h2, "eth0", sw2, "FastEthernet0/1", 5.0)
            .unwrap();
        world
            .connect_ifaces(CableKind::Cat6a, sw1, "GigabitEthernet0/1", sw2, "GigabitEthernet0/1", 10.0)
            .unwrap();

        for sw in [sw1, sw2] {
            let access = world.port_id(sw, "FastEthernet0/1").unwrap();
            let trunk = world.port_id(sw, "GigabitEthernet0/1").unwrap();
            let state = world.device_mut(sw).unwrap().as_switch_mut().unwrap();
            state.create_vlan(20).unwrap();
            state.assign_access_vlan(access, 20);
            state.set_port_mode(trunk, SwitchPortMode::Trunk);
            // VLAN 20 not in the allowed set.
            state.port_cfg.get_mut(&trunk).unwrap().allowed =
                AllowedVlans::List([1u16, 10].into_iter().collect());
        }
        cfg_iface(&mut world, h1, "eth0", "10.0.0.1", 24);
        cfg_iface(&mut world, h2, "eth0", "10.0.0.2", 24);

        let report = world.ping(h1, ip("10.0.0.2"), 1, None).unwrap();
        assert_eq!(report.received(), 0, "trunk must filter disallowed VLANs");
    }

    #[test]
    fn test_mac_aging_evicts_idle_stations() {
        let (mut world, sw, h1, _) = lan();
        world.ping(h1, ip("192.168.1.20"), 1, None).unwrap();
        assert_eq!(world.device(sw).unwrap().as_switch().unwrap().mac_table.len(), 2);

        let aging = crate::config::MAC_AGING_SECS;
        world.tick_secs(aging + 2);
        assert!(
            world.device(sw).unwrap().as_switch().unwrap().mac_table.is_empty(),
            "dynamic entries age out after {aging}s of silence"
        );
    }

    #[test]
    fn test_lossy_cable_drops_probes() {
        let (mut world, _, h1, h2) = lan();
        let h2_cable = world
            .port(world.port_id(h2, "eth0").unwrap())
            .unwrap()
            .cable
            .unwrap();
        world
            .cables
            .get_mut(&h2_cable)
            .unwrap()
            .set_packet_loss_rate(1.0)
            .unwrap();

        let report = world.ping(h1, ip("192.168.1.20"), 3, None).unwrap();
        assert_eq!(report.received(), 0);
        let cable = world.cable(h2_cable).unwrap();
        assert!(cable.frames_lost > 0, "losses are counted");
    }

    #[test]
    fn test_port_security_shutdown_on_second_mac() {
        let (mut world, sw, h1, _) = lan();
        let sw_port = world.port_id(sw, "FastEthernet0/1").unwrap();
        world.port_mut(sw_port).unwrap().security =
            Some(PortSecurity::new(ViolationMode::Shutdown));

        let h1_pid = world.port_id(h1, "eth0").unwrap();
        let mac_a: MacAddr = "02:00:00:00:00:aa".parse().unwrap();
        let mac_b: MacAddr = "02:00:00:00:00:bb".parse().unwrap();
        let frame = |src: MacAddr| {
            EthernetFrame::new(
                src,
                MacAddr::BROADCAST,
                Payload::Arp(ArpPacket::request(src, ip("192.168.1.10"), ip("192.168.1.20"))),
            )
        };

        world.port_send(h1_pid, frame(mac_a));
        assert!(world.port(sw_port).unwrap().up, "first MAC is learned");
        world.port_send(h1_pid, frame(mac_b));
        let port = world.port(sw_port).unwrap();
        assert!(!port.up, "second MAC err-disables the port");
        assert_eq!(port.security.as_ref().unwrap().violations, 1);
    }

    /// H1 -- R1 -- R2 -- H2 chain used by the routing tests.
    fn routed_chain() -> (World, DeviceId, DeviceId, DeviceId, DeviceId) {
        let mut world = World::new();
        let h1 = world.add_host("H1");
        let h2 = world.add_host("H2");
        let r1 = world.add_router("R1", 2);
        let r2 = world.add_router("R2", 2);
        world
            .connect_ifaces(CableKind::Cat5e, h1, "eth0", r1, "eth0", 5.0)
            .unwrap();
        world
            .connect_ifaces(CableKind::Cat5e, r1, "eth1", r2, "eth0", 5.0)
            .unwrap();
        world
            .connect_ifaces(CableKind::Cat5e, r2, "eth1", h2, "eth0", 5.0)
            .unwrap();

        cfg_iface(&mut world, h1, "eth0", "10.0.1.10", 24);
        cfg_iface(&mut world, r1, "eth0", "10.0.1.1", 24);
        cfg_iface(&mut world, r1, "eth1", "10.0.12.1", 24);
        cfg_iface(&mut world, r2, "eth0", "10.0.12.2", 24);
        cfg_iface(&mut world, r2, "eth1", "10.0.2.1", 24);
        cfg_iface(&mut world, h2, "eth0", "10.0.2.10", 24);

        world.add_default_route(h1, ip("10.0.1.1"), 0).unwrap();
        world.add_default_route(h2, ip("10.0.2.1"), 0).unwrap();
        world
            .add_static_route(r1, ip("10.0.2.0"), "/24".parse().unwrap(), ip("10.0.12.2"), 1)
            .unwrap();
        world
            .add_static_route(r2, ip("10.0.1.0"), "/24".parse().unwrap(), ip("10.0.12.1"), 1)
            .unwrap();
        (world, h1, h2, r1, r2)
    }

    #[test]
    fn test_routed_ping_decrements_ttl() {
        let (mut world, h1, _, _, _) = routed_chain();
        let report = world.ping(h1, ip("10.0.2.10"), 1, None).unwrap();
        assert_eq!(report.received(), 1);
        match report.probes[0].outcome {
            Some(EchoOutcome::Reply { from, ttl }) => {
                assert_eq!(from, ip("10.0.2.10"));
                assert_eq!(ttl, crate::config::DEFAULT_TTL - 2, "two router hops");
            }
            other => panic!("expected a reply, got {other:?}"),
        }
    }

    #[test]
    fn test_ttl_one_dies_at_first_router() {
        let (mut world, h1, _, _, _) = routed_chain();
        let report = world.ping(h1, ip("10.0.2.10"), 1, Some(1)).unwrap();
        assert_eq!(report.received(), 0);
        match report.probes[0].outcome {
            Some(EchoOutcome::TimeExceeded { from }) => assert_eq!(from, ip("10.0.1.1")),
            other => panic!("expected time-exceeded from R1, got {other:?}"),
        }
    }

    #[test]
    fn test_traceroute_walks_the_chain() {
        let (mut world, h1, _, _, _) = routed_chain();
        let hops = world.traceroute(h1, ip("10.0.2.10")).unwrap();
        assert_eq!(hops.len(), 3);
        assert_eq!(hops[0].from, Some(ip("10.0.1.1")));
        assert_eq!(hops[1].from, Some(ip("10.0.12.2")));
        assert_eq!(hops[2].from, Some(ip("10.0.2.10")));
        assert!(hops[2].reached);
        assert!(!hops[0].reached);
    }

    #[test]
    fn test_router_unreachable_network() {
        let (mut world, h1, _, _, _) = routed_chain();
        let report = world.ping(h1, ip("10.99.0.1"), 1, None).unwrap();
        match report.probes[0].outcome {
            Some(EchoOutcome::Unreachable { from }) => assert_eq!(from, ip("10.0.1.1")),
            other => panic!("expected unreachable from R1, got {other:?}"),
        }
    }

    #[test]
    fn test_s5_dhcp_dora_over_the_wire() {
        let mut world = World::new();
        let r1 = world.add_router("R1", 1);
        let h1 = world.add_host("H1");
        world
            .connect_ifaces(CableKind::Cat5e, h1, "eth0", r1, "eth0", 5.0)
            .unwrap();
        cfg_iface(&mut world, r1, "eth0", "10.1.1.1", 24);
        {
            let server = world.dhcp_server_mut(r1).unwrap();
            let pool = server.pool_mut("LAN");
            pool.network = Some(ip("10.1.1.0"));
            pool.mask = Some("/24".parse().unwrap());
            pool.default_router = Some(ip("10.1.1.1"));
            pool.lease_secs = 86_400;
            server.exclude_range(ip("10.1.1.1"), ip("10.1.1.10")).unwrap();
        }

        let out = world
            .dhclient(
                h1,
                "eth0",
                DhclientOptions {
                    verbose: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(out.contains("DHCPDISCOVER on eth0"), "{out}");
        assert!(out.contains("DHCPOFFER of 10.1.1.11 from 10.1.1.1"), "{out}");
        assert!(out.contains("DHCPREQUEST for 10.1.1.11"), "{out}");
        assert!(out.contains("DHCPACK of 10.1.1.11 from 10.1.1.1"), "{out}");
        assert!(out.contains("bound to 10.1.1.11"), "{out}");

        // Interface configured, gateway installed, client BOUND.
        let pid = world.port_id(h1, "eth0").unwrap();
        let (addr, mask) = world.port(pid).unwrap().ipv4.unwrap();
        assert_eq!(addr, ip("10.1.1.11"));
        assert_eq!(mask.prefix_len(), 24);
        let host = world.device(h1).unwrap().as_host().unwrap();
        assert!(host
            .routes
            .iter()
            .any(|r| r.next_hop == Some(ip("10.1.1.1"))));
        assert_eq!(
            host.dhcp_clients.get("eth0").unwrap().state(),
            DhcpClientState::Bound
        );

        // The server holds exactly one binding, for H1's MAC.
        let h1_hex = world.port(pid).unwrap().mac.to_plain_hex();
        let server = world
            .device(r1)
            .unwrap()
            .as_host()
            .unwrap()
            .dhcp_server
            .as_ref()
            .unwrap();
        let bindings: Vec<_> = server.bindings().collect();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].client_id, h1_hex);
        assert_eq!(bindings[0].ip, ip("10.1.1.11"));

        // The default gateway answers pings through the leased address.
        let report = world.ping(h1, ip("10.1.1.1"), 1, None).unwrap();
        assert_eq!(report.received(), 1);
    }

    #[test]
    fn test_dhcp_renewal_keeps_binding() {
        let mut world = World::new();
        let r1 = world.add_router("R1", 1);
        let h1 = world.add_host("H1");
        world
            .connect_ifaces(CableKind::Cat5e, h1, "eth0", r1, "eth0", 5.0)
            .unwrap();
        cfg_iface(&mut world, r1, "eth0", "10.1.1.1", 24);
        {
            let server = world.dhcp_server_mut(r1).unwrap();
            let pool = server.pool_mut("LAN");
            pool.network = Some(ip("10.1.1.0"));
            pool.mask = Some("/24".parse().unwrap());
            pool.lease_secs = 1000;
        }
        world.dhclient(h1, "eth0", DhclientOptions::default()).unwrap();
        let state = |w: &World| w.device(h1).unwrap().as_host().unwrap().dhcp_clients["eth0"].state();
        assert_eq!(state(&world), DhcpClientState::Bound);

        // T1 at 500s: the client renews and returns to BOUND.
        world.tick_secs(501);
        assert_eq!(state(&world), DhcpClientState::Bound);
        let client = &world.device(h1).unwrap().as_host().unwrap().dhcp_clients["eth0"];
        assert!(client.lease.as_ref().unwrap().obtained_ms >= 500_000, "lease window moved");
    }

    #[test]
    fn test_dhcp_expiry_clears_interface() {
        let mut world = World::new();
        let r1 = world.add_router("R1", 1);
        let h1 = world.add_host("H1");
        let cable = world
            .connect_ifaces(CableKind::Cat5e, h1, "eth0", r1, "eth0", 5.0)
            .unwrap();
        cfg_iface(&mut world, r1, "eth0", "10.1.1.1", 24);
        {
            let server = world.dhcp_server_mut(r1).unwrap();
            let pool = server.pool_mut("LAN");
            pool.network = Some(ip("10.1.1.0"));
            pool.mask = Some("/24".parse().unwrap());
            pool.lease_secs = 1000;
        }
        world.dhclient(h1, "eth0", DhclientOptions::default()).unwrap();

        // Server vanishes; renewal and rebinding both go unanswered.
        world.disconnect(cable).unwrap();
        world.tick_secs(1001);

        let host = world.device(h1).unwrap().as_host().unwrap();
        let client = &host.dhcp_clients["eth0"];
        assert_eq!(client.state(), DhcpClientState::Init);
        assert!(!client.running);
        assert!(client.lease.is_none());
        let pid = world.port_id(h1, "eth0").unwrap();
        assert!(world.port(pid).unwrap().ipv4.is_none(), "address released on expiry");
    }

    #[test]
    fn test_dhcp_fallback_self_assignment() {
        let mut world = World::new();
        let h1 = world.add_host("H1");
        // No server anywhere; non-verbose mode self-assigns from the MAC.
        let out = world.dhclient(h1, "eth0", DhclientOptions::default()).unwrap();
        assert!(out.contains("self-assigned 169.254."), "{out}");
        let pid = world.port_id(h1, "eth0").unwrap();
        let (addr, mask) = world.port(pid).unwrap().ipv4.unwrap();
        assert_eq!(addr.octets()[0], 169);
        assert_eq!(addr.octets()[1], 254);
        assert_eq!(mask.prefix_len(), 16);
    }

    #[test]
    fn test_dhcp_verbose_no_offers_stays_unconfigured() {
        let mut world = World::new();
        let h1 = world.add_host("H1");
        let out = world
            .dhclient(
                h1,
                "eth0",
                DhclientOptions {
                    verbose: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(out.contains("No DHCPOFFERS received."), "{out}");
        let pid = world.port_id(h1, "eth0").unwrap();
        assert!(world.port(pid).unwrap().ipv4.is_none());
    }

    #[test]
    fn test_registry_lookup_and_clear() {
        let (mut world, sw, h1, _) = lan();
        assert_eq!(world.find_by_name("SW1"), Some(sw));
        assert_eq!(world.find_by_name("nope"), None);
        let (dev, _) = world.find_by_ipv4(&ip("192.168.1.10")).unwrap();
        assert_eq!(dev, h1);

        world.clear();
        assert!(world.find_by_name("SW1").is_none());
        assert!(world.find_by_ipv4(&ip("192.168.1.10")).is_none());
    }

    #[test]
    fn test_remove_device_disconnects_cables() {
        let (mut world, sw, h1, _) = lan();
        let h1_pid = world.port_id(h1, "eth0").unwrap();
        assert!(world.port(h1_pid).unwrap().cable.is_some());
        world.remove_device(sw).unwrap();
        assert!(world.port(h1_pid).unwrap().cable.is_none(), "link-down on peer");
        assert!(world.device(sw).is_err());
    }

    #[test]
    fn test_power_off_stops_frames_and_aging() {
        let (mut world, sw, h1, _) = lan();
        world.ping(h1, ip("192.168.1.20"), 1, None).unwrap();
        world.power_off(sw).unwrap();

        // Frames die at the powered-off switch.
        let report = world.ping(h1, ip("192.168.1.30"), 1, None).unwrap();
        assert_eq!(report.received(), 0);

        // Aging no longer runs: the table survives far past the horizon.
        world.tick_secs(crate::config::MAC_AGING_SECS * 2);
        assert_eq!(
            world.device(sw).unwrap().as_switch().unwrap().mac_table.len(),
            2,
            "no sweeps while powered off"
        );
    }

    #[test]
    fn test_set_port_up_is_idempotent_on_events() {
        let (mut world, _, h1, _) = lan();
        let pid = world.port_id(h1, "eth0").unwrap();
        let before = world.bus.len();
        world.set_port_up(pid, true).unwrap();
        assert_eq!(world.bus.len(), before, "no event without a state change");
        world.set_port_up(pid, false).unwrap();
        assert_eq!(world.bus.len(), before + 1);
    }

    #[test]
    fn test_same_seed_replays_identically() {
        let run = |seed: u64| {
            let mut world = World::with_seed(seed);
            let sw = world.add_switch("SW1", SwitchVendor::Cisco, 8);
            let h1 = world.add_host("H1");
            let h2 = world.add_host("H2");
            world
                .connect_ifaces(CableKind::Cat5e, h1, "eth0", sw, "FastEthernet0/1", 5.0)
                .unwrap();
            let cable = world
                .connect_ifaces(CableKind::Cat5e, h2, "eth0", sw, "FastEthernet0/2", 5.0)
                .unwrap();
            cfg_iface(&mut world, h1, "eth0", "192.168.1.10", 24);
            cfg_iface(&mut world, h2, "eth0", "192.168.1.20", 24);
            world
                .cables
                .get_mut(&cable)
                .unwrap()
                .set_packet_loss_rate(0.5)
                .unwrap();
            let report = world.ping(h1, ip("192.168.1.20"), 10, None).unwrap();
            report
                .probes
                .iter()
                .map(|p| p.success())
                .collect::<Vec<bool>>()
        };
        assert_eq!(run(7), run(7), "loss draws replay under the same seed");
    }
}

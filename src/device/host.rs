//! The end-host L3 stack: ARP cache and resolution, the routing table with
//! longest-prefix-match, ICMP echo, ping, and traceroute.

use std::collections::HashMap;

use crate::addr::{Ipv4Address, MacAddr, SubnetMask};
use crate::config;
use crate::device::{DeviceId, World};
use crate::dhcp::{DhcpClient, DhcpServer};
use crate::error::NetError;
use crate::logger::LogLevel;
use crate::proto::{
    ArpOp, ArpPacket, EthernetFrame, IcmpPacket, IcmpType, Icmpv6Packet, Icmpv6Type, IpPayload,
    Ipv4Packet, Ipv6Packet, NdpPayload, Payload, DHCP_CLIENT_PORT, DHCP_SERVER_PORT,
};
use crate::wire::PortId;

/// One resolved neighbor.
#[derive(Debug, Clone, Copy)]
pub struct ArpEntry {
    pub mac: MacAddr,
    pub iface: PortId,
    pub learned_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Connected,
    Static,
    Default,
}

/// One routing-table entry.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub kind: RouteKind,
    pub network: Ipv4Address,
    pub mask: SubnetMask,
    pub next_hop: Option<Ipv4Address>,
    pub iface: PortId,
    pub metric: u32,
}

impl RouteEntry {
    pub fn matches(&self, dst: &Ipv4Address) -> bool {
        dst.network(&self.mask) == self.network
    }
}

/// How one echo probe ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EchoOutcome {
    Reply {
        from: Ipv4Address,
        ttl: u8,
    },
    TimeExceeded {
        from: Ipv4Address,
    },
    Unreachable {
        from: Ipv4Address,
    },
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingEcho {
    pub sent_at_ms: u64,
    pub outcome: Option<EchoOutcome>,
}

/// One probe of a ping run. `outcome == None` is a timeout (no reply, ARP
/// failure included).
#[derive(Debug, Clone, Copy)]
pub struct PingProbe {
    pub sequence: u16,
    pub outcome: Option<EchoOutcome>,
    pub rtt_ms: f64,
}

impl PingProbe {
    pub fn success(&self) -> bool {
        matches!(self.outcome, Some(EchoOutcome::Reply { .. }))
    }
}

/// The result of a ping run.
#[derive(Debug, Clone)]
pub struct PingReport {
    pub destination: Ipv4Address,
    pub probes: Vec<PingProbe>,
}

impl PingReport {
    pub fn transmitted(&self) -> usize {
        self.probes.len()
    }

    pub fn received(&self) -> usize {
        self.probes.iter().filter(|p| p.success()).count()
    }

    pub fn loss_pct(&self) -> f64 {
        if self.probes.is_empty() {
            return 0.0;
        }
        100.0 * (self.transmitted() - self.received()) as f64 / self.transmitted() as f64
    }
}

/// One traceroute hop. `from == None` means the probe vanished.
#[derive(Debug, Clone, Copy)]
pub struct TracerouteHop {
    pub ttl: u8,
    pub from: Option<Ipv4Address>,
    pub rtt_ms: f64,
    pub reached: bool,
}

/// Per-host L3 state. Routers are hosts with `forwarding` set.
#[derive(Debug, Default)]
pub struct HostState {
    pub arp_cache: HashMap<Ipv4Address, ArpEntry>,
    pub routes: Vec<RouteEntry>,
    pub forwarding: bool,
    pub dhcp_server: Option<DhcpServer>,
    pub dhcp_clients: HashMap<String, DhcpClient>,
    pub dns_servers: Vec<Ipv4Address>,
    pub domain_name: Option<String>,
    pub(crate) next_echo_id: u16,
    pub(crate) pending: HashMap<(u16, u16), PendingEcho>,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    /// DRAM loss: neighbor and probe state evaporates; interface addressing
    /// and routes are reinstalled by whoever configures the box.
    pub fn reset_volatile(&mut self) {
        self.arp_cache.clear();
        self.pending.clear();
        self.dhcp_clients.clear();
    }

    /// Longest-prefix-match: among matching entries prefer the widest mask,
    /// then the lowest metric, then insertion order.
    pub fn lookup_route(&self, dst: &Ipv4Address) -> Option<&RouteEntry> {
        let mut best: Option<&RouteEntry> = None;
        for entry in self.routes.iter().filter(|e| e.matches(dst)) {
            best = match best {
                None => Some(entry),
                Some(current) => {
                    let (cp, cm) = (current.mask.prefix_len(), current.metric);
                    let (np, nm) = (entry.mask.prefix_len(), entry.metric);
                    if np > cp || (np == cp && nm < cm) {
                        Some(entry)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        best
    }

    /// The connected route whose subnet contains `ip`, if any.
    pub fn connected_route_for(&self, ip: &Ipv4Address) -> Option<&RouteEntry> {
        self.routes
            .iter()
            .find(|e| e.kind == RouteKind::Connected && e.matches(ip))
    }

    /// Install (or replace) the connected route for an interface.
    pub fn set_connected_route(&mut self, iface: PortId, ip: Ipv4Address, mask: SubnetMask) {
        self.routes
            .retain(|e| !(e.kind == RouteKind::Connected && e.iface == iface));
        self.routes.push(RouteEntry {
            kind: RouteKind::Connected,
            network: ip.network(&mask),
            mask,
            next_hop: None,
            iface,
            metric: 0,
        });
    }

    pub fn remove_connected_route(&mut self, iface: PortId) {
        self.routes
            .retain(|e| !(e.kind == RouteKind::Connected && e.iface == iface));
    }

    /// Add a static route. The next hop must sit in a connected subnet.
    pub fn add_static_route(
        &mut self,
        network: Ipv4Address,
        mask: SubnetMask,
        next_hop: Ipv4Address,
        metric: u32,
    ) -> Result<(), NetError> {
        let via = self
            .connected_route_for(&next_hop)
            .map(|e| e.iface)
            .ok_or_else(|| NetError::Configuration("Network is unreachable".to_string()))?;
        let kind = if network.is_unspecified() && mask.prefix_len() == 0 {
            RouteKind::Default
        } else {
            RouteKind::Static
        };
        self.routes.push(RouteEntry {
            kind,
            network: network.network(&mask),
            mask,
            next_hop: Some(next_hop),
            iface: via,
            metric,
        });
        Ok(())
    }

    pub fn add_default_route(&mut self, gateway: Ipv4Address, metric: u32) -> Result<(), NetError> {
        self.add_static_route(
            Ipv4Address::UNSPECIFIED,
            SubnetMask::from_prefix_len(0).expect("/0 is valid"),
            gateway,
            metric,
        )
    }

    /// Remove static/default routes matching (network, mask). Returns how
    /// many entries went away.
    pub fn remove_route(&mut self, network: Ipv4Address, mask: SubnetMask) -> usize {
        let before = self.routes.len();
        self.routes.retain(|e| {
            e.kind == RouteKind::Connected || !(e.network == network && e.mask == mask)
        });
        before - self.routes.len()
    }

    pub fn remove_default_route(&mut self) -> usize {
        let before = self.routes.len();
        self.routes.retain(|e| e.kind != RouteKind::Default);
        before - self.routes.len()
    }

    pub(crate) fn allocate_echo_id(&mut self) -> u16 {
        self.next_echo_id = self.next_echo_id.wrapping_add(1);
        self.next_echo_id
    }
}

impl World {
    // ---- interface configuration --------------------------------------

    /// Set an interface's IPv4 address and install the connected route.
    pub fn configure_interface(
        &mut self,
        device: DeviceId,
        iface: &str,
        ip: Ipv4Address,
        mask: SubnetMask,
    ) -> Result<(), NetError> {
        let pid = self.port_id(device, iface)?;
        self.port_mut(pid)?.configure_ip(ip, mask);
        if let Some(host) = self.device_mut(device)?.as_host_mut() {
            host.set_connected_route(pid, ip, mask);
        }
        let name = self.device_name(device);
        self.log(
            LogLevel::Info,
            &name,
            "port.ip-config",
            format!("{iface} configured {ip}/{}", mask.prefix_len()),
        );
        Ok(())
    }

    /// Drop an interface's addressing and its connected route.
    pub fn clear_interface(&mut self, device: DeviceId, iface: &str) -> Result<(), NetError> {
        let pid = self.port_id(device, iface)?;
        self.port_mut(pid)?.clear_ip();
        if let Some(host) = self.device_mut(device)?.as_host_mut() {
            host.remove_connected_route(pid);
        }
        Ok(())
    }

    pub fn add_static_route(
        &mut self,
        device: DeviceId,
        network: Ipv4Address,
        mask: SubnetMask,
        next_hop: Ipv4Address,
        metric: u32,
    ) -> Result<(), NetError> {
        let host = self
            .device_mut(device)?
            .as_host_mut()
            .ok_or_else(|| NetError::Configuration("device has no routing table".to_string()))?;
        host.add_static_route(network, mask, next_hop, metric)
    }

    pub fn add_default_route(
        &mut self,
        device: DeviceId,
        gateway: Ipv4Address,
        metric: u32,
    ) -> Result<(), NetError> {
        let host = self
            .device_mut(device)?
            .as_host_mut()
            .ok_or_else(|| NetError::Configuration("device has no routing table".to_string()))?;
        host.add_default_route(gateway, metric)
    }

    // ---- ARP -----------------------------------------------------------

    /// Resolve `target` to a MAC via `via`. Cache hit short-circuits; a
    /// miss broadcasts a request and, delivery being synchronous, either
    /// the reply has landed by the time the send unwinds or it never will.
    pub fn arp_resolve(
        &mut self,
        device: DeviceId,
        target: Ipv4Address,
        via: PortId,
    ) -> Result<MacAddr, NetError> {
        if let Some(entry) = self
            .device(device)?
            .as_host()
            .and_then(|h| h.arp_cache.get(&target))
        {
            return Ok(entry.mac);
        }

        let (my_ip, my_mac) = {
            let port = self.port(via)?;
            let (ip, _) = port.ipv4.ok_or_else(|| {
                NetError::Configuration(format!("{} has no IPv4 address", port.name))
            })?;
            (ip, port.mac)
        };

        let request = EthernetFrame::new(
            my_mac,
            MacAddr::BROADCAST,
            Payload::Arp(ArpPacket::request(my_mac, my_ip, target)),
        );
        self.port_send(via, request);

        self.device(device)?
            .as_host()
            .and_then(|h| h.arp_cache.get(&target))
            .map(|e| e.mac)
            .ok_or_else(|| NetError::Protocol(format!("ARP timeout resolving {target}")))
    }

    // ---- routed send ---------------------------------------------------

    /// Route, ARP, frame, transmit. The one path every locally originated
    /// IPv4 packet takes.
    pub fn send_ipv4(&mut self, device: DeviceId, packet: Ipv4Packet) -> Result<(), NetError> {
        let dst = packet.destination;
        let route = {
            let host = self
                .device(device)?
                .as_host()
                .ok_or_else(|| NetError::Configuration("device has no IP stack".to_string()))?;
            host.lookup_route(&dst)
                .cloned()
                .ok_or_else(|| NetError::Configuration("Network is unreachable".to_string()))?
        };
        let target = match route.kind {
            RouteKind::Connected => dst,
            RouteKind::Static | RouteKind::Default => route
                .next_hop
                .ok_or_else(|| NetError::Configuration("route has no next hop".to_string()))?,
        };
        let mac = self.arp_resolve(device, target, route.iface)?;
        let src_mac = self.port(route.iface)?.mac;
        let frame = EthernetFrame::new(src_mac, mac, Payload::Ipv4(packet));
        self.port_send(route.iface, frame);
        Ok(())
    }

    // ---- frame handling ------------------------------------------------

    pub(crate) fn host_handle_frame(
        &mut self,
        device: DeviceId,
        ingress: PortId,
        frame: EthernetFrame,
    ) {
        let Some(port) = self.ports.get(&ingress) else {
            return;
        };
        // NIC filter: mine, broadcast, or IPv6 multicast.
        if frame.dst != port.mac && !frame.dst.is_broadcast() && !frame.dst.is_ipv6_multicast() {
            return;
        }
        match frame.payload.clone() {
            Payload::Arp(arp) => self.host_handle_arp(device, ingress, arp),
            Payload::Ipv4(pkt) => self.host_handle_ipv4(device, ingress, pkt),
            Payload::Ipv6(pkt) => self.host_handle_ipv6(device, ingress, &frame, pkt),
        }
    }

    fn host_handle_arp(&mut self, device: DeviceId, ingress: PortId, arp: ArpPacket) {
        let now = self.clock.now_ms();
        match arp.op {
            ArpOp::Request => {
                // Find the interface that owns the asked-for address.
                let owned = self
                    .device(device)
                    .ok()
                    .and_then(|d| {
                        d.ports.values().find(|pid| {
                            self.ports
                                .get(pid)
                                .map(|p| p.has_ipv4(&arp.target_ip))
                                .unwrap_or(false)
                        })
                    })
                    .copied();
                let Some(owning_pid) = owned else {
                    return;
                };
                let my_mac = self.ports[&owning_pid].mac;
                if let Some(host) = self
                    .devices
                    .get_mut(&device)
                    .and_then(|d| d.as_host_mut())
                {
                    host.arp_cache.insert(
                        arp.sender_ip,
                        ArpEntry {
                            mac: arp.sender_mac,
                            iface: ingress,
                            learned_at_ms: now,
                        },
                    );
                }
                let reply = EthernetFrame::new(
                    my_mac,
                    arp.sender_mac,
                    Payload::Arp(ArpPacket::reply(
                        my_mac,
                        arp.target_ip,
                        arp.sender_mac,
                        arp.sender_ip,
                    )),
                );
                self.port_send(ingress, reply);
            }
            ArpOp::Reply => {
                if let Some(host) = self
                    .devices
                    .get_mut(&device)
                    .and_then(|d| d.as_host_mut())
                {
                    host.arp_cache.insert(
                        arp.sender_ip,
                        ArpEntry {
                            mac: arp.sender_mac,
                            iface: ingress,
                            learned_at_ms: now,
                        },
                    );
                }
            }
        }
    }

    fn host_handle_ipv4(&mut self, device: DeviceId, ingress: PortId, pkt: Ipv4Packet) {
        let local = {
            let dev = match self.device(device) {
                Ok(d) => d,
                Err(_) => return,
            };
            let owned = dev.ports.values().any(|pid| {
                self.ports
                    .get(pid)
                    .map(|p| p.has_ipv4(&pkt.destination))
                    .unwrap_or(false)
            });
            let broadcast = pkt.destination.is_limited_broadcast()
                || self
                    .ports
                    .get(&ingress)
                    .and_then(|p| p.ipv4)
                    .map(|(ip, mask)| {
                        pkt.destination.is_directed_broadcast(&mask)
                            && ip.same_subnet(&pkt.destination, &mask)
                    })
                    .unwrap_or(false);
            owned || broadcast
        };

        if !local {
            let forwarding = self
                .device(device)
                .ok()
                .and_then(|d| d.as_host())
                .map(|h| h.forwarding)
                .unwrap_or(false);
            if forwarding {
                self.forward_ipv4(device, pkt);
            }
            return;
        }

        match pkt.payload.clone() {
            IpPayload::Icmp(icmp) => self.host_handle_icmp(device, ingress, &pkt, icmp),
            IpPayload::Udp(udp) => {
                if udp.dst_port == DHCP_SERVER_PORT {
                    if let crate::proto::UdpData::Dhcp(msg) = udp.payload {
                        self.dhcp_server_handle(device, ingress, msg);
                    }
                } else if udp.dst_port == DHCP_CLIENT_PORT {
                    if let crate::proto::UdpData::Dhcp(msg) = udp.payload {
                        self.dhcp_client_handle(device, ingress, msg);
                    }
                }
            }
            IpPayload::Icmpv6(_) | IpPayload::Raw(_) => {}
        }
    }

    fn host_handle_icmp(
        &mut self,
        device: DeviceId,
        ingress: PortId,
        pkt: &Ipv4Packet,
        icmp: IcmpPacket,
    ) {
        match icmp.icmp_type {
            IcmpType::EchoRequest => {
                // Reply from the targeted address (or the ingress interface
                // address when the request was broadcast).
                let src_ip = if self
                    .ports
                    .values()
                    .any(|p| p.owner == device && p.has_ipv4(&pkt.destination))
                {
                    pkt.destination
                } else {
                    match self.ports.get(&ingress).and_then(|p| p.ipv4) {
                        Some((ip, _)) => ip,
                        None => return,
                    }
                };
                let reply = Ipv4Packet::new(
                    src_ip,
                    pkt.source,
                    config::DEFAULT_TTL,
                    IpPayload::Icmp(IcmpPacket::echo_reply(&icmp)),
                );
                if let Err(err) = self.send_ipv4(device, reply) {
                    let name = self.device_name(device);
                    self.log(
                        LogLevel::Warn,
                        &name,
                        "icmp.reply-failed",
                        format!("echo reply to {} failed: {err}", pkt.source),
                    );
                }
            }
            IcmpType::EchoReply => {
                self.record_echo_outcome(
                    device,
                    icmp.id,
                    icmp.sequence,
                    EchoOutcome::Reply {
                        from: pkt.source,
                        ttl: pkt.ttl,
                    },
                );
            }
            IcmpType::TimeExceeded => {
                self.record_echo_outcome(
                    device,
                    icmp.id,
                    icmp.sequence,
                    EchoOutcome::TimeExceeded { from: pkt.source },
                );
            }
            IcmpType::DestinationUnreachable => {
                self.record_echo_outcome(
                    device,
                    icmp.id,
                    icmp.sequence,
                    EchoOutcome::Unreachable { from: pkt.source },
                );
            }
        }
    }

    fn record_echo_outcome(&mut self, device: DeviceId, id: u16, seq: u16, outcome: EchoOutcome) {
        if let Some(host) = self.devices.get_mut(&device).and_then(|d| d.as_host_mut()) {
            if let Some(pending) = host.pending.get_mut(&(id, seq)) {
                pending.outcome = Some(outcome);
            }
        }
    }

    fn host_handle_ipv6(
        &mut self,
        device: DeviceId,
        ingress: PortId,
        frame: &EthernetFrame,
        pkt: Ipv6Packet,
    ) {
        let IpPayload::Icmpv6(icmp) = pkt.payload.clone() else {
            return;
        };
        match icmp.icmp_type {
            Icmpv6Type::NeighborSolicitation => {
                let Some(NdpPayload::NeighborSolicit { target }) = icmp.ndp.clone() else {
                    return;
                };
                let owns = self
                    .ports
                    .get(&ingress)
                    .map(|p| p.ipv6.iter().any(|b| b.addr.same_address(&target)))
                    .unwrap_or(false);
                if !owns {
                    return;
                }
                let (my_mac, is_router) = {
                    let mac = self.ports[&ingress].mac;
                    let router = self
                        .device(device)
                        .ok()
                        .and_then(|d| d.as_host())
                        .map(|h| h.forwarding)
                        .unwrap_or(false);
                    (mac, router)
                };
                let na = Icmpv6Packet::neighbor_advertisement(target.clone(), true, is_router);
                let reply = EthernetFrame::new(
                    my_mac,
                    frame.src,
                    Payload::Ipv6(Ipv6Packet::new(
                        target,
                        pkt.source.clone(),
                        255,
                        IpPayload::Icmpv6(na),
                    )),
                );
                self.port_send(ingress, reply);
            }
            Icmpv6Type::EchoRequest => {
                let mine = self
                    .ports
                    .get(&ingress)
                    .map(|p| p.ipv6.iter().any(|b| b.addr.same_address(&pkt.destination)))
                    .unwrap_or(false);
                if !mine {
                    return;
                }
                let my_mac = self.ports[&ingress].mac;
                let reply = EthernetFrame::new(
                    my_mac,
                    frame.src,
                    Payload::Ipv6(Ipv6Packet::new(
                        pkt.destination.clone(),
                        pkt.source.clone(),
                        64,
                        IpPayload::Icmpv6(Icmpv6Packet::echo_reply(&icmp)),
                    )),
                );
                self.port_send(ingress, reply);
            }
            _ => {}
        }
    }

    // ---- ping / traceroute ---------------------------------------------

    /// One echo probe: route, resolve, send, harvest the synchronous
    /// outcome. `None` is a timeout.
    fn send_echo_probe(
        &mut self,
        device: DeviceId,
        dst: Ipv4Address,
        id: u16,
        seq: u16,
        ttl: u8,
    ) -> Result<(Option<EchoOutcome>, f64), NetError> {
        let route = {
            let host = self
                .device(device)?
                .as_host()
                .ok_or_else(|| NetError::Configuration("device has no IP stack".to_string()))?;
            host.lookup_route(&dst)
                .cloned()
                .ok_or_else(|| NetError::Configuration("Network is unreachable".to_string()))?
        };
        let target = match route.kind {
            RouteKind::Connected => dst,
            _ => route
                .next_hop
                .ok_or_else(|| NetError::Configuration("route has no next hop".to_string()))?,
        };

        let sent_at = self.clock.now_ms();
        let mac = match self.arp_resolve(device, target, route.iface) {
            Ok(mac) => mac,
            Err(_) => return Ok((None, 0.0)),
        };

        let (src_ip, src_mac) = {
            let port = self.port(route.iface)?;
            let (ip, _) = port.ipv4.ok_or_else(|| {
                NetError::Configuration(format!("{} has no IPv4 address", port.name))
            })?;
            (ip, port.mac)
        };

        if let Some(host) = self.devices.get_mut(&device).and_then(|d| d.as_host_mut()) {
            host.pending.insert(
                (id, seq),
                PendingEcho {
                    sent_at_ms: sent_at,
                    outcome: None,
                },
            );
        }

        let echo = Ipv4Packet::new(
            src_ip,
            dst,
            ttl,
            IpPayload::Icmp(IcmpPacket::echo_request(id, seq, 56)),
        );
        let frame = EthernetFrame::new(src_mac, mac, Payload::Ipv4(echo));
        self.port_send(route.iface, frame);

        let now = self.clock.now_ms();
        let outcome = self
            .devices
            .get_mut(&device)
            .and_then(|d| d.as_host_mut())
            .and_then(|h| h.pending.remove(&(id, seq)))
            .and_then(|p| p.outcome);
        Ok((outcome, (now - sent_at) as f64))
    }

    /// Send `count` echo probes to `dst`.
    pub fn ping(
        &mut self,
        device: DeviceId,
        dst: Ipv4Address,
        count: u32,
        ttl: Option<u8>,
    ) -> Result<PingReport, NetError> {
        let ttl = ttl.unwrap_or(config::DEFAULT_TTL);
        let id = self
            .device_mut(device)?
            .as_host_mut()
            .ok_or_else(|| NetError::Configuration("device has no IP stack".to_string()))?
            .allocate_echo_id();

        let mut probes = Vec::with_capacity(count as usize);
        for seq in 0..count as u16 {
            let (outcome, rtt_ms) = self.send_echo_probe(device, dst, id, seq, ttl)?;
            probes.push(PingProbe {
                sequence: seq,
                outcome,
                rtt_ms,
            });
        }

        let name = self.device_name(device);
        let report = PingReport {
            destination: dst,
            probes,
        };
        self.log(
            LogLevel::Info,
            &name,
            "icmp.ping-done",
            format!(
                "ping {dst}: {}/{} replies ({:.0}% loss)",
                report.received(),
                report.transmitted(),
                report.loss_pct()
            ),
        );
        Ok(report)
    }

    /// Probe with TTL 1, 2, ... until the destination answers or the hop
    /// cap is hit. An empty result means the first hop was silent.
    pub fn traceroute(
        &mut self,
        device: DeviceId,
        dst: Ipv4Address,
    ) -> Result<Vec<TracerouteHop>, NetError> {
        let id = self
            .device_mut(device)?
            .as_host_mut()
            .ok_or_else(|| NetError::Configuration("device has no IP stack".to_string()))?
            .allocate_echo_id();

        let mut hops = Vec::new();
        for ttl in 1..=config::TRACEROUTE_MAX_HOPS {
            let (outcome, rtt_ms) = self.send_echo_probe(device, dst, id, u16::from(ttl), ttl)?;
            match outcome {
                Some(EchoOutcome::TimeExceeded { from }) => {
                    hops.push(TracerouteHop {
                        ttl,
                        from: Some(from),
                        rtt_ms,
                        reached: false,
                    });
                }
                Some(EchoOutcome::Reply { from, .. }) => {
                    hops.push(TracerouteHop {
                        ttl,
                        from: Some(from),
                        rtt_ms,
                        reached: true,
                    });
                    break;
                }
                Some(EchoOutcome::Unreachable { from }) => {
                    hops.push(TracerouteHop {
                        ttl,
                        from: Some(from),
                        rtt_ms,
                        reached: false,
                    });
                    break;
                }
                None => {
                    if hops.is_empty() {
                        // First hop silent: report nothing at all.
                        return Ok(hops);
                    }
                    hops.push(TracerouteHop {
                        ttl,
                        from: None,
                        rtt_ms,
                        reached: false,
                    });
                }
            }
        }
        Ok(hops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> Ipv4Address {
        s.parse().unwrap()
    }

    fn mask(s: &str) -> SubnetMask {
        s.parse().unwrap()
    }

    fn host_with_connected() -> HostState {
        let mut host = HostState::new();
        host.set_connected_route(PortId(1), ip("192.168.1.10"), mask("/24"));
        host.set_connected_route(PortId(2), ip("10.0.0.1"), mask("/8"));
        host
    }

    #[test]
    fn test_connected_route_replaced_per_iface() {
        let mut host = HostState::new();
        host.set_connected_route(PortId(1), ip("192.168.1.10"), mask("/24"));
        host.set_connected_route(PortId(1), ip("172.16.0.1"), mask("/16"));
        let connected: Vec<_> = host
            .routes
            .iter()
            .filter(|e| e.kind == RouteKind::Connected)
            .collect();
        assert_eq!(connected.len(), 1, "reconfigure replaces, not appends");
        assert_eq!(connected[0].network, ip("172.16.0.0"));
    }

    #[test]
    fn test_lookup_prefers_longest_prefix() {
        let mut host = host_with_connected();
        host.add_static_route(ip("10.1.0.0"), mask("/16"), ip("10.0.0.254"), 1)
            .unwrap();
        // /16 beats /8 for 10.1.x.x
        let entry = host.lookup_route(&ip("10.1.2.3")).unwrap();
        assert_eq!(entry.mask.prefix_len(), 16);
        // Plain 10.x traffic still uses the connected /8.
        let entry = host.lookup_route(&ip("10.200.0.1")).unwrap();
        assert_eq!(entry.kind, RouteKind::Connected);
    }

    #[test]
    fn test_lookup_ties_break_by_metric() {
        let mut host = host_with_connected();
        host.add_static_route(ip("172.20.0.0"), mask("/16"), ip("10.0.0.254"), 20)
            .unwrap();
        host.add_static_route(ip("172.20.0.0"), mask("/16"), ip("192.168.1.254"), 5)
            .unwrap();
        let entry = host.lookup_route(&ip("172.20.9.9")).unwrap();
        assert_eq!(entry.metric, 5);
        assert_eq!(entry.next_hop, Some(ip("192.168.1.254")));
    }

    #[test]
    fn test_lookup_falls_back_to_default() {
        let mut host = host_with_connected();
        host.add_default_route(ip("192.168.1.1"), 0).unwrap();
        let entry = host.lookup_route(&ip("8.8.8.8")).unwrap();
        assert_eq!(entry.kind, RouteKind::Default);
        assert!(host.lookup_route(&ip("8.8.8.8")).is_some());
    }

    #[test]
    fn test_no_route_yields_none() {
        let host = host_with_connected();
        assert!(host.lookup_route(&ip("8.8.8.8")).is_none());
    }

    #[test]
    fn test_static_route_requires_reachable_next_hop() {
        let mut host = host_with_connected();
        let err = host
            .add_static_route(ip("172.16.0.0"), mask("/16"), ip("203.0.113.1"), 1)
            .unwrap_err();
        assert_eq!(err.to_string(), "Network is unreachable");
    }

    #[test]
    fn test_default_route_detected_by_zero_network() {
        let mut host = host_with_connected();
        host.add_static_route(ip("0.0.0.0"), mask("/0"), ip("192.168.1.1"), 0)
            .unwrap();
        assert!(host.routes.iter().any(|e| e.kind == RouteKind::Default));
    }

    #[test]
    fn test_remove_route_spares_connected() {
        let mut host = host_with_connected();
        host.add_static_route(ip("172.16.0.0"), mask("/16"), ip("10.0.0.254"), 1)
            .unwrap();
        assert_eq!(host.remove_route(ip("172.16.0.0"), mask("/16")), 1);
        assert_eq!(
            host.remove_route(ip("192.168.1.0"), mask("/24")),
            0,
            "connected routes are not deletable this way"
        );
    }

    #[test]
    fn test_ping_report_loss_accounting() {
        let report = PingReport {
            destination: ip("10.0.0.9"),
            probes: vec![
                PingProbe {
                    sequence: 0,
                    outcome: Some(EchoOutcome::Reply {
                        from: ip("10.0.0.9"),
                        ttl: 64,
                    }),
                    rtt_ms: 0.0,
                },
                PingProbe {
                    sequence: 1,
                    outcome: None,
                    rtt_ms: 0.0,
                },
            ],
        };
        assert_eq!(report.transmitted(), 2);
        assert_eq!(report.received(), 1);
        assert!((report.loss_pct() - 50.0).abs() < f64::EPSILON);
    }
}

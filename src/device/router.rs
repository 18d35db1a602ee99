//! The router forwarding plane: TTL handling, ICMP error synthesis, and
//! the route-then-resolve transmit path. Runs only on hosts whose
//! `forwarding` flag is set.

use crate::config;
use crate::device::{DeviceId, RouteKind, World};
use crate::logger::LogLevel;
use crate::proto::{EthernetFrame, IcmpPacket, IpPayload, Ipv4Packet, Payload};

impl World {
    /// Forward a transit packet: TTL decrement first, then the route
    /// lookup. TTL death and missing routes turn into ICMP errors sent
    /// back toward the source.
    pub(crate) fn forward_ipv4(&mut self, device: DeviceId, mut pkt: Ipv4Packet) {
        let name = self.device_name(device);

        if pkt.ttl <= 1 {
            let (id, seq) = probe_identity(&pkt);
            self.log(
                LogLevel::Info,
                &name,
                "icmp.time-exceeded",
                format!("TTL expired for {} -> {}", pkt.source, pkt.destination),
            );
            self.send_icmp_error(device, pkt.source, IcmpPacket::time_exceeded(id, seq));
            return;
        }
        pkt.ttl -= 1;
        pkt.refresh_checksum();

        let route = self
            .device(device)
            .ok()
            .and_then(|d| d.as_host())
            .and_then(|h| h.lookup_route(&pkt.destination))
            .cloned();
        let Some(route) = route else {
            let (id, seq) = probe_identity(&pkt);
            self.log(
                LogLevel::Info,
                &name,
                "icmp.dest-unreachable",
                format!("no route to {} (from {})", pkt.destination, pkt.source),
            );
            self.send_icmp_error(
                device,
                pkt.source,
                IcmpPacket::destination_unreachable(0, id, seq),
            );
            return;
        };

        let target = match route.kind {
            RouteKind::Connected => pkt.destination,
            _ => match route.next_hop {
                Some(hop) => hop,
                None => return,
            },
        };

        let mac = match self.arp_resolve(device, target, route.iface) {
            Ok(mac) => mac,
            Err(err) => {
                self.log(
                    LogLevel::Warn,
                    &name,
                    "router.forward-drop",
                    format!("cannot resolve {target}: {err}"),
                );
                return;
            }
        };
        let src_mac = match self.port(route.iface) {
            Ok(port) => port.mac,
            Err(_) => return,
        };
        let frame = EthernetFrame::new(src_mac, mac, Payload::Ipv4(pkt));
        self.port_send(route.iface, frame);
    }

    /// Route an ICMP error back toward `dst`, sourced from the interface
    /// the return route leaves by.
    fn send_icmp_error(&mut self, device: DeviceId, dst: crate::addr::Ipv4Address, icmp: IcmpPacket) {
        let src_ip = {
            let Some(host) = self.device(device).ok().and_then(|d| d.as_host()) else {
                return;
            };
            let Some(route) = host.lookup_route(&dst) else {
                return;
            };
            match self.ports.get(&route.iface).and_then(|p| p.ipv4) {
                Some((ip, _)) => ip,
                None => return,
            }
        };
        let pkt = Ipv4Packet::new(src_ip, dst, config::DEFAULT_TTL, IpPayload::Icmp(icmp));
        if let Err(err) = self.send_ipv4(device, pkt) {
            let name = self.device_name(device);
            self.log(
                LogLevel::Warn,
                &name,
                "icmp.error-send-failed",
                format!("ICMP error to {dst} failed: {err}"),
            );
        }
    }
}

/// Pull the (id, sequence) of a dying echo so the originator can match the
/// error to its probe.
fn probe_identity(pkt: &Ipv4Packet) -> (u16, u16) {
    match &pkt.payload {
        IpPayload::Icmp(icmp) => (icmp.id, icmp.sequence),
        _ => (0, 0),
    }
}

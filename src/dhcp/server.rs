//! The DHCP server: address pools, excluded ranges, deny patterns, the
//! binding database, and the frame-level DORA responder.

use std::collections::BTreeMap;

use crate::addr::{Ipv4Address, MacAddr, SubnetMask};
use crate::config;
use crate::device::{DeviceId, World};
use crate::error::NetError;
use crate::logger::LogLevel;
use crate::proto::{
    DhcpMessage, DhcpMessageType, DhcpOptions, EthernetFrame, IpPayload, Ipv4Packet, Payload,
    UdpData, UdpPacket, DHCP_CLIENT_PORT, DHCP_SERVER_PORT,
};
use crate::wire::PortId;

/// One address pool. A pool with no network/mask configured is skipped by
/// the allocator.
#[derive(Debug, Clone)]
pub struct DhcpPool {
    pub name: String,
    pub network: Option<Ipv4Address>,
    pub mask: Option<SubnetMask>,
    pub default_router: Option<Ipv4Address>,
    pub dns_servers: Vec<Ipv4Address>,
    pub domain_name: Option<String>,
    pub lease_secs: u64,
    /// Glob patterns matched against the client-id encodings; a match
    /// makes this pool refuse the client.
    pub deny_patterns: Vec<String>,
}

impl DhcpPool {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            network: None,
            mask: None,
            default_router: None,
            dns_servers: Vec::new(),
            domain_name: None,
            lease_secs: config::DHCP_DEFAULT_LEASE_SECS,
            deny_patterns: Vec::new(),
        }
    }

    fn options(&self) -> DhcpOptions {
        DhcpOptions {
            subnet_mask: self.mask,
            router: self.default_router,
            dns_servers: self.dns_servers.clone(),
            domain_name: self.domain_name.clone(),
            lease_secs: Some(self.lease_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Automatic,
    Manual,
}

/// One leased address.
#[derive(Debug, Clone)]
pub struct DhcpBinding {
    pub ip: Ipv4Address,
    pub client_id: String,
    pub lease_start_ms: u64,
    pub lease_expiry_ms: u64,
    pub pool: String,
    pub kind: BindingKind,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DhcpServerStats {
    pub discovers: u64,
    pub offers: u64,
    pub requests: u64,
    pub acks: u64,
    pub naks: u64,
    pub releases: u64,
}

/// What the allocator decided to hand a client.
#[derive(Debug, Clone)]
pub struct OfferDecision {
    pub ip: Ipv4Address,
    pub pool: String,
    pub options: DhcpOptions,
}

/// The server state carried by a router/host.
#[derive(Debug, Default)]
pub struct DhcpServer {
    pools: BTreeMap<String, DhcpPool>,
    excluded: Vec<(Ipv4Address, Ipv4Address)>,
    /// Bindings keyed by leased address.
    bindings: BTreeMap<u32, DhcpBinding>,
    pub stats: DhcpServerStats,
}

impl DhcpServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create a pool, vendor style (`ip dhcp pool NAME`).
    pub fn pool_mut(&mut self, name: &str) -> &mut DhcpPool {
        self.pools
            .entry(name.to_string())
            .or_insert_with(|| DhcpPool::new(name))
    }

    pub fn pool(&self, name: &str) -> Option<&DhcpPool> {
        self.pools.get(name)
    }

    pub fn remove_pool(&mut self, name: &str) -> bool {
        self.pools.remove(name).is_some()
    }

    /// Exclude `[lo, hi]` from allocation.
    pub fn exclude_range(&mut self, lo: Ipv4Address, hi: Ipv4Address) -> Result<(), NetError> {
        if lo.to_u32() > hi.to_u32() {
            return Err(NetError::Validation(format!(
                "excluded range {lo} - {hi} is inverted"
            )));
        }
        self.excluded.push((lo, hi));
        Ok(())
    }

    pub fn is_excluded(&self, ip: &Ipv4Address) -> bool {
        let v = ip.to_u32();
        self.excluded
            .iter()
            .any(|(lo, hi)| (lo.to_u32()..=hi.to_u32()).contains(&v))
    }

    pub fn bindings(&self) -> impl Iterator<Item = &DhcpBinding> {
        self.bindings.values()
    }

    pub fn binding_for(&self, ip: &Ipv4Address) -> Option<&DhcpBinding> {
        self.bindings.get(&ip.to_u32())
    }

    /// The four client-id encodings a deny pattern is tried against:
    /// raw hex, `01`-prefixed hex, and both in dotted-quad-hex form.
    pub fn client_id_forms(mac: &MacAddr) -> [String; 4] {
        let raw = mac.to_plain_hex();
        let prefixed = format!("01{raw}");
        [dotted_hex(&raw), dotted_hex(&prefixed), raw, prefixed]
    }

    fn deny_matches(pool: &DhcpPool, mac: &MacAddr) -> bool {
        let forms = Self::client_id_forms(mac);
        pool.deny_patterns
            .iter()
            .any(|pat| forms.iter().any(|form| glob_match(pat, form)))
    }

    fn client_binding(&self, pool: &str, client_id: &str) -> Option<&DhcpBinding> {
        self.bindings
            .values()
            .find(|b| b.pool == pool && b.client_id == client_id)
    }

    /// First free host address of the pool's subnet: network and broadcast
    /// are skipped, as are excluded ranges and bound addresses.
    fn first_free_ip(&self, pool: &DhcpPool) -> Option<Ipv4Address> {
        let (network, mask) = (pool.network?, pool.mask?);
        let base = network.network(&mask).to_u32();
        let size = mask.subnet_size();
        if size < 3 {
            return None;
        }
        for offset in 1..size - 1 {
            let candidate = Ipv4Address::from_u32(base + offset as u32);
            if self.is_excluded(&candidate) {
                continue;
            }
            if self.bindings.contains_key(&candidate.to_u32()) {
                continue;
            }
            return Some(candidate);
        }
        None
    }

    /// DISCOVER: pick the address this client would get. Does not commit.
    pub fn select_offer(&mut self, client: &MacAddr) -> Option<OfferDecision> {
        self.stats.discovers += 1;
        let client_id = client.to_plain_hex();
        for pool in self.pools.values() {
            if pool.network.is_none() || pool.mask.is_none() {
                continue;
            }
            if Self::deny_matches(pool, client) {
                continue;
            }
            if let Some(existing) = self.client_binding(&pool.name, &client_id) {
                return Some(OfferDecision {
                    ip: existing.ip,
                    pool: pool.name.clone(),
                    options: pool.options(),
                });
            }
            if let Some(ip) = self.first_free_ip(pool) {
                return Some(OfferDecision {
                    ip,
                    pool: pool.name.clone(),
                    options: pool.options(),
                });
            }
        }
        None
    }

    /// REQUEST: allocate or renew the binding. `Err` means NAK.
    pub fn commit_request(
        &mut self,
        client: &MacAddr,
        requested: Ipv4Address,
        now_ms: u64,
    ) -> Result<OfferDecision, NetError> {
        self.stats.requests += 1;
        let client_id = client.to_plain_hex();

        let pool = self
            .pools
            .values()
            .find(|p| match (p.network, p.mask) {
                (Some(net), Some(mask)) => requested.same_subnet(&net, &mask),
                _ => false,
            })
            .cloned()
            .ok_or_else(|| NetError::Protocol(format!("no pool covers {requested}")))?;

        if Self::deny_matches(&pool, client) {
            return Err(NetError::Policy(format!("client {client} denied by pool {}", pool.name)));
        }
        if self.is_excluded(&requested) {
            return Err(NetError::Protocol(format!("{requested} is excluded")));
        }
        if let Some(existing) = self.bindings.get(&requested.to_u32()) {
            if existing.client_id != client_id {
                return Err(NetError::Protocol(format!("{requested} is bound elsewhere")));
            }
        }

        self.bindings.insert(
            requested.to_u32(),
            DhcpBinding {
                ip: requested,
                client_id,
                lease_start_ms: now_ms,
                lease_expiry_ms: now_ms + pool.lease_secs * 1000,
                pool: pool.name.clone(),
                kind: BindingKind::Automatic,
            },
        );
        self.stats.acks += 1;
        Ok(OfferDecision {
            ip: requested,
            pool: pool.name.clone(),
            options: pool.options(),
        })
    }

    /// RELEASE: forget the binding if it belongs to this client.
    pub fn release(&mut self, client: &MacAddr, ip: &Ipv4Address) {
        let client_id = client.to_plain_hex();
        if let Some(binding) = self.bindings.get(&ip.to_u32()) {
            if binding.client_id == client_id {
                self.bindings.remove(&ip.to_u32());
                self.stats.releases += 1;
            }
        }
    }
}

/// Insert a dot every four hex chars: `001a2b3c4d5e` -> `001a.2b3c.4d5e`.
fn dotted_hex(hex: &str) -> String {
    hex.as_bytes()
        .chunks(4)
        .map(|c| std::str::from_utf8(c).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(".")
}

/// Minimal glob: `*` matches any run, `?` any single character.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => inner(&p[1..], t) || (!t.is_empty() && inner(p, &t[1..])),
            (Some(b'?'), Some(_)) => inner(&p[1..], &t[1..]),
            (Some(pc), Some(tc)) if pc == tc => inner(&p[1..], &t[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

impl World {
    /// Frame-level server entry: called for UDP 67 arriving at a device
    /// that carries a `DhcpServer`.
    pub(crate) fn dhcp_server_handle(
        &mut self,
        device: DeviceId,
        ingress: PortId,
        msg: DhcpMessage,
    ) {
        let Some((my_ip, _)) = self.ports.get(&ingress).and_then(|p| p.ipv4) else {
            return; // cannot serve on an unnumbered interface
        };
        let name = self.device_name(device);
        let now = self.clock.now_ms();

        // A client that pinned a server (`dhclient -s`) is ignored by the
        // others.
        if let Some(selected) = msg.server_id {
            if selected != my_ip {
                return;
            }
        }

        let (reply, log_line) = {
            let Some(server) = self
                .devices
                .get_mut(&device)
                .and_then(|d| d.as_host_mut())
                .and_then(|h| h.dhcp_server.as_mut())
            else {
                return;
            };
            match msg.message_type {
                DhcpMessageType::Discover => match server.select_offer(&msg.client_mac) {
                    Some(decision) => {
                        server.stats.offers += 1;
                        let line = (
                            LogLevel::Info,
                            "dhcp.server.offer",
                            format!("offering {} to {}", decision.ip, msg.client_mac),
                        );
                        (build_reply(&msg, my_ip, decision, DhcpMessageType::Offer), line)
                    }
                    None => {
                        // Nothing to offer: stay silent per RFC 2131.
                        return;
                    }
                },
                DhcpMessageType::Request => {
                    let Some(requested) = msg.requested_ip else {
                        return;
                    };
                    match server.commit_request(&msg.client_mac, requested, now) {
                        Ok(decision) => {
                            let line = (
                                LogLevel::Info,
                                "dhcp.server.ack",
                                format!("ACK {} to {}", decision.ip, msg.client_mac),
                            );
                            (build_reply(&msg, my_ip, decision, DhcpMessageType::Ack), line)
                        }
                        Err(err) => {
                            server.stats.naks += 1;
                            let line = (
                                LogLevel::Warn,
                                "dhcp.server.nak",
                                format!("NAK for {} ({err})", msg.client_mac),
                            );
                            let nak = DhcpMessage {
                                message_type: DhcpMessageType::Nak,
                                xid: msg.xid,
                                client_mac: msg.client_mac,
                                your_ip: None,
                                requested_ip: None,
                                server_id: Some(my_ip),
                                options: DhcpOptions::default(),
                            };
                            (nak, line)
                        }
                    }
                }
                DhcpMessageType::Release => {
                    if let Some(ip) = msg.requested_ip {
                        server.release(&msg.client_mac, &ip);
                        let client = msg.client_mac;
                        self.log(
                            LogLevel::Info,
                            &name,
                            "dhcp.server.release",
                            format!("{client} released {ip}"),
                        );
                    }
                    return;
                }
                _ => return,
            }
        };
        self.log(log_line.0, &name, log_line.1, log_line.2);

        // Replies go back out the ingress interface: Ethernet-unicast to
        // the client MAC, IPv4 limited broadcast (the client may not own
        // an address yet).
        let my_mac = self.ports[&ingress].mac;
        let udp = UdpPacket::new(DHCP_SERVER_PORT, DHCP_CLIENT_PORT, UdpData::Dhcp(reply));
        let pkt = Ipv4Packet::new(
            my_ip,
            Ipv4Address::BROADCAST,
            config::DEFAULT_TTL,
            IpPayload::Udp(udp),
        );
        let frame = EthernetFrame::new(my_mac, msg.client_mac, Payload::Ipv4(pkt));
        self.port_send(ingress, frame);
    }
}

/// Build an OFFER/ACK mirroring the client's xid with the decision's
/// address and options.
fn build_reply(
    msg: &DhcpMessage,
    server_ip: Ipv4Address,
    decision: OfferDecision,
    kind: DhcpMessageType,
) -> DhcpMessage {
    DhcpMessage {
        message_type: kind,
        xid: msg.xid,
        client_mac: msg.client_mac,
        your_ip: Some(decision.ip),
        requested_ip: None,
        server_id: Some(server_ip),
        options: decision.options,
    }
}

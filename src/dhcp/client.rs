//! The per-interface DHCP client state machine:
//! INIT -> SELECTING -> REQUESTING -> BOUND -> RENEWING -> REBINDING.
//!
//! Delivery being synchronous, OFFER/ACK/NAK have already landed in the
//! client state by the time a send call unwinds; T1/T2/expiry ride the
//! world's timer wheel.

use crate::addr::{Ipv4Address, SubnetMask};
use crate::config;
use crate::device::world::TimerKind;
use crate::device::{DeviceId, World};
use crate::dhcp::DhcpServer;
use crate::error::NetError;
use crate::logger::LogLevel;
use crate::proto::{
    DhcpMessage, DhcpMessageType, EthernetFrame, IpPayload, Ipv4Packet, Payload, UdpData,
    UdpPacket, DHCP_CLIENT_PORT, DHCP_SERVER_PORT,
};
use crate::wire::PortId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpClientState {
    Init,
    Selecting,
    Requesting,
    Bound,
    Renewing,
    Rebinding,
}

impl DhcpClientState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DhcpClientState::Init => "INIT",
            DhcpClientState::Selecting => "SELECTING",
            DhcpClientState::Requesting => "REQUESTING",
            DhcpClientState::Bound => "BOUND",
            DhcpClientState::Renewing => "RENEWING",
            DhcpClientState::Rebinding => "REBINDING",
        }
    }
}

/// The configuration an ACK put on the interface.
#[derive(Debug, Clone)]
pub struct DhcpLease {
    pub ip: Ipv4Address,
    pub mask: SubnetMask,
    pub gateway: Option<Ipv4Address>,
    pub dns_servers: Vec<Ipv4Address>,
    pub domain_name: Option<String>,
    pub server: Ipv4Address,
    pub lease_secs: u64,
    pub obtained_ms: u64,
}

/// Per-interface client state.
#[derive(Debug)]
pub struct DhcpClient {
    pub state: DhcpClientState,
    pub xid: u32,
    pub lease: Option<DhcpLease>,
    pub running: bool,
    pub verbose: bool,
    /// dhclient-style trace lines for the current run.
    pub log: Vec<String>,
    pub target_server: Option<Ipv4Address>,
    pub(crate) offers: Vec<DhcpMessage>,
    pub(crate) ack: Option<DhcpMessage>,
    pub(crate) nak: bool,
}

impl Default for DhcpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DhcpClient {
    pub fn new() -> Self {
        Self {
            state: DhcpClientState::Init,
            xid: 0,
            lease: None,
            running: false,
            verbose: false,
            log: Vec::new(),
            target_server: None,
            offers: Vec::new(),
            ack: None,
            nak: false,
        }
    }

    pub fn state(&self) -> DhcpClientState {
        self.state
    }

    fn reset_for_run(&mut self, xid: u32, verbose: bool, target: Option<Ipv4Address>) {
        self.state = DhcpClientState::Init;
        self.xid = xid;
        self.running = true;
        self.verbose = verbose;
        self.target_server = target;
        self.log.clear();
        self.offers.clear();
        self.ack = None;
        self.nak = false;
    }
}

/// Parsed `dhclient` flags.
#[derive(Debug, Clone, Default)]
pub struct DhclientOptions {
    /// `-v`: verbose trace; also the strict mode that reports
    /// "No DHCPOFFERS received" instead of self-assigning.
    pub verbose: bool,
    /// `-d`: stay in foreground; implies verbose output.
    pub foreground: bool,
    /// `-r`: release the current lease and exit.
    pub release: bool,
    /// `-x`: stop the running client without releasing.
    pub stop: bool,
    /// `-s <server>`: only talk to this server.
    pub server: Option<Ipv4Address>,
    /// `-t <secs>`: give up after the timeout instead of self-assigning.
    pub timeout_secs: Option<u64>,
    /// `-w`: keep waiting for a link; accepted, no behavioral difference
    /// under synchronous delivery.
    pub wait: bool,
}

impl World {
    /// Convenience: the DHCP server state of a device, created on first use.
    pub fn dhcp_server_mut(&mut self, device: DeviceId) -> Result<&mut DhcpServer, NetError> {
        let host = self
            .device_mut(device)?
            .as_host_mut()
            .ok_or_else(|| NetError::Configuration("device has no IP stack".to_string()))?;
        Ok(host.dhcp_server.get_or_insert_with(DhcpServer::new))
    }

    fn with_client<R>(
        &mut self,
        device: DeviceId,
        iface: &str,
        f: impl FnOnce(&mut DhcpClient) -> R,
    ) -> Option<R> {
        self.devices
            .get_mut(&device)
            .and_then(|d| d.as_host_mut())
            .and_then(|h| h.dhcp_clients.get_mut(iface))
            .map(f)
    }

    /// Run the acquisition flow on one interface (`dhclient [flags] IFACE`).
    pub fn dhclient(
        &mut self,
        device: DeviceId,
        iface: &str,
        opts: DhclientOptions,
    ) -> Result<String, NetError> {
        if opts.release {
            return self.dhcp_release(device, iface);
        }
        if opts.stop {
            return self.dhcp_stop(device, iface);
        }

        let pid = self.port_id(device, iface)?;
        let mac = self.port(pid)?.mac;
        let verbose = opts.verbose || opts.foreground;
        let xid = self.rng.next_u32();

        {
            let host = self
                .device_mut(device)?
                .as_host_mut()
                .ok_or_else(|| NetError::Configuration("device has no IP stack".to_string()))?;
            let client = host
                .dhcp_clients
                .entry(iface.to_string())
                .or_insert_with(DhcpClient::new);
            client.reset_for_run(xid, verbose, opts.server);
        }
        self.cancel_dhcp_timers(device, iface);
        let name = self.device_name(device);

        // DISCOVER -> SELECTING.
        self.with_client(device, iface, |c| {
            c.state = DhcpClientState::Selecting;
            c.log
                .push(format!("DHCPDISCOVER on {iface} to 255.255.255.255 port 67"));
        });
        self.log(
            LogLevel::Info,
            &name,
            "dhcp.client.discover",
            format!("{iface}: DISCOVER (xid {xid:#010x})"),
        );
        let mut discover = DhcpMessage::discover(xid, mac);
        discover.server_id = opts.server;
        self.send_dhcp_broadcast(pid, discover);

        // Harvest: the first OFFER wins.
        let offer = self
            .with_client(device, iface, |c| c.offers.first().cloned())
            .flatten();
        let Some(offer) = offer else {
            return self.dhcp_no_offers(device, iface, pid, &opts);
        };
        let your_ip = offer
            .your_ip
            .ok_or_else(|| NetError::Protocol("OFFER carried no address".to_string()))?;
        let server_ip = offer
            .server_id
            .ok_or_else(|| NetError::Protocol("OFFER carried no server id".to_string()))?;
        self.with_client(device, iface, |c| {
            c.log.push(format!("DHCPOFFER of {your_ip} from {server_ip}"));
        });

        // REQUEST -> REQUESTING.
        self.with_client(device, iface, |c| {
            c.state = DhcpClientState::Requesting;
            c.log.push(format!(
                "DHCPREQUEST for {your_ip} on {iface} to 255.255.255.255 port 67"
            ));
            c.ack = None;
            c.nak = false;
        });
        let request = DhcpMessage::request(xid, mac, your_ip, Some(server_ip));
        self.send_dhcp_broadcast(pid, request);

        let nak = self.with_client(device, iface, |c| c.nak).unwrap_or(false);
        if nak {
            self.with_client(device, iface, |c| {
                c.state = DhcpClientState::Init;
                c.running = false;
                c.log.push(format!("DHCPNAK from {server_ip}"));
            });
            self.log(
                LogLevel::Warn,
                &name,
                "dhcp.client.nak",
                format!("{iface}: NAK from {server_ip}"),
            );
            return Ok(self.client_output(device, iface, verbose));
        }
        let ack = self.with_client(device, iface, |c| c.ack.clone()).flatten();
        let Some(ack) = ack else {
            self.with_client(device, iface, |c| {
                c.state = DhcpClientState::Init;
                c.running = false;
                c.log.push("no DHCPACK received".to_string());
            });
            return Ok(self.client_output(device, iface, verbose));
        };

        // ACK -> BOUND: apply the configuration.
        let mask = ack
            .options
            .subnet_mask
            .unwrap_or_else(|| SubnetMask::from_prefix_len(24).expect("/24 is valid"));
        let lease_secs = ack.options.lease_secs.unwrap_or(config::DHCP_DEFAULT_LEASE_SECS);
        self.configure_interface(device, iface, your_ip, mask)?;
        if let Some(gw) = ack.options.router {
            if let Some(host) = self.device_mut(device)?.as_host_mut() {
                host.remove_default_route();
                let _ = host.add_default_route(gw, 0);
            }
        }
        if let Some(host) = self.device_mut(device)?.as_host_mut() {
            host.dns_servers = ack.options.dns_servers.clone();
            host.domain_name = ack.options.domain_name.clone();
        }

        let now = self.clock.now_ms();
        let t1_secs = (lease_secs as f64 * config::DHCP_T1_FRACTION) as u64;
        self.with_client(device, iface, |c| {
            c.state = DhcpClientState::Bound;
            c.lease = Some(DhcpLease {
                ip: your_ip,
                mask,
                gateway: ack.options.router,
                dns_servers: ack.options.dns_servers.clone(),
                domain_name: ack.options.domain_name.clone(),
                server: server_ip,
                lease_secs,
                obtained_ms: now,
            });
            c.log.push(format!("DHCPACK of {your_ip} from {server_ip}"));
            c.log
                .push(format!("bound to {your_ip} -- renewal in {t1_secs} seconds."));
        });
        self.arm_dhcp_timers(device, iface, lease_secs);
        self.log(
            LogLevel::Info,
            &name,
            "dhcp.client.bound",
            format!("{iface}: bound to {your_ip}/{} via {server_ip}", mask.prefix_len()),
        );
        Ok(self.client_output(device, iface, verbose))
    }

    /// No OFFER came back. Strict mode reports it; convenience mode
    /// self-assigns a deterministic link-local style address off the MAC.
    fn dhcp_no_offers(
        &mut self,
        device: DeviceId,
        iface: &str,
        pid: PortId,
        opts: &DhclientOptions,
    ) -> Result<String, NetError> {
        let name = self.device_name(device);
        let verbose = opts.verbose || opts.foreground;
        if verbose || opts.timeout_secs.is_some() {
            self.with_client(device, iface, |c| {
                c.state = DhcpClientState::Init;
                c.running = false;
                c.log.push("No DHCPOFFERS received.".to_string());
            });
            self.log(
                LogLevel::Warn,
                &name,
                "dhcp.client.no-offers",
                format!("{iface}: no DHCPOFFERS received"),
            );
            return Ok(self.client_output(device, iface, true));
        }

        let mac = self.port(pid)?.mac.octets();
        let third = mac[4].clamp(1, 254);
        let fourth = mac[5].clamp(1, 254);
        let ip = Ipv4Address::from_octets([169, 254, third, fourth]);
        let mask = SubnetMask::from_prefix_len(16).expect("/16 is valid");
        self.configure_interface(device, iface, ip, mask)?;
        self.with_client(device, iface, |c| {
            c.state = DhcpClientState::Init;
            c.running = false;
            c.log.push(format!("self-assigned {ip}/16 on {iface}"));
        });
        self.log(
            LogLevel::Info,
            &name,
            "dhcp.client.self-assigned",
            format!("{iface}: self-assigned {ip}"),
        );
        Ok(self.client_output(device, iface, false))
    }

    fn client_output(&mut self, device: DeviceId, iface: &str, verbose: bool) -> String {
        self.with_client(device, iface, |c| {
            if verbose {
                c.log.join("\n")
            } else {
                c.log.last().cloned().unwrap_or_default()
            }
        })
        .unwrap_or_default()
    }

    /// Broadcast a client message out one port (src 0.0.0.0 when the
    /// interface is unnumbered).
    fn send_dhcp_broadcast(&mut self, pid: PortId, msg: DhcpMessage) {
        let Ok(port) = self.port(pid) else {
            return;
        };
        let src_ip = port.ipv4.map(|(ip, _)| ip).unwrap_or(Ipv4Address::UNSPECIFIED);
        let src_mac = port.mac;
        let udp = UdpPacket::new(DHCP_CLIENT_PORT, DHCP_SERVER_PORT, UdpData::Dhcp(msg));
        let pkt = Ipv4Packet::new(
            src_ip,
            Ipv4Address::BROADCAST,
            config::DEFAULT_TTL,
            IpPayload::Udp(udp),
        );
        let frame = EthernetFrame::new(
            src_mac,
            crate::addr::MacAddr::BROADCAST,
            Payload::Ipv4(pkt),
        );
        self.port_send(pid, frame);
    }

    /// Unicast a client message to the bound server through the routed path.
    fn send_dhcp_unicast(&mut self, device: DeviceId, server: Ipv4Address, msg: DhcpMessage) {
        let udp = UdpPacket::new(DHCP_CLIENT_PORT, DHCP_SERVER_PORT, UdpData::Dhcp(msg));
        // Source address comes from the routed path.
        let src = self
            .device(device)
            .ok()
            .and_then(|d| d.as_host())
            .and_then(|h| h.lookup_route(&server))
            .and_then(|r| self.ports.get(&r.iface))
            .and_then(|p| p.ipv4)
            .map(|(ip, _)| ip);
        let Some(src) = src else {
            return;
        };
        let pkt = Ipv4Packet::new(src, server, config::DEFAULT_TTL, IpPayload::Udp(udp));
        if let Err(err) = self.send_ipv4(device, pkt) {
            let name = self.device_name(device);
            self.log(
                LogLevel::Warn,
                &name,
                "dhcp.client.send-failed",
                format!("unicast to {server} failed: {err}"),
            );
        }
    }

    /// Frame-level client entry: UDP 68 arriving on a port.
    pub(crate) fn dhcp_client_handle(&mut self, device: DeviceId, ingress: PortId, msg: DhcpMessage) {
        let (iface, my_mac) = {
            let Some(port) = self.ports.get(&ingress) else {
                return;
            };
            (port.name.clone(), port.mac)
        };
        if msg.client_mac != my_mac {
            return;
        }
        self.with_client(device, &iface, |c| {
            if c.xid != msg.xid {
                return;
            }
            match msg.message_type {
                DhcpMessageType::Offer => c.offers.push(msg),
                DhcpMessageType::Ack => c.ack = Some(msg),
                DhcpMessageType::Nak => c.nak = true,
                _ => {}
            }
        });
    }

    // ---- timers --------------------------------------------------------

    fn arm_dhcp_timers(&mut self, device: DeviceId, iface: &str, lease_secs: u64) {
        self.cancel_dhcp_timers(device, iface);
        let now = self.clock.now_ms();
        let t1_ms = (lease_secs as f64 * config::DHCP_T1_FRACTION * 1000.0) as u64;
        let t2_ms = (lease_secs as f64 * config::DHCP_T2_FRACTION * 1000.0) as u64;
        let expiry_ms = lease_secs * 1000;
        self.timers.schedule_in(
            now,
            t1_ms,
            TimerKind::DhcpT1 {
                device,
                iface: iface.to_string(),
            },
        );
        self.timers.schedule_in(
            now,
            t2_ms,
            TimerKind::DhcpT2 {
                device,
                iface: iface.to_string(),
            },
        );
        self.timers.schedule_in(
            now,
            expiry_ms,
            TimerKind::DhcpExpiry {
                device,
                iface: iface.to_string(),
            },
        );
    }

    fn cancel_dhcp_timers(&mut self, device: DeviceId, iface: &str) {
        self.timers.cancel_matching(|k| match k {
            TimerKind::DhcpT1 { device: d, iface: i }
            | TimerKind::DhcpT2 { device: d, iface: i }
            | TimerKind::DhcpExpiry { device: d, iface: i } => *d == device && i == iface,
            _ => false,
        });
    }

    /// T1 (50% of the lease): BOUND -> RENEWING, unicast REQUEST to the
    /// originating server. An ACK returns the client to BOUND.
    pub(crate) fn dhcp_timer_t1(&mut self, device: DeviceId, iface: &str) {
        let lease = self
            .with_client(device, iface, |c| {
                if c.state() == DhcpClientState::Bound {
                    c.state = DhcpClientState::Renewing;
                    c.ack = None;
                    c.nak = false;
                    c.lease.clone()
                } else {
                    None
                }
            })
            .flatten();
        let Some(lease) = lease else {
            return;
        };
        let name = self.device_name(device);
        self.log(
            LogLevel::Info,
            &name,
            "dhcp.client.renewing",
            format!("{iface}: renewing {} with {}", lease.ip, lease.server),
        );

        let mac = match self.port_id(device, iface).and_then(|p| self.port(p)) {
            Ok(port) => port.mac,
            Err(_) => return,
        };
        let xid = self.with_client(device, iface, |c| c.xid).unwrap_or_default();
        let request = DhcpMessage::request(xid, mac, lease.ip, Some(lease.server));
        self.send_dhcp_unicast(device, lease.server, request);

        self.finish_renewal(device, iface);
    }

    /// T2 (87.5%): RENEWING -> REBINDING, broadcast REQUEST for any server.
    pub(crate) fn dhcp_timer_t2(&mut self, device: DeviceId, iface: &str) {
        let lease = self
            .with_client(device, iface, |c| {
                if c.state() == DhcpClientState::Renewing {
                    c.state = DhcpClientState::Rebinding;
                    c.ack = None;
                    c.nak = false;
                    c.lease.clone()
                } else {
                    None
                }
            })
            .flatten();
        let Some(lease) = lease else {
            return;
        };
        let name = self.device_name(device);
        self.log(
            LogLevel::Info,
            &name,
            "dhcp.client.rebinding",
            format!("{iface}: rebinding {}", lease.ip),
        );

        let Ok(pid) = self.port_id(device, iface) else {
            return;
        };
        let mac = self.ports[&pid].mac;
        let xid = self.with_client(device, iface, |c| c.xid).unwrap_or_default();
        let request = DhcpMessage::request(xid, mac, lease.ip, None);
        self.send_dhcp_broadcast(pid, request);

        self.finish_renewal(device, iface);
    }

    /// Shared tail of T1/T2: if an ACK landed, go back to BOUND with fresh
    /// timers.
    fn finish_renewal(&mut self, device: DeviceId, iface: &str) {
        let acked = self
            .with_client(device, iface, |c| c.ack.take())
            .flatten();
        let Some(ack) = acked else {
            return;
        };
        let lease_secs = ack
            .options
            .lease_secs
            .unwrap_or(config::DHCP_DEFAULT_LEASE_SECS);
        let now = self.clock.now_ms();
        self.with_client(device, iface, |c| {
            c.state = DhcpClientState::Bound;
            if let Some(lease) = c.lease.as_mut() {
                lease.lease_secs = lease_secs;
                lease.obtained_ms = now;
            }
        });
        self.arm_dhcp_timers(device, iface, lease_secs);
        let name = self.device_name(device);
        self.log(
            LogLevel::Info,
            &name,
            "dhcp.client.renewed",
            format!("{iface}: lease renewed for {lease_secs} seconds"),
        );
    }

    /// Lease ran out: back to INIT, interface deconfigured, process dead.
    pub(crate) fn dhcp_timer_expiry(&mut self, device: DeviceId, iface: &str) {
        let lease = self
            .with_client(device, iface, |c| {
                let lease = c.lease.take();
                c.state = DhcpClientState::Init;
                c.running = false;
                lease
            })
            .flatten();
        let Some(lease) = lease else {
            return;
        };
        self.cancel_dhcp_timers(device, iface);
        let _ = self.clear_interface(device, iface);
        if let Ok(dev) = self.device_mut(device) {
            if let Some(host) = dev.as_host_mut() {
                host.remove_default_route();
            }
        }
        let name = self.device_name(device);
        self.log(
            LogLevel::Warn,
            &name,
            "dhcp.client.expired",
            format!("{iface}: lease on {} expired", lease.ip),
        );
    }

    // ---- release / stop ------------------------------------------------

    /// `dhclient -r`: tell the server, tear everything down, back to INIT.
    pub fn dhcp_release(&mut self, device: DeviceId, iface: &str) -> Result<String, NetError> {
        let lease = self
            .with_client(device, iface, |c| c.lease.clone())
            .flatten();
        let Some(lease) = lease else {
            return Ok(format!("dhclient: no lease on {iface}"));
        };

        let pid = self.port_id(device, iface)?;
        let mac = self.port(pid)?.mac;
        let xid = self.with_client(device, iface, |c| c.xid).unwrap_or_default();
        let release = DhcpMessage::release(xid, mac, lease.ip, lease.server);
        self.send_dhcp_unicast(device, lease.server, release);

        self.cancel_dhcp_timers(device, iface);
        self.with_client(device, iface, |c| {
            c.lease = None;
            c.state = DhcpClientState::Init;
            c.running = false;
        });
        self.clear_interface(device, iface)?;
        if let Some(host) = self.device_mut(device)?.as_host_mut() {
            host.remove_default_route();
        }
        let name = self.device_name(device);
        self.log(
            LogLevel::Info,
            &name,
            "dhcp.client.released",
            format!("{iface}: released {}", lease.ip),
        );
        Ok(format!("Released lease on {iface} ({})", lease.ip))
    }

    /// `dhclient -x`: stop timers and mark not-running; the server is not
    /// told and the interface keeps its address.
    pub fn dhcp_stop(&mut self, device: DeviceId, iface: &str) -> Result<String, NetError> {
        self.cancel_dhcp_timers(device, iface);
        let was_running = self
            .with_client(device, iface, |c| {
                let was = c.running;
                c.running = false;
                was
            })
            .unwrap_or(false);
        Ok(if was_running {
            format!("Stopped DHCP client on {iface}")
        } else {
            format!("dhclient: no process on {iface}")
        })
    }
}

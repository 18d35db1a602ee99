//! The end-host shell: Unix-flavored `ifconfig`, `ip`, `ping`, `arp`,
//! `traceroute`, and `dhclient` front-ends over the L3 stack. Drives hosts
//! and routers alike (a router is a host with forwarding on).

use crate::addr::{Ipv4Address, SubnetMask};
use crate::cli::{apply_filters, split_pipeline, CommandTrie, Resolution};
use crate::device::{DeviceId, EchoOutcome, RouteKind, World};
use crate::dhcp::DhclientOptions;
use crate::error::NetError;

pub struct HostCtx<'a> {
    pub world: &'a mut World,
    pub device: DeviceId,
}

pub struct HostShell {
    pub device: DeviceId,
}

impl HostShell {
    pub fn new(device: DeviceId) -> Self {
        Self { device }
    }

    pub fn prompt(&self, world: &World) -> String {
        let hostname = world
            .device(self.device)
            .map(|d| d.hostname.clone())
            .unwrap_or_else(|_| "host".to_string());
        format!("{hostname}$ ")
    }

    pub fn exec(&mut self, world: &mut World, line: &str) -> String {
        let line = line.trim();
        if line.is_empty() {
            return String::new();
        }
        let (base, filters) = split_pipeline(line);
        let tokens: Vec<String> = base.split_whitespace().map(str::to_string).collect();
        if tokens.is_empty() {
            return String::new();
        }

        let trie = build_trie();
        match trie.resolve(&tokens) {
            Resolution::Match { handler, args } => {
                let mut ctx = HostCtx {
                    world,
                    device: self.device,
                };
                match handler(&mut ctx, &args) {
                    Ok(output) => apply_filters(&output, &filters),
                    Err(err) => err.to_string(),
                }
            }
            Resolution::Ambiguous { candidates } => {
                format!("{}: ambiguous command ({})", tokens[0], candidates.join(", "))
            }
            Resolution::Incomplete { continuations } => {
                format!("{}: missing operand ({})", tokens[0], continuations.join(", "))
            }
            Resolution::Invalid { position } => {
                format!("{}: command not found", tokens[position.min(tokens.len() - 1)])
            }
        }
    }
}

fn build_trie<'a>() -> CommandTrie<HostCtx<'a>> {
    let mut t = CommandTrie::new();
    t.register_greedy("ifconfig", "Configure a network interface", h_ifconfig);
    t.register("ip addr", "Show interface addresses", h_ip_addr);
    t.register_greedy("ip route", "Show or edit the routing table", h_ip_route);
    t.register("ip neigh", "Show the neighbor (ARP) table", h_ip_neigh);
    t.register_greedy("ping", "Send ICMP echo requests", h_ping);
    t.register_greedy("arp", "Show the ARP cache", h_arp);
    t.register_greedy("traceroute", "Trace the route to a host", h_traceroute);
    t.register_greedy("dhclient", "Dynamic host configuration client", h_dhclient);
    t.register_greedy("hostname", "Show or set the system hostname", h_hostname);
    t
}

/// A destination argument: dotted address, or an equipment name looked up
/// in the registry.
fn resolve_destination(world: &World, raw: &str) -> Result<Ipv4Address, NetError> {
    if let Ok(ip) = raw.parse::<Ipv4Address>() {
        return Ok(ip);
    }
    let device = world
        .find_by_name(raw)
        .ok_or_else(|| NetError::Configuration(format!("{raw}: Name or service not known")))?;
    world
        .device(device)
        .ok()
        .and_then(|d| {
            d.ports
                .values()
                .filter_map(|pid| world.port(*pid).ok())
                .filter_map(|p| p.ipv4)
                .map(|(ip, _)| ip)
                .next()
        })
        .ok_or_else(|| NetError::Configuration(format!("{raw}: Name or service not known")))
}

// ---- ifconfig ----------------------------------------------------------

fn render_iface(ctx: &HostCtx<'_>, name: &str) -> Result<String, NetError> {
    let pid = ctx.world.port_id(ctx.device, name)?;
    let port = ctx.world.port(pid)?;
    let flag = if port.up { "UP,BROADCAST,RUNNING" } else { "DOWN" };
    let mut out = format!("{name}: flags=<{flag}>  mtu {}\n", port.mtu);
    if let Some((ip, mask)) = port.ipv4 {
        out.push_str(&format!("        inet {ip}  netmask {mask}\n"));
    }
    for binding in &port.ipv6 {
        out.push_str(&format!(
            "        inet6 {}  prefixlen {}\n",
            binding.addr, binding.prefix_len
        ));
    }
    out.push_str(&format!("        ether {}\n", port.mac));
    out.push_str(&format!(
        "        RX packets {}  bytes {}\n        TX packets {}  bytes {}\n",
        port.counters.frames_in,
        port.counters.bytes_in,
        port.counters.frames_out,
        port.counters.bytes_out
    ));
    Ok(out)
}

fn h_ifconfig(ctx: &mut HostCtx<'_>, args: &[String]) -> Result<String, NetError> {
    match args {
        [] => {
            let names: Vec<String> = ctx
                .world
                .device(ctx.device)?
                .ports
                .keys()
                .cloned()
                .collect();
            let mut out = String::new();
            for name in names {
                out.push_str(&render_iface(ctx, &name)?);
                out.push('\n');
            }
            Ok(out.trim_end().to_string())
        }
        [iface] => Ok(render_iface(ctx, iface)?.trim_end().to_string()),
        [iface, ip, rest @ ..] => {
            let ip: Ipv4Address = ip
                .parse()
                .map_err(|_| NetError::Parse(format!("ifconfig: invalid address: {ip}")))?;
            // `netmask <mask>` or the fixed /24 default.
            let mask: SubnetMask = match rest {
                [keyword, mask] if keyword == "netmask" => mask.parse()?,
                [] => SubnetMask::from_prefix_len(24).expect("/24 is valid"),
                _ => {
                    return Err(NetError::Configuration(format!(
                        "ifconfig: bad arguments: {}",
                        rest.join(" ")
                    )))
                }
            };
            ctx.world.configure_interface(ctx.device, iface, ip, mask)?;
            Ok(String::new())
        }
    }
}

// ---- ip ----------------------------------------------------------------

fn h_ip_addr(ctx: &mut HostCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let entries: Vec<(String, crate::wire::PortId)> = ctx
        .world
        .device(ctx.device)?
        .ports
        .iter()
        .map(|(n, p)| (n.clone(), *p))
        .collect();
    let mut out = String::new();
    for (index, (name, pid)) in entries.iter().enumerate() {
        let port = ctx.world.port(*pid)?;
        let state = if port.up { "UP" } else { "DOWN" };
        out.push_str(&format!(
            "{}: {name}: <{state}> mtu {}\n    link/ether {}\n",
            index + 1,
            port.mtu,
            port.mac
        ));
        if let Some((ip, mask)) = port.ipv4 {
            out.push_str(&format!("    inet {ip}/{}\n", mask.prefix_len()));
        }
        for binding in &port.ipv6 {
            let scope = if binding.addr.is_link_local() { "link" } else { "global" };
            out.push_str(&format!(
                "    inet6 {}/{} scope {scope}\n",
                binding.addr, binding.prefix_len
            ));
        }
    }
    Ok(out.trim_end().to_string())
}

fn iface_name_of(ctx: &HostCtx<'_>, pid: crate::wire::PortId) -> String {
    ctx.world
        .port(pid)
        .map(|p| p.name.clone())
        .unwrap_or_default()
}

fn h_ip_route(ctx: &mut HostCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let strs: Vec<&str> = args.iter().map(String::as_str).collect();
    match strs.as_slice() {
        [] => {
            let routes = ctx
                .world
                .device(ctx.device)?
                .as_host()
                .ok_or_else(|| NetError::Configuration("no routing table".to_string()))?
                .routes
                .clone();
            let mut out = String::new();
            for entry in &routes {
                let dev = iface_name_of(ctx, entry.iface);
                match entry.kind {
                    RouteKind::Default => out.push_str(&format!(
                        "default via {} dev {dev}\n",
                        entry.next_hop.map(|h| h.to_string()).unwrap_or_default()
                    )),
                    RouteKind::Connected => out.push_str(&format!(
                        "{}/{} dev {dev} proto kernel scope link\n",
                        entry.network,
                        entry.mask.prefix_len()
                    )),
                    RouteKind::Static => out.push_str(&format!(
                        "{}/{} via {} dev {dev} metric {}\n",
                        entry.network,
                        entry.mask.prefix_len(),
                        entry.next_hop.map(|h| h.to_string()).unwrap_or_default(),
                        entry.metric
                    )),
                }
            }
            Ok(out.trim_end().to_string())
        }
        ["add", "default", "via", gw, rest @ ..] => {
            let gw: Ipv4Address = gw.parse()?;
            let metric = parse_metric(rest)?;
            ctx.world.add_default_route(ctx.device, gw, metric)?;
            Ok(String::new())
        }
        ["add", dest, "via", gw, rest @ ..] => {
            let (network, mask) = parse_cidr(dest)?;
            let gw: Ipv4Address = gw.parse()?;
            let metric = parse_metric(rest)?;
            ctx.world
                .add_static_route(ctx.device, network, mask, gw, metric)?;
            Ok(String::new())
        }
        ["del", "default"] => {
            let host = ctx
                .world
                .device_mut(ctx.device)?
                .as_host_mut()
                .ok_or_else(|| NetError::Configuration("no routing table".to_string()))?;
            if host.remove_default_route() == 0 {
                return Err(NetError::Configuration("RTNETLINK answers: No such process".to_string()));
            }
            Ok(String::new())
        }
        ["del", dest] => {
            let (network, mask) = parse_cidr(dest)?;
            let host = ctx
                .world
                .device_mut(ctx.device)?
                .as_host_mut()
                .ok_or_else(|| NetError::Configuration("no routing table".to_string()))?;
            if host.remove_route(network, mask) == 0 {
                return Err(NetError::Configuration("RTNETLINK answers: No such process".to_string()));
            }
            Ok(String::new())
        }
        _ => Err(NetError::Configuration(format!(
            "ip route: bad arguments: {}",
            strs.join(" ")
        ))),
    }
}

fn parse_cidr(s: &str) -> Result<(Ipv4Address, SubnetMask), NetError> {
    let (net, len) = s
        .split_once('/')
        .ok_or_else(|| NetError::Parse(format!("expected net/prefix, got {s}")))?;
    let network: Ipv4Address = net.parse()?;
    let prefix: u8 = len
        .parse()
        .map_err(|_| NetError::Parse(format!("invalid prefix length: {len}")))?;
    Ok((network, SubnetMask::from_prefix_len(prefix)?))
}

fn parse_metric(rest: &[&str]) -> Result<u32, NetError> {
    match rest {
        [] => Ok(0),
        ["metric", value] => value
            .parse()
            .map_err(|_| NetError::Parse(format!("invalid metric: {value}"))),
        other => Err(NetError::Configuration(format!(
            "ip route: bad arguments: {}",
            other.join(" ")
        ))),
    }
}

fn h_ip_neigh(ctx: &mut HostCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let host = ctx
        .world
        .device(ctx.device)?
        .as_host()
        .ok_or_else(|| NetError::Configuration("no neighbor table".to_string()))?;
    let mut entries: Vec<String> = host
        .arp_cache
        .iter()
        .map(|(ip, entry)| {
            format!(
                "{ip} dev {} lladdr {} REACHABLE",
                ctx.world
                    .port(entry.iface)
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
                entry.mac
            )
        })
        .collect();
    entries.sort();
    Ok(entries.join("\n"))
}

// ---- ping / traceroute -------------------------------------------------

fn h_ping(ctx: &mut HostCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let mut count = crate::config::PING_DEFAULT_COUNT;
    let mut ttl: Option<u8> = None;
    let mut dest: Option<&String> = None;
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-c" => {
                let v = it
                    .next()
                    .ok_or_else(|| NetError::Configuration("ping: option requires an argument -- c".to_string()))?;
                count = v
                    .parse()
                    .map_err(|_| NetError::Parse(format!("ping: invalid count: {v}")))?;
            }
            "-t" => {
                let v = it
                    .next()
                    .ok_or_else(|| NetError::Configuration("ping: option requires an argument -- t".to_string()))?;
                ttl = Some(
                    v.parse()
                        .map_err(|_| NetError::Parse(format!("ping: invalid ttl: {v}")))?,
                );
            }
            _ => dest = Some(arg),
        }
    }
    let dest =
        dest.ok_or_else(|| NetError::Configuration("ping: usage error: Destination address required".to_string()))?;
    let dst = resolve_destination(ctx.world, dest)?;

    let report = ctx
        .world
        .ping(ctx.device, dst, count, ttl)
        .map_err(|e| NetError::Configuration(format!("connect: {e}")))?;

    let mut out = format!("PING {dst} ({dst}) 56(84) bytes of data.\n");
    for probe in &report.probes {
        match probe.outcome {
            Some(EchoOutcome::Reply { from, ttl }) => out.push_str(&format!(
                "64 bytes from {from}: icmp_seq={} ttl={ttl} time={:.1} ms\n",
                probe.sequence, probe.rtt_ms
            )),
            Some(EchoOutcome::TimeExceeded { from }) => out.push_str(&format!(
                "From {from} icmp_seq={} Time to live exceeded\n",
                probe.sequence
            )),
            Some(EchoOutcome::Unreachable { from }) => out.push_str(&format!(
                "From {from} icmp_seq={} Destination Net Unreachable\n",
                probe.sequence
            )),
            None => out.push_str(&format!(
                "Request timeout for icmp_seq {}\n",
                probe.sequence
            )),
        }
    }
    out.push_str(&format!("--- {dst} ping statistics ---\n"));
    out.push_str(&format!(
        "{} packets transmitted, {} received, {:.0}% packet loss",
        report.transmitted(),
        report.received(),
        report.loss_pct()
    ));
    Ok(out)
}

fn h_traceroute(ctx: &mut HostCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let dest = args
        .first()
        .ok_or_else(|| NetError::Configuration("traceroute: missing host operand".to_string()))?;
    let dst = resolve_destination(ctx.world, dest)?;
    let hops = ctx
        .world
        .traceroute(ctx.device, dst)
        .map_err(|e| NetError::Configuration(format!("traceroute: {e}")))?;

    let mut out = format!(
        "traceroute to {dst} ({dst}), {} hops max\n",
        crate::config::TRACEROUTE_MAX_HOPS
    );
    for hop in &hops {
        match hop.from {
            Some(ip) => out.push_str(&format!(" {}  {ip}  {:.3} ms\n", hop.ttl, hop.rtt_ms)),
            None => out.push_str(&format!(" {}  * * *\n", hop.ttl)),
        }
    }
    Ok(out.trim_end().to_string())
}

// ---- arp / dhclient / hostname ----------------------------------------

fn h_arp(ctx: &mut HostCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let host = ctx
        .world
        .device(ctx.device)?
        .as_host()
        .ok_or_else(|| NetError::Configuration("no ARP table".to_string()))?;
    let mut entries: Vec<String> = host
        .arp_cache
        .iter()
        .map(|(ip, entry)| {
            format!(
                "? ({ip}) at {} [ether] on {}",
                entry.mac,
                ctx.world
                    .port(entry.iface)
                    .map(|p| p.name.clone())
                    .unwrap_or_default()
            )
        })
        .collect();
    entries.sort();
    Ok(entries.join("\n"))
}

fn h_dhclient(ctx: &mut HostCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let mut opts = DhclientOptions::default();
    let mut iface: Option<&String> = None;
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-v" => opts.verbose = true,
            "-d" => opts.foreground = true,
            "-r" => opts.release = true,
            "-x" => opts.stop = true,
            "-w" => opts.wait = true,
            "-s" => {
                let v = it.next().ok_or_else(|| {
                    NetError::Configuration("dhclient: option requires an argument -- s".to_string())
                })?;
                opts.server = Some(v.parse()?);
            }
            "-t" => {
                let v = it.next().ok_or_else(|| {
                    NetError::Configuration("dhclient: option requires an argument -- t".to_string())
                })?;
                opts.timeout_secs = Some(v.parse().map_err(|_| {
                    NetError::Parse(format!("dhclient: invalid timeout: {v}"))
                })?);
            }
            _ => iface = Some(arg),
        }
    }
    let iface = iface
        .ok_or_else(|| NetError::Configuration("dhclient: interface required".to_string()))?;
    ctx.world
        .dhclient(ctx.device, iface, opts)
        .map_err(|e| NetError::Configuration(format!("dhclient: {e}")))
}

fn h_hostname(ctx: &mut HostCtx<'_>, args: &[String]) -> Result<String, NetError> {
    match args.first() {
        None => Ok(ctx.world.device(ctx.device)?.hostname.clone()),
        Some(name) => {
            ctx.world.device_mut(ctx.device)?.hostname = name.clone();
            Ok(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::switch::SwitchVendor;
    use crate::wire::CableKind;

    /// Two hosts on one Cisco switch, both access ports in VLAN 1.
    fn lan_fixture() -> (World, DeviceId, DeviceId) {
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
        (world, h1, h2)
    }

    #[test]
    fn test_ifconfig_sets_address_with_default_mask() {
        let (mut world, h1, _) = lan_fixture();
        let mut shell = HostShell::new(h1);
        shell.exec(&mut world, "ifconfig eth0 192.168.1.10");
        let out = shell.exec(&mut world, "ifconfig eth0");
        assert!(out.contains("inet 192.168.1.10  netmask 255.255.255.0"), "{out}");
    }

    #[test]
    fn test_ifconfig_explicit_netmask() {
        let (mut world, h1, _) = lan_fixture();
        let mut shell = HostShell::new(h1);
        shell.exec(&mut world, "ifconfig eth0 10.0.0.1 netmask 255.255.0.0");
        let out = shell.exec(&mut world, "ip addr");
        assert!(out.contains("inet 10.0.0.1/16"), "{out}");
    }

    #[test]
    fn test_ping_between_hosts_zero_loss() {
        let (mut world, h1, h2) = lan_fixture();
        let mut s1 = HostShell::new(h1);
        let mut s2 = HostShell::new(h2);
        s1.exec(&mut world, "ifconfig eth0 192.168.1.10");
        s2.exec(&mut world, "ifconfig eth0 192.168.1.20");

        let out = s1.exec(&mut world, "ping -c 1 192.168.1.20");
        assert!(out.contains("64 bytes from 192.168.1.20"), "{out}");
        assert!(out.contains("1 packets transmitted, 1 received, 0% packet loss"), "{out}");
    }

    #[test]
    fn test_ping_by_registry_name() {
        let (mut world, h1, h2) = lan_fixture();
        let mut s1 = HostShell::new(h1);
        let mut s2 = HostShell::new(h2);
        s1.exec(&mut world, "ifconfig eth0 192.168.1.10");
        s2.exec(&mut world, "ifconfig eth0 192.168.1.20");

        let out = s1.exec(&mut world, "ping -c 1 H2");
        assert!(out.contains("0% packet loss"), "{out}");
    }

    #[test]
    fn test_ping_no_route_reports_unreachable() {
        let (mut world, h1, _) = lan_fixture();
        let mut shell = HostShell::new(h1);
        shell.exec(&mut world, "ifconfig eth0 192.168.1.10");
        let out = shell.exec(&mut world, "ping -c 1 8.8.8.8");
        assert!(out.contains("Network is unreachable"), "{out}");
    }

    #[test]
    fn test_arp_cache_after_ping() {
        let (mut world, h1, h2) = lan_fixture();
        let mut s1 = HostShell::new(h1);
        let mut s2 = HostShell::new(h2);
        s1.exec(&mut world, "ifconfig eth0 192.168.1.10");
        s2.exec(&mut world, "ifconfig eth0 192.168.1.20");
        s1.exec(&mut world, "ping -c 1 192.168.1.20");

        let h2_mac = {
            let pid = world.port_id(h2, "eth0").unwrap();
            world.port(pid).unwrap().mac.to_string()
        };
        let out = s1.exec(&mut world, "arp -a");
        assert!(out.contains(&format!("? (192.168.1.20) at {h2_mac} [ether] on eth0")), "{out}");
    }

    #[test]
    fn test_ip_route_add_and_del() {
        let (mut world, h1, _) = lan_fixture();
        let mut shell = HostShell::new(h1);
        shell.exec(&mut world, "ifconfig eth0 192.168.1.10");
        shell.exec(&mut world, "ip route add default via 192.168.1.1");
        shell.exec(&mut world, "ip route add 10.0.0.0/8 via 192.168.1.254 metric 5");

        let out = shell.exec(&mut world, "ip route");
        assert!(out.contains("default via 192.168.1.1 dev eth0"), "{out}");
        assert!(out.contains("10.0.0.0/8 via 192.168.1.254 dev eth0 metric 5"), "{out}");
        assert!(out.contains("192.168.1.0/24 dev eth0 proto kernel scope link"), "{out}");

        shell.exec(&mut world, "ip route del 10.0.0.0/8");
        shell.exec(&mut world, "ip route del default");
        let out = shell.exec(&mut world, "ip route");
        assert!(!out.contains("via"), "only the connected route remains: {out}");
    }

    #[test]
    fn test_ip_route_add_unreachable_gateway() {
        let (mut world, h1, _) = lan_fixture();
        let mut shell = HostShell::new(h1);
        shell.exec(&mut world, "ifconfig eth0 192.168.1.10");
        let out = shell.exec(&mut world, "ip route add 10.0.0.0/8 via 203.0.113.1");
        assert!(out.contains("Network is unreachable"), "{out}");
    }

    #[test]
    fn test_ip_route_del_missing_route() {
        let (mut world, h1, _) = lan_fixture();
        let mut shell = HostShell::new(h1);
        shell.exec(&mut world, "ifconfig eth0 192.168.1.10");
        let out = shell.exec(&mut world, "ip route del default");
        assert!(out.contains("No such process"), "{out}");
    }

    #[test]
    fn test_unknown_command() {
        let (mut world, h1, _) = lan_fixture();
        let mut shell = HostShell::new(h1);
        let out = shell.exec(&mut world, "frobnicate now");
        assert_eq!(out, "frobnicate: command not found");
    }

    #[test]
    fn test_hostname_get_and_set() {
        let (mut world, h1, _) = lan_fixture();
        let mut shell = HostShell::new(h1);
        assert_eq!(shell.exec(&mut world, "hostname"), "H1");
        shell.exec(&mut world, "hostname web-1");
        assert_eq!(shell.exec(&mut world, "hostname"), "web-1");
        assert_eq!(shell.prompt(&world), "web-1$ ");
    }

    #[test]
    fn test_dhclient_requires_interface() {
        let (mut world, h1, _) = lan_fixture();
        let mut shell = HostShell::new(h1);
        let out = shell.exec(&mut world, "dhclient -v");
        assert!(out.contains("interface required"), "{out}");
    }

    #[test]
    fn test_pipe_filter_on_host_output() {
        let (mut world, h1, _) = lan_fixture();
        let mut shell = HostShell::new(h1);
        shell.exec(&mut world, "ifconfig eth0 192.168.1.10");
        let out = shell.exec(&mut world, "ip addr | include 192.168");
        assert_eq!(out.trim(), "inet 192.168.1.10/24");
    }
}

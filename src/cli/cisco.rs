//! The Cisco IOS shell: a mode FSM (user / privileged / global-config /
//! interface-config / vlan-config) with one command trie per mode. Trie
//! actions receive an explicit context; the shell holds no reference to the
//! switch, only its id.

use crate::cli::{
    apply_filters, cisco_mac, resolve_interface_name, short_interface_name, split_pipeline,
    CommandTrie, Resolution,
};
use crate::config;
use crate::device::switch::{AllowedVlans, MacEntryKind, SwitchPortMode, SwitchState};
use crate::device::{DeviceId, World};
use crate::error::NetError;
use crate::wire::{PortId, PortSecurity, ViolationMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiscoMode {
    User,
    Privileged,
    Config,
    ConfigIf,
    ConfigVlan,
}

/// Shell-owned FSM state. Handlers mutate it through the context.
#[derive(Debug)]
pub struct CiscoShellState {
    pub mode: CiscoMode,
    /// Targets of interface-config mode (one port, or a range).
    pub selected_ports: Vec<PortId>,
    /// Target of vlan-config mode.
    pub selected_vlan: u16,
}

/// What every trie action gets: the world, the target switch, and the
/// shell FSM, all explicit.
pub struct CiscoCtx<'a> {
    pub world: &'a mut World,
    pub device: DeviceId,
    pub shell: &'a mut CiscoShellState,
}

pub struct CiscoShell {
    pub device: DeviceId,
    state: CiscoShellState,
}

impl CiscoShell {
    pub fn new(device: DeviceId) -> Self {
        Self {
            device,
            state: CiscoShellState {
                mode: CiscoMode::User,
                selected_ports: Vec::new(),
                selected_vlan: 1,
            },
        }
    }

    pub fn mode(&self) -> CiscoMode {
        self.state.mode
    }

    pub fn prompt(&self, world: &World) -> String {
        let hostname = world
            .device(self.device)
            .map(|d| d.hostname.clone())
            .unwrap_or_else(|_| "Switch".to_string());
        match self.state.mode {
            CiscoMode::User => format!("{hostname}>"),
            CiscoMode::Privileged => format!("{hostname}#"),
            CiscoMode::Config => format!("{hostname}(config)#"),
            CiscoMode::ConfigIf => format!("{hostname}(config-if)#"),
            CiscoMode::ConfigVlan => format!("{hostname}(config-vlan)#"),
        }
    }

    /// Ctrl-C: back to privileged from any config mode.
    pub fn interrupt(&mut self) {
        if self.state.mode != CiscoMode::User {
            self.state.mode = CiscoMode::Privileged;
        }
    }

    /// Execute one input line and render its output.
    pub fn exec(&mut self, world: &mut World, line: &str) -> String {
        let line = line.trim();
        if line.is_empty() {
            return String::new();
        }
        if let Some(stripped) = line.strip_suffix('?') {
            return self.help(stripped);
        }

        let (base, filters) = split_pipeline(line);
        let tokens: Vec<String> = base.split_whitespace().map(str::to_string).collect();
        if tokens.is_empty() {
            return String::new();
        }

        let trie = build_trie(self.state.mode);
        match trie.resolve(&tokens) {
            Resolution::Match { handler, args } => {
                let mut ctx = CiscoCtx {
                    world,
                    device: self.device,
                    shell: &mut self.state,
                };
                match handler(&mut ctx, &args) {
                    Ok(output) => apply_filters(&output, &filters),
                    Err(err) => format!("% {err}"),
                }
            }
            Resolution::Ambiguous { .. } => format!("% Ambiguous command: \"{base}\""),
            Resolution::Incomplete { continuations } => {
                if continuations.len() > 1 {
                    format!("% Ambiguous command: \"{base}\"")
                } else {
                    "% Incomplete command.".to_string()
                }
            }
            Resolution::Invalid { position } => invalid_marker(&tokens, position),
        }
    }

    /// `?` help: keywords valid at this point, plus `<cr>` when the line
    /// already forms a command.
    pub fn help(&self, partial: &str) -> String {
        let tokens: Vec<String> = partial.split_whitespace().map(str::to_string).collect();
        let trie = build_trie(self.state.mode);
        let completions = trie.completions(&tokens);
        let mut lines = Vec::new();
        if !tokens.is_empty() {
            if let Resolution::Match { .. } = trie.resolve(&tokens) {
                lines.push("  <cr>".to_string());
            }
        }
        for completion in &completions {
            lines.push(format!(
                "  {:<22} {}",
                completion.keyword, completion.description
            ));
        }
        if lines.is_empty() {
            "% Unrecognized command".to_string()
        } else {
            lines.join("\n")
        }
    }

    /// Tab completion for the current mode.
    pub fn tab_complete(&self, partial: &str) -> Option<String> {
        let tokens: Vec<String> = partial.split_whitespace().map(str::to_string).collect();
        build_trie(self.state.mode).tab_complete(&tokens)
    }
}

/// Render the IOS caret marker under the first invalid token.
fn invalid_marker(tokens: &[String], position: usize) -> String {
    let line = tokens.join(" ");
    let offset: usize = tokens[..position].iter().map(|t| t.len() + 1).sum();
    format!(
        "{line}\n{}^\n% Invalid input detected at '^' marker.",
        " ".repeat(offset)
    )
}

fn build_trie<'a>(mode: CiscoMode) -> CommandTrie<CiscoCtx<'a>> {
    let mut t = CommandTrie::new();
    match mode {
        CiscoMode::User => {
            t.register("enable", "Turn on privileged commands", h_enable);
            t.register("exit", "Exit from the EXEC", h_noop);
        }
        CiscoMode::Privileged => {
            t.register("disable", "Turn off privileged commands", h_disable);
            t.register("exit", "Exit from the EXEC", h_disable);
            t.register("configure terminal", "Enter configuration mode", h_configure);
            t.register("reload", "Halt and perform a cold restart", h_reload);
            t.register_greedy("write", "Write running configuration to memory", h_write);
            t.register(
                "copy running-config startup-config",
                "Copy from current system configuration",
                h_write,
            );
            t.register("show version", "System hardware and software status", h_show_version);
            t.register_greedy("show vlan", "VTP VLAN status", h_show_vlan);
            t.register(
                "show mac address-table",
                "MAC forwarding table",
                h_show_mac_table,
            );
            t.register_greedy("show interfaces", "Interface status and configuration", h_show_interfaces);
            t.register("show spanning-tree", "Spanning tree topology", h_show_spanning_tree);
            t.register(
                "show running-config",
                "Current operating configuration",
                h_show_running,
            );
            t.register(
                "show startup-config",
                "Contents of startup configuration",
                h_show_startup,
            );
            t.register_greedy(
                "clear mac address-table",
                "Clear MAC forwarding table",
                h_clear_mac_table,
            );
        }
        CiscoMode::Config => {
            t.register_greedy("hostname", "Set system's network name", h_hostname);
            t.register_greedy("vlan", "Vlan commands", h_vlan);
            t.register_greedy("no vlan", "Delete a VLAN", h_no_vlan);
            t.register_greedy("interface range", "Select an interface range", h_interface_range);
            t.register_greedy("interface", "Select an interface to configure", h_interface);
            t.register_greedy(
                "mac address-table aging-time",
                "Set MAC address table entry maximum age",
                h_aging_time,
            );
            t.register("exit", "Exit from configure mode", h_exit_to_privileged);
            t.register("end", "Exit from configure mode", h_end);
        }
        CiscoMode::ConfigIf => {
            t.register_greedy(
                "switchport mode",
                "Set trunking mode of the interface",
                h_switchport_mode,
            );
            t.register_greedy(
                "switchport access vlan",
                "Set VLAN when interface is in access mode",
                h_switchport_access_vlan,
            );
            t.register_greedy(
                "switchport trunk native vlan",
                "Set native VLAN when interface is in trunking mode",
                h_trunk_native_vlan,
            );
            t.register_greedy(
                "switchport trunk allowed vlan",
                "Set allowed VLANs when interface is in trunking mode",
                h_trunk_allowed_vlan,
            );
            t.register_greedy(
                "switchport port-security",
                "Security related interface configuration",
                h_port_security,
            );
            t.register(
                "no switchport port-security",
                "Disable port security",
                h_no_port_security,
            );
            t.register("shutdown", "Shutdown the selected interface", h_shutdown);
            t.register("no shutdown", "Enable the selected interface", h_no_shutdown);
            t.register("exit", "Exit from interface configuration mode", h_exit_to_config);
            t.register("end", "Exit from configure mode", h_end);
        }
        CiscoMode::ConfigVlan => {
            t.register_greedy("name", "Ascii name of the VLAN", h_vlan_name);
            t.register("exit", "Exit from vlan configuration mode", h_exit_to_config);
            t.register("end", "Exit from configure mode", h_end);
        }
    }
    t
}

// ---- helpers -----------------------------------------------------------

fn switch_state<'a>(ctx: &'a CiscoCtx<'_>) -> Result<&'a SwitchState, NetError> {
    ctx.world
        .device(ctx.device)?
        .as_switch()
        .ok_or_else(|| NetError::Configuration("device is not a switch".to_string()))
}

fn switch_state_mut<'a>(ctx: &'a mut CiscoCtx<'_>) -> Result<&'a mut SwitchState, NetError> {
    ctx.world
        .device_mut(ctx.device)?
        .as_switch_mut()
        .ok_or_else(|| NetError::Configuration("device is not a switch".to_string()))
}

fn parse_vlan_id(arg: Option<&String>) -> Result<u16, NetError> {
    let raw = arg.ok_or_else(|| NetError::Configuration("Incomplete command.".to_string()))?;
    let vid: u16 = raw
        .parse()
        .map_err(|_| NetError::Parse(format!("invalid VLAN id: {raw}")))?;
    if vid == 0 || vid > config::VLAN_MAX {
        return Err(NetError::Validation(format!("invalid VLAN id: {vid}")));
    }
    Ok(vid)
}

/// Sorted display-order (name, id) pairs of a device's ports.
fn port_list(ctx: &CiscoCtx<'_>) -> Vec<(String, PortId)> {
    ctx.world
        .device(ctx.device)
        .map(|d| d.ports.iter().map(|(n, p)| (n.clone(), *p)).collect())
        .unwrap_or_default()
}

// ---- mode transitions --------------------------------------------------

fn h_noop(_ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    Ok(String::new())
}

fn h_enable(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    ctx.shell.mode = CiscoMode::Privileged;
    Ok(String::new())
}

fn h_disable(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    ctx.shell.mode = CiscoMode::User;
    Ok(String::new())
}

fn h_configure(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    ctx.shell.mode = CiscoMode::Config;
    Ok("Enter configuration commands, one per line.  End with CNTL/Z.".to_string())
}

fn h_exit_to_privileged(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    ctx.shell.mode = CiscoMode::Privileged;
    Ok(String::new())
}

fn h_exit_to_config(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    ctx.shell.mode = CiscoMode::Config;
    Ok(String::new())
}

fn h_end(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    ctx.shell.mode = CiscoMode::Privileged;
    Ok(String::new())
}

fn h_reload(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    ctx.world.power_off(ctx.device)?;
    ctx.world.power_on(ctx.device)?;
    ctx.shell.mode = CiscoMode::User;
    Ok("Reloading...".to_string())
}

// ---- configuration commands -------------------------------------------

fn h_hostname(ctx: &mut CiscoCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let name = args
        .first()
        .ok_or_else(|| NetError::Configuration("Incomplete command.".to_string()))?;
    ctx.world.device_mut(ctx.device)?.hostname = name.clone();
    Ok(String::new())
}

fn h_vlan(ctx: &mut CiscoCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let vid = parse_vlan_id(args.first())?;
    switch_state_mut(ctx)?.create_vlan(vid)?;
    ctx.shell.selected_vlan = vid;
    ctx.shell.mode = CiscoMode::ConfigVlan;
    Ok(String::new())
}

fn h_no_vlan(ctx: &mut CiscoCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let vid = parse_vlan_id(args.first())?;
    switch_state_mut(ctx)?.delete_vlan(vid)?;
    Ok(String::new())
}

fn h_interface(ctx: &mut CiscoCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let spec = args.join("");
    let name = resolve_interface_name(&spec)
        .ok_or_else(|| NetError::Configuration(format!("invalid interface: {spec}")))?;
    let pid = ctx.world.port_id(ctx.device, &name)?;
    ctx.shell.selected_ports = vec![pid];
    ctx.shell.mode = CiscoMode::ConfigIf;
    Ok(String::new())
}

fn h_interface_range(ctx: &mut CiscoCtx<'_>, args: &[String]) -> Result<String, NetError> {
    // Accepted forms: `Fa0/1 - 24`, `fa0/1-24`.
    let spec: String = args.join("");
    let (head, tail) = spec
        .rsplit_once('-')
        .ok_or_else(|| NetError::Configuration(format!("invalid range: {spec}")))?;
    let first = resolve_interface_name(head)
        .ok_or_else(|| NetError::Configuration(format!("invalid interface: {head}")))?;
    let end: u32 = tail
        .trim()
        .parse()
        .map_err(|_| NetError::Parse(format!("invalid range end: {tail}")))?;
    let (prefix, start) = first
        .rsplit_once('/')
        .ok_or_else(|| NetError::Configuration(format!("invalid interface: {first}")))?;
    let start: u32 = start
        .parse()
        .map_err(|_| NetError::Parse(format!("invalid interface: {first}")))?;
    if end < start {
        return Err(NetError::Validation(format!("invalid range: {spec}")));
    }

    let mut ports = Vec::new();
    for n in start..=end {
        let name = format!("{prefix}/{n}");
        ports.push(ctx.world.port_id(ctx.device, &name)?);
    }
    ctx.shell.selected_ports = ports;
    ctx.shell.mode = CiscoMode::ConfigIf;
    Ok(String::new())
}

fn h_aging_time(ctx: &mut CiscoCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let raw = args
        .first()
        .ok_or_else(|| NetError::Configuration("Incomplete command.".to_string()))?;
    let secs: u64 = raw
        .parse()
        .map_err(|_| NetError::Parse(format!("invalid aging time: {raw}")))?;
    switch_state_mut(ctx)?.mac_table.aging_secs = secs;
    Ok(String::new())
}

fn h_vlan_name(ctx: &mut CiscoCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let name = args
        .first()
        .ok_or_else(|| NetError::Configuration("Incomplete command.".to_string()))?
        .clone();
    let vid = ctx.shell.selected_vlan;
    let state = switch_state_mut(ctx)?;
    let vlan = state
        .vlans
        .get_mut(vid)
        .ok_or_else(|| NetError::Configuration(format!("VLAN {vid} not found")))?;
    vlan.name = name;
    Ok(String::new())
}

// ---- interface-config commands ----------------------------------------

fn h_switchport_mode(ctx: &mut CiscoCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let raw = args
        .first()
        .ok_or_else(|| NetError::Configuration("Incomplete command.".to_string()))?;
    let mode = if "access".starts_with(raw.as_str()) {
        SwitchPortMode::Access
    } else if "trunk".starts_with(raw.as_str()) {
        SwitchPortMode::Trunk
    } else {
        return Err(NetError::Configuration(format!("invalid switchport mode: {raw}")));
    };
    let ports = ctx.shell.selected_ports.clone();
    let state = switch_state_mut(ctx)?;
    for pid in ports {
        state.set_port_mode(pid, mode);
    }
    Ok(String::new())
}

fn h_switchport_access_vlan(ctx: &mut CiscoCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let vid = parse_vlan_id(args.first())?;
    let ports = ctx.shell.selected_ports.clone();
    let state = switch_state_mut(ctx)?;
    let mut note = String::new();
    if !state.vlans.contains(vid) {
        state.create_vlan(vid)?;
        note = format!("% Access VLAN does not exist. Creating vlan {vid}");
    }
    for pid in ports {
        state.assign_access_vlan(pid, vid);
    }
    Ok(note)
}

fn h_trunk_native_vlan(ctx: &mut CiscoCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let vid = parse_vlan_id(args.first())?;
    let ports = ctx.shell.selected_ports.clone();
    let state = switch_state_mut(ctx)?;
    for pid in &ports {
        if let Some(cfg) = state.port_cfg.get_mut(pid) {
            cfg.native_vlan = vid;
        }
    }
    Ok(String::new())
}

fn h_trunk_allowed_vlan(ctx: &mut CiscoCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let raw = args
        .first()
        .ok_or_else(|| NetError::Configuration("Incomplete command.".to_string()))?;
    let allowed = if raw == "all" {
        AllowedVlans::All
    } else {
        AllowedVlans::List(crate::device::switch::parse_vlan_list(raw)?)
    };
    let ports = ctx.shell.selected_ports.clone();
    let state = switch_state_mut(ctx)?;
    for pid in &ports {
        if let Some(cfg) = state.port_cfg.get_mut(pid) {
            cfg.allowed = allowed.clone();
        }
    }
    Ok(String::new())
}

fn h_port_security(ctx: &mut CiscoCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let ports = ctx.shell.selected_ports.clone();
    for pid in ports {
        let port = ctx.world.port_mut(pid)?;
        let security = port
            .security
            .get_or_insert_with(|| PortSecurity::new(ViolationMode::Shutdown));
        match args.first().map(String::as_str) {
            None => {}
            Some("maximum") => {
                let raw = args
                    .get(1)
                    .ok_or_else(|| NetError::Configuration("Incomplete command.".to_string()))?;
                security.max_macs = raw
                    .parse()
                    .map_err(|_| NetError::Parse(format!("invalid maximum: {raw}")))?;
            }
            Some("violation") => {
                let raw = args
                    .get(1)
                    .ok_or_else(|| NetError::Configuration("Incomplete command.".to_string()))?;
                security.mode = if "shutdown".starts_with(raw.as_str()) {
                    ViolationMode::Shutdown
                } else if "restrict".starts_with(raw.as_str()) {
                    ViolationMode::Restrict
                } else if "protect".starts_with(raw.as_str()) {
                    ViolationMode::Protect
                } else {
                    return Err(NetError::Configuration(format!(
                        "invalid violation mode: {raw}"
                    )));
                };
            }
            Some(other) => {
                return Err(NetError::Configuration(format!(
                    "invalid port-security option: {other}"
                )))
            }
        }
    }
    Ok(String::new())
}

fn h_no_port_security(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let ports = ctx.shell.selected_ports.clone();
    for pid in ports {
        ctx.world.port_mut(pid)?.security = None;
    }
    Ok(String::new())
}

fn h_shutdown(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    for pid in ctx.shell.selected_ports.clone() {
        ctx.world.set_port_up(pid, false)?;
    }
    Ok(String::new())
}

fn h_no_shutdown(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    for pid in ctx.shell.selected_ports.clone() {
        ctx.world.set_port_up(pid, true)?;
    }
    Ok(String::new())
}

// ---- show commands -----------------------------------------------------

fn h_show_version(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let device = ctx.world.device(ctx.device)?;
    let hostname = device.hostname.clone();
    let (fast, giga) = device.ports.keys().fold((0u32, 0u32), |(f, g), name| {
        if name.starts_with("FastEthernet") {
            (f + 1, g)
        } else if name.starts_with("GigabitEthernet") {
            (f, g + 1)
        } else {
            (f, g)
        }
    });
    let base_mac = device
        .ports
        .values()
        .next()
        .and_then(|pid| ctx.world.port(*pid).ok())
        .map(|p| cisco_mac(&p.mac))
        .unwrap_or_default();
    let uptime_secs = ctx.world.clock.now_ms() / 1000;
    Ok(format!(
        "NetLab IOS Software, C2960 Software (C2960-LANBASEK9-M), Version 15.0(2)SE\n\
         {hostname} uptime is {uptime_secs} seconds\n\
         Base ethernet MAC Address       : {base_mac}\n\
         {fast} FastEthernet interfaces\n\
         {giga} Gigabit Ethernet interfaces"
    ))
}

fn h_show_vlan(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    // `show vlan` and `show vlan brief` render the same summary table.
    let ports = port_list(ctx);
    let state = switch_state(ctx)?;
    let mut out = String::new();
    out.push_str("VLAN Name                             Status    Ports\n");
    out.push_str("---- -------------------------------- --------- -------------------------------\n");
    for (vid, vlan) in state.vlans.iter() {
        let members: Vec<String> = ports
            .iter()
            .filter(|(_, pid)| vlan.ports.contains(pid))
            .map(|(name, _)| short_interface_name(name))
            .collect();
        out.push_str(&format!(
            "{:<4} {:<32} {:<9} {}\n",
            vid,
            vlan.name,
            "active",
            members.join(", ")
        ));
    }
    Ok(out.trim_end().to_string())
}

fn h_show_mac_table(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let ports = port_list(ctx);
    let state = switch_state(ctx)?;
    let mut out = String::new();
    out.push_str("          Mac Address Table\n");
    out.push_str("-------------------------------------------\n\n");
    out.push_str("Vlan    Mac Address       Type        Ports\n");
    out.push_str("----    -----------       --------    -----\n");
    let mut total = 0usize;
    for ((vid, mac), entry) in state.mac_table.iter() {
        let port_name = ports
            .iter()
            .find(|(_, pid)| *pid == entry.port)
            .map(|(name, _)| short_interface_name(name))
            .unwrap_or_default();
        let kind = match entry.kind {
            MacEntryKind::Dynamic => "DYNAMIC",
            MacEntryKind::Static => "STATIC",
        };
        out.push_str(&format!(
            "{:>4}    {}    {:<8}    {}\n",
            vid,
            cisco_mac(mac),
            kind,
            port_name
        ));
        total += 1;
    }
    out.push_str(&format!("Total Mac Addresses for this criterion: {total}"));
    Ok(out)
}

fn h_show_interfaces(ctx: &mut CiscoCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let wants_status = args
        .first()
        .map(|a| !a.is_empty() && "status".starts_with(a.as_str()))
        .unwrap_or(false);
    if wants_status {
        return h_show_interfaces_status(ctx);
    }
    let ports = port_list(ctx);
    let mut out = String::new();
    for (name, pid) in &ports {
        let port = ctx.world.port(*pid)?;
        let connected = port.up && port.cable.is_some();
        let line = if connected { "up" } else { "down" };
        let admin = if port.up { "up" } else { "administratively down" };
        out.push_str(&format!(
            "{name} is {admin}, line protocol is {line}\n  Hardware is Ethernet, address is {}\n  MTU {} bytes, BW {} Kbit/sec\n  {} packets input, {} bytes, {} drops\n  {} packets output, {} bytes, {} drops\n",
            cisco_mac(&port.mac),
            port.mtu,
            port.negotiated_speed.unwrap_or(port.speed_mbps) * 1000,
            port.counters.frames_in,
            port.counters.bytes_in,
            port.counters.drops_in,
            port.counters.frames_out,
            port.counters.bytes_out,
            port.counters.drops_out,
        ));
    }
    Ok(out.trim_end().to_string())
}

fn h_show_interfaces_status(ctx: &mut CiscoCtx<'_>) -> Result<String, NetError> {
    let ports = port_list(ctx);
    let state = switch_state(ctx)?;
    let mut out = String::new();
    out.push_str("Port      Name               Status       Vlan       Duplex  Speed Type\n");
    for (name, pid) in &ports {
        let port = ctx.world.port(*pid)?;
        let cfg = state.cfg(*pid);
        let status = if !port.up {
            "disabled"
        } else if port.cable.is_some() {
            "connected"
        } else {
            "notconnect"
        };
        let vlan = match cfg.mode {
            SwitchPortMode::Trunk => "trunk".to_string(),
            SwitchPortMode::Access => cfg.access_vlan.to_string(),
        };
        let duplex = match port.negotiated_duplex {
            Some(crate::wire::Duplex::Full) => "a-full",
            Some(crate::wire::Duplex::Half) => "a-half",
            None => "auto",
        };
        let speed = match port.negotiated_speed {
            Some(s) => format!("a-{s}"),
            None => "auto".to_string(),
        };
        out.push_str(&format!(
            "{:<9} {:<18} {:<12} {:<10} {:<7} {:<5} 10/100BaseTX\n",
            short_interface_name(name),
            "",
            status,
            vlan,
            duplex,
            speed
        ));
    }
    Ok(out.trim_end().to_string())
}

fn h_show_spanning_tree(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let ports = port_list(ctx);
    let state = switch_state(ctx)?;
    let mut out = String::new();
    out.push_str("Interface           Role Sts Cost      Prio.Nbr Type\n");
    out.push_str("------------------- ---- --- --------- -------- --------------------------------\n");
    for (i, (name, pid)) in ports.iter().enumerate() {
        let sts = match state.stp_state(*pid) {
            crate::device::StpState::Blocking => "BLK",
            crate::device::StpState::Listening => "LIS",
            crate::device::StpState::Learning => "LRN",
            crate::device::StpState::Forwarding => "FWD",
            crate::device::StpState::Disabled => "DIS",
        };
        out.push_str(&format!(
            "{:<19} Desg {sts} 19        128.{:<4} P2p\n",
            short_interface_name(name),
            i + 1
        ));
    }
    Ok(out.trim_end().to_string())
}

/// Capture the live configuration in display order.
fn capture_config(ctx: &CiscoCtx<'_>) -> Result<crate::device::switch::StartupConfig, NetError> {
    let device = ctx.world.device(ctx.device)?;
    let hostname = device.hostname.clone();
    let ports: Vec<(String, PortId, bool)> = device
        .ports
        .iter()
        .map(|(name, pid)| {
            let up = ctx.world.port(*pid).map(|p| p.up).unwrap_or(false);
            (name.clone(), *pid, up)
        })
        .collect();
    let state = switch_state(ctx)?;
    Ok(crate::device::switch::StartupConfig::capture(
        &hostname, state, &ports,
    ))
}

fn h_show_running(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let config = capture_config(ctx)?;
    Ok(format!(
        "Building configuration...\n\nCurrent configuration:\n{}",
        config.render()
    ))
}

fn h_show_startup(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let state = switch_state(ctx)?;
    match &state.startup_config {
        Some(blob) => {
            let config = crate::device::switch::StartupConfig::from_json(blob)?;
            Ok(config.render())
        }
        None => Ok("startup-config is not present".to_string()),
    }
}

fn h_write(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let config = capture_config(ctx)?;
    let blob = config.to_json()?;
    switch_state_mut(ctx)?.startup_config = Some(blob);
    Ok("Building configuration...\n[OK]".to_string())
}

fn h_clear_mac_table(ctx: &mut CiscoCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    switch_state_mut(ctx)?.mac_table.clear();
    Ok(String::new())
}

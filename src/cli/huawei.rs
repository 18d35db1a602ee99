//! The Huawei VRP shell: a view FSM (user / system / interface / vlan)
//! structurally mirroring the IOS shell, with VRP vocabulary —
//! `system-view`, `quit`, `return`, `display`, `undo`, `sysname`, and the
//! `port link-type` family.

use crate::cli::{
    apply_filters, resolve_interface_name, short_interface_name, split_pipeline, CommandTrie,
    Resolution,
};
use crate::addr::MacAddr;
use crate::config;
use crate::device::switch::{AllowedVlans, MacEntryKind, SwitchPortMode, SwitchState};
use crate::device::{DeviceId, World};
use crate::error::NetError;
use crate::wire::PortId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuaweiView {
    User,
    System,
    Interface,
    Vlan,
}

#[derive(Debug)]
pub struct HuaweiShellState {
    pub view: HuaweiView,
    pub selected_port: Option<PortId>,
    pub selected_vlan: u16,
}

pub struct HuaweiCtx<'a> {
    pub world: &'a mut World,
    pub device: DeviceId,
    pub shell: &'a mut HuaweiShellState,
}

pub struct HuaweiShell {
    pub device: DeviceId,
    state: HuaweiShellState,
}

impl HuaweiShell {
    pub fn new(device: DeviceId) -> Self {
        Self {
            device,
            state: HuaweiShellState {
                view: HuaweiView::User,
                selected_port: None,
                selected_vlan: 1,
            },
        }
    }

    pub fn view(&self) -> HuaweiView {
        self.state.view
    }

    pub fn prompt(&self, world: &World) -> String {
        let hostname = world
            .device(self.device)
            .map(|d| d.hostname.clone())
            .unwrap_or_else(|_| "Huawei".to_string());
        match self.state.view {
            HuaweiView::User => format!("<{hostname}>"),
            HuaweiView::System => format!("[{hostname}]"),
            HuaweiView::Interface => {
                let iface = self
                    .state
                    .selected_port
                    .and_then(|pid| world.port(pid).ok())
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                format!("[{hostname}-{iface}]")
            }
            HuaweiView::Vlan => format!("[{hostname}-vlan{}]", self.state.selected_vlan),
        }
    }

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

        let trie = build_trie(self.state.view);
        match trie.resolve(&tokens) {
            Resolution::Match { handler, args } => {
                let mut ctx = HuaweiCtx {
                    world,
                    device: self.device,
                    shell: &mut self.state,
                };
                match handler(&mut ctx, &args) {
                    Ok(output) => apply_filters(&output, &filters),
                    Err(err) => format!("Error: {err}"),
                }
            }
            Resolution::Ambiguous { .. } => {
                "Error: Ambiguous command found at '^' position.".to_string()
            }
            Resolution::Incomplete { .. } => {
                "Error: Incomplete command found at '^' position.".to_string()
            }
            Resolution::Invalid { .. } => {
                "Error: Unrecognized command found at '^' position.".to_string()
            }
        }
    }

    pub fn help(&self, partial: &str) -> String {
        let tokens: Vec<String> = partial.split_whitespace().map(str::to_string).collect();
        let trie = build_trie(self.state.view);
        let completions = trie.completions(&tokens);
        if completions.is_empty() {
            return "Error: Unrecognized command found at '^' position.".to_string();
        }
        completions
            .iter()
            .map(|c| format!("  {:<22} {}", c.keyword, c.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tab_complete(&self, partial: &str) -> Option<String> {
        let tokens: Vec<String> = partial.split_whitespace().map(str::to_string).collect();
        build_trie(self.state.view).tab_complete(&tokens)
    }
}

fn build_trie<'a>(view: HuaweiView) -> CommandTrie<HuaweiCtx<'a>> {
    let mut t = CommandTrie::new();
    // `display` works from every view.
    t.register("display version", "Display system version", h_display_version);
    t.register("display vlan", "Display VLAN information", h_display_vlan);
    t.register("display mac-address", "Display MAC address table", h_display_mac);
    t.register(
        "display current-configuration",
        "Display current configuration",
        h_display_current,
    );
    t.register(
        "display saved-configuration",
        "Display saved configuration",
        h_display_saved,
    );
    t.register("display stp", "Display spanning tree status", h_display_stp);
    match view {
        HuaweiView::User => {
            t.register("system-view", "Enter system view", h_system_view);
            t.register("save", "Save the current configuration", h_save);
            t.register("reboot", "Reboot the device", h_reboot);
            t.register("quit", "Exit the current view", h_noop);
        }
        HuaweiView::System => {
            t.register_greedy("sysname", "Set the host name", h_sysname);
            t.register_greedy("vlan", "Create or enter VLAN view", h_vlan);
            t.register_greedy("undo vlan", "Delete a VLAN", h_undo_vlan);
            t.register_greedy("interface", "Enter interface view", h_interface);
            t.register_greedy(
                "mac-address aging-time",
                "Set the aging time of dynamic MAC entries",
                h_aging_time,
            );
            t.register("quit", "Return to user view", h_quit_to_user);
            t.register("return", "Return to user view", h_quit_to_user);
        }
        HuaweiView::Interface => {
            t.register_greedy(
                "port link-type",
                "Set the link type of the port",
                h_port_link_type,
            );
            t.register_greedy(
                "port default vlan",
                "Set the default VLAN of an access port",
                h_port_default_vlan,
            );
            t.register_greedy(
                "port trunk pvid vlan",
                "Set the native VLAN of a trunk port",
                h_port_trunk_pvid,
            );
            t.register_greedy(
                "port trunk allow-pass vlan",
                "Set the VLANs a trunk port passes",
                h_port_trunk_allow,
            );
            t.register("shutdown", "Shut down the port", h_shutdown);
            t.register("undo shutdown", "Bring the port up", h_undo_shutdown);
            t.register("quit", "Return to system view", h_quit_to_system);
            t.register("return", "Return to user view", h_quit_to_user);
        }
        HuaweiView::Vlan => {
            t.register_greedy("name", "Set the VLAN name", h_vlan_name);
            t.register("quit", "Return to system view", h_quit_to_system);
            t.register("return", "Return to user view", h_quit_to_user);
        }
    }
    t
}

// ---- helpers -----------------------------------------------------------

fn switch_state<'a>(ctx: &'a HuaweiCtx<'_>) -> Result<&'a SwitchState, NetError> {
    ctx.world
        .device(ctx.device)?
        .as_switch()
        .ok_or_else(|| NetError::Configuration("device is not a switch".to_string()))
}

fn switch_state_mut<'a>(ctx: &'a mut HuaweiCtx<'_>) -> Result<&'a mut SwitchState, NetError> {
    ctx.world
        .device_mut(ctx.device)?
        .as_switch_mut()
        .ok_or_else(|| NetError::Configuration("device is not a switch".to_string()))
}

fn parse_vlan_id(arg: Option<&String>) -> Result<u16, NetError> {
    let raw = arg.ok_or_else(|| NetError::Configuration("incomplete command".to_string()))?;
    let vid: u16 = raw
        .parse()
        .map_err(|_| NetError::Parse(format!("invalid VLAN id: {raw}")))?;
    if vid == 0 || vid > config::VLAN_MAX {
        return Err(NetError::Validation(format!("invalid VLAN id: {vid}")));
    }
    Ok(vid)
}

fn selected_port(ctx: &HuaweiCtx<'_>) -> Result<PortId, NetError> {
    ctx.shell
        .selected_port
        .ok_or_else(|| NetError::Configuration("no interface selected".to_string()))
}

/// `0200-0000-0001`, the VRP MAC rendering.
fn huawei_mac(mac: &MacAddr) -> String {
    let o = mac.octets();
    format!(
        "{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}",
        o[0], o[1], o[2], o[3], o[4], o[5]
    )
}

// ---- view transitions --------------------------------------------------

fn h_noop(_ctx: &mut HuaweiCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    Ok(String::new())
}

fn h_system_view(ctx: &mut HuaweiCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    ctx.shell.view = HuaweiView::System;
    Ok("Enter system view, return user view with Ctrl+Z.".to_string())
}

fn h_quit_to_user(ctx: &mut HuaweiCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    ctx.shell.view = HuaweiView::User;
    Ok(String::new())
}

fn h_quit_to_system(ctx: &mut HuaweiCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    ctx.shell.view = HuaweiView::System;
    Ok(String::new())
}

fn h_reboot(ctx: &mut HuaweiCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    ctx.world.power_off(ctx.device)?;
    ctx.world.power_on(ctx.device)?;
    ctx.shell.view = HuaweiView::User;
    Ok("Info: The system is rebooting now.".to_string())
}

// ---- system-view commands ----------------------------------------------

fn h_sysname(ctx: &mut HuaweiCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let name = args
        .first()
        .ok_or_else(|| NetError::Configuration("incomplete command".to_string()))?;
    ctx.world.device_mut(ctx.device)?.hostname = name.clone();
    Ok(String::new())
}

fn h_vlan(ctx: &mut HuaweiCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let vid = parse_vlan_id(args.first())?;
    switch_state_mut(ctx)?.create_vlan(vid)?;
    ctx.shell.selected_vlan = vid;
    ctx.shell.view = HuaweiView::Vlan;
    Ok(String::new())
}

fn h_undo_vlan(ctx: &mut HuaweiCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let vid = parse_vlan_id(args.first())?;
    switch_state_mut(ctx)?.delete_vlan(vid)?;
    Ok(String::new())
}

fn h_interface(ctx: &mut HuaweiCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let spec = args.join("");
    let name = resolve_interface_name(&spec)
        .ok_or_else(|| NetError::Configuration(format!("invalid interface: {spec}")))?;
    let pid = ctx.world.port_id(ctx.device, &name)?;
    ctx.shell.selected_port = Some(pid);
    ctx.shell.view = HuaweiView::Interface;
    Ok(String::new())
}

fn h_aging_time(ctx: &mut HuaweiCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let raw = args
        .first()
        .ok_or_else(|| NetError::Configuration("incomplete command".to_string()))?;
    let secs: u64 = raw
        .parse()
        .map_err(|_| NetError::Parse(format!("invalid aging time: {raw}")))?;
    switch_state_mut(ctx)?.mac_table.aging_secs = secs;
    Ok(String::new())
}

fn h_vlan_name(ctx: &mut HuaweiCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let name = args
        .first()
        .ok_or_else(|| NetError::Configuration("incomplete command".to_string()))?
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

// ---- interface-view commands -------------------------------------------

fn h_port_link_type(ctx: &mut HuaweiCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let raw = args
        .first()
        .ok_or_else(|| NetError::Configuration("incomplete command".to_string()))?;
    let mode = if "access".starts_with(raw.as_str()) {
        SwitchPortMode::Access
    } else if "trunk".starts_with(raw.as_str()) {
        SwitchPortMode::Trunk
    } else {
        return Err(NetError::Configuration(format!("invalid link type: {raw}")));
    };
    let pid = selected_port(ctx)?;
    switch_state_mut(ctx)?.set_port_mode(pid, mode);
    Ok(String::new())
}

fn h_port_default_vlan(ctx: &mut HuaweiCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let vid = parse_vlan_id(args.first())?;
    let pid = selected_port(ctx)?;
    let state = switch_state_mut(ctx)?;
    if !state.vlans.contains(vid) {
        return Err(NetError::Configuration(format!(
            "VLAN {vid} does not exist"
        )));
    }
    state.assign_access_vlan(pid, vid);
    Ok(String::new())
}

fn h_port_trunk_pvid(ctx: &mut HuaweiCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let vid = parse_vlan_id(args.first())?;
    let pid = selected_port(ctx)?;
    let state = switch_state_mut(ctx)?;
    if let Some(cfg) = state.port_cfg.get_mut(&pid) {
        cfg.native_vlan = vid;
    }
    Ok(String::new())
}

fn h_port_trunk_allow(ctx: &mut HuaweiCtx<'_>, args: &[String]) -> Result<String, NetError> {
    let raw = args
        .first()
        .ok_or_else(|| NetError::Configuration("incomplete command".to_string()))?;
    let allowed = if raw == "all" {
        AllowedVlans::All
    } else {
        // VRP lists look like `10 20 30` or `10,20-30`; accept both.
        let joined = args.join(",");
        AllowedVlans::List(crate::device::switch::parse_vlan_list(&joined)?)
    };
    let pid = selected_port(ctx)?;
    let state = switch_state_mut(ctx)?;
    if let Some(cfg) = state.port_cfg.get_mut(&pid) {
        cfg.allowed = allowed;
    }
    Ok(String::new())
}

fn h_shutdown(ctx: &mut HuaweiCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let pid = selected_port(ctx)?;
    ctx.world.set_port_up(pid, false)?;
    Ok(String::new())
}

fn h_undo_shutdown(ctx: &mut HuaweiCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let pid = selected_port(ctx)?;
    ctx.world.set_port_up(pid, true)?;
    Ok(String::new())
}

// ---- display commands --------------------------------------------------

fn h_display_version(ctx: &mut HuaweiCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let hostname = ctx.world.device(ctx.device)?.hostname.clone();
    let uptime_secs = ctx.world.clock.now_ms() / 1000;
    Ok(format!(
        "Huawei Versatile Routing Platform Software\n\
         VRP (R) software, Version 5.170 (S5700 V200R010C00)\n\
         {hostname} uptime is {uptime_secs} seconds"
    ))
}

fn h_display_vlan(ctx: &mut HuaweiCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let ports: Vec<(String, PortId)> = ctx
        .world
        .device(ctx.device)
        .map(|d| d.ports.iter().map(|(n, p)| (n.clone(), *p)).collect())
        .unwrap_or_default();
    let state = switch_state(ctx)?;
    let total = state.vlans.iter().count();
    let mut out = format!("The total number of vlans is : {total}\n");
    out.push_str("--------------------------------------------------------------------------------\n");
    out.push_str("VID  Type    Ports\n");
    out.push_str("--------------------------------------------------------------------------------\n");
    for (vid, vlan) in state.vlans.iter() {
        let members: Vec<String> = ports
            .iter()
            .filter(|(_, pid)| vlan.ports.contains(pid))
            .map(|(name, _)| format!("{}(U)", short_interface_name(name)))
            .collect();
        out.push_str(&format!("{:<4} common  UT:{}\n", vid, members.join(" ")));
    }
    Ok(out.trim_end().to_string())
}

fn h_display_mac(ctx: &mut HuaweiCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let ports: Vec<(String, PortId)> = ctx
        .world
        .device(ctx.device)
        .map(|d| d.ports.iter().map(|(n, p)| (n.clone(), *p)).collect())
        .unwrap_or_default();
    let state = switch_state(ctx)?;
    let mut out = String::new();
    out.push_str("MAC Address     VLAN  Port              Type\n");
    out.push_str("--------------------------------------------------\n");
    for ((vid, mac), entry) in state.mac_table.iter() {
        let port_name = ports
            .iter()
            .find(|(_, pid)| *pid == entry.port)
            .map(|(name, _)| short_interface_name(name))
            .unwrap_or_default();
        let kind = match entry.kind {
            MacEntryKind::Dynamic => "dynamic",
            MacEntryKind::Static => "static",
        };
        out.push_str(&format!(
            "{}  {:<4}  {:<16}  {}\n",
            huawei_mac(mac),
            vid,
            port_name,
            kind
        ));
    }
    Ok(out.trim_end().to_string())
}

fn h_display_stp(ctx: &mut HuaweiCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let ports: Vec<(String, PortId)> = ctx
        .world
        .device(ctx.device)
        .map(|d| d.ports.iter().map(|(n, p)| (n.clone(), *p)).collect())
        .unwrap_or_default();
    let state = switch_state(ctx)?;
    let mut out = String::new();
    out.push_str("Port                        Role  STP State     Protection\n");
    for (name, pid) in &ports {
        out.push_str(&format!(
            "{:<27} DESI  {:<13} NONE\n",
            name,
            state.stp_state(*pid).as_str().to_uppercase()
        ));
    }
    Ok(out.trim_end().to_string())
}

/// Capture, then render in VRP style (`#`-separated blocks, `undo`-free).
fn render_vrp(config: &crate::device::switch::StartupConfig) -> String {
    let mut out = String::new();
    out.push_str("#\n");
    out.push_str(&format!("sysname {}\n", config.hostname));
    out.push_str("#\n");
    if !config.vlans.is_empty() {
        let ids: Vec<String> = config.vlans.iter().map(|v| v.id.to_string()).collect();
        out.push_str(&format!("vlan batch {}\n#\n", ids.join(" ")));
    }
    for iface in &config.interfaces {
        out.push_str(&format!("interface {}\n", iface.name));
        if iface.mode == "trunk" {
            out.push_str(" port link-type trunk\n");
            if iface.native_vlan != 1 {
                out.push_str(&format!(" port trunk pvid vlan {}\n", iface.native_vlan));
            }
            if iface.allowed_vlans != "all" {
                out.push_str(&format!(
                    " port trunk allow-pass vlan {}\n",
                    iface.allowed_vlans
                ));
            }
        } else {
            out.push_str(" port link-type access\n");
            if iface.access_vlan != 1 {
                out.push_str(&format!(" port default vlan {}\n", iface.access_vlan));
            }
        }
        if iface.shutdown {
            out.push_str(" shutdown\n");
        }
        out.push_str("#\n");
    }
    out.push_str("return\n");
    out
}

fn capture_config(ctx: &HuaweiCtx<'_>) -> Result<crate::device::switch::StartupConfig, NetError> {
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

fn h_display_current(ctx: &mut HuaweiCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    Ok(render_vrp(&capture_config(ctx)?))
}

fn h_display_saved(ctx: &mut HuaweiCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let state = switch_state(ctx)?;
    match &state.startup_config {
        Some(blob) => {
            let config = crate::device::switch::StartupConfig::from_json(blob)?;
            Ok(render_vrp(&config))
        }
        None => Ok("Info: The device has no saved configuration.".to_string()),
    }
}

fn h_save(ctx: &mut HuaweiCtx<'_>, _args: &[String]) -> Result<String, NetError> {
    let config = capture_config(ctx)?;
    let blob = config.to_json()?;
    switch_state_mut(ctx)?.startup_config = Some(blob);
    Ok("Info: Save the configuration successfully.".to_string())
}

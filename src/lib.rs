//! netlab: a deterministic simulator of small IP networks.
//!
//! Hosts, hubs, switches, and routers live in a [`World`] arena, wired by
//! cables and exchanging semantically modelled L2/L3 PDUs. Frame delivery
//! is synchronous and single-threaded; time is virtual and only moves via
//! [`World::advance`], so every run replays identically. Vendor-style CLI
//! shells (Cisco IOS, Huawei VRP, a Unix host shell) drive the control
//! planes.
//!
//! ```
//! use netlab::{CableKind, HostShell, SwitchVendor, World};
//!
//! let mut world = World::new();
//! let sw = world.add_switch("SW1", SwitchVendor::Cisco, 8);
//! let h1 = world.add_host("H1");
//! let h2 = world.add_host("H2");
//! world.connect_ifaces(CableKind::Cat5e, h1, "eth0", sw, "FastEthernet0/1", 5.0).unwrap();
//! world.connect_ifaces(CableKind::Cat5e, h2, "eth0", sw, "FastEthernet0/2", 5.0).unwrap();
//!
//! let mut shell = HostShell::new(h1);
//! shell.exec(&mut world, "ifconfig eth0 192.168.1.10");
//! HostShell::new(h2).exec(&mut world, "ifconfig eth0 192.168.1.20");
//! let out = shell.exec(&mut world, "ping -c 1 192.168.1.20");
//! assert!(out.contains("0% packet loss"));
//! ```

pub mod addr;
pub mod cli;
pub mod clock;
pub mod config;
pub mod device;
pub mod dhcp;
pub mod error;
pub mod logger;
pub mod proto;
pub mod rng;
pub mod wire;

pub use addr::{Ipv4Address, Ipv6Address, MacAddr, SubnetMask};
pub use cli::{CiscoShell, HostShell, HuaweiShell};
pub use device::{DeviceId, PingReport, SwitchVendor, World};
pub use dhcp::{DhclientOptions, DhcpServer};
pub use error::NetError;
pub use logger::{EventBus, EventFilter, LogEvent, LogLevel};
pub use wire::{CableId, CableKind, PortId};

/// Install the console `tracing` subscriber. Honors `RUST_LOG`, defaulting
/// to `netlab=info`. Call once from the embedding application; tests and
/// library consumers that bring their own subscriber skip it.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netlab=info".into()),
        )
        .init();
}

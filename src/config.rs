//! Centralized runtime constants for the simulator.
//!
//! All tunable intervals, thresholds, and counts are collected here so they can
//! be found and adjusted in a single place rather than scattered across modules.

/// Default time-to-live stamped on IPv4 packets originated by hosts.
pub const DEFAULT_TTL: u8 = 64;

/// Default MTU assigned to a freshly created port (bytes).
pub const DEFAULT_MTU: u32 = 1500;

/// Default port speed before negotiation (Mb/s).
pub const DEFAULT_SPEED_MBPS: u32 = 1000;

/// Seconds a dynamic MAC-table entry survives without being refreshed.
pub const MAC_AGING_SECS: u64 = 300;

/// Interval of the MAC-table aging sweep (seconds of virtual time).
pub const MAC_AGING_SWEEP_SECS: u64 = 1;

/// Interval at which STP port states advance one stage (seconds of virtual time).
pub const STP_ADVANCE_SECS: u64 = 2;

/// Maximum events retained by the logger ring buffer before it halves itself.
pub const LOG_RING_CAPACITY: usize = 10_000;

/// Hop cap for traceroute probes.
pub const TRACEROUTE_MAX_HOPS: u8 = 30;

/// Default number of echo probes sent by `ping` when `-c` is not given.
pub const PING_DEFAULT_COUNT: u32 = 4;

/// Default DHCP lease duration handed out by pools that do not override it (seconds).
pub const DHCP_DEFAULT_LEASE_SECS: u64 = 86_400;

/// Fraction of the lease after which the DHCP client enters RENEWING (T1).
pub const DHCP_T1_FRACTION: f64 = 0.5;

/// Fraction of the lease after which the DHCP client enters REBINDING (T2).
pub const DHCP_T2_FRACTION: f64 = 0.875;

/// Secure MAC addresses a port may learn before port security triggers, by default.
pub const PORT_SECURITY_DEFAULT_MAX: usize = 1;

/// Upper bound for configurable VLAN ids (802.1Q 12-bit space, 4095 reserved).
pub const VLAN_MAX: u16 = 4094;

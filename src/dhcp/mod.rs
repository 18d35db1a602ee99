//! DHCP: the server (pools, bindings, DORA responses) and the per-interface
//! client state machine. The exchange runs over real simulated frames
//! (UDP 67/68 in IPv4 broadcast), so it traverses switches and VLANs like
//! any other traffic.

mod client;
mod server;

pub use client::{DhclientOptions, DhcpClient, DhcpClientState, DhcpLease};
pub use server::{BindingKind, DhcpBinding, DhcpPool, DhcpServer, DhcpServerStats, OfferDecision};

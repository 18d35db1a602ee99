//! The wire model: ports, cables, and their stable handles.
//!
//! Ports and cables reference each other by id, never by pointer; the
//! `World` arena (see `device`) owns both sides and mediates delivery.

mod cable;
mod port;

pub use cable::{Cable, CableKind, CableSpec};
pub use port::{
    Duplex, Ipv6Binding, Ipv6Origin, Port, PortCounters, PortSecurity, SecurityVerdict,
    ViolationMode,
};

use serde::{Deserialize, Serialize};

/// Stable handle to a `Port` in the world arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub u32);

/// Stable handle to a `Cable` in the world arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CableId(pub u32);

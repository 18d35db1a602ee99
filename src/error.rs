//! Unified error type for the simulation engine.
//!
//! `NetError` is the single error type returned by addressing parsers, the
//! wire model, the device control planes, and the CLI shells. It serializes
//! as `{ "kind": "...", "message": "..." }` so an embedding UI can
//! programmatically distinguish error categories.

use serde::ser::SerializeStruct;

/// Engine-level error returned by all fallible simulator operations.
///
/// Each variant maps to a distinct failure domain. Observers receive a JSON
/// object with `kind` (variant name) and `message` (human-readable description).
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Malformed MAC / IP / mask / hex input.
    #[error("{0}")]
    Parse(String),

    /// Out-of-range value (MAC octet, VLAN id, cable length, MTU, port speed).
    #[error("{0}")]
    Validation(String),

    /// Unreachable next-hop, VLAN-1 deletion, unknown interface, bad CLI input.
    #[error("{0}")]
    Configuration(String),

    /// Send attempted on a down or disconnected port, or over a down cable.
    #[error("{0}")]
    Link(String),

    /// ARP timeout, DHCP NAK, no offers received, checksum mismatch on receive.
    #[error("{0}")]
    Protocol(String),

    /// Port-security violation, STP-blocked egress, trunk disallowed VLAN.
    #[error("{0}")]
    Policy(String),
}

impl NetError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            NetError::Parse(_) => "Parse",
            NetError::Validation(_) => "Validation",
            NetError::Configuration(_) => "Configuration",
            NetError::Link(_) => "Link",
            NetError::Protocol(_) => "Protocol",
            NetError::Policy(_) => "Policy",
        }
    }
}

/// Custom Serialize: produces `{ "kind": "Variant", "message": "..." }` for observers.
impl serde::Serialize for NetError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("NetError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

// ---- From implementations for ergonomic error conversion ----

impl From<std::num::ParseIntError> for NetError {
    fn from(err: std::num::ParseIntError) -> Self {
        NetError::Parse(err.to_string())
    }
}

impl From<anyhow::Error> for NetError {
    fn from(err: anyhow::Error) -> Self {
        NetError::Configuration(err.to_string())
    }
}

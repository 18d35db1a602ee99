//! Point-to-point cables.

use serde::Serialize;

use crate::error::NetError;
use crate::wire::{CableId, PortId};

/// Physical cable families, each with a spec-sheet row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CableKind {
    Cat5e,
    Cat6,
    Cat6a,
    FiberSingleMode,
    FiberMultiMode,
    Crossover,
    Serial,
}

/// Electrical/optical limits of a cable family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CableSpec {
    pub max_speed_mbps: u32,
    pub max_length_m: f64,
    /// Signal propagation, nanoseconds per meter. Reported as metadata only;
    /// delivery stays synchronous.
    pub ns_per_meter: f64,
}

impl CableKind {
    pub fn spec(&self) -> CableSpec {
        match self {
            CableKind::Cat5e => CableSpec {
                max_speed_mbps: 1_000,
                max_length_m: 100.0,
                ns_per_meter: 5.0,
            },
            CableKind::Cat6 => CableSpec {
                max_speed_mbps: 10_000,
                max_length_m: 55.0,
                ns_per_meter: 5.0,
            },
            CableKind::Cat6a => CableSpec {
                max_speed_mbps: 10_000,
                max_length_m: 100.0,
                ns_per_meter: 5.0,
            },
            CableKind::FiberSingleMode => CableSpec {
                max_speed_mbps: 100_000,
                max_length_m: 10_000.0,
                ns_per_meter: 4.9,
            },
            CableKind::FiberMultiMode => CableSpec {
                max_speed_mbps: 10_000,
                max_length_m: 550.0,
                ns_per_meter: 4.9,
            },
            CableKind::Crossover => CableSpec {
                max_speed_mbps: 100,
                max_length_m: 100.0,
                ns_per_meter: 5.0,
            },
            CableKind::Serial => CableSpec {
                max_speed_mbps: 2,
                max_length_m: 15.0,
                ns_per_meter: 5.0,
            },
        }
    }
}

/// A connected point-to-point link between two ports.
#[derive(Debug, Clone)]
pub struct Cable {
    pub id: CableId,
    pub kind: CableKind,
    pub a: PortId,
    pub b: PortId,
    pub up: bool,
    pub length_m: f64,
    /// Probability a transmitted frame is dropped, in `[0, 1]`.
    pub packet_loss_rate: f64,
    pub frames_transmitted: u64,
    pub frames_lost: u64,
}

impl Cable {
    pub fn new(
        id: CableId,
        kind: CableKind,
        a: PortId,
        b: PortId,
        length_m: f64,
    ) -> Result<Self, NetError> {
        let spec = kind.spec();
        if length_m <= 0.0 || length_m > spec.max_length_m {
            return Err(NetError::Validation(format!(
                "cable length {length_m} m out of range (max {} m for {kind:?})",
                spec.max_length_m
            )));
        }
        Ok(Self {
            id,
            kind,
            a,
            b,
            up: true,
            length_m,
            packet_loss_rate: 0.0,
            frames_transmitted: 0,
            frames_lost: 0,
        })
    }

    pub fn set_packet_loss_rate(&mut self, rate: f64) -> Result<(), NetError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(NetError::Validation(format!(
                "packet loss rate {rate} outside [0, 1]"
            )));
        }
        self.packet_loss_rate = rate;
        Ok(())
    }

    /// The far end relative to `port`, if `port` is attached at all.
    pub fn opposite(&self, port: PortId) -> Option<PortId> {
        if port == self.a {
            Some(self.b)
        } else if port == self.b {
            Some(self.a)
        } else {
            None
        }
    }

    /// One-way propagation delay metadata.
    pub fn propagation_ns(&self) -> f64 {
        self.length_m * self.kind.spec().ns_per_meter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_validation_per_kind() {
        assert!(Cable::new(CableId(1), CableKind::Cat5e, PortId(1), PortId(2), 100.0).is_ok());
        assert!(Cable::new(CableId(1), CableKind::Cat5e, PortId(1), PortId(2), 101.0).is_err());
        assert!(Cable::new(CableId(1), CableKind::Cat6, PortId(1), PortId(2), 56.0).is_err());
        assert!(
            Cable::new(CableId(1), CableKind::FiberSingleMode, PortId(1), PortId(2), 5000.0)
                .is_ok()
        );
        assert!(Cable::new(CableId(1), CableKind::Serial, PortId(1), PortId(2), 0.0).is_err());
    }

    #[test]
    fn test_loss_rate_bounds() {
        let mut cable =
            Cable::new(CableId(1), CableKind::Cat5e, PortId(1), PortId(2), 10.0).unwrap();
        assert!(cable.set_packet_loss_rate(0.5).is_ok());
        assert!(cable.set_packet_loss_rate(1.0).is_ok());
        assert!(cable.set_packet_loss_rate(-0.1).is_err());
        assert!(cable.set_packet_loss_rate(1.1).is_err());
    }

    #[test]
    fn test_opposite_end() {
        let cable = Cable::new(CableId(1), CableKind::Cat5e, PortId(7), PortId(9), 10.0).unwrap();
        assert_eq!(cable.opposite(PortId(7)), Some(PortId(9)));
        assert_eq!(cable.opposite(PortId(9)), Some(PortId(7)));
        assert_eq!(cable.opposite(PortId(8)), None);
    }

    #[test]
    fn test_propagation_metadata() {
        let cable = Cable::new(CableId(1), CableKind::Cat5e, PortId(1), PortId(2), 100.0).unwrap();
        assert!((cable.propagation_ns() - 500.0).abs() < f64::EPSILON);
    }
}

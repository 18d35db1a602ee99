//! Spanning-tree port states.
//!
//! Only the per-port state machine is modelled; there is no BPDU exchange.
//! Cisco-flavored switches boot ports straight to `Forwarding` (PortFast
//! behavior); Huawei-flavored ones boot to `Listening` and walk
//! `Listening -> Learning -> Forwarding` on timer ticks.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StpState {
    Blocking,
    Listening,
    Learning,
    Forwarding,
    Disabled,
}

impl StpState {
    /// May source addresses be learned from frames on this port?
    pub fn can_learn(&self) -> bool {
        matches!(self, StpState::Learning | StpState::Forwarding)
    }

    /// May frames be forwarded to/from this port?
    pub fn can_forward(&self) -> bool {
        matches!(self, StpState::Forwarding)
    }

    /// One timer tick of convergence. Blocking and Disabled hold.
    pub fn advance(&self) -> StpState {
        match self {
            StpState::Listening => StpState::Learning,
            StpState::Learning => StpState::Forwarding,
            other => *other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StpState::Blocking => "blocking",
            StpState::Listening => "listening",
            StpState::Learning => "learning",
            StpState::Forwarding => "forwarding",
            StpState::Disabled => "disabled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_walks_to_forwarding() {
        let mut s = StpState::Listening;
        s = s.advance();
        assert_eq!(s, StpState::Learning);
        s = s.advance();
        assert_eq!(s, StpState::Forwarding);
        s = s.advance();
        assert_eq!(s, StpState::Forwarding, "forwarding is terminal");
    }

    #[test]
    fn test_blocking_and_disabled_hold() {
        assert_eq!(StpState::Blocking.advance(), StpState::Blocking);
        assert_eq!(StpState::Disabled.advance(), StpState::Disabled);
    }

    #[test]
    fn test_gating_predicates() {
        assert!(!StpState::Blocking.can_learn());
        assert!(!StpState::Listening.can_learn());
        assert!(StpState::Learning.can_learn());
        assert!(!StpState::Learning.can_forward());
        assert!(StpState::Forwarding.can_learn());
        assert!(StpState::Forwarding.can_forward());
        assert!(!StpState::Disabled.can_forward());
    }
}

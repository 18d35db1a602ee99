//! The learned-address table, keyed by (VLAN, MAC).

use std::collections::BTreeMap;

use crate::addr::MacAddr;
use crate::config;
use crate::wire::PortId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacEntryKind {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy)]
pub struct MacEntry {
    pub port: PortId,
    pub kind: MacEntryKind,
    pub last_seen_ms: u64,
}

/// Result of learning one source address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnOutcome {
    /// New entry, or refresh on the same port.
    Learned,
    /// A dynamic entry moved to a different port (flap or station move).
    Moved { from: PortId },
    /// A static entry pins this (vlan, mac); learning is ignored.
    PinnedStatic,
}

/// Per-switch MAC table with aging.
#[derive(Debug)]
pub struct MacTable {
    entries: BTreeMap<(u16, MacAddr), MacEntry>,
    pub aging_secs: u64,
    pub mac_moves: u64,
}

impl MacTable {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            aging_secs: config::MAC_AGING_SECS,
            mac_moves: 0,
        }
    }

    pub fn lookup(&self, vid: u16, mac: MacAddr) -> Option<&MacEntry> {
        self.entries.get(&(vid, mac))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(u16, MacAddr), &MacEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Learn `mac` on `port` in `vid`. Static entries win over learning.
    pub fn learn(&mut self, vid: u16, mac: MacAddr, port: PortId, now_ms: u64) -> LearnOutcome {
        match self.entries.get_mut(&(vid, mac)) {
            Some(entry) if entry.kind == MacEntryKind::Static => LearnOutcome::PinnedStatic,
            Some(entry) => {
                let outcome = if entry.port != port {
                    self.mac_moves += 1;
                    LearnOutcome::Moved { from: entry.port }
                } else {
                    LearnOutcome::Learned
                };
                entry.port = port;
                entry.last_seen_ms = now_ms;
                outcome
            }
            None => {
                self.entries.insert(
                    (vid, mac),
                    MacEntry {
                        port,
                        kind: MacEntryKind::Dynamic,
                        last_seen_ms: now_ms,
                    },
                );
                LearnOutcome::Learned
            }
        }
    }

    /// Install a static entry, replacing anything at that key.
    pub fn add_static(&mut self, vid: u16, mac: MacAddr, port: PortId, now_ms: u64) {
        self.entries.insert(
            (vid, mac),
            MacEntry {
                port,
                kind: MacEntryKind::Static,
                last_seen_ms: now_ms,
            },
        );
    }

    /// Evict dynamic entries last refreshed more than `aging_secs` ago.
    /// Static entries are immune. Returns the eviction count.
    pub fn sweep(&mut self, now_ms: u64) -> usize {
        let horizon = self.aging_secs * 1000;
        let before = self.entries.len();
        self.entries.retain(|_, e| {
            e.kind == MacEntryKind::Static || now_ms.saturating_sub(e.last_seen_ms) <= horizon
        });
        before - self.entries.len()
    }

    /// Drop every entry in `vid` (used when the VLAN is deleted).
    pub fn remove_vlan(&mut self, vid: u16) {
        self.entries.retain(|(v, _), _| *v != vid);
    }

    /// Drop every entry pointing at `port` (used on link-down).
    pub fn remove_port(&mut self, port: PortId) {
        self.entries.retain(|_, e| e.port != port);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for MacTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(n: u8) -> MacAddr {
        MacAddr::from_octets([2, 0, 0, 0, 0, n])
    }

    #[test]
    fn test_learn_and_lookup() {
        let mut table = MacTable::new();
        assert_eq!(table.learn(1, mac(1), PortId(10), 0), LearnOutcome::Learned);
        let entry = table.lookup(1, mac(1)).unwrap();
        assert_eq!(entry.port, PortId(10));
        assert_eq!(entry.kind, MacEntryKind::Dynamic);
    }

    #[test]
    fn test_lookup_is_per_vlan() {
        let mut table = MacTable::new();
        table.learn(1, mac(1), PortId(10), 0);
        assert!(table.lookup(2, mac(1)).is_none(), "vlan 2 has no entry");
    }

    #[test]
    fn test_relearn_on_other_port_counts_move() {
        let mut table = MacTable::new();
        table.learn(1, mac(1), PortId(10), 0);
        let outcome = table.learn(1, mac(1), PortId(11), 5);
        assert_eq!(outcome, LearnOutcome::Moved { from: PortId(10) });
        assert_eq!(table.mac_moves, 1);
        assert_eq!(table.lookup(1, mac(1)).unwrap().port, PortId(11));
    }

    #[test]
    fn test_static_entry_pins_port() {
        let mut table = MacTable::new();
        table.add_static(1, mac(1), PortId(10), 0);
        let outcome = table.learn(1, mac(1), PortId(11), 5);
        assert_eq!(outcome, LearnOutcome::PinnedStatic);
        assert_eq!(table.lookup(1, mac(1)).unwrap().port, PortId(10));
    }

    #[test]
    fn test_sweep_evicts_only_stale_dynamic() {
        let mut table = MacTable::new();
        table.aging_secs = 300;
        table.learn(1, mac(1), PortId(10), 0);
        table.learn(1, mac(2), PortId(11), 200_000);
        table.add_static(1, mac(3), PortId(12), 0);

        // At t=301s the first entry is 301s old (stale), the second 101s.
        let evicted = table.sweep(301_000);
        assert_eq!(evicted, 1);
        assert!(table.lookup(1, mac(1)).is_none());
        assert!(table.lookup(1, mac(2)).is_some());
        assert!(table.lookup(1, mac(3)).is_some(), "static is immune");
    }

    #[test]
    fn test_refresh_resets_age() {
        let mut table = MacTable::new();
        table.aging_secs = 300;
        table.learn(1, mac(1), PortId(10), 0);
        table.learn(1, mac(1), PortId(10), 250_000);
        assert_eq!(table.sweep(400_000), 0, "refreshed at 250s, only 150s old");
    }

    #[test]
    fn test_remove_vlan_and_port() {
        let mut table = MacTable::new();
        table.learn(1, mac(1), PortId(10), 0);
        table.learn(2, mac(2), PortId(10), 0);
        table.learn(2, mac(3), PortId(11), 0);

        table.remove_vlan(2);
        assert_eq!(table.len(), 1);

        table.remove_port(PortId(10));
        assert!(table.is_empty());
    }
}

//! The VLAN database and the `1,10,20-30`-style list syntax.

use std::collections::{BTreeMap, BTreeSet};

use crate::config;
use crate::error::NetError;
use crate::wire::PortId;

/// One VLAN: a name and the set of access ports currently active in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vlan {
    pub name: String,
    pub ports: BTreeSet<PortId>,
}

/// The per-switch VLAN database. VLAN 1 always exists and cannot be deleted.
#[derive(Debug)]
pub struct VlanDb {
    vlans: BTreeMap<u16, Vlan>,
}

impl VlanDb {
    pub fn new() -> Self {
        let mut vlans = BTreeMap::new();
        vlans.insert(
            1,
            Vlan {
                name: "default".to_string(),
                ports: BTreeSet::new(),
            },
        );
        Self { vlans }
    }

    pub fn contains(&self, vid: u16) -> bool {
        self.vlans.contains_key(&vid)
    }

    pub fn get(&self, vid: u16) -> Option<&Vlan> {
        self.vlans.get(&vid)
    }

    pub fn get_mut(&mut self, vid: u16) -> Option<&mut Vlan> {
        self.vlans.get_mut(&vid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u16, &Vlan)> {
        self.vlans.iter()
    }

    /// Create `vid` if absent and return it. Rejects out-of-range ids.
    pub fn create(&mut self, vid: u16) -> Result<&mut Vlan, NetError> {
        if vid == 0 || vid > config::VLAN_MAX {
            return Err(NetError::Validation(format!("invalid VLAN id: {vid}")));
        }
        Ok(self.vlans.entry(vid).or_insert_with(|| Vlan {
            name: format!("VLAN{vid:04}"),
            ports: BTreeSet::new(),
        }))
    }

    /// Remove `vid`. VLAN 1 is permanent.
    pub fn delete(&mut self, vid: u16) -> Result<Vlan, NetError> {
        if vid == 1 {
            return Err(NetError::Configuration(
                "default VLAN 1 may not be removed".to_string(),
            ));
        }
        self.vlans
            .remove(&vid)
            .ok_or_else(|| NetError::Configuration(format!("VLAN {vid} not found")))
    }

    /// Remove a port from every VLAN's active set.
    pub fn detach_port(&mut self, port: PortId) {
        for vlan in self.vlans.values_mut() {
            vlan.ports.remove(&port);
        }
    }
}

impl Default for VlanDb {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the vendor list syntax `1,10,20-30` into a VLAN id set.
pub fn parse_vlan_list(s: &str) -> Result<BTreeSet<u16>, NetError> {
    let mut out = BTreeSet::new();
    for piece in s.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        if let Some((lo, hi)) = piece.split_once('-') {
            let lo: u16 = lo.trim().parse()?;
            let hi: u16 = hi.trim().parse()?;
            if lo == 0 || hi > config::VLAN_MAX || lo > hi {
                return Err(NetError::Validation(format!("invalid VLAN range: {piece}")));
            }
            out.extend(lo..=hi);
        } else {
            let vid: u16 = piece.parse()?;
            if vid == 0 || vid > config::VLAN_MAX {
                return Err(NetError::Validation(format!("invalid VLAN id: {vid}")));
            }
            out.insert(vid);
        }
    }
    Ok(out)
}

/// Render a VLAN id set back into `1,10,20-30` form.
pub fn format_vlan_list(set: &BTreeSet<u16>) -> String {
    let mut pieces: Vec<String> = Vec::new();
    let mut iter = set.iter().copied().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end = iter.next().unwrap();
        }
        if end == start {
            pieces.push(start.to_string());
        } else {
            pieces.push(format!("{start}-{end}"));
        }
    }
    pieces.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_db_has_default_vlan() {
        let db = VlanDb::new();
        assert!(db.contains(1));
        assert_eq!(db.get(1).unwrap().name, "default");
    }

    #[test]
    fn test_create_assigns_default_name() {
        let mut db = VlanDb::new();
        db.create(10).unwrap();
        assert_eq!(db.get(10).unwrap().name, "VLAN0010");
    }

    #[test]
    fn test_create_validates_range() {
        let mut db = VlanDb::new();
        assert!(db.create(0).is_err());
        assert!(db.create(4095).is_err());
        assert!(db.create(4094).is_ok());
    }

    #[test]
    fn test_create_existing_is_idempotent() {
        let mut db = VlanDb::new();
        db.create(10).unwrap().name = "SALES".to_string();
        db.create(10).unwrap();
        assert_eq!(db.get(10).unwrap().name, "SALES", "re-create keeps the name");
    }

    #[test]
    fn test_delete_vlan_one_is_rejected() {
        let mut db = VlanDb::new();
        let err = db.delete(1).unwrap_err();
        assert_eq!(err.kind(), "Configuration");
        assert!(db.contains(1));
    }

    #[test]
    fn test_delete_missing_vlan_errors() {
        let mut db = VlanDb::new();
        assert!(db.delete(99).is_err());
    }

    #[test]
    fn test_detach_port_sweeps_all_vlans() {
        let mut db = VlanDb::new();
        db.get_mut(1).unwrap().ports.insert(PortId(5));
        db.create(10).unwrap().ports.insert(PortId(5));
        db.detach_port(PortId(5));
        assert!(db.get(1).unwrap().ports.is_empty());
        assert!(db.get(10).unwrap().ports.is_empty());
    }

    #[test]
    fn test_parse_vlan_list_forms() {
        let set = parse_vlan_list("1,10,20-23").unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![1, 10, 20, 21, 22, 23]);
    }

    #[test]
    fn test_parse_vlan_list_rejects_bad_ranges() {
        assert!(parse_vlan_list("30-20").is_err(), "descending range");
        assert!(parse_vlan_list("0").is_err());
        assert!(parse_vlan_list("4095").is_err());
        assert!(parse_vlan_list("ten").is_err());
    }

    #[test]
    fn test_format_vlan_list_collapses_runs() {
        let set: BTreeSet<u16> = [1, 10, 20, 21, 22, 30].into_iter().collect();
        assert_eq!(format_vlan_list(&set), "1,10,20-22,30");
    }

    #[test]
    fn test_list_round_trip() {
        let original = "1,5-7,100";
        let set = parse_vlan_list(original).unwrap();
        assert_eq!(format_vlan_list(&set), original);
    }
}

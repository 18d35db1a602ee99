//! The vendor CLI layer: the command trie, pipe filtering, interface name
//! resolution, and the per-vendor shells.

mod cisco;
mod host_shell;
mod huawei;
mod trie;

pub use cisco::{CiscoMode, CiscoShell};
pub use host_shell::HostShell;
pub use huawei::{HuaweiShell, HuaweiView};
pub use trie::{CommandTrie, Completion, Handler, Resolution};

use crate::addr::MacAddr;

/// One `| include` / `| exclude` stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeFilter {
    Include(String),
    Exclude(String),
}

/// Split an input line into the base command and its pipe stages.
/// `grep` and `findstr` are `include` aliases; an unknown stage keyword is
/// treated as an include pattern wholesale, matching nothing fancy.
pub fn split_pipeline(line: &str) -> (String, Vec<PipeFilter>) {
    let mut parts = line.split('|');
    let base = parts.next().unwrap_or_default().trim().to_string();
    let filters = parts
        .filter_map(|stage| {
            let stage = stage.trim();
            if stage.is_empty() {
                return None;
            }
            let (keyword, pattern) = match stage.split_once(char::is_whitespace) {
                Some((k, p)) => (k, p.trim().to_string()),
                None => (stage, String::new()),
            };
            match keyword.to_ascii_lowercase().as_str() {
                "include" | "grep" | "findstr" => Some(PipeFilter::Include(pattern)),
                "exclude" => Some(PipeFilter::Exclude(pattern)),
                _ => Some(PipeFilter::Include(stage.to_string())),
            }
        })
        .collect();
    (base, filters)
}

/// Apply pipe stages: case-insensitive substring match over output lines.
pub fn apply_filters(output: &str, filters: &[PipeFilter]) -> String {
    if filters.is_empty() {
        return output.to_string();
    }
    output
        .lines()
        .filter(|line| {
            let lower = line.to_ascii_lowercase();
            filters.iter().all(|f| match f {
                PipeFilter::Include(p) => lower.contains(&p.to_ascii_lowercase()),
                PipeFilter::Exclude(p) => !lower.contains(&p.to_ascii_lowercase()),
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Resolve a user-typed interface name to its canonical form:
/// `fa`/`fas`/…/`fastethernet` plus `0/1` become `FastEthernet0/1`,
/// `gi…` becomes `GigabitEthernet…`, and the literal `eth<n>` passes
/// through. Embedded whitespace (`fa 0/1`) is tolerated.
pub fn resolve_interface_name(input: &str) -> Option<String> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let split = cleaned
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(cleaned.len());
    let (alpha, numeric) = cleaned.split_at(split);
    if alpha.is_empty() || numeric.is_empty() {
        return None;
    }
    let lower = alpha.to_ascii_lowercase();
    if lower.len() >= 2 && "fastethernet".starts_with(lower.as_str()) {
        return Some(format!("FastEthernet{numeric}"));
    }
    if lower.len() >= 2 && "gigabitethernet".starts_with(lower.as_str()) {
        return Some(format!("GigabitEthernet{numeric}"));
    }
    if lower == "eth" {
        return Some(format!("eth{numeric}"));
    }
    None
}

/// `FastEthernet0/1` -> `Fa0/1`, `GigabitEthernet0/2` -> `Gi0/2`.
pub fn short_interface_name(name: &str) -> String {
    if let Some(rest) = name.strip_prefix("FastEthernet") {
        return format!("Fa{rest}");
    }
    if let Some(rest) = name.strip_prefix("GigabitEthernet") {
        return format!("Gi{rest}");
    }
    name.to_string()
}

/// Cisco's dotted-triplet MAC rendering: `0200.0000.0001`.
pub fn cisco_mac(mac: &MacAddr) -> String {
    let o = mac.octets();
    format!(
        "{:02x}{:02x}.{:02x}{:02x}.{:02x}{:02x}",
        o[0], o[1], o[2], o[3], o[4], o[5]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pipeline_basic() {
        let (base, filters) = split_pipeline("show running-config | include vlan");
        assert_eq!(base, "show running-config");
        assert_eq!(filters, vec![PipeFilter::Include("vlan".to_string())]);
    }

    #[test]
    fn test_split_pipeline_aliases_and_chaining() {
        let (_, filters) = split_pipeline("show run | grep interface | exclude Gi");
        assert_eq!(
            filters,
            vec![
                PipeFilter::Include("interface".to_string()),
                PipeFilter::Exclude("Gi".to_string()),
            ]
        );
        let (_, filters) = split_pipeline("show run | findstr vlan");
        assert_eq!(filters, vec![PipeFilter::Include("vlan".to_string())]);
    }

    #[test]
    fn test_apply_filters_case_insensitive() {
        let output = "interface FastEthernet0/1\n shutdown\ninterface GigabitEthernet0/1";
        let filtered = apply_filters(
            output,
            &[PipeFilter::Include("FASTETHERNET".to_string())],
        );
        assert_eq!(filtered, "interface FastEthernet0/1");
    }

    #[test]
    fn test_apply_filters_exclude() {
        let output = "a 1\nb 2\na 3";
        let filtered = apply_filters(output, &[PipeFilter::Exclude("a".to_string())]);
        assert_eq!(filtered, "b 2");
    }

    #[test]
    fn test_resolve_interface_abbreviations() {
        for form in ["fa0/1", "fas0/1", "fast0/1", "fastethernet0/1", "Fa0/1", "fa 0/1"] {
            assert_eq!(
                resolve_interface_name(form).as_deref(),
                Some("FastEthernet0/1"),
                "{form} should resolve"
            );
        }
        assert_eq!(
            resolve_interface_name("gi0/2").as_deref(),
            Some("GigabitEthernet0/2")
        );
        assert_eq!(resolve_interface_name("eth0").as_deref(), Some("eth0"));
    }

    #[test]
    fn test_resolve_interface_rejects_unknown() {
        assert!(resolve_interface_name("f0/1").is_none(), "one letter is too short");
        assert!(resolve_interface_name("xe0/1").is_none());
        assert!(resolve_interface_name("fa").is_none(), "no number");
        assert!(resolve_interface_name("0/1").is_none(), "no family");
    }

    #[test]
    fn test_short_interface_name() {
        assert_eq!(short_interface_name("FastEthernet0/1"), "Fa0/1");
        assert_eq!(short_interface_name("GigabitEthernet0/2"), "Gi0/2");
        assert_eq!(short_interface_name("eth0"), "eth0");
    }

    #[test]
    fn test_cisco_mac_format() {
        let mac: MacAddr = "02:00:00:00:00:1a".parse().unwrap();
        assert_eq!(cisco_mac(&mac), "0200.0000.001a");
    }
}

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PREROUTING: &str = "PREROUTING";
pub const INPUT: &str = "INPUT";
pub const FORWARD: &str = "FORWARD";
pub const OUTPUT: &str = "OUTPUT";
pub const POSTROUTING: &str = "POSTROUTING";

/// Where the simulated packet enters the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketOrigin {
    /// Arrives from the network and is delivered locally
    #[serde(alias = "incoming")]
    Outside,
    /// Arrives from the network and is routed through
    #[serde(alias = "forwarded")]
    Forward,
    /// Generated by a local process
    #[serde(alias = "local", alias = "outgoing")]
    Inside,
}

impl PacketOrigin {
    pub const ALL: [PacketOrigin; 3] = [Self::Outside, Self::Forward, Self::Inside];

    /// Netfilter hooks the packet passes, in order
    pub fn hooks(&self) -> &'static [&'static str] {
        match self {
            Self::Outside => &[PREROUTING, INPUT],
            Self::Forward => &[PREROUTING, FORWARD, POSTROUTING],
            Self::Inside => &[OUTPUT, POSTROUTING],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outside => "outside",
            Self::Forward => "forward",
            Self::Inside => "inside",
        }
    }
}

impl fmt::Display for PacketOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PacketOrigin {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "outside" | "incoming" => Ok(Self::Outside),
            "forward" | "forwarded" => Ok(Self::Forward),
            "inside" | "local" | "outgoing" => Ok(Self::Inside),
            other => bail!(
                "Unknown packet origin '{}' (expected outside, forward or inside)",
                other
            ),
        }
    }
}

/// Tables consulted at a hook, highest priority first.
///
/// Unknown hook names have no tables.
pub fn tables_for_hook(hook: &str) -> &'static [&'static str] {
    match hook.to_ascii_uppercase().as_str() {
        PREROUTING => &["raw", "mangle", "nat"],
        INPUT => &["mangle", "nat", "filter", "security"],
        FORWARD => &["mangle", "filter", "security"],
        OUTPUT => &["raw", "mangle", "nat", "filter", "security"],
        POSTROUTING => &["mangle", "nat"],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_parsing_accepts_aliases() {
        assert_eq!("outside".parse::<PacketOrigin>().unwrap(), PacketOrigin::Outside);
        assert_eq!("Forward".parse::<PacketOrigin>().unwrap(), PacketOrigin::Forward);
        assert_eq!("local".parse::<PacketOrigin>().unwrap(), PacketOrigin::Inside);
        assert!("sideways".parse::<PacketOrigin>().is_err());
    }

    #[test]
    fn forwarded_packets_skip_local_hooks() {
        let hooks = PacketOrigin::Forward.hooks();
        assert_eq!(hooks, &[PREROUTING, FORWARD, POSTROUTING]);
        assert!(!hooks.contains(&INPUT));
        assert!(!hooks.contains(&OUTPUT));
    }

    #[test]
    fn raw_precedes_nat_at_prerouting() {
        let tables = tables_for_hook("prerouting");
        let raw = tables.iter().position(|t| *t == "raw").unwrap();
        let nat = tables.iter().position(|t| *t == "nat").unwrap();
        assert!(raw < nat);
        assert!(tables_for_hook("NOT_A_HOOK").is_empty());
    }

    #[test]
    fn display_round_trips() {
        for origin in PacketOrigin::ALL {
            assert_eq!(origin.to_string().parse::<PacketOrigin>().unwrap(), origin);
        }
    }
}

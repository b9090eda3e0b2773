// Target extensions from iptables(8). These decide the packet's fate (or
// annotate it) instead of continuing in another chain.
const SPECIAL_TARGETS: &[&str] = &[
    "balance",
    "classify",
    "clusterip",
    "connmark",
    "dnat",
    "dscp",
    "ecn",
    "ipmark",
    "ipv4optsstrip",
    "log",
    "mark",
    "masquerade",
    "mirror",
    "netmap",
    "nfqueue",
    "notrack",
    "redirect",
    "reject",
    "same",
    "set",
    "snat",
    "tarpit",
    "tcpmss",
    "tos",
    "trace",
    "ttl",
    "ulog",
    "xor",
];

/// Whether a `-j` value names a target extension rather than a chain
pub fn is_special_target(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    SPECIAL_TARGETS.contains(&lowered.as_str())
}

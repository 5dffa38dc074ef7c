use libpcap_tools::Error;
use pnet_packet::ipv4::MutableIpv4Packet;
use pnet_packet::ipv6::MutableIpv6Packet;
use tracing::trace;

/// TTL / hop limit rewrite rule
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TtlMode {
    #[default]
    Off,
    /// Assign a fixed value
    Set(u8),
    /// Increase, saturating at 255
    Add(u8),
    /// Decrease, never going below 1
    Sub(u8),
}

impl TtlMode {
    /// Build a mode from its configuration name (`off`, `set`, `add`, `sub`) and value
    pub fn from_parts(mode: &str, value: Option<u8>) -> Result<TtlMode, Error> {
        let need_value = || {
            value.ok_or_else(|| Error::InvalidConfig(format!("ttl mode '{mode}' requires a value")))
        };
        match mode {
            "off" => Ok(TtlMode::Off),
            "set" => Ok(TtlMode::Set(need_value()?)),
            "add" => Ok(TtlMode::Add(need_value()?)),
            "sub" => Ok(TtlMode::Sub(need_value()?)),
            _ => Err(Error::InvalidConfig(format!(
                "invalid ttl mode: {mode} not among off|set|add|sub"
            ))),
        }
    }

    /// Compute the new TTL
    pub fn apply(self, ttl: u8) -> u8 {
        match self {
            TtlMode::Off => ttl,
            TtlMode::Set(v) => v,
            TtlMode::Add(v) => ttl.saturating_add(v),
            TtlMode::Sub(v) => {
                if ttl <= v {
                    1
                } else {
                    ttl - v
                }
            }
        }
    }
}

/// Rewrite the TTL of an IPv4 header. Returns `true` if the field changed.
pub fn rewrite_ipv4_ttl(mode: TtlMode, ip: &mut MutableIpv4Packet) -> bool {
    let old = ip.get_ttl();
    let new = mode.apply(old);
    if new == old {
        return false;
    }
    trace!("TTL {} -> {}", old, new);
    ip.set_ttl(new);
    true
}

/// Rewrite the hop limit of an IPv6 header. Returns `true` if the field changed.
pub fn rewrite_ipv6_hlim(mode: TtlMode, ip6: &mut MutableIpv6Packet) -> bool {
    let old = ip6.get_hop_limit();
    let new = mode.apply(old);
    if new == old {
        return false;
    }
    trace!("hop limit {} -> {}", old, new);
    ip6.set_hop_limit(new);
    true
}

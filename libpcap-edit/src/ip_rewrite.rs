//! Address rewriting on IPv4 and IPv6 headers

use crate::addr::{is_multicast_v6, randomize_v4, randomize_v6};
use crate::chain::{walk_chains, Remappable, Rewritten};
use crate::cidr::CidrMap;
use crate::config::EditConfig;
use crate::layers::Direction;
use pnet_packet::ipv4::MutableIpv4Packet;
use pnet_packet::ipv6::MutableIpv6Packet;
use tracing::trace;

/// Randomize source and destination of an IPv4 header
///
/// Returns `true` if at least one address changed.
pub fn randomize_ipv4(seed: u32, skip_broadcast: bool, ip: &mut MutableIpv4Packet) -> bool {
    let (src, dst) = (ip.get_source(), ip.get_destination());
    trace!("Old Src IP: {}\tOld Dst IP: {}", src, dst);
    let new_src = randomize_v4(seed, skip_broadcast, src);
    let new_dst = randomize_v4(seed, skip_broadcast, dst);
    ip.set_source(new_src);
    ip.set_destination(new_dst);
    trace!("New Src IP: {}\tNew Dst IP: {}", new_src, new_dst);
    new_src != src || new_dst != dst
}

/// Randomize source and destination of an IPv6 header
///
/// With `skip_broadcast`, multicast addresses are left untouched.
/// Returns `true` if at least one address changed.
pub fn randomize_ipv6(seed: u32, skip_broadcast: bool, ip6: &mut MutableIpv6Packet) -> bool {
    let (src, dst) = (ip6.get_source(), ip6.get_destination());
    trace!("Old Src IP: {}\tOld Dst IP: {}", src, dst);
    let mix = |addr: std::net::Ipv6Addr| {
        if skip_broadcast && is_multicast_v6(&addr.octets()) {
            addr
        } else {
            randomize_v6(seed, addr)
        }
    };
    let (new_src, new_dst) = (mix(src), mix(dst));
    ip6.set_source(new_src);
    ip6.set_destination(new_dst);
    trace!("New Src IP: {}\tNew Dst IP: {}", new_src, new_dst);
    new_src != src || new_dst != dst
}

/// Apply an optional direct map to one address. Returns `true` if the rule matched.
fn apply_direct_map<A: Remappable + std::fmt::Display>(
    map: Option<&CidrMap>,
    addr: &mut A,
    skip_broadcast: bool,
    what: &str,
) -> bool {
    match map {
        Some(m) if addr.in_cidr(&m.from) => {
            addr.remap(&m.to, skip_broadcast);
            trace!("Remapped {} addr to: {}", what, addr);
            true
        }
        _ => false,
    }
}

/// Remap a (source, destination) pair: direct maps first, then the chains
fn rewrite_pair<A: Remappable + std::fmt::Display>(
    config: &EditConfig,
    src: &mut A,
    dst: &mut A,
    direction: Direction,
) -> usize {
    let mut changed = Rewritten {
        src: apply_direct_map(config.src_ip_map.as_ref(), src, config.skip_broadcast, "src"),
        dst: apply_direct_map(config.dst_ip_map.as_ref(), dst, config.skip_broadcast, "dst"),
    };
    if !config.cidr_chains.is_empty() {
        let (src_chain, dst_chain) = config.cidr_chains.select(direction);
        let walked = walk_chains(src_chain, dst_chain, src, dst, config.skip_broadcast);
        if walked.src {
            trace!("Remapped src addr to: {}", src);
        }
        if walked.dst {
            trace!("Remapped dst addr to: {}", dst);
        }
        changed.src |= walked.src;
        changed.dst |= walked.dst;
    }
    changed.count()
}

/// Remap IPv4 addresses using the configured subnet maps
///
/// Returns the number of fields (0 to 2) that were rewritten.
pub fn rewrite_ipv4_l3(
    config: &EditConfig,
    ip: &mut MutableIpv4Packet,
    direction: Direction,
) -> usize {
    let (mut src, mut dst) = (ip.get_source(), ip.get_destination());
    let n = rewrite_pair(config, &mut src, &mut dst, direction);
    if n > 0 {
        ip.set_source(src);
        ip.set_destination(dst);
    }
    n
}

/// Remap IPv6 addresses using the configured subnet maps
///
/// Returns the number of fields (0 to 2) that were rewritten.
pub fn rewrite_ipv6_l3(
    config: &EditConfig,
    ip6: &mut MutableIpv6Packet,
    direction: Direction,
) -> usize {
    let (mut src, mut dst) = (ip6.get_source(), ip6.get_destination());
    let n = rewrite_pair(config, &mut src, &mut dst, direction);
    if n > 0 {
        ip6.set_source(src);
        ip6.set_destination(dst);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cidr::CidrChains;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn ipv4_header(src: [u8; 4], dst: [u8; 4]) -> [u8; 20] {
        let mut h = [0u8; 20];
        h[0] = 0x45;
        h[12..16].copy_from_slice(&src);
        h[16..20].copy_from_slice(&dst);
        h
    }

    fn ipv6_header(src: &str, dst: &str) -> [u8; 40] {
        let mut h = [0u8; 40];
        h[0] = 0x60;
        h[8..24].copy_from_slice(&src.parse::<Ipv6Addr>().unwrap().octets());
        h[24..40].copy_from_slice(&dst.parse::<Ipv6Addr>().unwrap().octets());
        h
    }

    #[test]
    fn randomize_ipv4_header() {
        let mut data = ipv4_header([10, 0, 0, 1], [224, 0, 0, 5]);
        let mut ip = MutableIpv4Packet::new(&mut data).expect("Ipv4Packet");
        assert!(randomize_ipv4(0x1234_5678, true, &mut ip));
        assert_eq!(ip.get_source(), Ipv4Addr::new(22, 52, 86, 121));
        assert_eq!(ip.get_destination(), Ipv4Addr::new(224, 0, 0, 5));
    }

    #[test]
    fn randomize_ipv6_header_skips_multicast() {
        let mut data = ipv6_header("2001:db8::1", "ff02::1");
        let mut ip6 = MutableIpv6Packet::new(&mut data).expect("Ipv6Packet");
        assert!(randomize_ipv6(0x1234_5678, true, &mut ip6));
        assert_eq!(ip6.get_destination(), "ff02::1".parse::<Ipv6Addr>().unwrap());
        assert_ne!(ip6.get_source(), "2001:db8::1".parse::<Ipv6Addr>().unwrap());
    }

    #[test]
    fn rewrite_ipv4_with_chains() {
        let config = EditConfig {
            cidr_chains: CidrChains::new(
                vec!["192.168.0.0/16:10.1.0.0/16".parse().unwrap()],
                vec!["8.8.8.0/24:10.2.2.0/24".parse().unwrap()],
            ),
            ..EditConfig::default()
        };
        let mut data = ipv4_header([192, 168, 3, 4], [8, 8, 8, 8]);
        let mut ip = MutableIpv4Packet::new(&mut data).expect("Ipv4Packet");
        assert_eq!(rewrite_ipv4_l3(&config, &mut ip, Direction::ClientToServer), 2);
        assert_eq!(ip.get_source(), Ipv4Addr::new(10, 1, 3, 4));
        assert_eq!(ip.get_destination(), Ipv4Addr::new(10, 2, 2, 8));

        // reply direction: chains swap roles, nothing matches
        let mut data = ipv4_header([192, 168, 3, 4], [8, 8, 8, 8]);
        let mut ip = MutableIpv4Packet::new(&mut data).expect("Ipv4Packet");
        assert_eq!(rewrite_ipv4_l3(&config, &mut ip, Direction::ServerToClient), 0);
        assert_eq!(ip.get_source(), Ipv4Addr::new(192, 168, 3, 4));
    }

    #[test]
    fn rewrite_ipv4_direct_maps() {
        let config = EditConfig {
            src_ip_map: Some("1.2.3.0/24:5.6.7.0/24".parse().unwrap()),
            dst_ip_map: Some("9.9.0.0/16:7.7.0.0/16".parse().unwrap()),
            ..EditConfig::default()
        };
        let mut data = ipv4_header([1, 2, 3, 4], [9, 9, 1, 1]);
        let mut ip = MutableIpv4Packet::new(&mut data).expect("Ipv4Packet");
        assert_eq!(rewrite_ipv4_l3(&config, &mut ip, Direction::ServerToClient), 2);
        assert_eq!(ip.get_source(), Ipv4Addr::new(5, 6, 7, 4));
        assert_eq!(ip.get_destination(), Ipv4Addr::new(7, 7, 1, 1));
    }

    #[test]
    fn rewrite_ipv6_with_chains() {
        let config = EditConfig {
            cidr_chains: CidrChains::symmetric(vec!["[2001:db8::/32]:[fd00:abcd::/32]"
                .parse()
                .unwrap()]),
            ..EditConfig::default()
        };
        let mut data = ipv6_header("2001:db8::1", "2001:db8::2");
        let mut ip6 = MutableIpv6Packet::new(&mut data).expect("Ipv6Packet");
        assert_eq!(rewrite_ipv6_l3(&config, &mut ip6, Direction::ClientToServer), 2);
        assert_eq!(ip6.get_source(), "fd00:abcd::1".parse::<Ipv6Addr>().unwrap());
        assert_eq!(ip6.get_destination(), "fd00:abcd::2".parse::<Ipv6Addr>().unwrap());
    }
}

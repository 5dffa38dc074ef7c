//! Address transforms: seeded randomization and subnet remapping
//!
//! These functions are pure: skip conditions are expressed by returning the
//! input unchanged, never by an error.

use crate::cidr::Cidr;
use std::net::{Ipv4Addr, Ipv6Addr};

/// First address of the multicast/broadcast range (224.0.0.0)
const IPV4_MULTICAST_START: u32 = 0xe000_0000;

/// Returns `true` for addresses below 224.0.0.0
#[inline]
pub fn is_unicast_v4(addr: Ipv4Addr) -> bool {
    u32::from(addr) < IPV4_MULTICAST_START
}

#[inline]
pub fn is_multicast_v6(addr: &[u8; 16]) -> bool {
    addr[0] == 0xff
}

/// Seeded mix of one 32-bit word, as stored in the packet
///
/// The word is taken as a little-endian integer over its wire bytes and the seed
/// in network byte order, so the result does not depend on the host byte order.
#[inline]
fn mix_word(seed: u32, word: [u8; 4]) -> [u8; 4] {
    let raw = u32::from_le_bytes(word);
    let seed = u32::from_le_bytes(seed.to_be_bytes());
    (raw ^ seed).wrapping_sub(raw & seed).to_le_bytes()
}

/// Randomize an IPv4 address using `seed`
///
/// Deterministic for a given seed, but not injective. With `skip_broadcast`,
/// multicast and broadcast addresses are returned unchanged.
pub fn randomize_v4(seed: u32, skip_broadcast: bool, addr: Ipv4Addr) -> Ipv4Addr {
    if skip_broadcast && !is_unicast_v4(addr) {
        return addr;
    }
    Ipv4Addr::from(mix_word(seed, addr.octets()))
}

/// Randomize an IPv6 address, one 32-bit word at a time
///
/// A multicast address stays multicast. A unicast address whose result happens
/// to start with 0xff gets 0xaa as first byte instead.
pub fn randomize_v6(seed: u32, addr: Ipv6Addr) -> Ipv6Addr {
    let mut octets = addr.octets();
    let was_multicast = is_multicast_v6(&octets);
    for chunk in octets.chunks_exact_mut(4) {
        let word = [chunk[0], chunk[1], chunk[2], chunk[3]];
        chunk.copy_from_slice(&mix_word(seed, word));
    }
    if was_multicast {
        octets[0] = 0xff;
    } else if is_multicast_v6(&octets) {
        octets[0] = 0xaa;
    }
    Ipv6Addr::from(octets)
}

/// Move `addr` into the subnet `cidr`, keeping its host bits
///
/// `10.0.0.0/8` and `192.168.55.123` give `10.168.55.123`.
/// Returns `addr` unchanged if `cidr` is not IPv4, or if `addr` is not unicast
/// and `skip_broadcast` is set.
pub fn remap_v4(cidr: &Cidr, skip_broadcast: bool, addr: Ipv4Addr) -> Ipv4Addr {
    let (network, masklen) = match *cidr {
        Cidr::V4 { network, masklen } => (network, masklen),
        Cidr::V6 { .. } => return addr,
    };
    if skip_broadcast && !is_unicast_v4(addr) {
        return addr;
    }
    let mask = Cidr::v4_mask(masklen);
    let result = (u32::from(network) & mask) | (u32::from(addr) & !mask);
    Ipv4Addr::from(result)
}

/// Move `addr` into the subnet `cidr` in place, keeping its host bits
///
/// Returns `false` without touching `addr` if `cidr` is not IPv6, or if `addr`
/// is multicast and `skip_broadcast` is set. Otherwise returns `true`, even if
/// the spliced address equals the original one.
pub fn remap_v6(cidr: &Cidr, skip_broadcast: bool, addr: &mut [u8; 16]) -> bool {
    let (network, masklen) = match *cidr {
        Cidr::V6 { network, masklen } => (network.octets(), masklen),
        Cidr::V4 { .. } => return false,
    };
    if skip_broadcast && is_multicast_v6(addr) {
        return false;
    }
    let full = usize::from(masklen / 8);
    addr[..full].copy_from_slice(&network[..full]);
    let rem = masklen % 8;
    if rem != 0 {
        let mask = 0xffu8 << (8 - rem);
        addr[full] = (network[full] & mask) | (addr[full] & !mask);
    }
    true
}

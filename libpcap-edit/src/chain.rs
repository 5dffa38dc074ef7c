//! Ordered CIDR rewrite chains
//!
//! Chains are walked in lockstep from their first entry. Each field (source,
//! destination) is rewritten by the first entry matching it, at most once per
//! packet. When one chain is exhausted it stays on its last entry while the
//! other one keeps advancing.

use crate::addr::{remap_v4, remap_v6};
use crate::cidr::{Cidr, CidrChains, CidrMap};
use crate::layers::Direction;
use std::net::{Ipv4Addr, Ipv6Addr};

/// An address that can be matched against and moved into a CIDR
pub trait Remappable {
    fn in_cidr(&self, cidr: &Cidr) -> bool;

    /// Remap into `cidr`, keeping host bits. Returns `true` if remapping was performed.
    fn remap(&mut self, cidr: &Cidr, skip_broadcast: bool) -> bool;
}

impl Remappable for Ipv4Addr {
    fn in_cidr(&self, cidr: &Cidr) -> bool {
        cidr.contains_v4(*self)
    }

    fn remap(&mut self, cidr: &Cidr, skip_broadcast: bool) -> bool {
        let new = remap_v4(cidr, skip_broadcast, *self);
        let changed = new != *self;
        *self = new;
        changed
    }
}

impl Remappable for Ipv6Addr {
    fn in_cidr(&self, cidr: &Cidr) -> bool {
        cidr.contains_v6(&self.octets())
    }

    fn remap(&mut self, cidr: &Cidr, skip_broadcast: bool) -> bool {
        let mut octets = self.octets();
        let changed = remap_v6(cidr, skip_broadcast, &mut octets);
        *self = Ipv6Addr::from(octets);
        changed
    }
}

/// Fields rewritten while walking the chains
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rewritten {
    pub src: bool,
    pub dst: bool,
}

impl Rewritten {
    pub fn count(&self) -> usize {
        usize::from(self.src) + usize::from(self.dst)
    }

    pub fn both(&self) -> bool {
        self.src && self.dst
    }
}

impl CidrChains {
    /// Return the `(source, destination)` chains for a packet travelling in `direction`
    pub fn select(&self, direction: Direction) -> (&[CidrMap], &[CidrMap]) {
        match direction {
            Direction::ClientToServer => (&self.c2s, &self.s2c),
            Direction::ServerToClient => (&self.s2c, &self.c2s),
        }
    }
}

/// Walk `src_chain` and `dst_chain` in lockstep, rewriting `src` and `dst`
///
/// A field counts as rewritten as soon as an entry matches it, even if the
/// remap itself left it untouched (for ex. a skipped broadcast address).
pub fn walk_chains<A: Remappable>(
    src_chain: &[CidrMap],
    dst_chain: &[CidrMap],
    src: &mut A,
    dst: &mut A,
    skip_broadcast: bool,
) -> Rewritten {
    let mut done = Rewritten::default();
    if src_chain.is_empty() && dst_chain.is_empty() {
        return done;
    }
    let (mut i_src, mut i_dst) = (0, 0);
    loop {
        if !done.dst {
            if let Some(m) = dst_chain.get(i_dst) {
                if dst.in_cidr(&m.from) {
                    dst.remap(&m.to, skip_broadcast);
                    done.dst = true;
                }
            }
        }
        if !done.src {
            if let Some(m) = src_chain.get(i_src) {
                if src.in_cidr(&m.from) {
                    src.remap(&m.to, skip_broadcast);
                    done.src = true;
                }
            }
        }
        let src_next = i_src + 1 < src_chain.len();
        let dst_next = i_dst + 1 < dst_chain.len();
        if done.both() || !(src_next || dst_next) {
            break;
        }
        if src_next {
            i_src += 1;
        }
        if dst_next {
            i_dst += 1;
        }
    }
    done
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(s: &str) -> CidrMap {
        s.parse().expect("CidrMap")
    }

    #[test]
    fn walk_uneven_chains() {
        let src_chain = vec![map("172.16.0.0/12:10.1.0.0/16"), map("192.168.0.0/16:10.2.0.0/16")];
        let dst_chain = vec![map("8.8.0.0/16:10.9.0.0/16")];
        let mut src = Ipv4Addr::new(192, 168, 1, 5);
        let mut dst = Ipv4Addr::new(8, 8, 4, 4);
        let r = walk_chains(&src_chain, &dst_chain, &mut src, &mut dst, false);
        assert_eq!(r.count(), 2);
        assert_eq!(src, Ipv4Addr::new(10, 2, 1, 5));
        assert_eq!(dst, Ipv4Addr::new(10, 9, 4, 4));
    }

    #[test]
    fn walk_rewrites_each_field_once() {
        // the first rule moves the address into the second rule's source range
        let chain = vec![map("10.0.0.0/8:192.168.0.0/16"), map("192.168.0.0/16:172.16.0.0/16")];
        let mut src = Ipv4Addr::new(10, 0, 3, 4);
        let mut dst = Ipv4Addr::new(1, 1, 1, 1);
        let r = walk_chains(&chain, &chain, &mut src, &mut dst, false);
        assert_eq!(r, Rewritten { src: true, dst: false });
        assert_eq!(src, Ipv4Addr::new(192, 168, 3, 4));
        assert_eq!(dst, Ipv4Addr::new(1, 1, 1, 1));
    }

    #[test]
    fn walk_first_match_wins() {
        let chain = vec![map("10.0.0.0/8:172.16.0.0/12"), map("10.1.0.0/16:192.168.0.0/16")];
        let mut src = Ipv4Addr::new(10, 1, 2, 3);
        let mut dst = Ipv4Addr::new(10, 1, 2, 4);
        let r = walk_chains(&chain, &chain, &mut src, &mut dst, false);
        assert_eq!(r.count(), 2);
        assert_eq!(src, Ipv4Addr::new(172, 17, 2, 3));
        assert_eq!(dst, Ipv4Addr::new(172, 17, 2, 4));
    }

    #[test]
    fn walk_no_match() {
        let chain = vec![map("10.0.0.0/8:172.16.0.0/12")];
        let mut src = Ipv4Addr::new(192, 168, 0, 1);
        let mut dst = Ipv4Addr::new(192, 168, 0, 2);
        let r = walk_chains(&chain, &[], &mut src, &mut dst, false);
        assert_eq!(r.count(), 0);
        assert_eq!(src, Ipv4Addr::new(192, 168, 0, 1));
        let r = walk_chains::<Ipv4Addr>(&[], &[], &mut src, &mut dst, false);
        assert_eq!(r.count(), 0);
    }

    #[test]
    fn walk_skipped_broadcast_still_counts() {
        let chain = vec![map("0.0.0.0/0:10.0.0.0/8")];
        let mut src = Ipv4Addr::new(192, 168, 0, 1);
        let mut dst = Ipv4Addr::BROADCAST;
        let r = walk_chains(&chain, &chain, &mut src, &mut dst, true);
        assert_eq!(r.count(), 2);
        assert_eq!(src, Ipv4Addr::new(10, 168, 0, 1));
        assert_eq!(dst, Ipv4Addr::BROADCAST);
    }

    #[test]
    fn walk_ipv6() {
        let src_chain = vec![map("[2001:db8::/32]:[fd00:1::/32]")];
        let dst_chain = vec![
            map("[10.0.0.0/8]:[11.0.0.0/8]"),
            map("[2001:db9::/32]:[fd00:2::/32]"),
        ];
        let mut src: Ipv6Addr = "2001:db8::10".parse().unwrap();
        let mut dst: Ipv6Addr = "2001:db9::20".parse().unwrap();
        let r = walk_chains(&src_chain, &dst_chain, &mut src, &mut dst, false);
        assert_eq!(r.count(), 2);
        assert_eq!(src, "fd00:1::10".parse::<Ipv6Addr>().unwrap());
        assert_eq!(dst, "fd00:2::20".parse::<Ipv6Addr>().unwrap());
    }

    #[test]
    fn select_by_direction() {
        let chains = CidrChains::new(vec![map("10.0.0.0/8:11.0.0.0/8")], vec![]);
        let (s, d) = chains.select(Direction::ClientToServer);
        assert_eq!((s.len(), d.len()), (1, 0));
        let (s, d) = chains.select(Direction::ServerToClient);
        assert_eq!((s.len(), d.len()), (0, 1));
    }
}

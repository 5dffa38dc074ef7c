//! IPv4 address rewriting inside ARP packets
//!
//! Address fields are not at fixed offsets: they depend on the hardware and
//! protocol address lengths carried in the fixed header.

use crate::addr::randomize_v4;
use crate::chain::walk_chains;
use crate::config::EditConfig;
use crate::layers::{
    read_array4, read_be16, slice_at, write_array4, Direction, ARP_FIXED_HEADER_LEN,
};
use libpcap_tools::Error;
use pnet_packet::arp::{ArpOperation, ArpOperations};
use pnet_packet::ethernet::EtherTypes;
use std::net::Ipv4Addr;
use tracing::{debug, trace, warn};

/// Offsets of the protocol addresses of an IPv4 request/reply
#[derive(Debug)]
struct ArpAddrs {
    operation: ArpOperation,
    sender: usize,
    target: usize,
}

impl ArpAddrs {
    /// Locate protocol addresses of the ARP header at `offset`
    ///
    /// Returns `None` if the packet is not an IPv4 request or reply.
    fn locate(data: &[u8], offset: usize) -> Result<Option<ArpAddrs>, Error> {
        let fixed = slice_at(data, offset, ARP_FIXED_HEADER_LEN)?;
        let proto = read_be16(fixed, 2)?;
        let hln = usize::from(fixed[4]);
        let pln = usize::from(fixed[5]);
        let operation = ArpOperation::new(read_be16(fixed, 6)?);
        if proto != EtherTypes::Ipv4.0
            || pln != 4
            || (operation != ArpOperations::Request && operation != ArpOperations::Reply)
        {
            return Ok(None);
        }
        let sender = offset + ARP_FIXED_HEADER_LEN + hln;
        let target = sender + pln + hln;
        Error::check_len(target + pln, data.len())?;
        Ok(Some(ArpAddrs {
            operation,
            sender,
            target,
        }))
    }
}

/// Randomize sender and target IPv4 addresses of the ARP packet at `offset`
///
/// Returns `false` if the packet is not an IPv4 request or reply, and is left untouched.
pub fn randomize_arp(
    seed: u32,
    skip_broadcast: bool,
    data: &mut [u8],
    offset: usize,
) -> Result<bool, Error> {
    let addrs = match ArpAddrs::locate(data, offset)? {
        Some(a) => a,
        None => {
            debug!("not an IPv4 ARP request/reply, skipping randomization");
            return Ok(false);
        }
    };
    for pos in [addrs.sender, addrs.target] {
        let old = Ipv4Addr::from(read_array4(data, pos)?);
        let new = randomize_v4(seed, skip_broadcast, old);
        trace!("ARP address {} -> {}", old, new);
        write_array4(data, pos, new.octets())?;
    }
    Ok(true)
}

/// Remap sender and target IPv4 addresses of the ARP packet at `offset`
/// through the CIDR chains
///
/// In a request the target plays the source role, in a reply the sender does.
/// Nothing is done unless chains are configured for both directions.
/// Returns the number of fields rewritten (0 to 2).
pub fn rewrite_arp(
    config: &EditConfig,
    data: &mut [u8],
    offset: usize,
    direction: Direction,
) -> Result<usize, Error> {
    let (src_chain, dst_chain) = config.cidr_chains.select(direction);
    if src_chain.is_empty() || dst_chain.is_empty() {
        return Ok(0);
    }
    let addrs = match ArpAddrs::locate(data, offset)? {
        Some(a) => a,
        None => {
            warn!("ARP packet isn't for IPv4, can't rewrite IP addresses");
            return Ok(0);
        }
    };
    let (src_pos, dst_pos) = if addrs.operation == ArpOperations::Request {
        (addrs.target, addrs.sender)
    } else {
        (addrs.sender, addrs.target)
    };
    let mut src = Ipv4Addr::from(read_array4(data, src_pos)?);
    let mut dst = Ipv4Addr::from(read_array4(data, dst_pos)?);
    let done = walk_chains(src_chain, dst_chain, &mut src, &mut dst, config.skip_broadcast);
    if done.src {
        write_array4(data, src_pos, src.octets())?;
    }
    if done.dst {
        write_array4(data, dst_pos, dst.octets())?;
    }
    trace!("ARP rewrite: {:?}", done);
    Ok(done.count())
}

//! Recomputation of IP and transport checksums after edits
//!
//! The transport header must immediately follow the IP header (and, for IPv6,
//! its extension headers) in the buffer.

use crate::layers::{slice_at, tail_mut, IPV4_MIN_HEADER_LEN, IPV6_HEADER_LEN, UDP_HEADER_LEN};
use crate::status::Status;
use libpcap_tools::{Error, PacketHeader};
use pnet_packet::icmp::{self, MutableIcmpPacket};
use pnet_packet::icmpv6::{self, MutableIcmpv6Packet};
use pnet_packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet_packet::ipv4::{self, Ipv4Packet, MutableIpv4Packet};
use pnet_packet::ipv6::Ipv6Packet;
use pnet_packet::tcp::{self, MutableTcpPacket};
use pnet_packet::udp::{self, MutableUdpPacket};
use pnet_packet::util;
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::{debug, trace};

const IGMP_MIN_LEN: usize = 8;

/// Result of a checksum recalculation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChecksumOutcome {
    pub status: Status,
    /// `false` if the transport checksum was left untouched (partial capture,
    /// non-initial fragment, or a warning)
    pub l4_updated: bool,
}

/// Addresses used in the transport pseudo-header
#[derive(Clone, Copy, Debug)]
enum PseudoHeader {
    V4(Ipv4Addr, Ipv4Addr),
    V6(Ipv6Addr, Ipv6Addr),
}

/// Compute and store the checksum of the transport segment `l4`
///
/// Returns `Warn` (and leaves `l4` untouched) if the segment is too short for
/// its header.
fn l4_checksum(
    proto: IpNextHeaderProtocol,
    l4: &mut [u8],
    pseudo: PseudoHeader,
) -> Result<Status, Error> {
    match (proto, pseudo) {
        (IpNextHeaderProtocols::Tcp, _) => {
            let mut tcp = match MutableTcpPacket::new(l4) {
                Some(p) => p,
                None => return Ok(Status::warn("Unable to checksum TCP with insufficient L4 data")),
            };
            let sum = match pseudo {
                PseudoHeader::V4(s, d) => tcp::ipv4_checksum(&tcp.to_immutable(), &s, &d),
                PseudoHeader::V6(s, d) => tcp::ipv6_checksum(&tcp.to_immutable(), &s, &d),
            };
            tcp.set_checksum(sum);
        }
        (IpNextHeaderProtocols::Udp, _) => {
            if l4.len() < UDP_HEADER_LEN {
                return Ok(Status::warn("Unable to checksum UDP with insufficient L4 data"));
            }
            let mut udp = match MutableUdpPacket::new(l4) {
                Some(p) => p,
                None => return Ok(Status::warn("Unable to checksum UDP with insufficient L4 data")),
            };
            let sum = match pseudo {
                PseudoHeader::V4(s, d) => udp::ipv4_checksum(&udp.to_immutable(), &s, &d),
                PseudoHeader::V6(s, d) => udp::ipv6_checksum(&udp.to_immutable(), &s, &d),
            };
            // a zero checksum means "no checksum" for UDP
            udp.set_checksum(if sum == 0 { 0xffff } else { sum });
        }
        (IpNextHeaderProtocols::Icmp, PseudoHeader::V4(_, _)) => {
            let mut icmp = match MutableIcmpPacket::new(l4) {
                Some(p) => p,
                None => {
                    return Ok(Status::warn("Unable to checksum ICMP with insufficient L4 data"))
                }
            };
            let sum = icmp::checksum(&icmp.to_immutable());
            icmp.set_checksum(sum);
        }
        (IpNextHeaderProtocols::Igmp, PseudoHeader::V4(_, _)) => {
            if l4.len() < IGMP_MIN_LEN {
                return Ok(Status::warn("Unable to checksum IGMP with insufficient L4 data"));
            }
            let sum = util::checksum(l4, 1);
            l4[2..4].copy_from_slice(&sum.to_be_bytes());
        }
        (IpNextHeaderProtocols::Icmpv6, PseudoHeader::V6(s, d)) => {
            let mut icmp6 = match MutableIcmpv6Packet::new(l4) {
                Some(p) => p,
                None => {
                    return Ok(Status::warn("Unable to checksum ICMPv6 with insufficient L4 data"))
                }
            };
            let sum = icmpv6::checksum(&icmp6.to_immutable(), &s, &d);
            icmp6.set_checksum(sum);
        }
        _ => {
            return Err(Error::Checksum(format!(
                "Unsupported protocol for checksum: 0x{:02x}",
                proto.0
            )))
        }
    }
    Ok(Status::Ok)
}

/// Recompute the checksums of an IPv4 packet whose header starts at `offset`
///
/// The transport checksum is only recomputed if the whole packet was captured
/// and it is not a non-initial fragment. The header checksum is always recomputed.
pub fn fix_ipv4_checksums(
    hdr: &PacketHeader,
    data: &mut [u8],
    offset: usize,
) -> Result<ChecksumOutcome, Error> {
    let caplen = hdr.caplen();
    Error::check_len(caplen, data.len())?;
    let ip_data = tail_mut(&mut data[..caplen], offset, IPV4_MIN_HEADER_LEN)?;
    let (hlen, total_len, proto, frag_offset, src, dst) = {
        let ip = Ipv4Packet::new(ip_data).ok_or(Error::Generic("IPv4 header too short"))?;
        (
            usize::from(ip.get_header_length()) * 4,
            usize::from(ip.get_total_length()),
            ip.get_next_level_protocol(),
            ip.get_fragment_offset(),
            ip.get_source(),
            ip.get_destination(),
        )
    };
    if hlen < IPV4_MIN_HEADER_LEN {
        return Err(Error::Checksum(format!("invalid IPv4 header length {hlen}")));
    }
    Error::check_len(hlen, ip_data.len())?;

    let mut status = Status::Ok;
    let mut l4_updated = false;
    if hdr.is_complete() && frag_offset == 0 {
        if total_len < hlen {
            status = Status::warn("IPv4 total length is smaller than header length");
        } else if total_len > ip_data.len() {
            status = Status::warn("IPv4 total length exceeds captured data");
        } else {
            status = l4_checksum(proto, &mut ip_data[hlen..total_len], PseudoHeader::V4(src, dst))?;
            l4_updated = !status.is_warn();
        }
    } else {
        debug!(
            "skipping L4 checksum (complete: {}, fragment offset: {})",
            hdr.is_complete(),
            frag_offset
        );
    }

    let mut ip = MutableIpv4Packet::new(ip_data).ok_or(Error::Generic("IPv4 header too short"))?;
    let sum = ipv4::checksum(&ip.to_immutable());
    trace!("IPv4 header checksum {:#06x} -> {:#06x}", ip.get_checksum(), sum);
    ip.set_checksum(sum);

    Ok(ChecksumOutcome { status, l4_updated })
}

fn is_ipv6_ext(proto: IpNextHeaderProtocol) -> bool {
    matches!(
        proto,
        IpNextHeaderProtocols::Hopopt
            | IpNextHeaderProtocols::Ipv6Opts
            | IpNextHeaderProtocols::Ipv6Route
            | IpNextHeaderProtocols::Ipv6Frag
    )
}

/// Location of the transport header inside an IPv6 payload
enum Ipv6Transport {
    Found(IpNextHeaderProtocol, usize),
    LaterFragment,
}

fn locate_ipv6_transport(
    payload: &[u8],
    next_header: IpNextHeaderProtocol,
) -> Result<Ipv6Transport, Error> {
    let mut proto = next_header;
    let mut offset = 0;
    while is_ipv6_ext(proto) {
        let ext = slice_at(payload, offset, 8)?;
        let next = IpNextHeaderProtocol::new(ext[0]);
        trace!("IPv6 extension header: {:?}", proto);
        if proto == IpNextHeaderProtocols::Ipv6Frag {
            let frag_offset = u16::from_be_bytes([ext[2], ext[3]]) >> 3;
            if frag_offset != 0 {
                return Ok(Ipv6Transport::LaterFragment);
            }
            offset += 8;
        } else {
            offset += (usize::from(ext[1]) + 1) * 8;
        }
        proto = next;
    }
    Ok(Ipv6Transport::Found(proto, offset))
}

/// Recompute the transport checksum of an IPv6 packet whose header starts at `offset`
///
/// IPv6 has no header checksum. The transport checksum is only recomputed if
/// the whole packet was captured and it is not a non-initial fragment.
pub fn fix_ipv6_checksums(
    hdr: &PacketHeader,
    data: &mut [u8],
    offset: usize,
) -> Result<ChecksumOutcome, Error> {
    let caplen = hdr.caplen();
    Error::check_len(caplen, data.len())?;
    let ip_data = tail_mut(&mut data[..caplen], offset, IPV6_HEADER_LEN)?;
    let (payload_len, next_header, src, dst) = {
        let ip6 = Ipv6Packet::new(ip_data).ok_or(Error::Generic("IPv6 header too short"))?;
        (
            usize::from(ip6.get_payload_length()),
            ip6.get_next_header(),
            ip6.get_source(),
            ip6.get_destination(),
        )
    };

    let skipped = ChecksumOutcome {
        status: Status::Ok,
        l4_updated: false,
    };
    if !hdr.is_complete() {
        debug!("skipping L4 checksum, packet not fully captured");
        return Ok(skipped);
    }
    if payload_len == 0 {
        return Ok(ChecksumOutcome {
            status: Status::warn("IPv6 payload length is 0 (jumbogram?)"),
            l4_updated: false,
        });
    }
    let end = IPV6_HEADER_LEN + payload_len;
    if end > ip_data.len() {
        return Ok(ChecksumOutcome {
            status: Status::warn("IPv6 payload length exceeds captured data"),
            l4_updated: false,
        });
    }
    let transport = locate_ipv6_transport(&ip_data[IPV6_HEADER_LEN..end], next_header);
    let (proto, l4_offset) = match transport {
        Ok(Ipv6Transport::Found(proto, o)) => (proto, IPV6_HEADER_LEN + o),
        Ok(Ipv6Transport::LaterFragment) => {
            debug!("skipping L4 checksum, non-initial IPv6 fragment");
            return Ok(skipped);
        }
        Err(_) => {
            return Ok(ChecksumOutcome {
                status: Status::warn("truncated IPv6 extension header"),
                l4_updated: false,
            })
        }
    };
    if l4_offset > end {
        return Ok(ChecksumOutcome {
            status: Status::warn("IPv6 extension headers exceed payload length"),
            l4_updated: false,
        });
    }
    let status = l4_checksum(proto, &mut ip_data[l4_offset..end], PseudoHeader::V6(src, dst))?;
    let l4_updated = !status.is_warn();
    Ok(ChecksumOutcome { status, l4_updated })
}

//! Location of the application payload of an IPv4 packet

use crate::layers::{tail, Layers, IPV4_MIN_HEADER_LEN, UDP_HEADER_LEN};
use libpcap_tools::{Error, PacketHeader};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::tcp::TcpPacket;
use std::cmp::min;
use std::ops::Range;
use tracing::debug;

/// Byte range of the layer 7 data in `data`
///
/// The available length is the smaller of the IP total length (which excludes
/// link-layer padding) and the captured bytes past the link header. TCP and UDP
/// headers are skipped. ICMP packets and packets without payload give an empty
/// range. For other protocols, everything past the IP header is returned.
pub fn l7_range(
    hdr: &PacketHeader,
    data: &[u8],
    layers: &Layers,
) -> Result<Range<usize>, Error> {
    let nodata = 0..0;
    let offset = match layers.ipv4_offset() {
        Some(o) => o,
        None => return Ok(nodata),
    };
    let caplen = hdr.caplen();
    Error::check_len(caplen, data.len())?;
    let data = &data[..caplen];
    let ip = Ipv4Packet::new(tail(data, offset, IPV4_MIN_HEADER_LEN)?)
        .ok_or(Error::Generic("IPv4 header too short"))?;

    let available = min(usize::from(ip.get_total_length()), caplen - offset);
    let hlen = usize::from(ip.get_header_length()) * 4;
    if available <= hlen {
        debug!("packet has no data past the IP header");
        return Ok(nodata);
    }
    let mut start = offset + hlen;
    let mut len = available - hlen;

    match ip.get_next_level_protocol() {
        IpNextHeaderProtocols::Tcp => {
            let th_len = match TcpPacket::new(&data[start..start + len]) {
                Some(tcp) => usize::from(tcp.get_data_offset()) * 4,
                None => return Ok(nodata),
            };
            if len <= th_len {
                return Ok(nodata);
            }
            start += th_len;
            len -= th_len;
        }
        IpNextHeaderProtocols::Udp => {
            if len <= UDP_HEADER_LEN {
                return Ok(nodata);
            }
            start += UDP_HEADER_LEN;
            len -= UDP_HEADER_LEN;
        }
        IpNextHeaderProtocols::Icmp => {
            debug!("ignoring any possible data in ICMP packet");
            return Ok(nodata);
        }
        proto => {
            debug!("unknown protocol {:?}, using everything past the IP header", proto);
        }
    }
    debug!("packet has {} bytes of layer 7 data", len);
    Ok(start..start + len)
}

/// Return the layer 7 data of an IPv4 packet, possibly empty
pub fn extract_data<'a>(
    hdr: &PacketHeader,
    data: &'a [u8],
    layers: &Layers,
) -> Result<&'a [u8], Error> {
    let range = l7_range(hdr, data, layers)?;
    Ok(&data[range])
}

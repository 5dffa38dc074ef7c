//! Length repair for truncated captures: padding, truncation, MTU enforcement

use crate::config::EditConfig;
use crate::layers::{tail_mut, Layers, IPV4_MIN_HEADER_LEN, IPV6_HEADER_LEN};
use libpcap_tools::{Error, PacketHeader};
use pnet_packet::ipv4::MutableIpv4Packet;
use pnet_packet::ipv6::MutableIpv6Packet;
use std::str::FromStr;
use tracing::{debug, trace};

/// What to do with packets whose captured length differs from their length
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FixLen {
    #[default]
    Off,
    /// Zero-fill up to the original length
    Pad,
    /// Shrink the original length (and IP length field) to the captured length
    Truncate,
}

impl FromStr for FixLen {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(FixLen::Off),
            "pad" => Ok(FixLen::Pad),
            "trunc" | "truncate" => Ok(FixLen::Truncate),
            _ => Err(Error::InvalidConfig(format!(
                "invalid fixlen mode: {s} not among off|pad|trunc"
            ))),
        }
    }
}

/// Result of a length fixup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthFix {
    Unchanged,
    /// Lengths changed, checksums must be recomputed
    Changed,
    /// A non-IP frame was truncated to the MTU, there is no checksum to fix
    TruncatedNoFixup,
}

fn length_field(len: usize) -> Result<u16, Error> {
    u16::try_from(len).map_err(|_| Error::Capture(format!("IP length {len} exceeds 65535")))
}

fn set_ipv4_total_length(data: &mut [u8], offset: usize, len: usize) -> Result<(), Error> {
    let len = length_field(len)?;
    let buf = tail_mut(data, offset, IPV4_MIN_HEADER_LEN)?;
    let mut ip = MutableIpv4Packet::new(buf).ok_or(Error::Generic("IPv4 header too short"))?;
    trace!("IPv4 total length {} -> {}", ip.get_total_length(), len);
    ip.set_total_length(len);
    Ok(())
}

fn set_ipv6_payload_length(data: &mut [u8], offset: usize, len: usize) -> Result<(), Error> {
    let len = length_field(len)?;
    let buf = tail_mut(data, offset, IPV6_HEADER_LEN)?;
    let mut ip6 = MutableIpv6Packet::new(buf).ok_or(Error::Generic("IPv6 header too short"))?;
    trace!("IPv6 payload length {} -> {}", ip6.get_payload_length(), len);
    ip6.set_payload_length(len);
    Ok(())
}

/// Repair a packet whose captured length differs from its on-wire length
///
/// `data` is the caller's buffer: it holds `hdr.caplen` captured bytes and, for
/// padding, must be large enough to hold `hdr.origlen` bytes.
pub fn untrunc_packet(
    config: &EditConfig,
    hdr: &mut PacketHeader,
    data: &mut [u8],
    layers: &Layers,
) -> Result<LengthFix, Error> {
    if (hdr.is_complete() || !layers.is_ip()) && !config.mtu_truncate {
        return Ok(LengthFix::Unchanged);
    }
    let l2_len = layers.l2_len;
    if l2_len > hdr.caplen() {
        return Err(Error::Capture(format!(
            "non-sensical layer 2 length: {l2_len} (caplen {})",
            hdr.caplen()
        )));
    }
    Error::check_len(hdr.caplen(), data.len())?;
    match config.fixlen {
        FixLen::Pad => pad_packet(hdr, data),
        FixLen::Truncate => truncate_packet(hdr, data, layers),
        FixLen::Off if config.mtu_truncate => mtu_truncate(config.mtu, hdr, data, layers),
        FixLen::Off => Ok(LengthFix::Unchanged),
    }
}

fn pad_packet(hdr: &mut PacketHeader, data: &mut [u8]) -> Result<LengthFix, Error> {
    let (caplen, origlen) = (hdr.caplen(), hdr.origlen());
    if origlen > caplen {
        Error::check_len(origlen, data.len())?;
        debug!("padding packet from {} to {} bytes", caplen, origlen);
        data[caplen..origlen].fill(0);
        hdr.caplen = hdr.origlen;
        Ok(LengthFix::Changed)
    } else if origlen < caplen {
        Err(Error::Capture(format!(
            "packet length {origlen} is smaller than captured length {caplen}"
        )))
    } else {
        Ok(LengthFix::Unchanged)
    }
}

fn truncate_packet(
    hdr: &mut PacketHeader,
    data: &mut [u8],
    layers: &Layers,
) -> Result<LengthFix, Error> {
    if hdr.is_complete() {
        return Ok(LengthFix::Unchanged);
    }
    let caplen = hdr.caplen();
    let l3_len = caplen - layers.l2_len;
    let data = &mut data[..caplen];
    if let Some(offset) = layers.ipv4_offset() {
        set_ipv4_total_length(data, offset, l3_len)?;
    } else if let Some(offset) = layers.ipv6_offset() {
        set_ipv6_payload_length(data, offset, l3_len.saturating_sub(IPV6_HEADER_LEN))?;
    }
    debug!("truncating packet length from {} to {}", hdr.origlen, hdr.caplen);
    hdr.origlen = hdr.caplen;
    Ok(LengthFix::Changed)
}

fn mtu_truncate(
    mtu: u16,
    hdr: &mut PacketHeader,
    data: &mut [u8],
    layers: &Layers,
) -> Result<LengthFix, Error> {
    let bound = layers.l2_len + usize::from(mtu);
    if hdr.origlen() <= bound {
        return Ok(LengthFix::Unchanged);
    }
    debug!("truncating packet from {} to MTU {} + {}", hdr.origlen, mtu, layers.l2_len);
    // bound < origlen, which is a u32
    let origlen = bound as u32;
    let caplen = hdr.caplen.min(origlen);
    let data = &mut data[..caplen as usize];
    let fix = if let Some(offset) = layers.ipv4_offset() {
        set_ipv4_total_length(data, offset, usize::from(mtu))?;
        LengthFix::Changed
    } else if let Some(offset) = layers.ipv6_offset() {
        let payload_len = usize::from(mtu).saturating_sub(IPV6_HEADER_LEN);
        set_ipv6_payload_length(data, offset, payload_len)?;
        LengthFix::Changed
    } else {
        LengthFix::TruncatedNoFixup
    };
    hdr.origlen = origlen;
    hdr.caplen = caplen;
    Ok(fix)
}

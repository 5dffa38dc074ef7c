//! Header locations resolved by the link-layer classification step

use libpcap_tools::Error;

pub const IPV4_MIN_HEADER_LEN: usize = 20;
pub const IPV6_HEADER_LEN: usize = 40;
pub const ARP_FIXED_HEADER_LEN: usize = 8;
pub const UDP_HEADER_LEN: usize = 8;

/// Network-layer header found in a frame, with its byte offset in the buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum L3Header {
    Ipv4(usize),
    Ipv6(usize),
    Arp(usize),
}

impl L3Header {
    pub fn offset(&self) -> usize {
        match *self {
            L3Header::Ipv4(o) | L3Header::Ipv6(o) | L3Header::Arp(o) => o,
        }
    }
}

/// Classification of one frame: link-layer header length and network header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layers {
    pub l2_len: usize,
    pub l3: Option<L3Header>,
}

impl Layers {
    /// Layout of a frame whose network header immediately follows the link header
    pub fn new(l2_len: usize, l3: Option<L3Header>) -> Self {
        Layers { l2_len, l3 }
    }

    pub fn ipv4(l2_len: usize) -> Self {
        Layers::new(l2_len, Some(L3Header::Ipv4(l2_len)))
    }

    pub fn ipv6(l2_len: usize) -> Self {
        Layers::new(l2_len, Some(L3Header::Ipv6(l2_len)))
    }

    pub fn arp(l2_len: usize) -> Self {
        Layers::new(l2_len, Some(L3Header::Arp(l2_len)))
    }

    pub fn ipv4_offset(&self) -> Option<usize> {
        match self.l3 {
            Some(L3Header::Ipv4(o)) => Some(o),
            _ => None,
        }
    }

    pub fn ipv6_offset(&self) -> Option<usize> {
        match self.l3 {
            Some(L3Header::Ipv6(o)) => Some(o),
            _ => None,
        }
    }

    pub fn is_ip(&self) -> bool {
        matches!(self.l3, Some(L3Header::Ipv4(_)) | Some(L3Header::Ipv6(_)))
    }
}

/// Travel direction of a packet, as decided by the caller's flow tracking
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

/// Return `data[offset..offset + len]`, or `BufferTooShort`
#[inline]
pub(crate) fn slice_at(data: &[u8], offset: usize, len: usize) -> Result<&[u8], Error> {
    let end = offset.saturating_add(len);
    Error::check_len(end, data.len())?;
    Ok(&data[offset..end])
}

/// Mutable variant of [`slice_at`]
#[inline]
pub(crate) fn slice_at_mut(data: &mut [u8], offset: usize, len: usize) -> Result<&mut [u8], Error> {
    let end = offset.saturating_add(len);
    Error::check_len(end, data.len())?;
    Ok(&mut data[offset..end])
}

/// Return `data[offset..]`, checking that at least `min_len` bytes remain
#[inline]
pub(crate) fn tail(data: &[u8], offset: usize, min_len: usize) -> Result<&[u8], Error> {
    Error::check_len(offset.saturating_add(min_len), data.len())?;
    Ok(&data[offset..])
}

/// Mutable variant of [`tail`]
#[inline]
pub(crate) fn tail_mut(data: &mut [u8], offset: usize, min_len: usize) -> Result<&mut [u8], Error> {
    Error::check_len(offset.saturating_add(min_len), data.len())?;
    Ok(&mut data[offset..])
}

#[inline]
pub(crate) fn read_be16(data: &[u8], offset: usize) -> Result<u16, Error> {
    let b = slice_at(data, offset, 2)?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

#[inline]
pub(crate) fn read_array4(data: &[u8], offset: usize) -> Result<[u8; 4], Error> {
    let b = slice_at(data, offset, 4)?;
    Ok([b[0], b[1], b[2], b[3]])
}

#[inline]
pub(crate) fn write_array4(data: &mut [u8], offset: usize, value: [u8; 4]) -> Result<(), Error> {
    slice_at_mut(data, offset, 4)?.copy_from_slice(&value);
    Ok(())
}

//! Per-packet edit pipeline
//!
//! Order matters: lengths are repaired first, then TTL and addresses are
//! rewritten, and checksums are recomputed last from the final header bytes.

use crate::arp::{randomize_arp, rewrite_arp};
use crate::checksum::{fix_ipv4_checksums, fix_ipv6_checksums};
use crate::config::EditConfig;
use crate::fixlen::{untrunc_packet, LengthFix};
use crate::ip_rewrite::{randomize_ipv4, randomize_ipv6, rewrite_ipv4_l3, rewrite_ipv6_l3};
use crate::layers::{tail_mut, Direction, L3Header, Layers, IPV4_MIN_HEADER_LEN, IPV6_HEADER_LEN};
use crate::status::Status;
use crate::ttl::{rewrite_ipv4_ttl, rewrite_ipv6_hlim, TtlMode};
use libpcap_tools::{Error, PacketHeader};
use pnet_packet::ipv4::MutableIpv4Packet;
use pnet_packet::ipv6::MutableIpv6Packet;
use tracing::{debug, trace};

/// Apply all configured edits to one frame, in place
///
/// `data` holds the `hdr.caplen` captured bytes (and must have room for
/// `hdr.origlen` bytes if padding is enabled). `hdr` is updated if lengths
/// are fixed. `layers` gives the location of the network header, and
/// `direction` selects the CIDR chains.
///
/// An `Err` means the packet could not be edited and should not be sent as is.
/// `Status::Warn` means the packet was edited but a checksum could not be fixed.
pub fn edit_packet(
    config: &EditConfig,
    hdr: &mut PacketHeader,
    data: &mut [u8],
    layers: &Layers,
    direction: Direction,
) -> Result<Status, Error> {
    let mut needs_checksum = false;
    if config.has_length_fixup() {
        let fix = untrunc_packet(config, hdr, data, layers)?;
        trace!("length fixup: {:?}", fix);
        needs_checksum = fix == LengthFix::Changed;
    }

    let caplen = hdr.caplen();
    Error::check_len(caplen, data.len())?;
    let l3 = match layers.l3 {
        Some(l3) => l3,
        None => {
            debug!("no network header, nothing to edit");
            return Ok(Status::Ok);
        }
    };
    let rewrites_ip =
        config.ttl != TtlMode::Off || config.randomize_seed().is_some() || config.has_remap();
    let is_ip = !matches!(l3, L3Header::Arp(_));
    if is_ip && !rewrites_ip && !needs_checksum && !config.fix_checksums {
        return Ok(Status::Ok);
    }

    match l3 {
        L3Header::Ipv4(offset) => {
            {
                let buf = tail_mut(&mut data[..caplen], offset, IPV4_MIN_HEADER_LEN)?;
                let mut ip =
                    MutableIpv4Packet::new(buf).ok_or(Error::Generic("IPv4 header too short"))?;
                needs_checksum |= rewrite_ipv4_ttl(config.ttl, &mut ip);
                if let Some(seed) = config.randomize_seed() {
                    needs_checksum |= randomize_ipv4(seed, config.skip_broadcast, &mut ip);
                }
                if config.has_remap() {
                    needs_checksum |= rewrite_ipv4_l3(config, &mut ip, direction) > 0;
                }
            }
            if needs_checksum || config.fix_checksums {
                let outcome = fix_ipv4_checksums(hdr, data, offset)?;
                trace!("IPv4 checksums: {:?}", outcome);
                return Ok(outcome.status);
            }
        }
        L3Header::Ipv6(offset) => {
            {
                let buf = tail_mut(&mut data[..caplen], offset, IPV6_HEADER_LEN)?;
                let mut ip6 =
                    MutableIpv6Packet::new(buf).ok_or(Error::Generic("IPv6 header too short"))?;
                needs_checksum |= rewrite_ipv6_hlim(config.ttl, &mut ip6);
                if let Some(seed) = config.randomize_seed() {
                    needs_checksum |= randomize_ipv6(seed, config.skip_broadcast, &mut ip6);
                }
                if config.has_remap() {
                    needs_checksum |= rewrite_ipv6_l3(config, &mut ip6, direction) > 0;
                }
            }
            if needs_checksum || config.fix_checksums {
                let outcome = fix_ipv6_checksums(hdr, data, offset)?;
                trace!("IPv6 checksums: {:?}", outcome);
                return Ok(outcome.status);
            }
        }
        L3Header::Arp(offset) => {
            let data = &mut data[..caplen];
            if let Some(seed) = config.randomize_seed() {
                randomize_arp(seed, config.skip_broadcast, data, offset)?;
            }
            if !config.cidr_chains.is_empty() {
                let n = rewrite_arp(config, data, offset, direction)?;
                trace!("ARP: {} address(es) remapped", n);
            }
        }
    }
    Ok(Status::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixlen::FixLen;
    use crate::ttl::TtlMode;
    use libpcap_tools::Timestamp;

    fn ipv4_udp_frame() -> Vec<u8> {
        let mut v = vec![0u8; 14 + 20 + 8 + 4];
        v[12..14].copy_from_slice(&0x0800u16.to_be_bytes());
        v[14] = 0x45;
        v[16..18].copy_from_slice(&32u16.to_be_bytes());
        v[22] = 64;
        v[23] = 17;
        v[26..30].copy_from_slice(&[10, 0, 0, 1]);
        v[30..34].copy_from_slice(&[10, 0, 0, 2]);
        v[34..36].copy_from_slice(&1000u16.to_be_bytes());
        v[36..38].copy_from_slice(&53u16.to_be_bytes());
        v[38..40].copy_from_slice(&12u16.to_be_bytes());
        v[42..46].copy_from_slice(b"abcd");
        v
    }

    fn header(caplen: usize, origlen: usize) -> PacketHeader {
        PacketHeader::new(Timestamp::default(), caplen as u32, origlen as u32)
    }

    #[test]
    fn nothing_configured() {
        let mut data = ipv4_udp_frame();
        let orig = data.clone();
        let mut hdr = header(data.len(), data.len());
        let status = edit_packet(
            &EditConfig::default(),
            &mut hdr,
            &mut data,
            &Layers::ipv4(14),
            Direction::ClientToServer,
        )
        .unwrap();
        assert_eq!(status, Status::Ok);
        assert_eq!(data, orig);
    }

    #[test]
    fn ttl_change_recomputes_checksums() {
        let config = EditConfig {
            ttl: TtlMode::Set(10),
            ..EditConfig::default()
        };
        let mut data = ipv4_udp_frame();
        let mut hdr = header(data.len(), data.len());
        let status = edit_packet(
            &config,
            &mut hdr,
            &mut data,
            &Layers::ipv4(14),
            Direction::ClientToServer,
        )
        .unwrap();
        assert_eq!(status, Status::Ok);
        assert_eq!(data[22], 10);
        assert_ne!(&data[24..26], &[0, 0]);
        assert_ne!(&data[40..42], &[0, 0]);
    }

    #[test]
    fn unchanged_ttl_skips_checksums() {
        let config = EditConfig {
            ttl: TtlMode::Set(64),
            ..EditConfig::default()
        };
        let mut data = ipv4_udp_frame();
        let orig = data.clone();
        let mut hdr = header(data.len(), data.len());
        edit_packet(
            &config,
            &mut hdr,
            &mut data,
            &Layers::ipv4(14),
            Direction::ClientToServer,
        )
        .unwrap();
        assert_eq!(data, orig);
    }

    #[test]
    fn truncate_fixes_length() {
        let config = EditConfig {
            fixlen: FixLen::Truncate,
            ..EditConfig::default()
        };
        let mut data = ipv4_udp_frame();
        data.truncate(40);
        let mut hdr = header(40, 46);
        let status = edit_packet(
            &config,
            &mut hdr,
            &mut data,
            &Layers::ipv4(14),
            Direction::ClientToServer,
        )
        .unwrap();
        assert_eq!(hdr.origlen, 40);
        assert_eq!(&data[16..18], &26u16.to_be_bytes());
        // UDP header is 6 bytes long
        assert!(status.is_warn());
        assert_ne!(&data[24..26], &[0, 0]);
    }

    #[test]
    fn non_ip_frame_untouched() {
        let config = EditConfig {
            seed: Some(42),
            fix_checksums: true,
            ..EditConfig::default()
        };
        let mut data = vec![0x55u8; 60];
        let orig = data.clone();
        let mut hdr = header(60, 60);
        let status = edit_packet(
            &config,
            &mut hdr,
            &mut data,
            &Layers::new(14, None),
            Direction::ServerToClient,
        )
        .unwrap();
        assert_eq!(status, Status::Ok);
        assert_eq!(data, orig);
    }

    #[test]
    fn nothing_configured_header_cut() {
        let mut data = ipv4_udp_frame();
        data.truncate(20);
        let orig = data.clone();
        let mut hdr = header(20, 46);
        let status = edit_packet(
            &EditConfig::default(),
            &mut hdr,
            &mut data,
            &Layers::ipv4(14),
            Direction::ClientToServer,
        )
        .unwrap();
        assert_eq!(status, Status::Ok);
        assert_eq!(data, orig);
        assert_eq!(hdr, header(20, 46));
    }

    #[test]
    fn buffer_shorter_than_caplen() {
        let mut data = ipv4_udp_frame();
        let mut hdr = header(data.len() + 10, data.len() + 10);
        let r = edit_packet(
            &EditConfig::default(),
            &mut hdr,
            &mut data,
            &Layers::ipv4(14),
            Direction::ClientToServer,
        );
        assert!(matches!(r, Err(Error::BufferTooShort { .. })));
    }
}

//! In-place editing of captured IPv4, IPv6 and ARP packets
//!
//! The caller classifies each frame (link-layer length, network header
//! offset) and passes it with an [`EditConfig`] to [`edit_packet`], which
//! repairs lengths, rewrites TTL and addresses, then fixes checksums.
//! Individual operations are also exported.

pub mod addr;
mod arp;
mod chain;
mod checksum;
mod cidr;
mod config;
mod edit;
mod fixlen;
mod ip_rewrite;
mod l7;
mod layers;
mod status;
mod ttl;

pub use arp::*;
pub use chain::*;
pub use checksum::*;
pub use cidr::*;
pub use config::*;
pub use edit::*;
pub use fixlen::*;
pub use ip_rewrite::*;
pub use l7::*;
pub use layers::*;
pub use status::*;
pub use ttl::*;

pub use libpcap_tools::{Error, PacketHeader, Timestamp};

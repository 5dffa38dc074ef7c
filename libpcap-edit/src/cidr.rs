use libpcap_tools::Error;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// A network prefix: address and number of leading network bits
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cidr {
    V4 { network: Ipv4Addr, masklen: u8 },
    V6 { network: Ipv6Addr, masklen: u8 },
}

impl Cidr {
    pub fn new(network: IpAddr, masklen: u8) -> Result<Cidr, Error> {
        match network {
            IpAddr::V4(network) if masklen <= 32 => Ok(Cidr::V4 { network, masklen }),
            IpAddr::V6(network) if masklen <= 128 => Ok(Cidr::V6 { network, masklen }),
            _ => Err(Error::InvalidConfig(format!(
                "prefix length {masklen} out of range for {network}"
            ))),
        }
    }

    pub fn masklen(&self) -> u8 {
        match *self {
            Cidr::V4 { masklen, .. } | Cidr::V6 { masklen, .. } => masklen,
        }
    }

    /// Host-order mask with the `masklen` high bits set
    pub(crate) fn v4_mask(masklen: u8) -> u32 {
        u32::MAX.checked_shl(32 - u32::from(masklen)).unwrap_or(0)
    }

    pub fn contains_v4(&self, addr: Ipv4Addr) -> bool {
        match *self {
            Cidr::V4 { network, masklen } => {
                let mask = Cidr::v4_mask(masklen);
                u32::from(network) & mask == u32::from(addr) & mask
            }
            Cidr::V6 { .. } => false,
        }
    }

    pub fn contains_v6(&self, addr: &[u8; 16]) -> bool {
        match *self {
            Cidr::V6 { network, masklen } => {
                let network = network.octets();
                let full = usize::from(masklen / 8);
                if network[..full] != addr[..full] {
                    return false;
                }
                let rem = masklen % 8;
                if rem == 0 {
                    return true;
                }
                let mask = 0xffu8 << (8 - rem);
                network[full] & mask == addr[full] & mask
            }
            Cidr::V4 { .. } => false,
        }
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cidr::V4 { network, masklen } => write!(f, "{network}/{masklen}"),
            Cidr::V6 { network, masklen } => write!(f, "{network}/{masklen}"),
        }
    }
}

impl FromStr for Cidr {
    type Err = Error;

    /// Parse `addr/len`. A bare address is a host prefix (/32 or /128).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr_s, len_s) = match s.split_once('/') {
            Some((a, l)) => (a, Some(l)),
            None => (s, None),
        };
        let addr = IpAddr::from_str(addr_s)
            .map_err(|e| Error::InvalidConfig(format!("invalid CIDR '{s}': {e}")))?;
        let masklen = match len_s {
            Some(l) => l
                .parse::<u8>()
                .map_err(|e| Error::InvalidConfig(format!("invalid prefix length in '{s}': {e}")))?,
            None if addr.is_ipv4() => 32,
            None => 128,
        };
        Cidr::new(addr, masklen)
    }
}

/// One rewrite rule: addresses inside `from` are moved into `to`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CidrMap {
    pub from: Cidr,
    pub to: Cidr,
}

impl CidrMap {
    pub fn new(from: Cidr, to: Cidr) -> Self {
        CidrMap { from, to }
    }
}

fn strip_brackets(s: &str) -> &str {
    s.strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(s)
}

impl FromStr for CidrMap {
    type Err = Error;

    /// Parse `from:to`. IPv6 prefixes must be bracketed: `[2001:db8::/32]:[fd00::/16]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (from, to) = if s.starts_with('[') {
            let end = s
                .find("]:")
                .ok_or_else(|| Error::InvalidConfig(format!("invalid CIDR map '{s}'")))?;
            (&s[..=end], &s[end + 2..])
        } else {
            s.split_once(':')
                .ok_or_else(|| Error::InvalidConfig(format!("invalid CIDR map '{s}'")))?
        };
        let from = Cidr::from_str(strip_brackets(from))?;
        let to = Cidr::from_str(strip_brackets(to))?;
        Ok(CidrMap::new(from, to))
    }
}

/// Parse a comma-separated list of `from:to` rules, keeping their order
pub fn parse_cidr_maps(s: &str) -> Result<Vec<CidrMap>, Error> {
    s.split(',')
        .filter(|item| !item.trim().is_empty())
        .map(CidrMap::from_str)
        .collect()
}

/// Ordered rewrite chains, one per travel direction
///
/// For a client-to-server packet, sources are matched against `c2s` and
/// destinations against `s2c`; the roles swap for server-to-client packets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CidrChains {
    pub c2s: Vec<CidrMap>,
    pub s2c: Vec<CidrMap>,
}

impl CidrChains {
    pub fn new(c2s: Vec<CidrMap>, s2c: Vec<CidrMap>) -> Self {
        CidrChains { c2s, s2c }
    }

    /// Use the same chain for both directions
    pub fn symmetric(chain: Vec<CidrMap>) -> Self {
        CidrChains {
            s2c: chain.clone(),
            c2s: chain,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.c2s.is_empty() && self.s2c.is_empty()
    }
}

use crate::cidr::{parse_cidr_maps, CidrChains, CidrMap};
use crate::fixlen::FixLen;
use crate::ttl::TtlMode;
use libpcap_tools::{Config, Error};
use std::str::FromStr;

pub const DEFAULT_MTU: u16 = 1500;

/// Edits to apply to every packet of a run
///
/// Built once, then shared read-only by all packet processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditConfig {
    /// Seed for address randomization. `None` or 0 disables randomization
    pub seed: Option<u32>,
    /// Leave multicast and broadcast addresses untouched
    pub skip_broadcast: bool,
    pub ttl: TtlMode,
    pub fixlen: FixLen,
    pub mtu: u16,
    /// Truncate frames larger than `mtu` (plus link header)
    pub mtu_truncate: bool,
    pub cidr_chains: CidrChains,
    pub src_ip_map: Option<CidrMap>,
    pub dst_ip_map: Option<CidrMap>,
    /// Recompute checksums even if no field was changed
    pub fix_checksums: bool,
}

impl Default for EditConfig {
    fn default() -> Self {
        EditConfig {
            seed: None,
            skip_broadcast: false,
            ttl: TtlMode::Off,
            fixlen: FixLen::Off,
            mtu: DEFAULT_MTU,
            mtu_truncate: false,
            cidr_chains: CidrChains::default(),
            src_ip_map: None,
            dst_ip_map: None,
            fix_checksums: false,
        }
    }
}

fn get_ranged<T: TryFrom<i64>>(config: &Config, key: &str) -> Result<Option<T>, Error> {
    match config.get_integer(key) {
        None => Ok(None),
        Some(i) => T::try_from(i)
            .map(Some)
            .map_err(|_| Error::InvalidConfig(format!("{key}: value {i} out of range"))),
    }
}

impl EditConfig {
    /// Build the edit configuration from the `edit` section of `config`
    ///
    /// Missing keys keep their default value.
    pub fn from_config(config: &Config) -> Result<EditConfig, Error> {
        let mut c = EditConfig {
            seed: get_ranged::<u32>(config, "edit.seed")?,
            ..EditConfig::default()
        };
        if let Some(b) = config.get_bool("edit.skip_broadcast") {
            c.skip_broadcast = b;
        }
        if let Some(mode) = config.get("edit.ttl_mode") {
            let value = get_ranged::<u8>(config, "edit.ttl_value")?;
            c.ttl = TtlMode::from_parts(mode, value)?;
        }
        if let Some(fixlen) = config.get("edit.fixlen") {
            c.fixlen = FixLen::from_str(fixlen)?;
        }
        if let Some(mtu) = get_ranged::<u16>(config, "edit.mtu")? {
            if mtu == 0 {
                return Err(Error::InvalidConfig("edit.mtu: must not be 0".to_owned()));
            }
            c.mtu = mtu;
        }
        if let Some(b) = config.get_bool("edit.mtu_truncate") {
            c.mtu_truncate = b;
        }
        if let Some(pnat) = config.get("edit.pnat") {
            let c2s = parse_cidr_maps(pnat)?;
            c.cidr_chains = match config.get("edit.pnat_reverse") {
                Some(rev) => CidrChains::new(c2s, parse_cidr_maps(rev)?),
                None => CidrChains::symmetric(c2s),
            };
        } else if config.get("edit.pnat_reverse").is_some() {
            return Err(Error::InvalidConfig(
                "edit.pnat_reverse requires edit.pnat".to_owned(),
            ));
        }
        if let Some(m) = config.get("edit.srcipmap") {
            c.src_ip_map = Some(CidrMap::from_str(m)?);
        }
        if let Some(m) = config.get("edit.dstipmap") {
            c.dst_ip_map = Some(CidrMap::from_str(m)?);
        }
        if let Some(b) = config.get_bool("edit.fix_checksums") {
            c.fix_checksums = b;
        }
        Ok(c)
    }

    /// Seed to use for randomization, if enabled
    pub fn randomize_seed(&self) -> Option<u32> {
        self.seed.filter(|&s| s != 0)
    }

    /// True if any subnet remapping rule is configured
    pub fn has_remap(&self) -> bool {
        !self.cidr_chains.is_empty() || self.src_ip_map.is_some() || self.dst_ip_map.is_some()
    }

    /// True if lengths may have to be fixed (padding, truncation or MTU)
    pub fn has_length_fixup(&self) -> bool {
        self.fixlen != FixLen::Off || self.mtu_truncate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(s: &str) -> Config {
        let mut config = Config::default();
        config.load_config(s.as_bytes()).expect("load config");
        config
    }

    #[test]
    fn defaults() {
        let c = EditConfig::from_config(&Config::default()).unwrap();
        assert_eq!(c, EditConfig::default());
        assert_eq!(c.mtu, 1500);
        assert!(!c.has_remap());
        assert!(!c.has_length_fixup());
        assert_eq!(c.randomize_seed(), None);
    }

    #[test]
    fn full_section() {
        let config = load(
            r#"
[edit]
seed = 305419896
skip_broadcast = true
ttl_mode = "sub"
ttl_value = 3
fixlen = "trunc"
mtu = 1400
mtu_truncate = true
pnat = "10.0.0.0/8:172.16.0.0/12,192.168.0.0/16:10.1.0.0/16"
pnat_reverse = "172.16.0.0/12:10.0.0.0/8"
srcipmap = "1.2.3.0/24:4.5.6.0/24"
dstipmap = "[2001:db8::/32]:[fd00::/16]"
fix_checksums = true
"#,
        );
        let c = EditConfig::from_config(&config).unwrap();
        assert_eq!(c.randomize_seed(), Some(0x1234_5678));
        assert!(c.skip_broadcast);
        assert_eq!(c.ttl, TtlMode::Sub(3));
        assert_eq!(c.fixlen, FixLen::Truncate);
        assert_eq!(c.mtu, 1400);
        assert!(c.mtu_truncate);
        assert_eq!(c.cidr_chains.c2s.len(), 2);
        assert_eq!(c.cidr_chains.s2c.len(), 1);
        assert_eq!(c.src_ip_map.unwrap().to.to_string(), "4.5.6.0/24");
        assert_eq!(c.dst_ip_map.unwrap().from.to_string(), "2001:db8::/32");
        assert!(c.fix_checksums);
        assert!(c.has_remap());
        assert!(c.has_length_fixup());
    }

    #[test]
    fn single_pnat_is_symmetric() {
        let config = load("[edit]\npnat = \"10.0.0.0/8:11.0.0.0/8\"\n");
        let c = EditConfig::from_config(&config).unwrap();
        assert_eq!(c.cidr_chains.c2s, c.cidr_chains.s2c);
    }

    #[test]
    fn seed_zero_disables_randomization() {
        let config = load("[edit]\nseed = 0\n");
        let c = EditConfig::from_config(&config).unwrap();
        assert_eq!(c.seed, Some(0));
        assert_eq!(c.randomize_seed(), None);
    }

    #[test]
    fn invalid_values() {
        for s in [
            "[edit]\nttl_mode = \"mul\"\nttl_value = 2\n",
            "[edit]\nttl_mode = \"set\"\n",
            "[edit]\nttl_mode = \"set\"\nttl_value = 300\n",
            "[edit]\nfixlen = \"stretch\"\n",
            "[edit]\nseed = -1\n",
            "[edit]\nmtu = 0\n",
            "[edit]\nmtu = 70000\n",
            "[edit]\npnat = \"10.0.0.0/8\"\n",
            "[edit]\npnat_reverse = \"10.0.0.0/8:11.0.0.0/8\"\n",
            "[edit]\nsrcipmap = \"10.0.0.0/40:11.0.0.0/8\"\n",
        ] {
            let config = load(s);
            match EditConfig::from_config(&config) {
                Err(Error::InvalidConfig(_)) => (),
                r => panic!("expected InvalidConfig for {s:?}, got {r:?}"),
            }
        }
    }
}

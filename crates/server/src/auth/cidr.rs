// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dotted-quad CIDR blocks for API-key IP allowlists. Hand-rolled rather
//! than pulled from a crate: the only operation needed is "does this IPv4
//! address fall inside this /n block", which is a mask-and-compare.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl Cidr {
    fn mask(prefix_len: u8) -> u32 {
        if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - prefix_len as u32)
        }
    }

    /// Whether `ip` falls inside this block. IPv6 addresses never match: an
    /// allowlist of IPv4 blocks doesn't implicitly permit every IPv6 caller.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(addr) => {
                let mask = Self::mask(self.prefix_len);
                u32::from(addr) & mask == u32::from(self.network) & mask
            }
            IpAddr::V6(_) => false,
        }
    }
}

impl FromStr for Cidr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_part, prefix_part) = s.split_once('/').ok_or_else(|| format!("'{s}' is missing a /prefix-length"))?;
        let network: Ipv4Addr = addr_part.parse().map_err(|_| format!("'{addr_part}' is not a dotted-quad IPv4 address"))?;
        let prefix_len: u8 = prefix_part.parse().map_err(|_| format!("'{prefix_part}' is not a valid prefix length"))?;
        if prefix_len > 32 {
            return Err(format!("prefix length {prefix_len} exceeds 32"));
        }
        Ok(Self { network, prefix_len })
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl Serialize for Cidr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Cidr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_24_matches_same_subnet_only() {
        let block: Cidr = "10.0.0.0/24".parse().expect("parses");
        assert!(block.contains("10.0.0.1".parse().expect("ip")));
        assert!(block.contains("10.0.0.255".parse().expect("ip")));
        assert!(!block.contains("10.0.1.1".parse().expect("ip")));
    }

    #[test]
    fn slash_32_matches_exactly_one_address() {
        let block: Cidr = "192.168.1.5/32".parse().expect("parses");
        assert!(block.contains("192.168.1.5".parse().expect("ip")));
        assert!(!block.contains("192.168.1.6".parse().expect("ip")));
    }

    #[test]
    fn slash_0_matches_everything_v4() {
        let block: Cidr = "0.0.0.0/0".parse().expect("parses");
        assert!(block.contains("8.8.8.8".parse().expect("ip")));
    }

    #[test]
    fn ipv6_never_matches() {
        let block: Cidr = "0.0.0.0/0".parse().expect("parses");
        assert!(!block.contains("::1".parse().expect("ip")));
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!("10.0.0.0".parse::<Cidr>().is_err());
    }

    #[test]
    fn rejects_oversized_prefix() {
        assert!("10.0.0.0/33".parse::<Cidr>().is_err());
    }
}

//! IPv4 CIDR block math.
//!
//! Parsing tolerates host bits the way non-strict network parsing does:
//! `192.168.1.5/24` normalizes to `192.168.1.0/24`.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use rand::Rng;

use crate::error::IpamError;

/// An IPv4 network block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpBlock {
    network: u32,
    prefix_len: u8,
}

impl FromStr for IpBlock {
    type Err = IpamError;

    fn from_str(s: &str) -> Result<Self, IpamError> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| IpamError::InvalidBlock(format!("{s}: missing prefix length")))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|e| IpamError::InvalidBlock(format!("{s}: {e}")))?;
        let prefix_len: u8 = len
            .parse()
            .map_err(|e| IpamError::InvalidBlock(format!("{s}: {e}")))?;
        if prefix_len > 32 {
            return Err(IpamError::InvalidBlock(format!(
                "{s}: prefix length above 32"
            )));
        }

        let mask = mask_for(prefix_len);
        Ok(Self {
            network: u32::from(addr) & mask,
            prefix_len,
        })
    }
}

impl fmt::Display for IpBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network_address(), self.prefix_len)
    }
}

impl IpBlock {
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn network_address(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    pub fn broadcast_address(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network | !mask_for(self.prefix_len))
    }

    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(mask_for(self.prefix_len))
    }

    pub fn num_addresses(&self) -> u64 {
        1u64 << (32 - self.prefix_len)
    }

    /// The address `index` positions into the block, if the block is that
    /// large.
    pub fn address_at_index(&self, index: u64) -> Option<Ipv4Addr> {
        if index >= self.num_addresses() {
            return None;
        }
        Some(Ipv4Addr::from(self.network + index as u32))
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        u32::from(address) & mask_for(self.prefix_len) == self.network
    }

    /// A uniformly-random address within the block.
    pub fn random_address(&self) -> Ipv4Addr {
        let offset = rand::thread_rng().gen_range(0..self.num_addresses());
        Ipv4Addr::from(self.network + offset as u32)
    }
}

fn mask_for(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let block: IpBlock = "192.168.1.0/24".parse().unwrap();
        assert_eq!(block.to_string(), "192.168.1.0/24");
        assert_eq!(block.prefix_len(), 24);
    }

    #[test]
    fn host_bits_are_masked_off() {
        let block: IpBlock = "192.168.1.57/24".parse().unwrap();
        assert_eq!(block.network_address(), Ipv4Addr::new(192, 168, 1, 0));
    }

    #[test]
    fn bad_blocks_are_rejected() {
        assert!("192.168.1.0".parse::<IpBlock>().is_err());
        assert!("not-an-ip/24".parse::<IpBlock>().is_err());
        assert!("192.168.1.0/33".parse::<IpBlock>().is_err());
        assert!("192.168.1.0/abc".parse::<IpBlock>().is_err());
    }

    #[test]
    fn block_geometry() {
        let block: IpBlock = "10.1.2.0/24".parse().unwrap();
        assert_eq!(block.broadcast_address(), Ipv4Addr::new(10, 1, 2, 255));
        assert_eq!(block.netmask(), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(block.num_addresses(), 256);
    }

    #[test]
    fn address_at_index_is_bounded() {
        let block: IpBlock = "10.1.2.0/30".parse().unwrap();
        assert_eq!(
            block.address_at_index(1),
            Some(Ipv4Addr::new(10, 1, 2, 1))
        );
        assert_eq!(
            block.address_at_index(3),
            Some(Ipv4Addr::new(10, 1, 2, 3))
        );
        assert_eq!(block.address_at_index(4), None);
    }

    #[test]
    fn containment() {
        let block: IpBlock = "10.1.2.0/24".parse().unwrap();
        assert!(block.contains(Ipv4Addr::new(10, 1, 2, 200)));
        assert!(!block.contains(Ipv4Addr::new(10, 1, 3, 1)));
    }

    #[test]
    fn random_addresses_stay_in_block() {
        let block: IpBlock = "172.16.4.0/26".parse().unwrap();
        for _ in 0..100 {
            assert!(block.contains(block.random_address()));
        }
    }

    #[test]
    fn tiny_blocks() {
        let one: IpBlock = "10.0.0.1/32".parse().unwrap();
        assert_eq!(one.num_addresses(), 1);
        assert_eq!(one.network_address(), one.broadcast_address());

        let two: IpBlock = "10.0.0.0/31".parse().unwrap();
        assert_eq!(two.num_addresses(), 2);
    }
}

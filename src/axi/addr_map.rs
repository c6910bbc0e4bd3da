use crate::{TbError, TbResult};

/// Destination regions, indexed by destination (slave) number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddrMap {
    regions: Vec<(u64, u64)>,
}

impl AddrMap {
    pub fn new() -> Self {
        AddrMap {
            regions: Vec::new(),
        }
    }

    /// Adds the inclusive range `[low, high]` as the next destination.
    pub fn with_region(mut self, low: u64, high: u64) -> TbResult<Self> {
        self.push_region(low, high)?;
        Ok(self)
    }

    pub fn push_region(&mut self, low: u64, high: u64) -> TbResult<usize> {
        if low > high {
            return Err(TbError::config(format!(
                "empty address region [{:#x}, {:#x}]",
                low, high
            )));
        }
        self.regions.push((low, high));
        Ok(self.regions.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn region(&self, dst: usize) -> Option<(u64, u64)> {
        self.regions.get(dst).copied()
    }

    /// First destination whose region contains `addr`.
    pub fn resolve(&self, addr: u64) -> TbResult<usize> {
        self.regions
            .iter()
            .position(|&(low, high)| addr >= low && addr <= high)
            .ok_or(TbError::AddrNotMapped { addr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_slaves() -> AddrMap {
        AddrMap::new()
            .with_region(0x0, 0xffff)
            .and_then(|m| m.with_region(0x1_0000, 0x1_ffff))
            .unwrap()
    }

    #[test]
    fn resolves_inclusive_bounds() {
        let map = two_slaves();
        assert_eq!(map.resolve(0x0).unwrap(), 0);
        assert_eq!(map.resolve(0xffff).unwrap(), 0);
        assert_eq!(map.resolve(0x1_0000).unwrap(), 1);
        assert_eq!(map.resolve(0x1_ffff).unwrap(), 1);
        // same answer every time
        assert_eq!(map.resolve(0x1_0040).unwrap(), map.resolve(0x1_0040).unwrap());
    }

    #[test]
    fn first_match_wins() {
        let map = AddrMap::new()
            .with_region(0x0, 0xff)
            .and_then(|m| m.with_region(0x80, 0x1ff))
            .unwrap();
        assert_eq!(map.resolve(0x90).unwrap(), 0);
        assert_eq!(map.resolve(0x100).unwrap(), 1);
    }

    #[test]
    fn unmapped_address_is_an_error() {
        let map = two_slaves();
        assert!(matches!(
            map.resolve(0x2_0000),
            Err(TbError::AddrNotMapped { addr: 0x2_0000 })
        ));
        assert!(AddrMap::new().push_region(0x10, 0x0f).is_err());
    }
}

//! Sector addressing and the flash topology probed at `Init`.

use crate::constants::{
    DEFAULT_TOP_SECTOR, DEVICE_ID0_FLASH_256K, DEVICE_ID0_FLASH_MASK, SECTOR_SIZE,
    SMALL_TOP_SECTOR,
};

/// Convert a flash address to its sector number.
///
/// No bounds checking is done here: an address past the end of flash maps to
/// a sector number the IAP ROM rejects with `INVALID_SECTOR`.
#[inline]
pub const fn address_to_sector(address: u32) -> u32 {
    address / SECTOR_SIZE
}

/// Start address of `sector`
#[inline]
pub const fn sector_to_address(sector: u32) -> u32 {
    sector * SECTOR_SIZE
}

/// Sectors touched by `len` bytes starting at `address`, as an inclusive range.
///
/// Returns `None` for an empty range.
pub fn sectors_spanning(address: u32, len: u32) -> Option<(u32, u32)> {
    if len == 0 {
        return None;
    }
    let last = address.checked_add(len - 1)?;
    Some((address_to_sector(address), address_to_sector(last)))
}

/// Flash layout of the attached part. Only the highest sector index varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Topology {
    top_sector: u32,
}

impl Default for Topology {
    /// The 512 KiB layout, used until a device ID has been read.
    fn default() -> Self {
        Topology {
            top_sector: DEFAULT_TOP_SECTOR,
        }
    }
}

impl Topology {
    pub const fn new(top_sector: u32) -> Self {
        Topology { top_sector }
    }

    /// Classify a part from its SYSCON DEVICE_ID0 value.
    pub const fn from_device_id(device_id0: u32) -> Self {
        if device_id0 & DEVICE_ID0_FLASH_MASK == DEVICE_ID0_FLASH_256K {
            Topology::new(SMALL_TOP_SECTOR)
        } else {
            Topology::new(DEFAULT_TOP_SECTOR)
        }
    }

    pub const fn top_sector(&self) -> u32 {
        self.top_sector
    }

    pub const fn sector_count(&self) -> u32 {
        self.top_sector + 1
    }

    pub const fn flash_size(&self) -> u32 {
        self.sector_count() * SECTOR_SIZE
    }
}

impl core::fmt::Display for Topology {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} sectors x {}KiB ({}KiB)",
            self.sector_count(),
            SECTOR_SIZE / 1024,
            self.flash_size() / 1024
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_is_floor_of_address() {
        assert_eq!(address_to_sector(0), 0);
        assert_eq!(address_to_sector(SECTOR_SIZE - 1), 0);
        assert_eq!(address_to_sector(SECTOR_SIZE), 1);
        assert_eq!(address_to_sector(5 * SECTOR_SIZE + 0x100), 5);
        assert_eq!(address_to_sector(0x0007_ffff), 15);
        for a in (0..0x0008_0000u32).step_by(0x1f01) {
            assert_eq!(address_to_sector(a), a / 32768);
        }
    }

    #[test]
    fn out_of_range_address_is_not_clamped() {
        assert_eq!(address_to_sector(0x0010_0000), 32);
        assert_eq!(address_to_sector(u32::MAX), u32::MAX / SECTOR_SIZE);
    }

    #[test]
    fn spanning_sectors() {
        assert_eq!(sectors_spanning(0, 0), None);
        assert_eq!(sectors_spanning(0, 1), Some((0, 0)));
        assert_eq!(sectors_spanning(0, SECTOR_SIZE), Some((0, 0)));
        assert_eq!(sectors_spanning(0, SECTOR_SIZE + 1), Some((0, 1)));
        assert_eq!(sectors_spanning(SECTOR_SIZE - 4, 8), Some((0, 1)));
        assert_eq!(sectors_spanning(u32::MAX, 2), None);
    }

    #[test]
    fn topology_from_device_id() {
        assert_eq!(Topology::default().top_sector(), 15);
        assert_eq!(Topology::from_device_id(0x8844_5101).top_sector(), 7);
        assert_eq!(Topology::from_device_id(0x0040_0000).top_sector(), 7);
        assert_eq!(Topology::from_device_id(0x8854_5102).top_sector(), 15);
        assert_eq!(Topology::from_device_id(0).top_sector(), 15);
        assert_eq!(Topology::from_device_id(0x00c0_0000).top_sector(), 15);
        assert_eq!(Topology::from_device_id(0x8844_5101).flash_size(), 256 * 1024);
        assert_eq!(Topology::default().flash_size(), 512 * 1024);
    }
}

//! On-chip target: the LPC5410x boot ROM and SYSCON registers.
use core::ptr;

use super::Target;
use crate::clock;
use crate::constants::{FLASH_BASE, IAP_ENTRY, IAP_WORDS, SYSCON_DEVICE_ID0};
use crate::iap::Iap;
use crate::protocol::{Command, Response, Status};
use crate::sector::Topology;

type IapEntry = unsafe extern "C" fn(command: *const u32, result: *mut u32);

/// Only usable when running on the LPC5410x itself.
pub struct RomTarget {
    clock_update: fn() -> u32,
}

impl Default for RomTarget {
    fn default() -> Self {
        RomTarget::new(clock::lpc5410x_reset_clock)
    }
}

impl RomTarget {
    /// `clock_update` plays the part of `SystemCoreClockUpdate`.
    pub const fn new(clock_update: fn() -> u32) -> Self {
        RomTarget { clock_update }
    }
}

/// Check `len` bytes at `address` lie inside the flash of the part reporting
/// `device_id0`.
fn check_flash_window(device_id0: u32, address: u32, len: usize) -> Result<(), Status> {
    let flash_end = FLASH_BASE as u64 + Topology::from_device_id(device_id0).flash_size() as u64;
    if address as u64 + len as u64 > flash_end {
        return Err(Status::SrcAddrNotMapped);
    }
    Ok(())
}

impl Iap for RomTarget {
    fn execute(&mut self, cmd: &Command<'_>) -> Response {
        let command = cmd.to_words();
        let mut result = [0u32; IAP_WORDS];
        // SAFETY: IAP_ENTRY is the documented ROM entry point and both tables
        // are five words long, as the ROM expects.
        unsafe {
            let entry: IapEntry = core::mem::transmute::<usize, IapEntry>(IAP_ENTRY as usize);
            entry(command.as_ptr(), result.as_mut_ptr());
        }
        Response::from_words(result)
    }
}

impl Target for RomTarget {
    fn system_core_clock_update(&mut self) -> u32 {
        (self.clock_update)()
    }

    fn read_device_id0(&mut self) -> u32 {
        // SAFETY: fixed, always readable SYSCON register
        unsafe { ptr::read_volatile(SYSCON_DEVICE_ID0 as usize as *const u32) }
    }

    fn read_flash(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Status> {
        let device_id0 = self.read_device_id0();
        check_flash_window(device_id0, address, buf.len())?;
        for (i, b) in buf.iter_mut().enumerate() {
            // SAFETY: inside the flash window checked above
            *b = unsafe { ptr::read_volatile((address as usize + i) as *const u8) };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_window_follows_part_size() {
        let small = 0x8844_5101;
        let large = 0x8854_5102;
        assert_eq!(check_flash_window(small, 0x3_ff00, 256), Ok(()));
        assert_eq!(check_flash_window(small, 0x3_ff00, 257), Err(Status::SrcAddrNotMapped));
        assert_eq!(check_flash_window(small, 0x4_0000, 1), Err(Status::SrcAddrNotMapped));
        assert_eq!(check_flash_window(large, 0x4_0000, 256), Ok(()));
        assert_eq!(check_flash_window(large, 0x7_ff00, 256), Ok(()));
        assert_eq!(check_flash_window(large, 0x7_ff00, 257), Err(Status::SrcAddrNotMapped));
        assert_eq!(check_flash_window(large, u32::MAX, 2), Err(Status::SrcAddrNotMapped));
    }
}

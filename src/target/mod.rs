//! Abstract flash target interface.
use crate::iap::Iap;
use crate::protocol::Status;

pub use self::rom::RomTarget;
#[cfg(feature = "std")]
pub use self::sim::{Call, CallKind, SimTarget};

mod rom;
#[cfg(feature = "std")]
mod sim;

/// Everything the flash algorithm needs from the part it runs on.
/// Might be the chip itself or a simulation of it.
pub trait Target: Iap {
    /// Re-evaluate the clock tree and return the core clock in Hz.
    fn system_core_clock_update(&mut self) -> u32;

    /// SYSCON DEVICE_ID0
    fn read_device_id0(&mut self) -> u32;

    /// Read memory-mapped flash.
    ///
    /// Fails with `SrcAddrNotMapped` if any byte lies outside flash.
    fn read_flash(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Status>;
}

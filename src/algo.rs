//! The FlashOS flash algorithm for LPC5410x internal flash.
//!
//! A debug host calls `init`, any mix of erase/program/verify operations,
//! then `uninit`. Call order is the host's business and is not checked here.
//!
//! `blank_check` and `verify` read flash back and compare. Earlier ports of
//! this algorithm always reported success for both.

use core::fmt;

use crate::clock::{CoreClock, LPC5410X_IRC_HZ};
use crate::constants::{DEFAULT_TOP_SECTOR, PAGE_SIZE};
use crate::iap::IapError;
use crate::sector::{Topology, address_to_sector};
use crate::target::Target;

/// What the host intends to do between `Init` and `UnInit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Erase = 1,
    Program = 2,
    Verify = 3,
}

impl TryFrom<u32> for Function {
    type Error = u32;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Function::Erase),
            2 => Ok(Function::Program),
            3 => Ok(Function::Verify),
            other => Err(other),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Function::Erase => "erase",
            Function::Program => "program",
            Function::Verify => "verify",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AlgoError {
    #[error(transparent)]
    Iap(#[from] IapError),
    #[error("flash not blank at 0x{address:08x}: found 0x{found:02x}")]
    NotBlank { address: u32, found: u8 },
    #[error("flash not readable at 0x{address:08x}")]
    Unreadable { address: u32 },
}

impl AlgoError {
    /// Value returned to the host: the IAP status, or 1 for checks done here
    pub const fn code(&self) -> u32 {
        match self {
            AlgoError::Iap(e) => e.code(),
            AlgoError::NotBlank { .. } | AlgoError::Unreadable { .. } => 1,
        }
    }
}

/// First address that does not hold the expected data
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("verify failed at 0x{address:08x}")]
pub struct VerifyMismatch {
    pub address: u32,
}

/// Integer result of an operation, as FlashOS hosts expect it
pub fn status_code(result: Result<(), AlgoError>) -> u32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}

/// Integer result of `verify`: end address on success, else the failing address
pub fn verify_code(result: Result<u32, VerifyMismatch>) -> u32 {
    match result {
        Ok(end) => end,
        Err(e) => e.address,
    }
}

pub struct FlashAlgorithm<T: Target> {
    target: T,
    topology: Topology,
    clock: CoreClock,
}

impl<T: Target> FlashAlgorithm<T> {
    /// The topology stays at its 512 KiB default until `init` probes the part.
    pub const fn new(target: T) -> Self {
        FlashAlgorithm {
            target,
            topology: Topology::new(DEFAULT_TOP_SECTOR),
            clock: CoreClock::new(LPC5410X_IRC_HZ),
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn into_target(self) -> T {
        self.target
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn core_clock(&self) -> CoreClock {
        self.clock
    }

    /// Refresh the core clock and probe the flash size. Cannot fail.
    pub fn init(&mut self, address: u32, clock_hz: u32, function: u32) -> Result<(), AlgoError> {
        match Function::try_from(function) {
            Ok(func) => log::debug!(
                "Init(0x{:08x}, {} Hz) for {}",
                address,
                clock_hz,
                func
            ),
            Err(code) => log::debug!(
                "Init(0x{:08x}, {} Hz) with unknown function {}",
                address,
                clock_hz,
                code
            ),
        }
        let hz = self.target.system_core_clock_update();
        self.clock.update(hz);

        let device_id0 = self.target.read_device_id0();
        self.topology = Topology::from_device_id(device_id0);
        log::debug!("DEVICE_ID0 0x{:08x}: {}", device_id0, self.topology);
        Ok(())
    }

    pub fn uninit(&mut self, function: u32) -> Result<(), AlgoError> {
        log::debug!("UnInit({})", function);
        Ok(())
    }

    /// Check every byte of `[address, address + size)` equals `pattern`.
    pub fn blank_check(&mut self, address: u32, size: u32, pattern: u8) -> Result<(), AlgoError> {
        let mut chunk = [0u8; PAGE_SIZE as usize];
        let mut offset = 0u32;
        while offset < size {
            let n = (size - offset).min(PAGE_SIZE);
            let at = address.wrapping_add(offset);
            let buf = &mut chunk[..n as usize];
            self.target
                .read_flash(at, buf)
                .map_err(|_| AlgoError::Unreadable { address: at })?;
            if let Some(pos) = buf.iter().position(|&b| b != pattern) {
                return Err(AlgoError::NotBlank {
                    address: at.wrapping_add(pos as u32),
                    found: buf[pos],
                });
            }
            offset += n;
        }
        Ok(())
    }

    /// Compare flash at `address` with the first `size` bytes of `data`.
    ///
    /// Returns `address + size` on a match. If `data` is shorter than `size`,
    /// the first address past `data` counts as a mismatch.
    pub fn verify(&mut self, address: u32, size: u32, data: &[u8]) -> Result<u32, VerifyMismatch> {
        let expected = &data[..data.len().min(size as usize)];
        let mut chunk = [0u8; PAGE_SIZE as usize];
        for (i, want) in expected.chunks(PAGE_SIZE as usize).enumerate() {
            let at = address.wrapping_add(i as u32 * PAGE_SIZE);
            let have = &mut chunk[..want.len()];
            self.target
                .read_flash(at, have)
                .map_err(|_| VerifyMismatch { address: at })?;
            if let Some(pos) = have.iter().zip(want).position(|(h, w)| h != w) {
                return Err(VerifyMismatch {
                    address: at.wrapping_add(pos as u32),
                });
            }
        }
        if expected.len() < size as usize {
            return Err(VerifyMismatch {
                address: address.wrapping_add(expected.len() as u32),
            });
        }
        Ok(address.wrapping_add(size))
    }

    pub fn erase_chip(&mut self) -> Result<(), AlgoError> {
        let top = self.topology.top_sector();
        self.target.prepare_sectors(0, top)?;
        self.target.erase_sectors(0, top, self.clock.khz())?;
        Ok(())
    }

    /// Erase the sector holding `address`, then blank check it.
    pub fn erase_sector(&mut self, address: u32) -> Result<(), AlgoError> {
        let sector = address_to_sector(address);
        self.target.prepare_sectors(sector, sector)?;
        self.target.erase_sectors(sector, sector, self.clock.khz())?;
        self.target.blank_check_sectors(sector, sector)?;
        Ok(())
    }

    /// Program `size` bytes of `data` at `address`.
    ///
    /// Page alignment and size are left to the host; the ROM rejects bad ones.
    pub fn program_page(&mut self, address: u32, size: u32, data: &[u8]) -> Result<(), AlgoError> {
        let sector = address_to_sector(address);
        let data = &data[..data.len().min(size as usize)];
        self.target.prepare_sectors(sector, sector)?;
        self.target
            .copy_ram_to_flash(address, data, self.clock.khz())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_codes() {
        assert_eq!(Function::try_from(1), Ok(Function::Erase));
        assert_eq!(Function::try_from(2), Ok(Function::Program));
        assert_eq!(Function::try_from(3), Ok(Function::Verify));
        assert_eq!(Function::try_from(0), Err(0));
        assert_eq!(Function::Program.to_string(), "program");
    }

    #[test]
    fn integer_results() {
        assert_eq!(status_code(Ok(())), 0);
        assert_eq!(status_code(Err(AlgoError::NotBlank { address: 0, found: 0 })), 1);
        assert_eq!(verify_code(Ok(0x1100)), 0x1100);
        assert_eq!(verify_code(Err(VerifyMismatch { address: 0x1004 })), 0x1004);
    }
}

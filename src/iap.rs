//! In-application programming call adapter.
//!
//! Each primitive issues exactly one ROM command and hands the status back
//! untouched. There are no retries here.

use crate::protocol::{Command, Response, Status};

/// A failed IAP command. The raw ROM status is available via [`IapError::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[error("IAP {command} failed: {status} (status {})", .status.code())]
pub struct IapError {
    pub command: &'static str,
    pub status: Status,
}

impl IapError {
    pub const fn code(&self) -> u32 {
        self.status.code()
    }
}

/// Abstraction of the IAP service.
/// On the chip this is the boot ROM, on the host a simulated flash controller.
pub trait Iap {
    /// Run one command and return the raw result table.
    fn execute(&mut self, cmd: &Command<'_>) -> Response;

    fn call(&mut self, cmd: Command<'_>) -> Result<Response, IapError> {
        log::trace!("=> {}", cmd);
        let resp = self.execute(&cmd);
        log::trace!("<= {:?}", resp);
        if resp.is_ok() {
            Ok(resp)
        } else {
            log::debug!("{} returned {}: {}", cmd, resp.status().code(), resp.status());
            Err(IapError {
                command: cmd.name(),
                status: resp.status(),
            })
        }
    }

    fn prepare_sectors(&mut self, start: u32, end: u32) -> Result<(), IapError> {
        self.call(Command::prepare(start, end)).map(drop)
    }

    fn erase_sectors(&mut self, start: u32, end: u32, clock_khz: u32) -> Result<(), IapError> {
        self.call(Command::erase(start, end, clock_khz)).map(drop)
    }

    fn blank_check_sectors(&mut self, start: u32, end: u32) -> Result<(), IapError> {
        self.call(Command::blank_check(start, end)).map(drop)
    }

    fn copy_ram_to_flash(&mut self, dst: u32, src: &[u8], clock_khz: u32) -> Result<(), IapError> {
        self.call(Command::copy_ram_to_flash(dst, src, clock_khz))
            .map(drop)
    }

    fn read_part_id(&mut self) -> Result<u32, IapError> {
        Ok(self.call(Command::ReadPartId)?.results()[0])
    }

    /// Boot code version as (major, minor)
    fn read_boot_code_version(&mut self) -> Result<(u8, u8), IapError> {
        let raw = self.call(Command::ReadBootCodeVersion)?.results()[0];
        Ok(((raw >> 8) as u8, raw as u8))
    }

    fn read_uid(&mut self) -> Result<[u32; 4], IapError> {
        let resp = self.call(Command::ReadUid)?;
        let mut uid = [0u32; 4];
        uid.copy_from_slice(resp.results());
        Ok(uid)
    }
}

//! Command and result tables of the LPC5410x IAP ROM

use core::fmt;

use crate::constants::{IAP_WORDS, commands, status};

/// IAP Command
///
/// Every command is five words on the wire: the command code followed by up
/// to four parameters. Unused parameters are zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command<'a> {
    /// Unlock sectors `start..=end` for the next erase or copy.
    ///
    /// The ROM locks them again after each successful erase or copy.
    Prepare { start: u32, end: u32 },
    /// Program `src` to flash at `dst`.
    ///
    /// `dst` must be 256-byte aligned and the length one of 256, 512, 1024
    /// or 4096 bytes.
    CopyRamToFlash {
        dst: u32,
        src: &'a [u8],
        clock_khz: u32,
    },
    /// Erase sectors `start..=end`
    Erase { start: u32, end: u32, clock_khz: u32 },
    /// Check sectors `start..=end` are erased.
    ///
    /// On `SECTOR_NOT_BLANK` the results hold the offset and the contents of
    /// the first non-blank word.
    BlankCheck { start: u32, end: u32 },
    ReadPartId,
    ReadBootCodeVersion,
    /// Compare flash at `dst` with `src`.
    ///
    /// On `COMPARE_ERROR` the first result holds the offset of the mismatch.
    Compare { dst: u32, src: &'a [u8] },
    ReadUid,
}

impl<'a> Command<'a> {
    pub fn prepare(start: u32, end: u32) -> Self {
        Command::Prepare { start, end }
    }

    pub fn erase(start: u32, end: u32, clock_khz: u32) -> Self {
        Command::Erase {
            start,
            end,
            clock_khz,
        }
    }

    pub fn blank_check(start: u32, end: u32) -> Self {
        Command::BlankCheck { start, end }
    }

    pub fn copy_ram_to_flash(dst: u32, src: &'a [u8], clock_khz: u32) -> Self {
        Command::CopyRamToFlash {
            dst,
            src,
            clock_khz,
        }
    }

    pub fn compare(dst: u32, src: &'a [u8]) -> Self {
        Command::Compare { dst, src }
    }

    pub const fn code(&self) -> u32 {
        match self {
            Command::Prepare { .. } => commands::PREPARE,
            Command::CopyRamToFlash { .. } => commands::COPY_RAM_TO_FLASH,
            Command::Erase { .. } => commands::ERASE,
            Command::BlankCheck { .. } => commands::BLANK_CHECK,
            Command::ReadPartId => commands::READ_PART_ID,
            Command::ReadBootCodeVersion => commands::READ_BOOT_CODE_VERSION,
            Command::Compare { .. } => commands::COMPARE,
            Command::ReadUid => commands::READ_UID,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Command::Prepare { .. } => "Prepare",
            Command::CopyRamToFlash { .. } => "CopyRamToFlash",
            Command::Erase { .. } => "Erase",
            Command::BlankCheck { .. } => "BlankCheck",
            Command::ReadPartId => "ReadPartId",
            Command::ReadBootCodeVersion => "ReadBootCodeVersion",
            Command::Compare { .. } => "Compare",
            Command::ReadUid => "ReadUid",
        }
    }

    /// Encode the ROM command table.
    ///
    /// RAM buffers are passed by address, which is only meaningful when the
    /// table is handed to the ROM on the target itself.
    pub fn to_words(&self) -> [u32; IAP_WORDS] {
        let mut words = [0u32; IAP_WORDS];
        words[0] = self.code();
        match *self {
            Command::Prepare { start, end } | Command::BlankCheck { start, end } => {
                words[1] = start;
                words[2] = end;
            }
            Command::Erase {
                start,
                end,
                clock_khz,
            } => {
                words[1] = start;
                words[2] = end;
                words[3] = clock_khz;
            }
            Command::CopyRamToFlash {
                dst,
                src,
                clock_khz,
            } => {
                words[1] = dst;
                words[2] = src.as_ptr() as usize as u32;
                words[3] = src.len() as u32;
                words[4] = clock_khz;
            }
            Command::Compare { dst, src } => {
                words[1] = dst;
                words[2] = src.as_ptr() as usize as u32;
                words[3] = src.len() as u32;
            }
            Command::ReadPartId | Command::ReadBootCodeVersion | Command::ReadUid => (),
        }
        words
    }
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Prepare { start, end } | Command::BlankCheck { start, end } => {
                write!(f, "{}({}..={})", self.name(), start, end)
            }
            Command::Erase {
                start,
                end,
                clock_khz,
            } => write!(f, "Erase({}..={}, {}kHz)", start, end, clock_khz),
            Command::CopyRamToFlash {
                dst,
                src,
                clock_khz,
            } => write!(
                f,
                "CopyRamToFlash(0x{:08x}, {} bytes, {}kHz)",
                dst,
                src.len(),
                clock_khz
            ),
            Command::Compare { dst, src } => {
                write!(f, "Compare(0x{:08x}, {} bytes)", dst, src.len())
            }
            _ => f.write_str(self.name()),
        }
    }
}

/// IAP status code. `Success` is the only non-error value.
///
/// Unlisted codes are kept verbatim in `Unknown` so they still reach the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Status {
    #[error("command success")]
    Success,
    #[error("invalid command")]
    InvalidCommand,
    #[error("source address not word aligned")]
    SrcAddrError,
    #[error("destination address not aligned")]
    DstAddrError,
    #[error("source address not mapped")]
    SrcAddrNotMapped,
    #[error("destination address not mapped")]
    DstAddrNotMapped,
    #[error("byte count not allowed")]
    CountError,
    #[error("invalid sector number")]
    InvalidSector,
    #[error("sector not blank")]
    SectorNotBlank,
    #[error("sector not prepared for write operation")]
    SectorNotPrepared,
    #[error("source and destination differ")]
    CompareError,
    #[error("flash interface busy")]
    Busy,
    #[error("invalid parameter")]
    ParamError,
    #[error("address not aligned")]
    AddrError,
    #[error("address not mapped")]
    AddrNotMapped,
    #[error("command locked")]
    CmdLocked,
    #[error("invalid unlock code")]
    InvalidCode,
    #[error("invalid baud rate")]
    InvalidBaudRate,
    #[error("invalid stop bit")]
    InvalidStopBit,
    #[error("code read protection enabled")]
    CodeReadProtectionEnabled,
    #[error("unknown status {0}")]
    Unknown(u32),
}

impl Status {
    pub const fn from_code(code: u32) -> Self {
        match code {
            status::CMD_SUCCESS => Status::Success,
            status::INVALID_COMMAND => Status::InvalidCommand,
            status::SRC_ADDR_ERROR => Status::SrcAddrError,
            status::DST_ADDR_ERROR => Status::DstAddrError,
            status::SRC_ADDR_NOT_MAPPED => Status::SrcAddrNotMapped,
            status::DST_ADDR_NOT_MAPPED => Status::DstAddrNotMapped,
            status::COUNT_ERROR => Status::CountError,
            status::INVALID_SECTOR => Status::InvalidSector,
            status::SECTOR_NOT_BLANK => Status::SectorNotBlank,
            status::SECTOR_NOT_PREPARED_FOR_WRITE_OPERATION => Status::SectorNotPrepared,
            status::COMPARE_ERROR => Status::CompareError,
            status::BUSY => Status::Busy,
            status::PARAM_ERROR => Status::ParamError,
            status::ADDR_ERROR => Status::AddrError,
            status::ADDR_NOT_MAPPED => Status::AddrNotMapped,
            status::CMD_LOCKED => Status::CmdLocked,
            status::INVALID_CODE => Status::InvalidCode,
            status::INVALID_BAUD_RATE => Status::InvalidBaudRate,
            status::INVALID_STOP_BIT => Status::InvalidStopBit,
            status::CODE_READ_PROTECTION_ENABLED => Status::CodeReadProtectionEnabled,
            other => Status::Unknown(other),
        }
    }

    /// The raw code, as the ROM reported it
    pub const fn code(self) -> u32 {
        match self {
            Status::Success => status::CMD_SUCCESS,
            Status::InvalidCommand => status::INVALID_COMMAND,
            Status::SrcAddrError => status::SRC_ADDR_ERROR,
            Status::DstAddrError => status::DST_ADDR_ERROR,
            Status::SrcAddrNotMapped => status::SRC_ADDR_NOT_MAPPED,
            Status::DstAddrNotMapped => status::DST_ADDR_NOT_MAPPED,
            Status::CountError => status::COUNT_ERROR,
            Status::InvalidSector => status::INVALID_SECTOR,
            Status::SectorNotBlank => status::SECTOR_NOT_BLANK,
            Status::SectorNotPrepared => status::SECTOR_NOT_PREPARED_FOR_WRITE_OPERATION,
            Status::CompareError => status::COMPARE_ERROR,
            Status::Busy => status::BUSY,
            Status::ParamError => status::PARAM_ERROR,
            Status::AddrError => status::ADDR_ERROR,
            Status::AddrNotMapped => status::ADDR_NOT_MAPPED,
            Status::CmdLocked => status::CMD_LOCKED,
            Status::InvalidCode => status::INVALID_CODE,
            Status::InvalidBaudRate => status::INVALID_BAUD_RATE,
            Status::InvalidStopBit => status::INVALID_STOP_BIT,
            Status::CodeReadProtectionEnabled => status::CODE_READ_PROTECTION_ENABLED,
            Status::Unknown(code) => code,
        }
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Status::Success)
    }
}

/// ROM result table: a status word and up to four result words.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Response {
    status: Status,
    results: [u32; IAP_WORDS - 1],
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.status.is_ok() {
            write!(f, "OK{:08x?}", self.results)
        } else {
            write!(f, "ERROR({}){:08x?}", self.status.code(), self.results)
        }
    }
}

impl Response {
    pub fn new(status: Status, results: [u32; IAP_WORDS - 1]) -> Self {
        Response { status, results }
    }

    pub fn ok() -> Self {
        Response::new(Status::Success, [0; IAP_WORDS - 1])
    }

    pub fn err(status: Status) -> Self {
        Response::new(status, [0; IAP_WORDS - 1])
    }

    /// Decode the ROM result table
    pub fn from_words(words: [u32; IAP_WORDS]) -> Self {
        let mut results = [0u32; IAP_WORDS - 1];
        results.copy_from_slice(&words[1..]);
        Response::new(Status::from_code(words[0]), results)
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn results(&self) -> &[u32] {
        &self.results
    }
}

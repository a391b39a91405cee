//! Simulated LPC5410x: flash array, IAP ROM semantics and SYSCON ID.
//!
//! Every IAP command is recorded, and faults can be injected per command
//! kind and sector.
use std::path::Path;

use anyhow::Result;
use scroll::{LE, Pread};

use super::Target;
use crate::clock::LPC5410X_IRC_HZ;
use crate::constants::{COPY_SIZES, ERASED_BYTE, PAGE_SIZE, SECTOR_SIZE};
use crate::device::Part;
use crate::iap::Iap;
use crate::protocol::{Command, Response, Status};
use crate::sector::{address_to_sector, sectors_spanning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Prepare,
    Erase,
    BlankCheck,
    Copy,
    Compare,
}

/// An IAP command as seen by the simulated ROM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Prepare { start: u32, end: u32 },
    Erase { start: u32, end: u32 },
    BlankCheck { start: u32, end: u32 },
    Copy { dst: u32, len: u32 },
    Compare { dst: u32, len: u32 },
    /// Identification commands, by command code
    Query(u32),
}

impl Call {
    pub fn kind(&self) -> Option<CallKind> {
        match self {
            Call::Prepare { .. } => Some(CallKind::Prepare),
            Call::Erase { .. } => Some(CallKind::Erase),
            Call::BlankCheck { .. } => Some(CallKind::BlankCheck),
            Call::Copy { .. } => Some(CallKind::Copy),
            Call::Compare { .. } => Some(CallKind::Compare),
            Call::Query(_) => None,
        }
    }

    /// Sectors the command covers, inclusive
    fn sectors(&self) -> Option<(u32, u32)> {
        match *self {
            Call::Prepare { start, end }
            | Call::Erase { start, end }
            | Call::BlankCheck { start, end } => Some((start, end)),
            Call::Copy { dst, len } | Call::Compare { dst, len } => {
                sectors_spanning(dst, len).or(Some((address_to_sector(dst), address_to_sector(dst))))
            }
            Call::Query(_) => None,
        }
    }
}

impl From<&Command<'_>> for Call {
    fn from(cmd: &Command<'_>) -> Self {
        match *cmd {
            Command::Prepare { start, end } => Call::Prepare { start, end },
            Command::Erase { start, end, .. } => Call::Erase { start, end },
            Command::BlankCheck { start, end } => Call::BlankCheck { start, end },
            Command::CopyRamToFlash { dst, src, .. } => Call::Copy {
                dst,
                len: src.len() as u32,
            },
            Command::Compare { dst, src } => Call::Compare {
                dst,
                len: src.len() as u32,
            },
            _ => Call::Query(cmd.code()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Fault {
    kind: CallKind,
    sector: u32,
    status: Status,
}

pub struct SimTarget {
    device_id0: u32,
    uid: [u32; 4],
    boot_code_version: u32,
    core_clock_hz: u32,
    flash: Vec<u8>,
    /// Per sector, cleared again by each erase or copy
    prepared: Vec<bool>,
    calls: Vec<Call>,
    faults: Vec<Fault>,
}

impl SimTarget {
    /// An erased part. `flash_size` is rounded up to whole sectors.
    pub fn new(device_id0: u32, flash_size: u32) -> Self {
        let sectors = flash_size.div_ceil(SECTOR_SIZE) as usize;
        SimTarget {
            device_id0,
            uid: [device_id0, 0x0001_5410, 0x2016_0524, 0x0000_0001],
            boot_code_version: 0x0000_0d01,
            core_clock_hz: LPC5410X_IRC_HZ,
            flash: vec![ERASED_BYTE; sectors * SECTOR_SIZE as usize],
            prepared: vec![false; sectors],
            calls: Vec::new(),
            faults: Vec::new(),
        }
    }

    pub fn for_part(part: &Part) -> Self {
        SimTarget::new(part.device_id, part.flash_size)
    }

    pub fn with_core_clock(mut self, hz: u32) -> Self {
        self.core_clock_hz = hz;
        self
    }

    pub fn set_core_clock(&mut self, hz: u32) {
        self.core_clock_hz = hz;
    }

    pub fn device_id0(&self) -> u32 {
        self.device_id0
    }

    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// Direct access to the array, bypassing the IAP rules
    pub fn flash_mut(&mut self) -> &mut [u8] {
        &mut self.flash
    }

    pub fn sector_count(&self) -> u32 {
        self.prepared.len() as u32
    }

    /// Commands issued so far, oldest first
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    /// Make every `kind` command covering `sector` fail with `status`.
    pub fn inject_fault(&mut self, kind: CallKind, sector: u32, status: Status) {
        self.faults.push(Fault {
            kind,
            sector,
            status,
        });
    }

    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    /// Replace the flash contents. Bytes past `data` read as erased.
    pub fn load_image(&mut self, data: &[u8]) -> Result<()> {
        anyhow::ensure!(
            data.len() <= self.flash.len(),
            "image of {} bytes does not fit in {}KiB of flash",
            data.len(),
            self.flash.len() / 1024
        );
        self.flash[..data.len()].copy_from_slice(data);
        self.flash[data.len()..].fill(ERASED_BYTE);
        Ok(())
    }

    /// Load flash contents from `path`; a missing file means an erased part.
    pub fn load_image_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let p = path.as_ref();
        match std::fs::read(p) {
            Ok(data) => {
                log::debug!("Loaded flash image {} ({} bytes)", p.display(), data.len());
                self.load_image(&data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("{} not found, starting from erased flash", p.display());
                self.flash.fill(ERASED_BYTE);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_image_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), &self.flash)?;
        log::debug!("Saved flash image {}", path.as_ref().display());
        Ok(())
    }

    fn fault_for(&self, call: &Call) -> Option<Status> {
        let kind = call.kind()?;
        let (start, end) = call.sectors()?;
        self.faults
            .iter()
            .find(|f| f.kind == kind && (start..=end).contains(&f.sector))
            .map(|f| f.status)
    }

    fn check_sectors(&self, start: u32, end: u32) -> Result<(), Status> {
        if start > end || end >= self.sector_count() {
            return Err(Status::InvalidSector);
        }
        Ok(())
    }

    fn check_prepared(&self, start: u32, end: u32) -> Result<(), Status> {
        if self.prepared[start as usize..=end as usize].iter().all(|&p| p) {
            Ok(())
        } else {
            Err(Status::SectorNotPrepared)
        }
    }

    fn lock(&mut self, start: u32, end: u32) {
        self.prepared[start as usize..=end as usize].fill(false);
    }

    fn sector_bytes(start: u32, end: u32) -> std::ops::Range<usize> {
        (start * SECTOR_SIZE) as usize..((end + 1) * SECTOR_SIZE) as usize
    }

    fn prepare(&mut self, start: u32, end: u32) -> Result<Response, Status> {
        self.check_sectors(start, end)?;
        self.prepared[start as usize..=end as usize].fill(true);
        Ok(Response::ok())
    }

    fn erase(&mut self, start: u32, end: u32) -> Result<Response, Status> {
        self.check_sectors(start, end)?;
        self.check_prepared(start, end)?;
        self.flash[Self::sector_bytes(start, end)].fill(ERASED_BYTE);
        self.lock(start, end);
        Ok(Response::ok())
    }

    fn blank_check(&mut self, start: u32, end: u32) -> Result<Response, Status> {
        self.check_sectors(start, end)?;
        let range = Self::sector_bytes(start, end);
        let base = range.start;
        match self.flash[range].iter().position(|&b| b != ERASED_BYTE) {
            None => Ok(Response::ok()),
            Some(pos) => {
                let offset = (base + pos) & !3;
                let word: u32 = self
                    .flash
                    .pread_with(offset, LE)
                    .map_err(|_| Status::SrcAddrNotMapped)?;
                Ok(Response::new(
                    Status::SectorNotBlank,
                    [offset as u32, word, 0, 0],
                ))
            }
        }
    }

    fn copy(&mut self, dst: u32, src: &[u8]) -> Result<Response, Status> {
        let len = src.len() as u32;
        if dst % PAGE_SIZE != 0 {
            return Err(Status::DstAddrError);
        }
        if !COPY_SIZES.contains(&len) {
            return Err(Status::CountError);
        }
        let end = dst as usize + src.len();
        if end > self.flash.len() {
            return Err(Status::DstAddrNotMapped);
        }
        let (first, last) = sectors_spanning(dst, len).ok_or(Status::DstAddrNotMapped)?;
        self.check_prepared(first, last)?;
        // Programming can only clear bits
        for (cell, byte) in self.flash[dst as usize..end].iter_mut().zip(src) {
            *cell &= *byte;
        }
        self.lock(first, last);
        Ok(Response::ok())
    }

    fn compare(&self, dst: u32, src: &[u8]) -> Result<Response, Status> {
        if dst % 4 != 0 {
            return Err(Status::AddrError);
        }
        if src.len() % 4 != 0 {
            return Err(Status::CountError);
        }
        let end = dst as usize + src.len();
        if end > self.flash.len() {
            return Err(Status::AddrNotMapped);
        }
        match self.flash[dst as usize..end]
            .iter()
            .zip(src)
            .position(|(a, b)| a != b)
        {
            None => Ok(Response::ok()),
            Some(pos) => Ok(Response::new(
                Status::CompareError,
                [(pos & !3) as u32, 0, 0, 0],
            )),
        }
    }
}

impl Iap for SimTarget {
    fn execute(&mut self, cmd: &Command<'_>) -> Response {
        let call = Call::from(cmd);
        self.calls.push(call);
        if let Some(status) = self.fault_for(&call) {
            log::debug!("injected fault on {}: {}", cmd, status);
            return Response::err(status);
        }
        let result = match *cmd {
            Command::Prepare { start, end } => self.prepare(start, end),
            Command::Erase { start, end, .. } => self.erase(start, end),
            Command::BlankCheck { start, end } => self.blank_check(start, end),
            Command::CopyRamToFlash { dst, src, .. } => self.copy(dst, src),
            Command::Compare { dst, src } => self.compare(dst, src),
            Command::ReadPartId => Ok(Response::new(Status::Success, [self.device_id0, 0, 0, 0])),
            Command::ReadBootCodeVersion => Ok(Response::new(
                Status::Success,
                [self.boot_code_version, 0, 0, 0],
            )),
            Command::ReadUid => Ok(Response::new(Status::Success, self.uid)),
        };
        result.unwrap_or_else(Response::err)
    }
}

impl Target for SimTarget {
    fn system_core_clock_update(&mut self) -> u32 {
        self.core_clock_hz
    }

    fn read_device_id0(&mut self) -> u32 {
        self.device_id0
    }

    fn read_flash(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Status> {
        let start = address as usize;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= self.flash.len())
            .ok_or(Status::SrcAddrNotMapped)?;
        buf.copy_from_slice(&self.flash[start..end]);
        Ok(())
    }
}

//! Host side of the flash algorithm: drives the FlashOS call sequence the
//! way a debug probe tool does.

use anyhow::Result;

use crate::algo::{FlashAlgorithm, Function};
use crate::constants::{ERASED_BYTE, PAGE_SIZE};
use crate::device::PartDB;
use crate::sector::{sector_to_address, sectors_spanning};
use crate::target::Target;

pub struct Programmer<T: Target> {
    algo: FlashAlgorithm<T>,
}

impl<T: Target> Programmer<T> {
    pub fn new(target: T) -> Self {
        Programmer {
            algo: FlashAlgorithm::new(target),
        }
    }

    pub fn algorithm(&self) -> &FlashAlgorithm<T> {
        &self.algo
    }

    pub fn algorithm_mut(&mut self) -> &mut FlashAlgorithm<T> {
        &mut self.algo
    }

    pub fn into_target(self) -> T {
        self.algo.into_target()
    }

    /// Run `f` between `Init` and `UnInit`.
    fn session<R>(
        &mut self,
        function: Function,
        f: impl FnOnce(&mut FlashAlgorithm<T>) -> Result<R>,
    ) -> Result<R> {
        let fnc = function as u32;
        if let Err(e) = self.algo.init(0, 0, fnc) {
            anyhow::bail!("Init failed with status {}: {}", e.code(), e);
        }
        let result = f(&mut self.algo);
        if let Err(e) = self.algo.uninit(fnc) {
            anyhow::bail!("UnInit failed with status {}: {}", e.code(), e);
        }
        result
    }

    pub fn dump_info(&mut self, db: &PartDB) -> Result<()> {
        self.session(Function::Verify, |algo| {
            let device_id0 = algo.target_mut().read_device_id0();
            let part = db.classify(device_id0)?;
            log::info!(
                "Part: {} (Flash: {}KiB, SRAM: {}KiB)",
                part,
                part.flash_size / 1024,
                part.sram_size / 1024
            );
            log::info!("Topology: {}", algo.topology());
            log::info!("Core clock: {} Hz", algo.core_clock().hz());

            let target = algo.target_mut();
            match target.read_part_id() {
                Ok(id) => log::info!("Part ID: 0x{:08x}", id),
                Err(e) => log::warn!("Read part ID: {}", e),
            }
            match target.read_boot_code_version() {
                Ok((major, minor)) => log::info!("Boot code version: {}.{}", major, minor),
                Err(e) => log::warn!("Read boot code version: {}", e),
            }
            match target.read_uid() {
                Ok(uid) => log::info!(
                    "UID: {}",
                    uid.iter().map(|w| format!("{:08x}", w)).collect::<Vec<_>>().join("-")
                ),
                Err(e) => log::warn!("Read UID: {}", e),
            }
            Ok(())
        })
    }

    pub fn erase_chip(&mut self) -> Result<()> {
        self.session(Function::Erase, |algo| {
            if let Err(e) = algo.erase_chip() {
                anyhow::bail!("EraseChip failed with status {}: {}", e.code(), e);
            }
            log::info!("Flash erased ({})", algo.topology());
            Ok(())
        })
    }

    /// Erase every sector touched by `[address, address + len)`.
    pub fn erase_range(&mut self, address: u32, len: u32) -> Result<()> {
        self.session(Function::Erase, |algo| erase_sectors(algo, address, len))
    }

    /// Check a non-empty range inside flash reads as erased.
    pub fn blank_check(&mut self, address: u32, len: u32) -> Result<()> {
        anyhow::ensure!(len > 0, "empty range at 0x{:08x}", address);
        self.session(Function::Verify, |algo| {
            let flash_size = algo.topology().flash_size();
            anyhow::ensure!(
                address as u64 + len as u64 <= flash_size as u64,
                "range 0x{:08x}+0x{:x} exceeds {}KiB of flash",
                address,
                len,
                flash_size / 1024
            );
            if let Err(e) = algo.blank_check(address, len, ERASED_BYTE) {
                anyhow::bail!("BlankCheck failed with status {}: {}", e.code(), e);
            }
            Ok(())
        })
    }

    /// Erase, then program `image` at `address` page by page.
    ///
    /// `progress` receives the number of bytes programmed so far.
    pub fn flash(&mut self, address: u32, image: &[u8], mut progress: impl FnMut(usize)) -> Result<()> {
        anyhow::ensure!(
            address % PAGE_SIZE == 0,
            "start address 0x{:08x} is not {}-byte page aligned",
            address,
            PAGE_SIZE
        );
        anyhow::ensure!(!image.is_empty(), "nothing to program");

        self.session(Function::Program, |algo| {
            let flash_size = algo.topology().flash_size();
            anyhow::ensure!(
                address as u64 + image.len() as u64 <= flash_size as u64,
                "image of {} bytes at 0x{:08x} exceeds {}KiB of flash",
                image.len(),
                address,
                flash_size / 1024
            );
            erase_sectors(algo, address, image.len() as u32)?;

            let mut page = [ERASED_BYTE; PAGE_SIZE as usize];
            let mut written = 0;
            for chunk in image.chunks(PAGE_SIZE as usize) {
                let at = address + written as u32;
                page.fill(ERASED_BYTE);
                page[..chunk.len()].copy_from_slice(chunk);
                if let Err(e) = algo.program_page(at, PAGE_SIZE, &page) {
                    anyhow::bail!("ProgramPage(0x{:08x}) failed with status {}: {}", at, e.code(), e);
                }
                written += chunk.len();
                progress(written);
            }
            log::info!("Programmed {} bytes at 0x{:08x}", written, address);
            Ok(())
        })
    }

    pub fn verify(&mut self, address: u32, image: &[u8]) -> Result<()> {
        self.session(Function::Verify, |algo| {
            let size = image.len() as u32;
            match algo.verify(address, size, image) {
                Ok(end) => {
                    log::debug!("Verify OK up to 0x{:08x}", end);
                    Ok(())
                }
                Err(e) => {
                    let offset = e.address.wrapping_sub(address) as usize;
                    let mut byte = [0u8; 1];
                    let found = match algo.target_mut().read_flash(e.address, &mut byte) {
                        Ok(()) => format!("0x{:02x}", byte[0]),
                        Err(_) => "unreadable".to_string(),
                    };
                    match image.get(offset) {
                        Some(want) => anyhow::bail!(
                            "Verify failed at 0x{:08x}: expected 0x{:02x}, found {}",
                            e.address,
                            want,
                            found
                        ),
                        None => anyhow::bail!("Verify failed at 0x{:08x}", e.address),
                    }
                }
            }
        })
    }
}

fn erase_sectors<T: Target>(algo: &mut FlashAlgorithm<T>, address: u32, len: u32) -> Result<()> {
    let Some((first, last)) = sectors_spanning(address, len) else {
        return Ok(());
    };
    for sector in first..=last {
        let at = sector_to_address(sector);
        if let Err(e) = algo.erase_sector(at) {
            anyhow::bail!("EraseSector(0x{:08x}) failed with status {}: {}", at, e.code(), e);
        }
        log::debug!("Erased sector {}", sector);
    }
    log::info!("Erased sectors {}..={}", first, last);
    Ok(())
}

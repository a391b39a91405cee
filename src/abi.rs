//! FlashOS entry points.
//!
//! The functions here take the raw arguments a debug host passes and return
//! the integer it expects. With the `abi` feature they are also exported
//! with C linkage, over one algorithm instance driving the boot ROM.

use core::slice;

use crate::algo::{FlashAlgorithm, status_code, verify_code};
use crate::constants::status::SRC_ADDR_ERROR;
use crate::target::Target;

/// `fnc`: 1 erase, 2 program, 3 verify. Always 0.
pub fn init<T: Target>(algo: &mut FlashAlgorithm<T>, adr: u32, clk: u32, fnc: u32) -> u32 {
    status_code(algo.init(adr, clk, fnc))
}

pub fn uninit<T: Target>(algo: &mut FlashAlgorithm<T>, fnc: u32) -> u32 {
    status_code(algo.uninit(fnc))
}

/// 0 if `[adr, adr + sz)` holds only `pat`, else 1
pub fn blank_check<T: Target>(algo: &mut FlashAlgorithm<T>, adr: u32, sz: u32, pat: u8) -> u32 {
    status_code(algo.blank_check(adr, sz, pat))
}

/// `adr + sz` if flash matches `buf`, else the first failing address.
/// A null `buf` fails at `adr`.
///
/// # Safety
///
/// `buf` must be null or point to `sz` readable bytes.
pub unsafe fn verify<T: Target>(algo: &mut FlashAlgorithm<T>, adr: u32, sz: u32, buf: *const u32) -> u32 {
    if buf.is_null() {
        return adr;
    }
    // SAFETY: caller guarantees `sz` readable bytes at `buf`
    let data = unsafe { slice::from_raw_parts(buf as *const u8, sz as usize) };
    verify_code(algo.verify(adr, sz, data))
}

pub fn erase_chip<T: Target>(algo: &mut FlashAlgorithm<T>) -> u32 {
    status_code(algo.erase_chip())
}

pub fn erase_sector<T: Target>(algo: &mut FlashAlgorithm<T>, adr: u32) -> u32 {
    status_code(algo.erase_sector(adr))
}

/// A null `buf` is rejected with SRC_ADDR_ERROR before any IAP call.
///
/// # Safety
///
/// `buf` must be null or point to `sz` readable bytes.
pub unsafe fn program_page<T: Target>(algo: &mut FlashAlgorithm<T>, adr: u32, sz: u32, buf: *const u32) -> u32 {
    if buf.is_null() {
        return SRC_ADDR_ERROR;
    }
    // SAFETY: caller guarantees `sz` readable bytes at `buf`
    let data = unsafe { slice::from_raw_parts(buf as *const u8, sz as usize) };
    status_code(algo.program_page(adr, sz, data))
}

#[cfg(feature = "abi")]
mod exports {
    #![allow(non_snake_case)]

    use crate::algo::FlashAlgorithm;
    use crate::clock::lpc5410x_reset_clock;
    use crate::target::RomTarget;

    static mut ALGORITHM: FlashAlgorithm<RomTarget> =
        FlashAlgorithm::new(RomTarget::new(lpc5410x_reset_clock));

    fn with_algorithm<R>(f: impl FnOnce(&mut FlashAlgorithm<RomTarget>) -> R) -> R {
        // SAFETY: the host halts the core between calls and never enters the
        // algorithm twice, so this is the only live reference.
        let algo = unsafe { &mut *(&raw mut ALGORITHM) };
        f(algo)
    }

    #[unsafe(no_mangle)]
    pub extern "C" fn Init(adr: u32, clk: u32, fnc: u32) -> u32 {
        with_algorithm(|algo| super::init(algo, adr, clk, fnc))
    }

    #[unsafe(no_mangle)]
    pub extern "C" fn UnInit(fnc: u32) -> u32 {
        with_algorithm(|algo| super::uninit(algo, fnc))
    }

    #[unsafe(no_mangle)]
    pub extern "C" fn BlankCheck(adr: u32, sz: u32, pat: u8) -> u32 {
        with_algorithm(|algo| super::blank_check(algo, adr, sz, pat))
    }

    /// # Safety
    ///
    /// `buf` must be null or point to `sz` readable bytes.
    #[unsafe(no_mangle)]
    pub unsafe extern "C" fn Verify(adr: u32, sz: u32, buf: *const u32) -> u32 {
        // SAFETY: forwarded caller contract
        with_algorithm(|algo| unsafe { super::verify(algo, adr, sz, buf) })
    }

    #[unsafe(no_mangle)]
    pub extern "C" fn EraseChip() -> u32 {
        with_algorithm(|algo| super::erase_chip(algo))
    }

    #[unsafe(no_mangle)]
    pub extern "C" fn EraseSector(adr: u32) -> u32 {
        with_algorithm(|algo| super::erase_sector(algo, adr))
    }

    /// # Safety
    ///
    /// `buf` must be null or point to `sz` readable bytes.
    #[unsafe(no_mangle)]
    pub unsafe extern "C" fn ProgramPage(adr: u32, sz: u32, buf: *const u32) -> u32 {
        // SAFETY: forwarded caller contract
        with_algorithm(|algo| unsafe { super::program_page(algo, adr, sz, buf) })
    }
}

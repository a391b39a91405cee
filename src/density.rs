//! Program flash densities of the KL28 family.
//!
//! `SIM_FCFG1[PFSIZE]` is a 4-bit code. The table maps it to the flash size
//! in 4 KiB units; zero marks a reserved code.

const KB: u32 = 1024;

/// Indexed by PFSIZE, sizes in 4 KiB units. Only valid for KL28.
pub const FLASH_DENSITIES: [u16; 16] = [
    0,                        // 0x0 - reserved
    0,                        // 0x1 - reserved
    0,                        // 0x2 - reserved
    0,                        // 0x3 - reserved
    0,                        // 0x4 - reserved
    (64 * KB >> 12) as u16,   // 0x5
    0,                        // 0x6 - reserved
    (128 * KB >> 12) as u16,  // 0x7
    0,                        // 0x8 - reserved
    (256 * KB >> 12) as u16,  // 0x9
    0,                        // 0xa - early RM drafts listed 512KB here
    (512 * KB >> 12) as u16,  // 0xb - 1.1 silicon
    0,                        // 0xc - reserved
    0,                        // 0xd - reserved
    0,                        // 0xe - reserved
    (512 * KB >> 12) as u16,  // 0xf - 1.0 silicon uses this instead of 0xb
];

bitfield::bitfield! {
    /// SIM_FCFG1 flash configuration register
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct SimFcfg1(u32);
    impl Debug;
    /// Program flash size code
    pub u8, pfsize, _: 27, 24;
}

/// Program flash size in bytes for a PFSIZE code, `None` if reserved.
pub fn program_flash_size(pfsize: u8) -> Option<u32> {
    match FLASH_DENSITIES.get(pfsize as usize) {
        Some(&units) if units != 0 => Some((units as u32) << 12),
        _ => None,
    }
}

/// Program flash size in bytes from a raw SIM_FCFG1 value.
pub fn program_flash_size_from_fcfg1(fcfg1: u32) -> Option<u32> {
    program_flash_size(SimFcfg1(fcfg1).pfsize())
}

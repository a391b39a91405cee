//! Hardware constants of the LPC5410x flash and its IAP ROM.

/// Erase granularity
pub const SECTOR_SIZE: u32 = 32 * 1024;
/// Program granularity
pub const PAGE_SIZE: u32 = 256;
/// Value of an erased flash byte
pub const ERASED_BYTE: u8 = 0xff;

/// Flash is mapped at address 0
pub const FLASH_BASE: u32 = 0x0000_0000;
/// Highest sector on the 512 KiB parts (16 x 32 KiB)
pub const DEFAULT_TOP_SECTOR: u32 = 15;
/// Highest sector on the 256 KiB parts (8 x 32 KiB)
pub const SMALL_TOP_SECTOR: u32 = 7;

/// IAP ROM entry point, Thumb bit set
pub const IAP_ENTRY: u32 = 0x0300_0205;
/// IAP command and result tables are both five words long
pub const IAP_WORDS: usize = 5;

/// SYSCON DEVICE_ID0 register
pub const SYSCON_DEVICE_ID0: u32 = 0x4000_03f8;
/// Flash size field of DEVICE_ID0
pub const DEVICE_ID0_FLASH_MASK: u32 = 0x00f0_0000;
/// DEVICE_ID0 flash size field of the 256 KiB parts
pub const DEVICE_ID0_FLASH_256K: u32 = 0x0040_0000;

/// Byte counts accepted by "Copy RAM to flash"
pub const COPY_SIZES: [u32; 4] = [256, 512, 1024, 4096];

pub mod commands {
    pub const PREPARE: u32 = 50;
    pub const COPY_RAM_TO_FLASH: u32 = 51;
    pub const ERASE: u32 = 52;
    pub const BLANK_CHECK: u32 = 53;
    pub const READ_PART_ID: u32 = 54;
    pub const READ_BOOT_CODE_VERSION: u32 = 55;
    pub const COMPARE: u32 = 56;
    pub const REINVOKE_ISP: u32 = 57;
    pub const READ_UID: u32 = 58;
}

pub mod status {
    pub const CMD_SUCCESS: u32 = 0;
    pub const INVALID_COMMAND: u32 = 1;
    pub const SRC_ADDR_ERROR: u32 = 2;
    pub const DST_ADDR_ERROR: u32 = 3;
    pub const SRC_ADDR_NOT_MAPPED: u32 = 4;
    pub const DST_ADDR_NOT_MAPPED: u32 = 5;
    pub const COUNT_ERROR: u32 = 6;
    pub const INVALID_SECTOR: u32 = 7;
    pub const SECTOR_NOT_BLANK: u32 = 8;
    pub const SECTOR_NOT_PREPARED_FOR_WRITE_OPERATION: u32 = 9;
    pub const COMPARE_ERROR: u32 = 10;
    pub const BUSY: u32 = 11;
    pub const PARAM_ERROR: u32 = 12;
    pub const ADDR_ERROR: u32 = 13;
    pub const ADDR_NOT_MAPPED: u32 = 14;
    pub const CMD_LOCKED: u32 = 15;
    pub const INVALID_CODE: u32 = 16;
    pub const INVALID_BAUD_RATE: u32 = 17;
    pub const INVALID_STOP_BIT: u32 = 18;
    pub const CODE_READ_PROTECTION_ENABLED: u32 = 19;
}

//! Firmware file formats
use std::str;
use std::{borrow::Cow, path::Path};

use anyhow::Result;
use object::{
    Endianness, elf::FileHeader32, elf::PT_LOAD, read::elf::FileHeader,
    read::elf::ProgramHeader,
};
use scroll::{LE, Pread, Pwrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirmwareFormat {
    PlainHex,
    IntelHex,
    ELF,
    Binary,
}

/// A flat firmware image and the flash address it belongs at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firmware {
    pub base_address: u32,
    pub data: Vec<u8>,
}

impl Firmware {
    pub fn new(base_address: u32, data: Vec<u8>) -> Self {
        Firmware { base_address, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Read a firmware file. Formats without addresses are placed at `default_base`.
pub fn read_firmware_from_file<P: AsRef<Path>>(path: P, default_base: u32) -> Result<Firmware> {
    let p = path.as_ref();
    let raw = std::fs::read(p)?;
    anyhow::ensure!(!raw.is_empty(), "{} is empty", p.display());

    let format = guess_format(p, &raw);
    log::info!("Read {} as {:?} format", p.display(), format);
    match format {
        FirmwareFormat::PlainHex => Ok(Firmware::new(default_base, read_hex(str::from_utf8(&raw)?)?)),
        FirmwareFormat::IntelHex => read_ihex(str::from_utf8(&raw)?),
        FirmwareFormat::ELF => objcopy_binary(&raw),
        FirmwareFormat::Binary => Ok(Firmware::new(default_base, raw)),
    }
}

pub fn guess_format(path: &Path, raw: &[u8]) -> FirmwareFormat {
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default()
        .to_lowercase();
    if ["ihex", "ihe", "h86", "hex", "a43", "a90"].contains(&&*ext) {
        return FirmwareFormat::IntelHex;
    }

    if raw.starts_with(&[0x7f, b'E', b'L', b'F']) {
        FirmwareFormat::ELF
    } else if raw.first() == Some(&b':')
        && raw
            .iter()
            .all(|&c| c.is_ascii_hexdigit() || c == b':' || c == b'\n' || c == b'\r')
    {
        FirmwareFormat::IntelHex
    } else if raw
        .iter()
        .all(|&c| c.is_ascii_hexdigit() || c == b'\n' || c == b'\r')
    {
        FirmwareFormat::PlainHex
    } else {
        FirmwareFormat::Binary
    }
}

/// Hex digits, line breaks ignored
pub fn read_hex(data: &str) -> Result<Vec<u8>> {
    let digits: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(hex::decode(digits)?)
}

pub fn read_ihex(data: &str) -> Result<Firmware> {
    use ihex::Record;

    let mut base_address: u32 = 0;

    let mut records = vec![];
    for record in ihex::Reader::new(data) {
        match record? {
            Record::Data { offset, value } => {
                let address = base_address.checked_add(offset as u32).ok_or_else(|| {
                    anyhow::format_err!("data record past the 32-bit address space")
                })?;
                records.push((address, value.into()));
            }
            Record::ExtendedSegmentAddress(address) => {
                base_address = (address as u32) * 16;
            }
            Record::ExtendedLinearAddress(address) => {
                base_address = (address as u32) << 16;
            }
            Record::EndOfFile
            | Record::StartSegmentAddress { .. }
            | Record::StartLinearAddress(_) => (),
        }
    }
    merge_sections(records)
}

/// Simulates `objcopy -O binary`, keeping the load address.
pub fn objcopy_binary(elf_data: &[u8]) -> Result<Firmware> {
    match object::FileKind::parse(elf_data)? {
        object::FileKind::Elf32 => (),
        _ => anyhow::bail!("cannot read file as ELF32 format"),
    }
    let elf_header = FileHeader32::<Endianness>::parse(elf_data)?;
    let endian = elf_header.endian()?;

    let mut sections = vec![];
    for segment in elf_header.program_headers(endian, elf_data)? {
        // Flash contents go to the physical address
        let p_paddr = segment.p_paddr(endian);
        let segment_data = segment
            .data(endian, elf_data)
            .map_err(|_| anyhow::format_err!("Failed to access data for an ELF segment."))?;
        if segment.p_type(endian) == PT_LOAD && !segment_data.is_empty() {
            log::debug!(
                "Loadable segment at {:#010x}, {} bytes",
                p_paddr,
                segment_data.len()
            );
            sections.push((p_paddr, Cow::Borrowed(segment_data)));
        }
    }

    if sections.is_empty() {
        anyhow::bail!("empty ELF file");
    }
    merge_sections(sections)
}

/// Lay sections out in one image; gaps are filled with erased bytes.
fn merge_sections(mut sections: Vec<(u32, Cow<[u8]>)>) -> Result<Firmware> {
    sections.sort_by_key(|(addr, _)| *addr);

    let (start_address, end_address) = match (sections.first(), sections.last()) {
        (Some(first), Some(last)) => {
            let end = u32::try_from(last.1.len())
                .ok()
                .and_then(|len| last.0.checked_add(len))
                .ok_or_else(|| {
                    anyhow::format_err!("section at {:#010x} ends past the 32-bit address space", last.0)
                })?;
            (first.0, end)
        }
        _ => anyhow::bail!("no data records"),
    };

    let mut binary = vec![crate::constants::ERASED_BYTE; (end_address - start_address) as usize];
    let mut filled = 0;
    for (addr, sect) in sections {
        let sect_start = (addr - start_address) as usize;
        let sect_end = sect_start + sect.len();
        if sect_start < filled || sect_end > binary.len() {
            anyhow::bail!("overlapping section at {:#010x}", addr);
        }
        binary[sect_start..sect_end].copy_from_slice(&sect);
        filled = sect_end;
    }
    Ok(Firmware::new(start_address, binary))
}

/// Word 7 of the vector table: two's complement of the sum of words 0..=6.
///
/// The boot ROM only starts user code whose first eight words sum to zero.
pub fn vector_table_checksum(image: &[u8]) -> Result<u32> {
    anyhow::ensure!(image.len() >= 32, "image too small for a vector table");
    let mut sum = 0u32;
    for i in 0..7 {
        sum = sum.wrapping_add(image.pread_with::<u32>(i * 4, LE)?);
    }
    Ok(sum.wrapping_neg())
}

pub fn has_valid_checksum(image: &[u8]) -> Result<bool> {
    Ok(image.pread_with::<u32>(28, LE)? == vector_table_checksum(image)?)
}

/// Store the checksum into word 7 of the vector table.
pub fn patch_vector_table(image: &mut [u8]) -> Result<u32> {
    let checksum = vector_table_checksum(image)?;
    image.pwrite_with(checksum, 28, LE)?;
    Ok(checksum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guess_by_content() {
        let p = Path::new("fw.bin");
        assert_eq!(guess_format(p, b"\x7fELF\x01"), FirmwareFormat::ELF);
        assert_eq!(guess_format(p, b":00000001FF\n"), FirmwareFormat::IntelHex);
        assert_eq!(guess_format(p, b"deadbeef\r\n"), FirmwareFormat::PlainHex);
        assert_eq!(guess_format(p, &[0x00, 0x10, 0x00, 0x20]), FirmwareFormat::Binary);
        assert_eq!(guess_format(Path::new("fw.HEX"), b"junk"), FirmwareFormat::IntelHex);
    }

    #[test]
    fn plain_hex_ignores_line_breaks() {
        assert_eq!(read_hex("dead\r\nbeef\n").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(read_hex("abc").is_err());
    }

    #[test]
    fn intel_hex_keeps_address_and_fills_gaps() {
        let text = ":020000040000FA\n\
                    :0400100001020304E2\n\
                    :02001800AABB81\n\
                    :00000001FF\n";
        let fw = read_ihex(text).unwrap();
        assert_eq!(fw.base_address, 0x10);
        assert_eq!(fw.data, vec![1, 2, 3, 4, 0xff, 0xff, 0xff, 0xff, 0xaa, 0xbb]);

        let overlapping = ":0400100001020304E2\n\
                           :02001200AABB87\n\
                           :00000001FF\n";
        assert!(read_ihex(overlapping).is_err());
    }

    #[test]
    fn intel_hex_past_address_space() {
        let wrapping = ":02000004FFFFFC\n\
                        :10FFF800000102030405060708090A0B0C0D0E0F81\n\
                        :00000001FF\n";
        assert!(read_ihex(wrapping).is_err());

        let top = ":02000004FFFFFC\n\
                   :04FFF80000010203FF\n\
                   :00000001FF\n";
        let fw = read_ihex(top).unwrap();
        assert_eq!(fw.base_address, 0xffff_fff8);
        assert_eq!(fw.data, vec![0, 1, 2, 3]);
    }

    #[test]
    fn checksum_patch() {
        let mut image = vec![0u8; 64];
        image[0..4].copy_from_slice(&0x2000_8000u32.to_le_bytes());
        image[4..8].copy_from_slice(&0x0000_00c1u32.to_le_bytes());
        assert!(!has_valid_checksum(&image).unwrap());

        let checksum = patch_vector_table(&mut image).unwrap();
        assert_eq!(checksum, 0u32.wrapping_sub(0x2000_8000 + 0xc1));
        assert!(has_valid_checksum(&image).unwrap());

        let total = (0..8).fold(0u32, |acc, i| {
            acc.wrapping_add(u32::from_le_bytes(image[i * 4..i * 4 + 4].try_into().unwrap()))
        });
        assert_eq!(total, 0);
        assert!(vector_table_checksum(&image[..16]).is_err());
    }
}

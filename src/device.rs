//! Part definitions, loaded from the YAML files under `devices/`
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::constants::{PAGE_SIZE, SECTOR_SIZE};

bitfield::bitfield! {
    /// SYSCON DEVICE_ID0
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct DeviceId0(u32);
    impl Debug;
    /// Flash size code; 4 on the 256 KiB parts
    pub u8, flash_size_code, _: 23, 20;
    pub u16, part_number, _: 15, 0;
}

/// MCU Family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    pub name: String,
    pub description: String,
    /// DEVICE_ID0 bits that tell the variants apart
    #[serde(deserialize_with = "parse_address_and_offset")]
    pub device_id_mask: u32,
    #[serde(default = "default_sector_size", deserialize_with = "parse_address_and_offset")]
    pub sector_size: u32,
    #[serde(default = "default_page_size", deserialize_with = "parse_address_and_offset")]
    pub page_size: u32,
    pub variants: Vec<Part>,
}

/// Represents an MCU part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub name: String,
    #[serde(deserialize_with = "parse_address_and_offset")]
    pub device_id: u32,
    #[serde(deserialize_with = "parse_address_and_offset")]
    pub flash_size: u32,
    #[serde(default, deserialize_with = "parse_address_and_offset")]
    pub sram_size: u32,
    /// Used when DEVICE_ID0 matches no variant
    #[serde(default)]
    pub default: bool,

    #[serde(skip_deserializing, default = "default_sector_size")]
    pub sector_size: u32,
    #[serde(skip_deserializing, default = "default_page_size")]
    pub page_size: u32,
}

fn default_sector_size() -> u32 {
    SECTOR_SIZE
}

fn default_page_size() -> u32 {
    PAGE_SIZE
}

impl ::std::fmt::Display for Part {
    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        write!(f, "{}(0x{:08x})", self.name, self.device_id)
    }
}

impl Part {
    pub const fn sector_count(&self) -> u32 {
        self.flash_size / self.sector_size
    }

    pub const fn top_sector(&self) -> u32 {
        self.sector_count() - 1
    }

    pub const fn page_count(&self) -> u32 {
        self.flash_size / self.page_size
    }

    pub fn device_id0(&self) -> DeviceId0 {
        DeviceId0(self.device_id)
    }
}

pub struct PartDB {
    families: Vec<Family>,
}

impl PartDB {
    pub fn load() -> Result<Self> {
        let families: Vec<Family> =
            vec![serde_yaml::from_str(include_str!("../devices/LPC5410x.yaml"))?];
        Ok(PartDB {
            families: families.into_iter().map(Family::inherit).collect(),
        })
    }

    pub fn families(&self) -> &[Family] {
        &self.families
    }

    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.families.iter().flat_map(|f| f.variants.iter())
    }

    pub fn find_by_name(&self, name: &str) -> Result<Part> {
        self.parts()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| anyhow::format_err!("Unknown part {:?}", name))
    }

    /// Identify the part reporting `device_id0`.
    ///
    /// An exact match wins; otherwise the first variant with the same masked
    /// bits, then the family default.
    pub fn classify(&self, device_id0: u32) -> Result<Part> {
        if let Some(part) = self.parts().find(|p| p.device_id == device_id0) {
            return Ok(part.clone());
        }
        for family in &self.families {
            let mask = family.device_id_mask;
            if let Some(part) = family
                .variants
                .iter()
                .find(|p| p.device_id & mask == device_id0 & mask)
            {
                log::warn!(
                    "No exact match for DEVICE_ID0 0x{:08x}, using {}",
                    device_id0,
                    part
                );
                return Ok(part.clone());
            }
        }
        let part = self
            .parts()
            .find(|p| p.default)
            .cloned()
            .ok_or_else(|| {
                anyhow::format_err!("Cannot find part with DEVICE_ID0 0x{:08x}", device_id0)
            })?;
        log::warn!(
            "Unknown DEVICE_ID0 0x{:08x}, assuming {}",
            device_id0,
            part
        );
        Ok(part)
    }
}

impl Family {
    /// Copy family-wide geometry into each variant
    fn inherit(mut self) -> Self {
        for part in self.variants.iter_mut() {
            part.sector_size = self.sector_size;
            part.page_size = self.page_size;
        }
        self
    }
}

fn parse_address_and_offset<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    parse_size(&s).map_err(serde::de::Error::custom)
}

/// Parse `0x...`, plain decimal, or a size with a `K`, `KB` or `KiB` suffix.
pub fn parse_size(s: &str) -> std::result::Result<u32, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(&hex.replace('_', ""), 16).ok()
    } else if let Some(kib) = ["KiB", "KB", "K"].iter().find_map(|sfx| s.strip_suffix(sfx)) {
        kib.trim().parse::<u32>().ok().and_then(|k| k.checked_mul(1024))
    } else {
        s.parse().ok()
    };
    parsed.ok_or_else(|| format!("error while parsing {:?}", s))
}

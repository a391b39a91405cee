use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use nxp_flashalgo::constants::FLASH_BASE;
use nxp_flashalgo::device::parse_size;
use nxp_flashalgo::{PartDB, Programmer, SimTarget, Target, density, format};

#[derive(Parser)]
#[command(
    name = "nxp-flashalgo",
    version,
    about = "Run the LPC5410x IAP flash algorithm against a simulated part"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Part to simulate
    #[arg(short, long, default_value = "LPC54102J512", global = true)]
    part: String,

    /// Flash contents of the simulated part, created on first write
    #[arg(short, long, default_value = "flash.bin", global = true)]
    image: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List known parts
    Parts,
    /// Probe the simulated part
    Info,
    /// Erase the whole flash, or the sectors of a range
    Erase {
        /// Start address of the range
        #[arg(long, value_parser = parse_number)]
        address: Option<u32>,
        /// Range length in bytes
        #[arg(long, value_parser = parse_number, default_value = "32K")]
        length: u32,
    },
    /// Check a range reads as erased
    BlankCheck {
        #[arg(value_parser = parse_number, default_value = "0")]
        address: u32,
        /// Whole flash if omitted
        #[arg(value_parser = parse_number)]
        length: Option<u32>,
    },
    /// Program a firmware file, then verify it
    Flash {
        /// Firmware file (binary, Intel HEX, hex text or ELF)
        path: PathBuf,
        /// Load address for formats that carry none
        #[arg(long, value_parser = parse_number, default_value = "0")]
        base: u32,
        /// Write the vector table checksum the boot ROM requires
        #[arg(long)]
        patch_checksum: bool,
        #[arg(long)]
        no_verify: bool,
    },
    /// Compare flash with a firmware file
    Verify {
        path: PathBuf,
        #[arg(long, value_parser = parse_number, default_value = "0")]
        base: u32,
    },
    /// Hex dump a flash range
    Dump {
        #[arg(value_parser = parse_number, default_value = "0")]
        address: u32,
        #[arg(value_parser = parse_number, default_value = "256")]
        length: u32,
    },
    /// Decode a KL28 SIM_FCFG1 PFSIZE code
    Density {
        #[arg(value_parser = parse_number)]
        pfsize: u32,
    },
}

fn parse_number(s: &str) -> std::result::Result<u32, String> {
    parse_size(s)
}

fn progress_bar(len: usize, verb: &str) -> Result<ProgressBar> {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::with_template(&format!(
            "{verb:>9} [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}}"
        ))?
        .progress_chars("=> "),
    );
    Ok(bar)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let _ = simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let db = PartDB::load()?;

    match cli.command {
        Command::Parts => {
            for part in db.parts() {
                println!(
                    "{:<14} DEVICE_ID0=0x{:08x} flash={}KiB sectors={} sram={}KiB{}",
                    part.name,
                    part.device_id,
                    part.flash_size / 1024,
                    part.sector_count(),
                    part.sram_size / 1024,
                    if part.default { " (default)" } else { "" }
                );
            }
            return Ok(());
        }
        Command::Density { pfsize } => {
            match u8::try_from(pfsize).ok().and_then(density::program_flash_size) {
                Some(size) => println!("PFSIZE 0x{:x}: {}KiB", pfsize, size / 1024),
                None => anyhow::bail!("PFSIZE 0x{:x} is reserved", pfsize),
            }
            return Ok(());
        }
        _ => (),
    }

    let part = db.find_by_name(&cli.part)?;
    let mut target = SimTarget::for_part(&part);
    target.load_image_file(&cli.image)?;
    let mut programmer = Programmer::new(target);

    match cli.command {
        Command::Info => {
            programmer.dump_info(&db)?;
        }
        Command::Erase { address, length } => {
            let result = match address {
                Some(address) => programmer.erase_range(address, length),
                None => programmer.erase_chip(),
            };
            programmer.algorithm().target().save_image_file(&cli.image)?;
            result?;
        }
        Command::BlankCheck { address, length } => {
            anyhow::ensure!(
                address < part.flash_size,
                "0x{:08x} is past the end of {}KiB of flash",
                address,
                part.flash_size / 1024
            );
            let length = length.unwrap_or(part.flash_size - address);
            programmer.blank_check(address, length)?;
            log::info!(
                "0x{:08x}..0x{:08x} is blank",
                address,
                address.wrapping_add(length)
            );
        }
        Command::Flash {
            path,
            base,
            patch_checksum,
            no_verify,
        } => {
            let mut firmware = format::read_firmware_from_file(path, base)?;
            log::info!(
                "Firmware size: {} bytes at 0x{:08x}",
                firmware.len(),
                firmware.base_address
            );
            if firmware.base_address == FLASH_BASE {
                if patch_checksum {
                    let checksum = format::patch_vector_table(&mut firmware.data)?;
                    log::info!("Vector table checksum: 0x{:08x}", checksum);
                } else if !format::has_valid_checksum(&firmware.data).unwrap_or(false) {
                    log::warn!("Invalid vector table checksum, the boot ROM will not start this image");
                }
            }

            let bar = progress_bar(firmware.len(), "Flashing")?;
            let result = programmer.flash(firmware.base_address, &firmware.data, |n| {
                bar.set_position(n as u64)
            });
            bar.finish();
            // Keep whatever reached the flash, even on failure
            programmer.algorithm().target().save_image_file(&cli.image)?;
            result?;

            if !no_verify {
                programmer.verify(firmware.base_address, &firmware.data)?;
                log::info!("Verified!");
            }
        }
        Command::Verify { path, base } => {
            let firmware = format::read_firmware_from_file(path, base)?;
            log::info!("Firmware size: {} bytes", firmware.len());
            programmer.verify(firmware.base_address, &firmware.data)?;
            log::info!("Verified!");
        }
        Command::Dump { address, length } => {
            let mut buf = vec![0u8; length as usize];
            programmer
                .algorithm_mut()
                .target_mut()
                .read_flash(address, &mut buf)
                .map_err(|e| anyhow::format_err!("read 0x{:08x}: {}", address, e))?;
            let mut out = Vec::new();
            hxdmp::hexdump(&buf, &mut out)?;
            println!("{}", String::from_utf8_lossy(&out));
        }
        Command::Parts | Command::Density { .. } => unreachable!(),
    }

    Ok(())
}

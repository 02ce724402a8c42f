//! CLI argument parsing

use clap::{Parser, Subcommand};
use parflash_core::nor::FLASH_WORDS;
use parflash_core::transfer::TransferRange;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

const PROGRAMMER_HELP: &str =
    "Programmer to use, with options (e.g. dummy, linux_gpio:dev=/dev/gpiochip0)";

#[derive(Parser)]
#[command(name = "parflash")]
#[command(author, version, about = "Parallel NOR flash programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Board wiring file (TOML). Defaults to the reference board wiring
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by the storage-backed transfers
#[derive(clap::Args, Debug, Clone)]
pub struct TransferArgs {
    #[arg(short, long, help = PROGRAMMER_HELP)]
    pub programmer: String,

    /// Directory standing in for the SD card root (holds sdrom.bin / newrom.bin)
    #[arg(short, long, default_value = ".")]
    pub storage: PathBuf,

    /// First word address (hex, e.g., 0x10000)
    #[arg(long, value_parser = parse_hex_u32)]
    pub start: Option<u32>,

    /// Number of words (hex or decimal). Defaults to the rest of the chip
    #[arg(long, value_parser = parse_hex_u32)]
    pub length: Option<u32>,
}

impl TransferArgs {
    /// Word range selected by `--start` and `--length`
    pub fn range(&self) -> parflash_core::Result<TransferRange> {
        let start = self.start.unwrap_or(0);
        let length = self
            .length
            .unwrap_or_else(|| FLASH_WORDS.saturating_sub(start));
        TransferRange::new(start, length)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dump flash contents to <storage>/sdrom.bin
    Dump {
        #[command(flatten)]
        transfer: TransferArgs,
    },

    /// Program <storage>/newrom.bin into flash (erase first!)
    Program {
        #[command(flatten)]
        transfer: TransferArgs,
    },

    /// Erase the whole flash chip
    Erase {
        #[arg(short, long, help = PROGRAMMER_HELP)]
        programmer: String,
    },

    /// Interactive single-key console (d = dump, e = erase, p = program, c = cancel)
    Console {
        #[command(flatten)]
        transfer: TransferArgs,
    },

    /// Read one word from flash
    Peek {
        #[arg(short, long, help = PROGRAMMER_HELP)]
        programmer: String,

        /// Word address (hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        address: u32,
    },

    /// List supported programmers
    ListProgrammers,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x1000"), Ok(0x1000));
        assert_eq!(parse_hex_u32("0XFF"), Ok(0xFF));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert!(parse_hex_u32("ten").is_err());
    }

    #[test]
    fn test_transfer_range_defaults() {
        let cli = Cli::parse_from(["parflash", "dump", "-p", "dummy", "--start", "0x3FF000"]);
        let Commands::Dump { transfer } = cli.command else {
            panic!("expected dump");
        };
        let range = transfer.range().unwrap();
        assert_eq!(range.start, 0x3F_F000);
        assert_eq!(range.end, FLASH_WORDS);
        assert_eq!(transfer.storage, PathBuf::from("."));
    }

    #[test]
    fn test_transfer_range_out_of_bounds() {
        let cli = Cli::parse_from([
            "parflash", "program", "-p", "dummy", "--start", "0x3FFFF0", "--length", "0x20",
        ]);
        let Commands::Program { transfer } = cli.command else {
            panic!("expected program");
        };
        assert!(transfer.range().is_err());
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::parse_from(["parflash", "peek", "-p", "dummy", "0x10", "-vv", "--config", "b.toml"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("b.toml")));
        assert!(matches!(cli.command, Commands::Peek { address: 0x10, .. }));
    }
}

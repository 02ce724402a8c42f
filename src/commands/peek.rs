//! Single word read, for checking the wiring

use parflash_core::gpio::Gpio;
use parflash_core::nor::{NorFlash, FLASH_WORDS};

/// Print the word at `address` along with both of its byte lanes
pub fn run_peek<G: Gpio>(
    flash: &mut NorFlash<G>,
    address: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    if address >= FLASH_WORDS {
        return Err(format!(
            "Address 0x{:X} is beyond the last word 0x{:X}",
            address,
            FLASH_WORDS - 1
        )
        .into());
    }

    let word = flash.read_at(address);
    let high = flash.read_half_at(address, true);
    let low = flash.read_half_at(address, false);

    println!("0x{:06X}: {:04X}", address, word);
    println!("  high lines: {:02X}", high);
    println!("  low lines:  {:02X}", low);
    Ok(())
}

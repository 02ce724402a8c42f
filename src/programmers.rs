//! Programmer registration and dispatch
//!
//! A programmer is a GPIO backend wired to the board. This module provides a
//! centralized registry for them, with support for feature-gated inclusion,
//! and opens the selected one as a ready-to-use [`NorFlash`].

use parflash_core::config::HardwareConfig;
use parflash_core::gpio::Gpio;
use parflash_core::nor::NorFlash;

/// Flash device behind whichever backend was selected at runtime
pub type DynFlash = NorFlash<Box<dyn Gpio>>;

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &["sim"],
        description: "Simulated board and flash chip (image=<file>,words=<n>)",
    });

    #[cfg(feature = "linux-gpio")]
    programmers.push(ProgrammerInfo {
        name: "linux_gpio",
        aliases: &["linux-gpio", "gpiochip"],
        description: "Linux GPIO character device (dev=/dev/gpiochipN or gpiochip=N)",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");
    for p in &programmers {
        help.push_str(&format!("  {:12} - {}\n", p.name, p.description));
    }
    help
}

/// Resolve a name or alias to the primary programmer name
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// Parse a programmer string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_programmer_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Open the programmer described by `programmer` and bring the board up
///
/// The returned device has its pins configured and the chip deselected.
pub fn open_flash(
    programmer: &str,
    wiring: &HardwareConfig,
) -> Result<DynFlash, Box<dyn std::error::Error>> {
    let gpio = open_gpio(programmer, wiring)?;
    let mut flash = NorFlash::new(gpio, wiring)?;
    flash.init();
    Ok(flash)
}

#[allow(unused_variables)]
fn open_gpio(
    programmer: &str,
    wiring: &HardwareConfig,
) -> Result<Box<dyn Gpio>, Box<dyn std::error::Error>> {
    let (name, options) = parse_programmer_string(programmer);

    let canonical_name = match find_programmer(name) {
        Some(n) => n,
        None => return Err(unknown_programmer_error(name)),
    };

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&options, wiring),

        #[cfg(feature = "linux-gpio")]
        "linux_gpio" => {
            log::info!("Opening Linux GPIO programmer...");
            parflash_linux_gpio::open_linux_gpio(&options, wiring).map_err(|e| {
                format!(
                    "Failed to open Linux GPIO device: {}\n\
                     Make sure the gpiochip exists and you have read/write permissions.",
                    e
                )
                .into()
            })
        }

        _ => Err(unknown_programmer_error(name)),
    }
}

/// Simulated board, optionally preloaded with a dump image
///
/// # Supported Options
///
/// - `image=<file>` - big-endian word image copied to the start of the chip
/// - `words=<n>` - size of the simulated chip in words (power of two)
#[cfg(feature = "dummy")]
fn open_dummy(
    options: &[(&str, &str)],
    wiring: &HardwareConfig,
) -> Result<Box<dyn Gpio>, Box<dyn std::error::Error>> {
    use parflash_dummy::{SimBoard, SimConfig};

    let mut sim = SimConfig::default();
    let mut image = None;

    for (key, value) in options {
        match *key {
            "image" => image = Some(*value),
            "words" => {
                sim.words = value
                    .parse()
                    .map_err(|_| format!("Invalid words value: {}", value))?;
            }
            _ => log::warn!("dummy: Unknown option: {}={}", key, value),
        }
    }

    let mut board = SimBoard::new(wiring, sim)?;

    if let Some(path) = image {
        let bytes = std::fs::read(path)
            .map_err(|e| format!("Failed to read dummy image {}: {}", path, e))?;
        let words: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        if words.len() > sim.words as usize {
            return Err(format!(
                "Dummy image {} holds {} words, the chip only {}",
                path,
                words.len(),
                sim.words
            )
            .into());
        }
        board.load(0, &words);
        log::info!("dummy: Preloaded {} words from {}", words.len(), path);
    }

    Ok(Box::new(board))
}

fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown programmer: {}\n\n", name);
    msg.push_str(&programmer_help());
    msg.push_str("\nUse 'parflash list-programmers' for more details");
    msg.into()
}

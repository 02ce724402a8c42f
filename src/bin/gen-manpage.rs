//! Man page generator for parflash
//!
//! Writes `parflash.1` plus one `parflash-<command>.1` page per subcommand.
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::path::{Path, PathBuf};

#[allow(dead_code)]
#[path = "../cli.rs"]
mod cli;

fn render(man: clap_mangen::Man, path: &Path) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    man.render(&mut buffer)?;
    fs::write(path, buffer)?;
    println!("  {}", path.display());
    Ok(())
}

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    println!("Man pages generated:");

    for sub in cmd.get_subcommands() {
        let name = format!("parflash-{}", sub.get_name());
        let path = output_dir.join(format!("{}.1", name));
        render(clap_mangen::Man::new(sub.clone()).title(name), &path)?;
    }
    render(clap_mangen::Man::new(cmd), &output_dir.join("parflash.1"))?;

    println!("\nTo view: man -l {}", output_dir.join("parflash.1").display());
    Ok(())
}

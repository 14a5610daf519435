use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;

use appinspect::{inspect, Formatter, InspectOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect a wearable application image")]
struct Opts {
    /// Image file to inspect
    image: PathBuf,

    /// Arena base address for the dry run
    #[arg(long, value_name = "ADDR", value_parser = parse_address)]
    base: Option<u32>,

    /// Arena size in bytes
    #[arg(long, value_name = "BYTES")]
    arena: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl Opts {
    fn options(&self) -> InspectOptions {
        let mut options = InspectOptions::default();
        if let Some(base) = self.base {
            options.base = base;
        }
        if let Some(arena) = self.arena {
            options.arena_size = arena;
        }
        options
    }
}

fn parse_address(text: &str) -> Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => text.parse(),
    };
    parsed.map_err(|err| format!("invalid address '{}': {}", text, err))
}

fn main() -> Result<ExitCode> {
    let opts = Opts::parse();
    let level = if opts.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let report = inspect(&opts.image, &opts.options())
        .with_context(|| format!("inspecting {}", opts.image.display()))?;
    let output = Formatter::new(opts.json)
        .render(&report)
        .context("rendering report")?;
    println!("{output}");

    Ok(if report.loaded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::parse_address;

    #[test]
    fn addresses_parse_as_hex_or_decimal() {
        assert_eq!(parse_address("0x2001_0000"), Ok(0x2001_0000));
        assert_eq!(parse_address("4096"), Ok(4096));
        assert!(parse_address("0xZZ").is_err());
    }
}

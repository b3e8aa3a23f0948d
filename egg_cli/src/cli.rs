//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "egg", version, about = "Gas sensor board CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/egg_config.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Regulate both heaters until Ctrl-C (or for a fixed number of passes)
    Run {
        /// Stop after this many regulation passes
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
    },
    /// Read one register through the bus protocol (WRITE address, then READ)
    Read {
        /// Register address, decimal or 0x-prefixed hex
        #[arg(long, value_name = "ADDR", value_parser = parse_addr)]
        addr: u16,
        /// Regulation passes to run first so telemetry registers are populated
        #[arg(long, value_name = "N", default_value_t = 0)]
        ticks: u64,
    },
    /// List the register map
    Registers,
    /// Quick health check (digipot status and wiper readback)
    SelfCheck,
}

pub fn parse_addr(s: &str) -> Result<u16, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid register address {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_accepts_hex_and_decimal() {
        assert_eq!(parse_addr("0x0124"), Ok(0x0124));
        assert_eq!(parse_addr("0X10"), Ok(0x10));
        assert_eq!(parse_addr("3"), Ok(3));
        assert!(parse_addr("0x1_0000").is_err());
        assert!(parse_addr("reg").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

use std::fmt;

use thiserror::Error;

/// Shared resources that foreground and bus context contend for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Adc,
    Digipot,
    Divider,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::Adc => "adc",
            Resource::Digipot => "digipot",
            Resource::Divider => "divider",
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EggError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("{0} busy past the clock-stretch budget")]
    Busy(Resource),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("no sensor channel {0}")]
    InvalidChannel(usize),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing analog input")]
    MissingAdc,
    #[error("missing wiper link")]
    MissingWiperLink,
    #[error("missing divider switch")]
    MissingDivider,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

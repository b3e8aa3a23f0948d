use thiserror::Error;

/// Failures of the board peripherals; boxed into `HwResult` at the trait seam.
#[derive(Debug, Error)]
pub enum HwError {
    #[error("spi error: {0}")]
    Spi(String),
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("adc error: {0}")]
    Adc(String),
}

pub type Result<T> = std::result::Result<T, HwError>;

//! Raspberry Pi backend: MCP3008 ADC and MCP4231 digipot on SPI, divider
//! enable lines on GPIO.
use rppal::gpio::{Gpio, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::trace;

use egg_traits::{AnalogInput, DividerSwitch, HwResult, WiperLink};

use crate::error::{HwError, Result};

fn spi_bus(index: u8) -> Result<Bus> {
    match index {
        0 => Ok(Bus::Spi0),
        1 => Ok(Bus::Spi1),
        other => Err(HwError::Spi(format!("unsupported spi bus {other}"))),
    }
}

/// 10-bit MCP3008 on a hardware chip-select.
pub struct Mcp3008Adc {
    spi: Spi,
}

impl Mcp3008Adc {
    pub fn new(bus: u8, clock_hz: u32) -> Result<Self> {
        let spi = Spi::new(spi_bus(bus)?, SlaveSelect::Ss0, clock_hz, Mode::Mode0)
            .map_err(|e| HwError::Spi(format!("open adc: {e}")))?;
        Ok(Self { spi })
    }
}

impl AnalogInput for Mcp3008Adc {
    fn read(&mut self, channel: u8) -> HwResult<u16> {
        if channel > 7 {
            return Err(Box::new(HwError::Adc(format!("no such channel {channel}"))));
        }
        // start bit, single-ended + channel, then clock out the result
        let tx = [0x01, (0x08 | channel) << 4, 0x00];
        let mut rx = [0u8; 3];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HwError::Spi(format!("adc transfer: {e}")))?;
        let code = (u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]);
        trace!(channel, code, "mcp3008 read");
        Ok(code)
    }
}

/// MCP4231 digipot with a GPIO-driven chip-select so one select can span
/// several command bytes.
pub struct SpiWiperLink {
    spi: Spi,
    cs: OutputPin,
}

impl SpiWiperLink {
    pub fn new(bus: u8, clock_hz: u32, cs_pin: u8) -> Result<Self> {
        let spi = Spi::new(spi_bus(bus)?, SlaveSelect::Ss1, clock_hz, Mode::Mode0)
            .map_err(|e| HwError::Spi(format!("open digipot: {e}")))?;
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut cs = gpio
            .get(cs_pin)
            .map_err(|e| HwError::Gpio(format!("open digipot cs: {e}")))?
            .into_output();
        cs.set_high(); // idle deselected
        Ok(Self { spi, cs })
    }
}

impl WiperLink for SpiWiperLink {
    fn select(&mut self) -> HwResult<()> {
        self.cs.set_low();
        Ok(())
    }

    fn deselect(&mut self) {
        self.cs.set_high();
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> HwResult<()> {
        self.spi
            .transfer(rx, tx)
            .map_err(|e| HwError::Spi(format!("digipot transfer: {e}")))?;
        Ok(())
    }
}

/// Two enable lines per sensor (r2, r3); high connects the resistor.
pub struct GpioDivider {
    lines: Vec<[OutputPin; 2]>,
}

impl GpioDivider {
    pub fn new(pins: &[[u8; 2]]) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut lines = Vec::with_capacity(pins.len());
        for [a, b] in pins {
            let open = |pin: u8| {
                gpio.get(pin)
                    .map(|p| p.into_output())
                    .map_err(|e| HwError::Gpio(format!("open divider pin {pin}: {e}")))
            };
            lines.push([open(*a)?, open(*b)?]);
        }
        Ok(Self { lines })
    }
}

impl DividerSwitch for GpioDivider {
    fn configure(&mut self, sensor: usize, r2_enabled: bool, r3_enabled: bool) -> HwResult<()> {
        let Some([r2, r3]) = self.lines.get_mut(sensor) else {
            return Err(Box::new(HwError::Gpio(format!(
                "no divider lines for sensor {sensor}"
            ))));
        };
        for (pin, enabled) in [(r2, r2_enabled), (r3, r3_enabled)] {
            if enabled {
                pin.set_high();
            } else {
                pin.set_low();
            }
        }
        Ok(())
    }
}

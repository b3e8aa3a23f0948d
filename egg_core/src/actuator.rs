//! Command layer for the two-wiper digipot that trims the heater supply.
//!
//! Every batch runs inside one chip-select window. The select line is
//! released by a drop guard so an error mid-batch still deselects.

use egg_traits::WiperLink;
use eyre::WrapErr;
use tracing::trace;

use crate::error::Result;
use crate::hw_error::map_hw_error;

pub const OP_INCREMENT: u8 = 0x04;
pub const OP_DECREMENT: u8 = 0x08;
pub const OP_READ: u8 = 0x0C;
/// Device address of the status register.
pub const STATUS_ADDRESS: u8 = 0x05;
/// Dummy byte clocked out while the device answers a read.
const READ_FILL: u8 = 0xFF;

/// First byte of every digipot command.
#[inline]
pub fn command_byte(address: u8, op: u8) -> u8 {
    ((address & 0x0F) << 4) | op
}

/// Nine-bit value carried by the two reply bytes of a read.
#[inline]
pub fn decode_read(rx: [u8; 2]) -> u16 {
    (u16::from(rx[0] & 0x01) << 8) | u16::from(rx[1])
}

struct Selected<'a, L: WiperLink + ?Sized> {
    link: &'a mut L,
}

impl<'a, L: WiperLink + ?Sized> Selected<'a, L> {
    fn new(link: &'a mut L) -> Result<Self> {
        link.select()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("digipot select")?;
        Ok(Self { link })
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        self.link
            .transfer(tx, rx)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
    }
}

impl<L: WiperLink + ?Sized> Drop for Selected<'_, L> {
    fn drop(&mut self) {
        self.link.deselect();
    }
}

/// Bounded step commands and read-back for the digipot.
///
/// No software clamping: the device saturates at its rails on its own.
#[derive(Debug)]
pub struct ActuatorDriver<L> {
    link: L,
}

impl<L: WiperLink> ActuatorDriver<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    /// Raise the wiper by `steps` taps.
    pub fn increment(&mut self, wiper: u8, steps: u32) -> Result<()> {
        self.step(wiper, OP_INCREMENT, steps)
            .wrap_err_with(|| format!("increment wiper {wiper} by {steps}"))
    }

    /// Lower the wiper by `steps` taps.
    pub fn decrement(&mut self, wiper: u8, steps: u32) -> Result<()> {
        self.step(wiper, OP_DECREMENT, steps)
            .wrap_err_with(|| format!("decrement wiper {wiper} by {steps}"))
    }

    pub fn read_wiper(&mut self, wiper: u8) -> Result<u16> {
        self.read(wiper)
            .wrap_err_with(|| format!("read wiper {wiper}"))
    }

    pub fn read_status(&mut self) -> Result<u16> {
        self.read(STATUS_ADDRESS).wrap_err("read digipot status")
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    fn step(&mut self, wiper: u8, op: u8, steps: u32) -> Result<()> {
        if steps == 0 {
            return Ok(());
        }
        let cmd = command_byte(wiper, op);
        let mut sel = Selected::new(&mut self.link)?;
        let mut rx = [0u8; 1];
        for _ in 0..steps {
            sel.transfer(&[cmd], &mut rx)?;
        }
        trace!(cmd, steps, "digipot step batch");
        Ok(())
    }

    fn read(&mut self, address: u8) -> Result<u16> {
        let tx = [command_byte(address, OP_READ), READ_FILL];
        let mut rx = [0u8; 2];
        {
            let mut sel = Selected::new(&mut self.link)?;
            sel.transfer(&tx, &mut rx)?;
        }
        let value = decode_read(rx);
        trace!(address, value, "digipot read");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_bytes_match_device_layout() {
        assert_eq!(command_byte(0, OP_INCREMENT), 0x04);
        assert_eq!(command_byte(1, OP_DECREMENT), 0x18);
        assert_eq!(command_byte(STATUS_ADDRESS, OP_READ), 0x5C);
    }

    #[test]
    fn read_keeps_only_the_ninth_bit_of_the_first_byte() {
        assert_eq!(decode_read([0xFF, 0x34]), 0x0134);
        assert_eq!(decode_read([0xFE, 0xFF]), 0x00FF);
    }
}

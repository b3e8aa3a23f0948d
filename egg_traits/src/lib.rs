pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Boxed error type used at every hardware trait boundary.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Single-ended analog-to-digital converter.
///
/// One call covers the whole "start conversion, wait, fetch result" sequence;
/// callers guard it so a second request cannot land mid-conversion.
pub trait AnalogInput {
    fn read(&mut self, channel: u8) -> HwResult<u16>;
}

/// Point-to-point command link to the two-wiper digipot.
pub trait WiperLink {
    /// Assert the chip-select line.
    fn select(&mut self) -> HwResult<()>;
    /// Release the chip-select line. Must be safe to call after a failed transfer.
    fn deselect(&mut self);
    /// Full-duplex exchange; `rx` is filled with as many bytes as `tx` carries.
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> HwResult<()>;
}

/// Enable lines of the two extra low-side resistors on a sensor's output divider.
pub trait DividerSwitch {
    fn configure(&mut self, sensor: usize, r2_enabled: bool, r3_enabled: bool) -> HwResult<()>;
}

impl<T: AnalogInput + ?Sized> AnalogInput for Box<T> {
    fn read(&mut self, channel: u8) -> HwResult<u16> {
        (**self).read(channel)
    }
}

impl<T: WiperLink + ?Sized> WiperLink for Box<T> {
    fn select(&mut self) -> HwResult<()> {
        (**self).select()
    }
    fn deselect(&mut self) {
        (**self).deselect();
    }
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> HwResult<()> {
        (**self).transfer(tx, rx)
    }
}

impl<T: DividerSwitch + ?Sized> DividerSwitch for Box<T> {
    fn configure(&mut self, sensor: usize, r2_enabled: bool, r3_enabled: bool) -> HwResult<()> {
        (**self).configure(sensor, r2_enabled, r3_enabled)
    }
}

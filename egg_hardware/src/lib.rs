pub mod error;
#[cfg(feature = "hardware")]
pub mod rpi;

use std::sync::{Arc, Mutex, MutexGuard};

use egg_traits::{AnalogInput, DividerSwitch, HwResult, WiperLink};
use tracing::trace;

use crate::error::HwError;

/// Highest wiper position of the simulated 8-bit digipot (257 taps).
pub const SIM_WIPER_MAX: u16 = 256;
/// Value the simulated digipot returns from its status register.
pub const SIM_STATUS: u16 = 0x01F0;

const OP_MASK: u8 = 0x0C;
const OP_WRITE: u8 = 0x00;
const OP_INCREMENT: u8 = 0x04;
const OP_DECREMENT: u8 = 0x08;
const OP_READ: u8 = 0x0C;
const ADDR_STATUS: u8 = 0x05;

/// Electrical description of one simulated heater/sensor pair.
#[derive(Debug, Clone)]
pub struct SimSensor {
    pub supply_adc: u8,
    pub feedback_adc: u8,
    pub sensor_adc: u8,
    pub wiper: u8,
    /// Regulator output at wiper position 0.
    pub min_supply_mv: u32,
    /// Regulator output gained per wiper tap.
    pub mv_per_tap: u32,
    pub heater_ohms: u32,
    pub feedback_ohms: u32,
    /// Low-side divider resistors `[r1, r2, r3]`.
    pub divider_ohms: [u32; 3],
    /// Resistance of the sensing element.
    pub sensor_ohms: u32,
}

#[derive(Debug)]
struct PlantState {
    wipers: [u16; 2],
    dividers: Vec<(bool, bool)>,
    selected: bool,
    commands: u64,
}

/// A simulated sensor board: regulator, heaters, dividers and a digipot
/// sharing one state so that wiper moves show up in the next ADC reading.
#[derive(Debug, Clone)]
pub struct SimulatedPlant {
    state: Arc<Mutex<PlantState>>,
    sensors: Arc<Vec<SimSensor>>,
    reference_mv: u32,
    full_scale: u16,
}

impl SimulatedPlant {
    pub fn new(sensors: Vec<SimSensor>, reference_mv: u32, full_scale: u16) -> Self {
        let dividers = vec![(true, true); sensors.len()];
        Self {
            state: Arc::new(Mutex::new(PlantState {
                wipers: [SIM_WIPER_MAX / 2; 2],
                dividers,
                selected: false,
                commands: 0,
            })),
            sensors: Arc::new(sensors),
            reference_mv: reference_mv.max(1),
            full_scale: full_scale.max(2),
        }
    }

    pub fn adc(&self) -> SimulatedAdc {
        SimulatedAdc {
            plant: self.clone(),
        }
    }

    pub fn wiper_link(&self) -> SimulatedWiperLink {
        SimulatedWiperLink {
            plant: self.clone(),
        }
    }

    pub fn divider(&self) -> SimulatedDivider {
        SimulatedDivider {
            plant: self.clone(),
        }
    }

    /// Current wiper position, for inspection from tests and the CLI.
    pub fn wiper(&self, wiper: usize) -> u16 {
        self.lock()
            .map(|st| st.wipers.get(wiper).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn set_wiper(&self, wiper: usize, position: u16) {
        if let Ok(mut st) = self.lock()
            && let Some(w) = st.wipers.get_mut(wiper)
        {
            *w = position.min(SIM_WIPER_MAX);
        }
    }

    /// Number of digipot commands decoded so far.
    pub fn commands_seen(&self) -> u64 {
        self.lock().map(|st| st.commands).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, PlantState>, HwError> {
        self.state
            .lock()
            .map_err(|_| HwError::Adc("simulated plant state poisoned".to_string()))
    }

    fn mv_to_code(&self, mv: u64) -> u16 {
        let code = mv * u64::from(self.full_scale) / u64::from(self.reference_mv);
        code.min(u64::from(self.full_scale - 1)) as u16
    }

    fn sample(&self, channel: u8) -> Result<u16, HwError> {
        let st = self.lock()?;
        for (idx, s) in self.sensors.iter().enumerate() {
            let wiper = st.wipers.get(usize::from(s.wiper)).copied().unwrap_or(0);
            let supply_mv =
                u64::from(s.min_supply_mv) + u64::from(wiper) * u64::from(s.mv_per_tap);
            let loop_ohms = u64::from(s.heater_ohms) + u64::from(s.feedback_ohms);
            let feedback_mv = supply_mv * u64::from(s.feedback_ohms) / loop_ohms.max(1);
            if channel == s.supply_adc {
                return Ok(self.mv_to_code(supply_mv));
            }
            if channel == s.feedback_adc {
                return Ok(self.mv_to_code(feedback_mv));
            }
            if channel == s.sensor_adc {
                let (r2_on, r3_on) = st.dividers.get(idx).copied().unwrap_or((false, false));
                let [r1, r2, r3] = s.divider_ohms;
                let low = u64::from(r1)
                    + if r2_on { u64::from(r2) } else { 0 }
                    + if r3_on { u64::from(r3) } else { 0 };
                let mv = u64::from(self.reference_mv) * low
                    / (low + u64::from(s.sensor_ohms)).max(1);
                return Ok(self.mv_to_code(mv));
            }
        }
        Err(HwError::Adc(format!("channel {channel} is not wired")))
    }

    fn exchange(&self, tx: &[u8], rx: &mut [u8]) -> Result<(), HwError> {
        let mut st = self.lock()?;
        if !st.selected {
            return Err(HwError::Spi("transfer without chip select".to_string()));
        }
        let mut i = 0;
        while i < tx.len() {
            let cmd = tx[i];
            let addr = cmd >> 4;
            st.commands += 1;
            match cmd & OP_MASK {
                OP_INCREMENT | OP_DECREMENT => {
                    if let Some(w) = st.wipers.get_mut(usize::from(addr)) {
                        *w = if cmd & OP_MASK == OP_INCREMENT {
                            (*w + 1).min(SIM_WIPER_MAX)
                        } else {
                            w.saturating_sub(1)
                        };
                    }
                    trace!(cmd, addr, "sim digipot step");
                    i += 1;
                }
                OP_READ => {
                    let value = if addr == ADDR_STATUS {
                        SIM_STATUS
                    } else {
                        st.wipers.get(usize::from(addr)).copied().unwrap_or(0)
                    };
                    if let Some(b) = rx.get_mut(i) {
                        *b = ((value >> 8) & 0x01) as u8;
                    }
                    if let Some(b) = rx.get_mut(i + 1) {
                        *b = (value & 0xFF) as u8;
                    }
                    i += 2;
                }
                OP_WRITE => {
                    let data = tx.get(i + 1).copied().unwrap_or(0);
                    let value = (u16::from(cmd & 0x01) << 8) | u16::from(data);
                    if let Some(w) = st.wipers.get_mut(usize::from(addr)) {
                        *w = value.min(SIM_WIPER_MAX);
                    }
                    i += 2;
                }
                _ => unreachable!("two-bit opcode"),
            }
        }
        Ok(())
    }
}

/// ADC view of the simulated plant.
#[derive(Debug, Clone)]
pub struct SimulatedAdc {
    plant: SimulatedPlant,
}

impl AnalogInput for SimulatedAdc {
    fn read(&mut self, channel: u8) -> HwResult<u16> {
        let code = self.plant.sample(channel)?;
        trace!(channel, code, "sim adc read");
        Ok(code)
    }
}

/// SPI view of the simulated digipot.
#[derive(Debug, Clone)]
pub struct SimulatedWiperLink {
    plant: SimulatedPlant,
}

impl WiperLink for SimulatedWiperLink {
    fn select(&mut self) -> HwResult<()> {
        self.plant.lock()?.selected = true;
        Ok(())
    }

    fn deselect(&mut self) {
        if let Ok(mut st) = self.plant.lock() {
            st.selected = false;
        }
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> HwResult<()> {
        Ok(self.plant.exchange(tx, rx)?)
    }
}

/// Divider enable lines of the simulated sensors.
#[derive(Debug, Clone)]
pub struct SimulatedDivider {
    plant: SimulatedPlant,
}

impl DividerSwitch for SimulatedDivider {
    fn configure(&mut self, sensor: usize, r2_enabled: bool, r3_enabled: bool) -> HwResult<()> {
        let mut st = self.plant.lock()?;
        match st.dividers.get_mut(sensor) {
            Some(d) => {
                *d = (r2_enabled, r3_enabled);
                Ok(())
            }
            None => Err(Box::new(HwError::Gpio(format!(
                "no divider lines for sensor {sensor}"
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plant() -> SimulatedPlant {
        SimulatedPlant::new(
            vec![SimSensor {
                supply_adc: 0,
                feedback_adc: 1,
                sensor_adc: 2,
                wiper: 0,
                min_supply_mv: 1000,
                mv_per_tap: 10,
                heater_ohms: 90,
                feedback_ohms: 10,
                divider_ohms: [10_000, 10_000, 20_000],
                sensor_ohms: 40_000,
            }],
            5000,
            1024,
        )
    }

    #[test]
    fn increments_raise_supply_reading() {
        let plant = plant();
        let mut adc = plant.adc();
        let mut link = plant.wiper_link();
        let before = adc.read(0).unwrap();
        link.select().unwrap();
        link.transfer(&[0x04, 0x04, 0x04], &mut [0; 3]).unwrap();
        link.deselect();
        let after = adc.read(0).unwrap();
        assert!(after > before, "{after} <= {before}");
        assert_eq!(plant.wiper(0), SIM_WIPER_MAX / 2 + 3);
    }

    #[test]
    fn transfer_requires_select() {
        let plant = plant();
        let mut link = plant.wiper_link();
        assert!(link.transfer(&[0x08], &mut [0]).is_err());
    }

    #[test]
    fn unwired_channel_errors() {
        let mut adc = plant().adc();
        assert!(adc.read(7).is_err());
    }
}

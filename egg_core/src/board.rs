//! The board context: every shared peripheral and all per-channel state,
//! built once and shared by the foreground loop and the bus thread.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use egg_traits::{AnalogInput, Clock, DividerSwitch, WiperLink};
use eyre::WrapErr;
use tracing::trace;

use crate::actuator::ActuatorDriver;
use crate::builder::{BoardBuilder, Missing};
use crate::config::{AdcCfg, ControlCfg, ProtocolCfg, SENSOR_COUNT, SamplerCfg, SensorChannel};
use crate::error::{EggError, Result};
use crate::heater::HeaterRuntimeState;
use crate::hw_error::map_hw_error;
use crate::resource::{Access, Exclusive};

pub type DynAdc = Box<dyn AnalogInput + Send>;
pub type DynWiperLink = Box<dyn WiperLink + Send>;
pub type DynDivider = Box<dyn DividerSwitch + Send>;

pub struct Board {
    pub(crate) adc: Exclusive<DynAdc>,
    pub(crate) actuator: Exclusive<ActuatorDriver<DynWiperLink>>,
    pub(crate) divider: Exclusive<DynDivider>,
    pub(crate) channels: [SensorChannel; SENSOR_COUNT],
    pub(crate) runtime: [Mutex<HeaterRuntimeState>; SENSOR_COUNT],
    pub(crate) adc_cfg: AdcCfg,
    pub(crate) control: ControlCfg,
    pub(crate) sampler: SamplerCfg,
    pub(crate) protocol: ProtocolCfg,
    pub(crate) module_id: [u8; 6],
    pub(crate) clock: Box<dyn Clock + Send + Sync>,
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("channels", &self.channels)
            .field("adc_cfg", &self.adc_cfg)
            .field("control", &self.control)
            .field("module_id", &self.module_id)
            .finish_non_exhaustive()
    }
}

impl Board {
    /// Start building a Board.
    pub fn builder() -> BoardBuilder<Missing, Missing, Missing> {
        BoardBuilder::default()
    }

    pub fn channel(&self, ch: usize) -> std::result::Result<&SensorChannel, EggError> {
        self.channels.get(ch).ok_or(EggError::InvalidChannel(ch))
    }

    pub fn channels(&self) -> &[SensorChannel] {
        &self.channels
    }

    pub fn adc_cfg(&self) -> &AdcCfg {
        &self.adc_cfg
    }

    pub fn control(&self) -> &ControlCfg {
        &self.control
    }

    pub fn sampler(&self) -> &SamplerCfg {
        &self.sampler
    }

    pub fn protocol(&self) -> &ProtocolCfg {
        &self.protocol
    }

    pub fn module_id(&self) -> [u8; 6] {
        self.module_id
    }

    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    /// One guarded conversion: the ADC is held from start of conversion until
    /// the result is fetched.
    pub fn read_adc(&self, channel: u8, access: Access) -> Result<u16> {
        let mut adc = self.adc(access)?;
        let code = adc
            .read(channel)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err_with(|| format!("adc channel {channel}"))?;
        trace!(channel, code, "adc read");
        Ok(code)
    }

    /// Exclusive use of the converter; holding it keeps every other
    /// conversion out.
    pub fn adc(&self, access: Access) -> Result<MutexGuard<'_, DynAdc>> {
        Ok(self.lock(&self.adc, access)?)
    }

    /// Exclusive use of the digipot for one command batch or read.
    pub fn actuator(&self, access: Access) -> Result<MutexGuard<'_, ActuatorDriver<DynWiperLink>>> {
        Ok(self.lock(&self.actuator, access)?)
    }

    pub fn divider(&self, access: Access) -> Result<MutexGuard<'_, DynDivider>> {
        Ok(self.lock(&self.divider, access)?)
    }

    /// Consistent copy of one channel's regulator state.
    pub fn snapshot(&self, ch: usize) -> Result<HeaterRuntimeState> {
        let st = self
            .runtime
            .get(ch)
            .ok_or(EggError::InvalidChannel(ch))?
            .lock()
            .map_err(|_| EggError::HardwareFault(format!("heater {ch} state poisoned")))?;
        Ok(*st)
    }

    pub(crate) fn update_runtime<R>(
        &self,
        ch: usize,
        f: impl FnOnce(&mut HeaterRuntimeState) -> R,
    ) -> Result<R> {
        let mut st = self
            .runtime
            .get(ch)
            .ok_or(EggError::InvalidChannel(ch))?
            .lock()
            .map_err(|_| EggError::HardwareFault(format!("heater {ch} state poisoned")))?;
        Ok(f(&mut st))
    }

    fn lock<'a, T>(
        &self,
        res: &'a Exclusive<T>,
        access: Access,
    ) -> std::result::Result<MutexGuard<'a, T>, EggError> {
        match access {
            Access::Foreground => res.acquire(),
            Access::Bus => res.acquire_within(self.protocol.stretch_budget(), self.clock()),
        }
    }
}

//! Type-state builder for `Board`.
//!
//! The builder enforces at compile time that the ADC, wiper link and divider
//! switch are provided before `build()` is available. `try_build()` is always
//! available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Mutex;

use egg_traits::{AnalogInput, Clock, DividerSwitch, MonotonicClock, WiperLink};

use crate::actuator::ActuatorDriver;
use crate::board::{Board, DynAdc, DynDivider, DynWiperLink};
use crate::config::*;
use crate::error::{BuildError, Resource, Result};
use crate::resource::Exclusive;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Board`. All fields are validated on `build()`.
pub struct BoardBuilder<A, L, D> {
    adc: Option<DynAdc>,
    link: Option<DynWiperLink>,
    divider: Option<DynDivider>,
    channels: Vec<SensorChannel>,
    adc_cfg: Option<AdcCfg>,
    control: Option<ControlCfg>,
    sampler: Option<SamplerCfg>,
    protocol: Option<ProtocolCfg>,
    module_id: [u8; 6],
    clock: Option<Box<dyn Clock + Send + Sync>>,
    _a: PhantomData<A>,
    _l: PhantomData<L>,
    _d: PhantomData<D>,
}

impl Default for BoardBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            adc: None,
            link: None,
            divider: None,
            channels: Vec::new(),
            adc_cfg: None,
            control: None,
            sampler: None,
            protocol: None,
            module_id: [0; 6],
            clock: None,
            _a: PhantomData,
            _l: PhantomData,
            _d: PhantomData,
        }
    }
}

fn invalid(msg: impl Into<String>) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg.into()))
}

fn validate(
    channels: &[SensorChannel],
    adc: &AdcCfg,
    control: &ControlCfg,
) -> Result<()> {
    if adc.reference_mv == 0 {
        return Err(invalid("reference_mv must be > 0"));
    }
    if adc.full_scale < 2 {
        return Err(invalid("full_scale must be >= 2"));
    }
    if control.momentum_step == 0 {
        return Err(invalid("momentum_step must be >= 1"));
    }
    if control.momentum_cap == Some(0) {
        return Err(invalid("momentum_cap must be >= 1"));
    }
    if channels.len() != SENSOR_COUNT {
        return Err(invalid(format!(
            "expected {SENSOR_COUNT} sensor channels, got {}",
            channels.len()
        )));
    }
    let mut wipers_seen = [false; SENSOR_COUNT];
    for (i, ch) in channels.iter().enumerate() {
        if ch.feedback_ohms == 0 {
            return Err(invalid(format!("channel {i}: feedback_ohms must be > 0")));
        }
        if ch.r0_ohms == 0 {
            return Err(invalid(format!("channel {i}: r0_ohms must be > 0")));
        }
        match wipers_seen.get_mut(usize::from(ch.wiper)) {
            Some(seen) if !*seen => *seen = true,
            _ => {
                return Err(invalid(format!(
                    "channel {i}: wiper {} is out of range or shared",
                    ch.wiper
                )));
            }
        }
        egg_config::check_curve(&ch.curve)
            .map_err(|e| invalid(format!("channel {i}: {e}")))?;
    }
    Ok(())
}

impl<A, L, D> BoardBuilder<A, L, D> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Board> {
        let adc = self
            .adc
            .ok_or_else(|| eyre::Report::new(BuildError::MissingAdc))?;
        let link = self
            .link
            .ok_or_else(|| eyre::Report::new(BuildError::MissingWiperLink))?;
        let divider = self
            .divider
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDivider))?;
        let clock: Box<dyn Clock + Send + Sync> = match self.clock {
            Some(clock) => clock,
            None => Box::new(MonotonicClock::new()),
        };
        let adc_cfg = self.adc_cfg.unwrap_or_default();
        let control = self.control.unwrap_or_default();

        validate(&self.channels, &adc_cfg, &control)?;
        let channels: [SensorChannel; SENSOR_COUNT] = self
            .channels
            .try_into()
            .map_err(|_| invalid("sensor channel count"))?;

        Ok(Board {
            adc: Exclusive::new(Resource::Adc, adc),
            actuator: Exclusive::new(Resource::Digipot, ActuatorDriver::new(link)),
            divider: Exclusive::new(Resource::Divider, divider),
            channels,
            runtime: std::array::from_fn(|_| Mutex::new(Default::default())),
            adc_cfg,
            control,
            sampler: self.sampler.unwrap_or_default(),
            protocol: self.protocol.unwrap_or_default(),
            module_id: self.module_id,
            clock,
        })
    }
}

/// Chainable setters that do not affect type-state.
impl<A, L, D> BoardBuilder<A, L, D> {
    pub fn with_channel(mut self, channel: SensorChannel) -> Self {
        self.channels.push(channel);
        self
    }
    pub fn with_channels(mut self, channels: impl IntoIterator<Item = SensorChannel>) -> Self {
        self.channels.extend(channels);
        self
    }
    pub fn with_adc_cfg(mut self, adc_cfg: AdcCfg) -> Self {
        self.adc_cfg = Some(adc_cfg);
        self
    }
    pub fn with_control(mut self, control: ControlCfg) -> Self {
        self.control = Some(control);
        self
    }
    pub fn with_sampler(mut self, sampler: SamplerCfg) -> Self {
        self.sampler = Some(sampler);
        self
    }
    pub fn with_protocol(mut self, protocol: ProtocolCfg) -> Self {
        self.protocol = Some(protocol);
        self
    }
    pub fn with_module_id(mut self, module_id: [u8; 6]) -> Self {
        self.module_id = module_id;
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<L, D> BoardBuilder<Missing, L, D> {
    pub fn with_adc(self, adc: impl AnalogInput + Send + 'static) -> BoardBuilder<Set, L, D> {
        BoardBuilder {
            adc: Some(Box::new(adc)),
            link: self.link,
            divider: self.divider,
            channels: self.channels,
            adc_cfg: self.adc_cfg,
            control: self.control,
            sampler: self.sampler,
            protocol: self.protocol,
            module_id: self.module_id,
            clock: self.clock,
            _a: PhantomData,
            _l: PhantomData,
            _d: PhantomData,
        }
    }
}

impl<A, D> BoardBuilder<A, Missing, D> {
    pub fn with_wiper_link(
        self,
        link: impl WiperLink + Send + 'static,
    ) -> BoardBuilder<A, Set, D> {
        BoardBuilder {
            adc: self.adc,
            link: Some(Box::new(link)),
            divider: self.divider,
            channels: self.channels,
            adc_cfg: self.adc_cfg,
            control: self.control,
            sampler: self.sampler,
            protocol: self.protocol,
            module_id: self.module_id,
            clock: self.clock,
            _a: PhantomData,
            _l: PhantomData,
            _d: PhantomData,
        }
    }
}

impl<A, L> BoardBuilder<A, L, Missing> {
    pub fn with_divider(
        self,
        divider: impl DividerSwitch + Send + 'static,
    ) -> BoardBuilder<A, L, Set> {
        BoardBuilder {
            adc: self.adc,
            link: self.link,
            divider: Some(Box::new(divider)),
            channels: self.channels,
            adc_cfg: self.adc_cfg,
            control: self.control,
            sampler: self.sampler,
            protocol: self.protocol,
            module_id: self.module_id,
            clock: self.clock,
            _a: PhantomData,
            _l: PhantomData,
            _d: PhantomData,
        }
    }
}

impl BoardBuilder<Set, Set, Set> {
    /// Validate and build the Board. Only available when ADC, link and divider are set.
    pub fn build(self) -> Result<Board> {
        self.try_build()
    }
}

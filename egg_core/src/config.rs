//! Configuration types for the regulator, sampler and dispatcher.
//!
//! These are the runtime configuration structs held by `Board`.
//! They are separate from the TOML-deserialized config in `egg_config`.

use std::time::Duration;

pub use egg_config::{CurvePoint, NAME_SLOT_LEN, SENSOR_COUNT};

/// Converter scaling shared by every analog channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcCfg {
    /// Reference voltage in millivolts.
    pub reference_mv: u32,
    /// Number of codes spanning the reference (1024 for 10 bit).
    pub full_scale: u16,
}

impl Default for AdcCfg {
    fn default() -> Self {
        Self {
            reference_mv: 5000,
            full_scale: 1024,
        }
    }
}

impl AdcCfg {
    /// Code the dynamic-range sampler aims for.
    #[inline]
    pub fn mid_scale(&self) -> u16 {
        self.full_scale / 2
    }

    /// `code * reference_mv / full_scale`, truncating.
    #[inline]
    pub fn code_to_mv(&self, code: u16) -> u32 {
        let mv = u64::from(code) * u64::from(self.reference_mv) / u64::from(self.full_scale.max(1));
        u32::try_from(mv).unwrap_or(u32::MAX)
    }
}

/// Heater regulation cadence and momentum tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlCfg {
    /// Length of one pass over all heaters.
    pub period_ms: u64,
    /// Momentum gained per tick while the direction repeats.
    pub momentum_step: u32,
    /// Ceiling on momentum; `None` lets it grow until it saturates.
    pub momentum_cap: Option<u32>,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            period_ms: 4000,
            momentum_step: 1,
            momentum_cap: None,
        }
    }
}

impl ControlCfg {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerCfg {
    /// Wait after each divider reconfiguration before sampling.
    pub settle_ms: u64,
}

impl Default for SamplerCfg {
    fn default() -> Self {
        Self { settle_ms: 10 }
    }
}

impl SamplerCfg {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolCfg {
    /// Longest a bus handler polls for a busy resource before answering zeros.
    pub stretch_budget_ms: u64,
}

impl Default for ProtocolCfg {
    fn default() -> Self {
        Self {
            stretch_budget_ms: 25,
        }
    }
}

impl ProtocolCfg {
    pub fn stretch_budget(&self) -> Duration {
        Duration::from_millis(self.stretch_budget_ms)
    }
}

/// Static description of one heater/sensor pair. Immutable once the board is built.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorChannel {
    pub type_name: String,
    pub unit_name: String,
    pub feedback_ohms: u32,
    pub target_power_mw: u32,
    pub supply_adc: u8,
    pub feedback_adc: u8,
    pub sensor_adc: u8,
    /// Logical digipot wiper (0 or 1) trimming this heater's supply.
    pub wiper: u8,
    /// Low-side divider resistors `[r1, r2, r3]`.
    pub divider_ohms: [u32; 3],
    pub r0_ohms: u32,
    /// `(Rs / R0, concentration)` points, ascending in ratio.
    pub curve: Vec<CurvePoint>,
}

//! `From` implementations bridging `egg_config` types to `egg_core` types.

use crate::config::{AdcCfg, ControlCfg, ProtocolCfg, SamplerCfg, SensorChannel};

// ── AdcCfg ───────────────────────────────────────────────────────────────────

impl From<&egg_config::AdcCfg> for AdcCfg {
    fn from(c: &egg_config::AdcCfg) -> Self {
        Self {
            reference_mv: c.reference_mv,
            full_scale: c.full_scale,
        }
    }
}

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&egg_config::ControlCfg> for ControlCfg {
    fn from(c: &egg_config::ControlCfg) -> Self {
        Self {
            period_ms: c.period_ms,
            momentum_step: c.momentum_step,
            momentum_cap: c.momentum_cap,
        }
    }
}

// ── SamplerCfg / ProtocolCfg ─────────────────────────────────────────────────

impl From<&egg_config::SamplerCfg> for SamplerCfg {
    fn from(c: &egg_config::SamplerCfg) -> Self {
        Self {
            settle_ms: c.settle_ms,
        }
    }
}

impl From<&egg_config::ProtocolCfg> for ProtocolCfg {
    fn from(c: &egg_config::ProtocolCfg) -> Self {
        Self {
            stretch_budget_ms: c.stretch_budget_ms,
        }
    }
}

// ── SensorChannel ────────────────────────────────────────────────────────────

/// Takes the inline `curve`; callers that use `curve_csv` replace it after loading.
impl From<&egg_config::SensorCfg> for SensorChannel {
    fn from(c: &egg_config::SensorCfg) -> Self {
        Self {
            type_name: c.type_name.clone(),
            unit_name: c.unit_name.clone(),
            feedback_ohms: c.feedback_ohms,
            target_power_mw: c.target_power_mw,
            supply_adc: c.supply_adc,
            feedback_adc: c.feedback_adc,
            sensor_adc: c.sensor_adc,
            wiper: c.wiper,
            divider_ohms: c.divider_ohms,
            r0_ohms: c.r0_ohms,
            curve: c.curve.clone(),
        }
    }
}

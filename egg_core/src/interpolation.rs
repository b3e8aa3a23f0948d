//! Sensor resistance and concentration from a dynamic-range sample.

use crate::config::{CurvePoint, SensorChannel};
use crate::dynamic_range::RawSample;

/// Resistance of the high-side sensing element, from the divider equation
/// `Rs = R_low * (full_scale - code) / code`.
///
/// A zero code means the sensor is effectively open and reads as `u32::MAX`.
pub fn sensor_resistance(code: u16, full_scale: u16, low_ohms: u32) -> u32 {
    if code == 0 {
        return u32::MAX;
    }
    let rs = u64::from(low_ohms) * u64::from(full_scale.saturating_sub(code)) / u64::from(code);
    u32::try_from(rs).unwrap_or(u32::MAX)
}

/// Piecewise-linear lookup, clamped to the end points.
pub fn interpolate(curve: &[CurvePoint], x: f32) -> f32 {
    let (Some(first), Some(last)) = (curve.first(), curve.last()) else {
        return 0.0;
    };
    if x <= first.ratio {
        return first.concentration;
    }
    for pair in curve.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if x <= b.ratio {
            let t = (x - a.ratio) / (b.ratio - a.ratio);
            return a.concentration + t * (b.concentration - a.concentration);
        }
    }
    last.concentration
}

/// Value reported in the sensor's unit for one raw sample.
pub fn computed_value(channel: &SensorChannel, sample: RawSample, full_scale: u16) -> u32 {
    let rs = sensor_resistance(sample.code, full_scale, sample.low_ohms);
    let ratio = rs as f32 / channel.r0_ohms.max(1) as f32;
    // float-to-int casts saturate and map NaN to 0
    interpolate(&channel.curve, ratio).round() as u32
}

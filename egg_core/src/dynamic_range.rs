//! Dynamic-range sampling of a sensor's output divider.
//!
//! The sensing element sits on the high side of a divider whose low side is
//! `r1` plus two switchable resistors. The sampler tries the three
//! configurations from widest to narrowest and keeps the reading closest to
//! ADC mid-scale, where the converter resolves resistance best.

use egg_traits::DividerSwitch;
use eyre::WrapErr;
use tracing::trace;

use crate::board::Board;
use crate::error::Result;
use crate::hw_error::map_hw_error;
use crate::resource::Access;

/// `(r2 enabled, r3 enabled)` in the order they are tried.
pub const CONFIGURATIONS: [(bool, bool); 3] = [(true, true), (true, false), (false, false)];

/// Winning code and the low-side resistance it was taken with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSample {
    pub code: u16,
    pub low_ohms: u32,
}

/// Low-side resistance for one divider configuration.
pub fn low_side_ohms(divider_ohms: [u32; 3], r2_enabled: bool, r3_enabled: bool) -> u32 {
    let [r1, r2, r3] = divider_ohms;
    let mut ohms = r1;
    if r2_enabled {
        ohms = ohms.saturating_add(r2);
    }
    if r3_enabled {
        ohms = ohms.saturating_add(r3);
    }
    ohms
}

/// Index of the code nearest `mid`; the earlier index wins ties.
pub fn select_best(codes: &[u16], mid: u16) -> usize {
    let mut best = 0;
    let mut best_distance = u16::MAX;
    for (i, &code) in codes.iter().enumerate() {
        let distance = code.abs_diff(mid);
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

/// Sweep the divider of sensor `index` and return the best-resolved sample.
///
/// Holds the divider lines for the whole sweep; the ADC guard is taken per
/// conversion.
pub fn sample_raw(board: &Board, index: usize, access: Access) -> Result<RawSample> {
    let channel = board.channel(index)?;
    let mut divider = board.divider(access)?;
    let mut codes = [0u16; CONFIGURATIONS.len()];

    for (slot, &(r2, r3)) in codes.iter_mut().zip(CONFIGURATIONS.iter()) {
        divider
            .configure(index, r2, r3)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err_with(|| format!("switching divider of sensor {index}"))?;
        board.clock().sleep(board.sampler().settle());
        *slot = board
            .read_adc(channel.sensor_adc, access)
            .wrap_err_with(|| format!("sampling sensor {index}"))?;
    }

    let best = select_best(&codes, board.adc_cfg().mid_scale());
    let (r2, r3) = CONFIGURATIONS[best];
    let sample = RawSample {
        code: codes[best],
        low_ohms: low_side_ohms(channel.divider_ohms, r2, r3),
    };
    trace!(sensor = index, ?codes, best, "dynamic range sweep");
    Ok(sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_side_sums_enabled_resistors() {
        let d = [4_700, 10_000, 47_000];
        assert_eq!(low_side_ohms(d, true, true), 61_700);
        assert_eq!(low_side_ohms(d, true, false), 14_700);
        assert_eq!(low_side_ohms(d, false, false), 4_700);
    }

    #[test]
    fn nearest_to_mid_wins() {
        assert_eq!(select_best(&[100, 400, 900], 512), 1);
        assert_eq!(select_best(&[1023, 1023, 600], 512), 2);
    }

    #[test]
    fn ties_keep_the_first_configuration() {
        assert_eq!(select_best(&[500, 524, 512 - 12], 512), 0);
        assert_eq!(select_best(&[0, 1024, 0], 512), 0);
    }

    #[test]
    fn worst_case_distance_still_selects() {
        assert_eq!(select_best(&[u16::MAX, u16::MAX, u16::MAX], 0), 0);
    }
}

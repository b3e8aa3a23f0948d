//! Heater power from the supply-side and feedback-side voltages.
//!
//! The heater and a known feedback resistor form a series loop: the feedback
//! voltage gives the loop current, the difference gives the heater voltage.

use eyre::WrapErr;

use crate::board::Board;
use crate::config::{AdcCfg, SensorChannel};
use crate::error::Result;
use crate::resource::Access;

/// One power measurement, in the units the registers expose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerReading {
    pub supply_mv: u32,
    pub feedback_mv: u32,
    pub power_mw: u32,
}

/// `(V_supply - V_feedback) * V_feedback / R_feedback`, in milliwatts, from raw
/// ADC codes.
///
/// Works on codes and scales by `reference_mv² / full_scale²` once at the end,
/// so the only truncation is the final division. Saturates to 0 when the
/// feedback side is at or above the supply side.
#[inline]
pub fn power_mw(supply_code: u16, feedback_code: u16, feedback_ohms: u32, adc: &AdcCfg) -> u32 {
    let heater_codes = u128::from(supply_code.saturating_sub(feedback_code));
    let reference = u128::from(adc.reference_mv);
    let full_scale = u128::from(adc.full_scale.max(1));
    let numerator = heater_codes * u128::from(feedback_code) * reference * reference;
    let denominator = full_scale * full_scale * u128::from(feedback_ohms.max(1)) * 1000;
    u32::try_from(numerator / denominator).unwrap_or(u32::MAX)
}

/// Sample both loop voltages of `channel` and compute its dissipation.
///
/// Each conversion takes the ADC guard on its own, so a bus handler can slip
/// in between the two reads. The millivolt fields are for diagnostics only.
pub fn sample(board: &Board, channel: &SensorChannel, access: Access) -> Result<PowerReading> {
    let adc = board.adc_cfg();
    let supply_code = board
        .read_adc(channel.supply_adc, access)
        .wrap_err("sampling heater supply")?;
    let feedback_code = board
        .read_adc(channel.feedback_adc, access)
        .wrap_err("sampling heater feedback")?;
    Ok(PowerReading {
        supply_mv: adc.code_to_mv(supply_code),
        feedback_mv: adc.code_to_mv(feedback_code),
        power_mw: power_mw(supply_code, feedback_code, channel.feedback_ohms, adc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const UNIT: AdcCfg = AdcCfg {
        reference_mv: 1024,
        full_scale: 1024,
    };
    const BOARD: AdcCfg = AdcCfg {
        reference_mv: 5000,
        full_scale: 1024,
    };

    #[rstest]
    #[case(UNIT, 900, 100, 1, 80)]
    #[case(UNIT, 1000, 1000, 10, 0)]
    #[case(UNIT, 100, 900, 1, 0)]
    #[case(UNIT, 0, 0, 10, 0)]
    #[case(BOARD, 1023, 102, 10, 223)]
    // 43.01 mW: converting each code to mV first would truncate this to 42
    #[case(BOARD, 274, 110, 10, 43)]
    #[case(BOARD, 517, 74, 10, 78)]
    fn computes_milliwatts_from_codes(
        #[case] adc: AdcCfg,
        #[case] supply: u16,
        #[case] feedback: u16,
        #[case] ohms: u32,
        #[case] expected: u32,
    ) {
        assert_eq!(power_mw(supply, feedback, ohms, &adc), expected);
    }

    #[test]
    fn normalizes_once_not_per_voltage() {
        let per_voltage = power_mw_from_millivolts(
            BOARD.code_to_mv(274),
            BOARD.code_to_mv(110),
            10,
        );
        assert_eq!(per_voltage, 42);
        assert_eq!(power_mw(274, 110, 10, &BOARD), 43);
    }

    fn power_mw_from_millivolts(supply_mv: u32, feedback_mv: u32, ohms: u32) -> u64 {
        u64::from(supply_mv - feedback_mv) * u64::from(feedback_mv) / (u64::from(ohms) * 1000)
    }

    #[test]
    fn huge_references_do_not_overflow() {
        let adc = AdcCfg {
            reference_mv: u32::MAX,
            full_scale: 2,
        };
        assert_eq!(power_mw(u16::MAX, u16::MAX / 2, 1, &adc), u32::MAX);
    }
}

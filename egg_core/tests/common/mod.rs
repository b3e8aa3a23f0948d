#![allow(dead_code)]

use std::sync::Arc;

use egg_core::config::CurvePoint;
use egg_core::mocks::{RecordingDivider, RecordingLink, ScriptedAdc};
use egg_core::{AdcCfg, Board, ControlCfg, SensorChannel};
use egg_traits::clock::test_clock::TestClock;

pub const TARGET_MW: u32 = 50;

/// A board on mocks. With a 1024 mV reference over 1024 codes, one code is
/// one millivolt, and a 1 Ω feedback resistor makes power easy to script.
pub struct Rig {
    pub board: Arc<Board>,
    pub adc: ScriptedAdc,
    pub link: RecordingLink,
    pub divider: RecordingDivider,
    pub clock: TestClock,
}

pub fn channel(i: u8) -> SensorChannel {
    SensorChannel {
        type_name: ["NO2", "CO"][usize::from(i)].to_string(),
        unit_name: "ppb".to_string(),
        feedback_ohms: 1,
        target_power_mw: TARGET_MW,
        supply_adc: 3 * i,
        feedback_adc: 3 * i + 1,
        sensor_adc: 3 * i + 2,
        wiper: i,
        divider_ohms: [4_700, 10_000, 47_000],
        r0_ohms: 10_000,
        curve: vec![
            CurvePoint {
                ratio: 0.5,
                concentration: 1000.0,
            },
            CurvePoint {
                ratio: 2.0,
                concentration: 250.0,
            },
        ],
    }
}

/// A mock board with explicit converter scaling and channel wiring.
pub fn rig_on(adc_cfg: AdcCfg, control: ControlCfg, channels: [SensorChannel; 2]) -> Rig {
    let adc = ScriptedAdc::new();
    let link = RecordingLink::new();
    let divider = RecordingDivider::new();
    let clock = TestClock::new();
    let board = Board::builder()
        .with_adc(adc.clone())
        .with_wiper_link(link.clone())
        .with_divider(divider.clone())
        .with_channels(channels)
        .with_adc_cfg(adc_cfg)
        .with_control(control)
        .with_module_id([0x00, 0x04, 0xa3, 0x0b, 0x00, 0x1c])
        .with_clock(Box::new(clock.clone()))
        .build()
        .expect("mock board builds");
    Rig {
        board: Arc::new(board),
        adc,
        link,
        divider,
        clock,
    }
}

pub fn rig_with(control: ControlCfg) -> Rig {
    rig_on(
        AdcCfg {
            reference_mv: 1024,
            full_scale: 1024,
        },
        control,
        [channel(0), channel(1)],
    )
}

pub fn rig() -> Rig {
    rig_with(ControlCfg::default())
}

/// Script both loop voltages of heater `ch` in millivolts.
pub fn set_heater(rig: &Rig, ch: u8, supply_mv: u16, feedback_mv: u16) {
    rig.adc.set(3 * ch, supply_mv);
    rig.adc.set(3 * ch + 1, feedback_mv);
}

#![no_main]
use std::sync::Arc;

use libfuzzer_sys::{arbitrary::Arbitrary, fuzz_target};

use egg_core::config::CurvePoint;
use egg_core::registers::Register;
use egg_core::{Board, ProtocolDispatcher, SamplerCfg, SensorChannel};
use egg_hardware::{SimSensor, SimulatedPlant};

#[derive(Debug, Arbitrary)]
enum Transaction {
    Write(Vec<u8>),
    Read,
}

fn channel(i: u8) -> SensorChannel {
    SensorChannel {
        type_name: "NO2".into(),
        unit_name: "ppb".into(),
        feedback_ohms: 10,
        target_power_mw: 40,
        supply_adc: 3 * i,
        feedback_adc: 3 * i + 1,
        sensor_adc: 3 * i + 2,
        wiper: i,
        divider_ohms: [4_700, 10_000, 47_000],
        r0_ohms: 2_200,
        curve: vec![
            CurvePoint { ratio: 1.0, concentration: 100.0 },
            CurvePoint { ratio: 90.0, concentration: 400.0 },
        ],
    }
}

fn board() -> Option<Board> {
    let sensors = (0..2u8)
        .map(|i| SimSensor {
            supply_adc: 3 * i,
            feedback_adc: 3 * i + 1,
            sensor_adc: 3 * i + 2,
            wiper: i,
            min_supply_mv: 1500,
            mv_per_tap: 8,
            heater_ohms: 60,
            feedback_ohms: 10,
            divider_ohms: [4_700, 10_000, 47_000],
            sensor_ohms: 100_000,
        })
        .collect();
    let plant = SimulatedPlant::new(sensors, 5000, 1024);
    Board::builder()
        .with_adc(plant.adc())
        .with_wiper_link(plant.wiper_link())
        .with_divider(plant.divider())
        .with_channels([channel(0), channel(1)])
        .with_sampler(SamplerCfg { settle_ms: 0 })
        .build()
        .ok()
}

fuzz_target!(|txns: Vec<Transaction>| {
    let Some(board) = board() else { return };
    let dispatcher = ProtocolDispatcher::new(Arc::new(board));
    for txn in txns {
        match txn {
            Transaction::Write(bytes) => dispatcher.on_write(&bytes),
            Transaction::Read => {
                let expected = dispatcher
                    .pending()
                    .map_or(Register::Unknown, Register::decode)
                    .width();
                // Responses always carry the width of the latched register
                assert_eq!(dispatcher.on_read().len(), expected);
            }
        }
    }
});

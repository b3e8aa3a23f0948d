use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use egg_core::config::CurvePoint;
use egg_core::mocks::{RecordingDivider, RecordingLink, ScriptedAdc};
use egg_core::protocol::{CMD_READ, ProtocolDispatcher};
use egg_core::registers::Register;
use egg_core::{Board, SamplerCfg, SensorChannel};

fn channel(i: u8) -> SensorChannel {
    SensorChannel {
        type_name: "NO2".into(),
        unit_name: "ppb".into(),
        feedback_ohms: 10,
        target_power_mw: 43,
        supply_adc: 3 * i,
        feedback_adc: 3 * i + 1,
        sensor_adc: 3 * i + 2,
        wiper: i,
        divider_ohms: [4_700, 10_000, 47_000],
        r0_ohms: 2_200,
        curve: vec![
            CurvePoint {
                ratio: 24.8,
                concentration: 198.9,
            },
            CurvePoint {
                ratio: 98.8,
                concentration: 418.2,
            },
        ],
    }
}

fn dispatcher() -> ProtocolDispatcher {
    let adc = ScriptedAdc::new();
    for ch in 0..6 {
        adc.set(ch, 400);
    }
    let board = Board::builder()
        .with_adc(adc)
        .with_wiper_link(RecordingLink::new())
        .with_divider(RecordingDivider::new())
        .with_channels([channel(0), channel(1)])
        // no settle wait so the bench measures the read path itself
        .with_sampler(SamplerCfg { settle_ms: 0 })
        .build()
        .expect("bench board");
    ProtocolDispatcher::new(Arc::new(board))
}

pub fn bench_register_read(c: &mut Criterion) {
    let mut g = c.benchmark_group("register_read");
    // Allow quick tweaking without CLI flags (Criterion 0.5):
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p egg_core --bench register_read
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    g.bench_function("decode_all_addresses", |b| {
        b.iter(|| {
            for addr in 0..=u16::MAX {
                black_box(Register::decode(black_box(addr)));
            }
        })
    });

    let d = dispatcher();
    let targets = [
        ("sensor_count", 0x0000u16),
        ("power", 0x0012),
        ("computed_value", 0x0124),
    ];
    for (name, addr) in targets {
        let [hi, lo] = addr.to_be_bytes();
        g.bench_function(name, |b| {
            b.iter(|| {
                d.on_write(black_box(&[CMD_READ, hi, lo]));
                black_box(d.on_read());
            })
        });
    }
    g.finish();
}

criterion_group!(register_read, bench_register_read);
criterion_main!(register_read);

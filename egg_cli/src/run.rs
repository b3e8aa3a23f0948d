//! Board assembly from config, and command execution.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use eyre::WrapErr;
use serde_json::json;

use egg_config::Config;
use egg_core::error::{BuildError, Result as CoreResult};
use egg_core::registers::Register;
use egg_core::runner::{self, ChannelReport};
use egg_core::{
    Access, Board, BusSlave, HeaterController, ProtocolDispatcher, SENSOR_COUNT, SensorChannel,
};

/// Map every `[[sensor]]` entry to a runtime channel, loading `curve_csv`
/// files relative to the config's directory.
pub fn sensor_channels(cfg: &Config, config_dir: &Path) -> eyre::Result<Vec<SensorChannel>> {
    cfg.sensors
        .iter()
        .enumerate()
        .map(|(i, s)| -> eyre::Result<SensorChannel> {
            let mut channel = SensorChannel::from(s);
            if let Some(csv) = &s.curve_csv {
                let path = config_dir.join(csv);
                channel.curve = egg_config::load_curve_csv(&path)
                    .map_err(|e| BuildError::InvalidConfig(format!("sensor[{i}]: {e}")))?;
                tracing::debug!(
                    channel = i,
                    path = %path.display(),
                    points = channel.curve.len(),
                    "curve loaded"
                );
            }
            Ok(channel)
        })
        .collect()
}

/// Assemble the board on the simulated plant described by `[simulation]`.
#[cfg(not(feature = "hardware"))]
pub fn build_board(cfg: &Config, channels: Vec<SensorChannel>) -> CoreResult<Board> {
    use egg_hardware::{SimSensor, SimulatedPlant};

    let sim = &cfg.simulation;
    let sensors = cfg
        .sensors
        .iter()
        .zip(sim.sensor_ohms)
        .map(|(s, sensor_ohms)| SimSensor {
            supply_adc: s.supply_adc,
            feedback_adc: s.feedback_adc,
            sensor_adc: s.sensor_adc,
            wiper: s.wiper,
            min_supply_mv: sim.min_supply_mv,
            mv_per_tap: sim.mv_per_tap,
            heater_ohms: sim.heater_ohms,
            feedback_ohms: s.feedback_ohms,
            divider_ohms: s.divider_ohms,
            sensor_ohms,
        })
        .collect();
    let plant = SimulatedPlant::new(sensors, cfg.adc.reference_mv, cfg.adc.full_scale);
    tracing::info!(backend = "sim", "board assembled");

    configure(Board::builder(), cfg, channels)?
        .with_adc(plant.adc())
        .with_wiper_link(plant.wiper_link())
        .with_divider(plant.divider())
        .build()
}

/// Assemble the board on the Raspberry Pi SPI/GPIO backend.
#[cfg(feature = "hardware")]
pub fn build_board(cfg: &Config, channels: Vec<SensorChannel>) -> CoreResult<Board> {
    use egg_hardware::rpi::{GpioDivider, Mcp3008Adc, SpiWiperLink};

    let hw = &cfg.hardware;
    let pins = cfg
        .sensors
        .iter()
        .enumerate()
        .map(|(i, s)| {
            s.divider_pins.ok_or_else(|| {
                BuildError::InvalidConfig(format!(
                    "sensor[{i}].divider_pins is required on hardware"
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let adc = Mcp3008Adc::new(hw.spi_bus, hw.spi_clock_hz).wrap_err("open adc")?;
    let link = SpiWiperLink::new(hw.spi_bus, hw.spi_clock_hz, hw.wiper_cs_pin)
        .wrap_err("open digipot")?;
    let divider = GpioDivider::new(&pins).wrap_err("open divider pins")?;
    tracing::info!(backend = "rpi", spi_bus = hw.spi_bus, "board assembled");

    configure(Board::builder(), cfg, channels)?
        .with_adc(adc)
        .with_wiper_link(link)
        .with_divider(divider)
        .build()
}

fn configure<A, L, D>(
    builder: egg_core::BoardBuilder<A, L, D>,
    cfg: &Config,
    channels: Vec<SensorChannel>,
) -> CoreResult<egg_core::BoardBuilder<A, L, D>> {
    let module_id = cfg
        .identity
        .module_id_bytes()
        .map_err(|e| BuildError::InvalidConfig(e.to_string()))?;
    Ok(builder
        .with_channels(channels)
        .with_adc_cfg((&cfg.adc).into())
        .with_control((&cfg.control).into())
        .with_sampler((&cfg.sampler).into())
        .with_protocol((&cfg.protocol).into())
        .with_module_id(module_id))
}

fn report_json(r: &ChannelReport) -> serde_json::Value {
    json!({
        "channel": r.channel,
        "type": r.type_name,
        "supply_mv": r.supply_mv,
        "feedback_mv": r.feedback_mv,
        "power_mw": r.power_mw,
        "target_mw": r.target_mw,
        "momentum": r.momentum,
        "last_direction": r.last_direction.sign(),
        "ticks": r.ticks,
    })
}

fn print_reports(reports: &[ChannelReport], json_mode: bool) {
    for r in reports {
        if json_mode {
            println!("{}", report_json(r));
        } else {
            println!(
                "heater[{}] {:<4} power={}mW target={}mW supply={}mV feedback={}mV \
                 momentum={} last={}",
                r.channel,
                r.type_name,
                r.power_mw,
                r.target_mw,
                r.supply_mv,
                r.feedback_mv,
                r.momentum,
                r.last_direction
            );
        }
    }
}

/// Regulate until `ticks` passes are done or `shutdown` is raised, then
/// print one summary line per heater.
pub fn run_regulation(
    board: Arc<Board>,
    ticks: Option<u64>,
    shutdown: &AtomicBool,
    json_mode: bool,
) -> CoreResult<()> {
    let dispatcher = Arc::new(ProtocolDispatcher::new(board.clone()));
    // Keep the bus serviced while the foreground loop runs
    let slave = BusSlave::spawn(dispatcher.clone());
    let controller = HeaterController::new(board.clone());

    let passes = runner::run(&controller, ticks, shutdown)?;
    drop(slave);

    let reports = runner::summarize(&board)?;
    if json_mode {
        println!(
            "{}",
            json!({ "passes": passes, "busy_reads": dispatcher.busy_count() })
        );
    } else {
        println!("regulation stopped after {passes} passes");
    }
    print_reports(&reports, json_mode);
    Ok(())
}

/// Read one register the way a bus master would: latch the address with a
/// `READ` write, then issue the read.
pub fn read_register(
    board: Arc<Board>,
    addr: u16,
    ticks: u64,
    shutdown: &AtomicBool,
    json_mode: bool,
) -> CoreResult<()> {
    if ticks > 0 {
        runner::run(&HeaterController::new(board.clone()), Some(ticks), shutdown)?;
    }
    let slave = BusSlave::spawn(Arc::new(ProtocolDispatcher::new(board)));
    let bytes = slave.master()?.transact(addr)?;
    let register = Register::decode(addr);
    let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();

    if json_mode {
        println!(
            "{}",
            json!({
                "addr": format!("0x{addr:04x}"),
                "register": register.to_string(),
                "bytes": bytes,
            })
        );
    } else {
        println!("0x{addr:04x} {register}: {}", hex.join(" "));
    }
    Ok(())
}

pub fn list_registers(json_mode: bool) {
    for register in Register::all() {
        let Some(addr) = register.address() else {
            continue;
        };
        if json_mode {
            let line = json!({
                "addr": format!("0x{addr:04x}"),
                "register": register.to_string(),
                "width": register.width(),
            });
            println!("{line}");
        } else {
            println!("0x{addr:04x} {:>2}  {register}", register.width());
        }
    }
}

/// Digipot status, wiper readback and one supply conversion per heater.
pub fn self_check(board: &Board, json_mode: bool) -> CoreResult<()> {
    let status = board
        .actuator(Access::Foreground)?
        .read_status()
        .wrap_err("digipot status")?;
    let mut wipers = [0u16; SENSOR_COUNT];
    let mut supply = [0u32; SENSOR_COUNT];
    for (ch, channel) in board.channels().iter().enumerate() {
        wipers[ch] = board
            .actuator(Access::Foreground)?
            .read_wiper(channel.wiper)
            .wrap_err_with(|| format!("wiper {}", channel.wiper))?;
        let code = board.read_adc(channel.supply_adc, Access::Foreground)?;
        supply[ch] = board.adc_cfg().code_to_mv(code);
    }
    tracing::info!(status, ?wipers, ?supply, "self-check passed");

    if json_mode {
        println!(
            "{}",
            json!({ "ok": true, "digipot_status": status, "wipers": wipers, "supply_mv": supply })
        );
    } else {
        println!("ok: digipot status 0x{status:03x}, wipers {wipers:?}, supply {supply:?} mV");
    }
    Ok(())
}

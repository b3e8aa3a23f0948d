#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and curve parsing for the sensor board.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Interpolation curves are given inline per sensor or loaded from a CSV
//!   with strict headers.
use std::path::PathBuf;

use serde::Deserialize;
use serde::de::Deserializer;

/// Number of heated sensors on the board. The register map is laid out for
/// exactly this many sensor blocks.
pub const SENSOR_COUNT: usize = 2;

/// Longest type or unit name that fits a register slot.
pub const NAME_SLOT_LEN: usize = 16;

/// Curve CSV schema.
///
/// Expected headers:
/// ratio,concentration
///
/// Example:
/// ratio,concentration
/// 0.402,41250
/// 0.504,20625
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub ratio: f32,
    pub concentration: f32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AdcCfg {
    /// Converter reference voltage in millivolts.
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlCfg {
    /// Length of one regulation pass over all heaters.
    pub period_ms: u64,
    /// Momentum gained per tick while the correction direction repeats.
    pub momentum_step: u32,
    /// Optional ceiling on momentum; unset means unbounded.
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplerCfg {
    /// Wait after switching divider resistors before sampling.
    pub settle_ms: u64,
}

impl Default for SamplerCfg {
    fn default() -> Self {
        Self { settle_ms: 10 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProtocolCfg {
    /// How long a bus handler may wait on a busy ADC or digipot before it
    /// answers with zeros (bounded by the master's clock-stretch tolerance).
    pub stretch_budget_ms: u64,
}

impl Default for ProtocolCfg {
    fn default() -> Self {
        Self {
            stretch_budget_ms: 25,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Identity {
    /// Six colon-separated hex bytes, e.g. "00:04:a3:0b:00:1c".
    pub module_id: String,
}

impl Identity {
    pub fn module_id_bytes(&self) -> eyre::Result<[u8; 6]> {
        let parts: Vec<&str> = self.module_id.split(':').collect();
        if parts.len() != 6 {
            eyre::bail!(
                "identity.module_id must have 6 bytes, got {}",
                parts.len()
            );
        }
        let mut out = [0u8; 6];
        for (slot, part) in out.iter_mut().zip(parts) {
            *slot = u8::from_str_radix(part.trim(), 16)
                .map_err(|e| eyre::eyre!("identity.module_id byte {part:?}: {e}"))?;
        }
        Ok(out)
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    pub spi_bus: u8,
    pub spi_clock_hz: u32,
    /// GPIO driving the digipot chip-select.
    pub wiper_cs_pin: u8,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            spi_bus: 0,
            spi_clock_hz: 1_000_000,
            wiper_cs_pin: 25,
        }
    }
}

/// Plant parameters for the simulated backend.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Simulation {
    pub min_supply_mv: u32,
    pub mv_per_tap: u32,
    pub heater_ohms: u32,
    /// Sensing element resistance per sensor.
    pub sensor_ohms: [u32; SENSOR_COUNT],
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            min_supply_mv: 1500,
            mv_per_tap: 8,
            heater_ohms: 60,
            sensor_ohms: [110_000, 412_500],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SensorCfg {
    pub type_name: String,
    pub unit_name: String,
    pub feedback_ohms: u32,
    pub target_power_mw: u32,
    pub supply_adc: u8,
    pub feedback_adc: u8,
    pub sensor_adc: u8,
    pub wiper: u8,
    /// Low-side divider resistors `[r1, r2, r3]`; r2 and r3 are switchable.
    pub divider_ohms: [u32; 3],
    /// Sensor resistance in clean air, the denominator of the curve ratio.
    pub r0_ohms: u32,
    /// Accepts either:
    /// - array of tables: [{ ratio = 0.4, concentration = 41250 }, ...]
    /// - array of tuples: [[0.4, 41250], ...]
    #[serde(default, deserialize_with = "de_curve")]
    pub curve: Vec<CurvePoint>,
    /// Alternative to `curve`; relative paths resolve against the config file.
    #[serde(default)]
    pub curve_csv: Option<PathBuf>,
    /// GPIO enable lines for r2 and r3 (hardware backend only).
    #[serde(default)]
    pub divider_pins: Option<[u8; 2]>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub adc: AdcCfg,
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub sampler: SamplerCfg,
    #[serde(default)]
    pub protocol: ProtocolCfg,
    pub identity: Identity,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub simulation: Simulation,
    #[serde(rename = "sensor")]
    pub sensors: Vec<SensorCfg>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PointToml {
    Tuple((f32, f32)),
    Table { ratio: f32, concentration: f32 },
}

fn de_curve<'de, D>(deserializer: D) -> Result<Vec<CurvePoint>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<Vec<PointToml>> = Option::deserialize(deserializer)?;
    let mut out = Vec::new();
    if let Some(items) = opt {
        for p in items {
            match p {
                PointToml::Tuple((ratio, concentration)) => out.push(CurvePoint {
                    ratio,
                    concentration,
                }),
                PointToml::Table {
                    ratio,
                    concentration,
                } => out.push(CurvePoint {
                    ratio,
                    concentration,
                }),
            }
        }
    }
    Ok(out)
}

/// Check that a curve is usable for interpolation: non-empty, finite and
/// strictly ascending in ratio.
pub fn check_curve(points: &[CurvePoint]) -> eyre::Result<()> {
    if points.is_empty() {
        eyre::bail!("curve requires at least one point");
    }
    for (i, p) in points.iter().enumerate() {
        if !p.ratio.is_finite() || !p.concentration.is_finite() {
            eyre::bail!("curve point {i} is not finite");
        }
        if i > 0 && p.ratio <= points[i - 1].ratio {
            eyre::bail!("curve ratios must be strictly ascending (point {i})");
        }
    }
    Ok(())
}

pub fn load_curve_csv(path: &std::path::Path) -> eyre::Result<Vec<CurvePoint>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open curve CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["ratio", "concentration"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "curve CSV must have headers 'ratio,concentration', got: {}",
            actual.join(",")
        );
    }

    let mut points = Vec::new();
    for (idx, rec) in rdr.deserialize::<CurvePoint>().enumerate() {
        match rec {
            Ok(p) => points.push(p),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    check_curve(&points)?;
    Ok(points)
}

fn check_name(field: &str, name: &str) -> eyre::Result<()> {
    if !name.is_ascii() {
        eyre::bail!("{field} must be ASCII");
    }
    if name.len() > NAME_SLOT_LEN {
        eyre::bail!("{field} must be at most {NAME_SLOT_LEN} bytes");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // ADC
        if self.adc.reference_mv == 0 {
            eyre::bail!("adc.reference_mv must be > 0");
        }
        if self.adc.full_scale < 2 {
            eyre::bail!("adc.full_scale must be >= 2");
        }

        // Control
        if self.control.period_ms == 0 {
            eyre::bail!("control.period_ms must be >= 1");
        }
        if self.control.period_ms > 60 * 1000 {
            eyre::bail!("control.period_ms is unreasonably large (>60s)");
        }
        if self.control.momentum_step == 0 {
            eyre::bail!("control.momentum_step must be >= 1");
        }
        if self.control.momentum_cap == Some(0) {
            eyre::bail!("control.momentum_cap must be >= 1 when set");
        }

        // Sampler
        if self.sampler.settle_ms > 1000 {
            eyre::bail!("sampler.settle_ms is unreasonably large (>1s)");
        }

        // Identity
        self.identity.module_id_bytes()?;

        // Sensors
        if self.sensors.len() != SENSOR_COUNT {
            eyre::bail!(
                "exactly {SENSOR_COUNT} [[sensor]] entries are required, got {}",
                self.sensors.len()
            );
        }
        let mut wipers_seen = [false; SENSOR_COUNT];
        for (i, s) in self.sensors.iter().enumerate() {
            check_name(&format!("sensor[{i}].type_name"), &s.type_name)?;
            check_name(&format!("sensor[{i}].unit_name"), &s.unit_name)?;
            if s.feedback_ohms == 0 {
                eyre::bail!("sensor[{i}].feedback_ohms must be > 0");
            }
            if s.divider_ohms[0] == 0 {
                eyre::bail!("sensor[{i}].divider_ohms[0] must be > 0");
            }
            if s.r0_ohms == 0 {
                eyre::bail!("sensor[{i}].r0_ohms must be > 0");
            }
            let w = usize::from(s.wiper);
            if w >= SENSOR_COUNT {
                eyre::bail!("sensor[{i}].wiper must be 0 or 1");
            }
            if wipers_seen[w] {
                eyre::bail!("sensor[{i}].wiper {w} is already used by another sensor");
            }
            wipers_seen[w] = true;
            match (s.curve.is_empty(), s.curve_csv.is_some()) {
                (true, false) => eyre::bail!("sensor[{i}] needs either curve or curve_csv"),
                (false, true) => eyre::bail!("sensor[{i}] sets both curve and curve_csv"),
                (false, false) => check_curve(&s.curve)
                    .map_err(|e| eyre::eyre!("sensor[{i}].{e}"))?,
                (true, true) => {}
            }
        }

        Ok(())
    }
}

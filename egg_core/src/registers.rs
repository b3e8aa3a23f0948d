//! Address map of the register interface.
//!
//! Decoding is pure arithmetic over the 16-bit address: fixed registers at the
//! bottom, then one heater block and one sensor block per channel.

use std::fmt;

use crate::config::{NAME_SLOT_LEN, SENSOR_COUNT};

pub const SENSOR_COUNT_ADDR: u16 = 0x0000;
pub const MODULE_ID_ADDR: u16 = 0x0001;
pub const DIGIPOT_STATUS_ADDR: u16 = 0x0002;
pub const BUSY_COUNTER_ADDR: u16 = 0x0003;

pub const HEATER_BASE: u16 = 0x0010;
pub const HEATER_BLOCK: u16 = 0x08;
pub const SENSOR_BASE: u16 = 0x0100;
pub const SENSOR_BLOCK: u16 = 0x30;

pub const MODULE_ID_LEN: usize = 6;

/// Heater telemetry, one u32 each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterField {
    SupplyMv,
    FeedbackMv,
    PowerMw,
    WiperPosition,
    Momentum,
}

impl HeaterField {
    pub const ALL: [HeaterField; 5] = [
        HeaterField::SupplyMv,
        HeaterField::FeedbackMv,
        HeaterField::PowerMw,
        HeaterField::WiperPosition,
        HeaterField::Momentum,
    ];

    pub fn offset(self) -> u16 {
        match self {
            HeaterField::SupplyMv => 0,
            HeaterField::FeedbackMv => 1,
            HeaterField::PowerMw => 2,
            HeaterField::WiperPosition => 3,
            HeaterField::Momentum => 4,
        }
    }

    fn name(self) -> &'static str {
        match self {
            HeaterField::SupplyMv => "supply_mv",
            HeaterField::FeedbackMv => "feedback_mv",
            HeaterField::PowerMw => "power_mw",
            HeaterField::WiperPosition => "wiper",
            HeaterField::Momentum => "momentum",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorField {
    TypeName,
    UnitName,
    R0,
    Value,
    /// Dynamic-range code followed by the low-side resistance it was taken with.
    Raw,
}

impl SensorField {
    pub const ALL: [SensorField; 5] = [
        SensorField::TypeName,
        SensorField::UnitName,
        SensorField::R0,
        SensorField::Value,
        SensorField::Raw,
    ];

    pub fn offset(self) -> u16 {
        match self {
            SensorField::TypeName => 0x00,
            SensorField::UnitName => 0x10,
            SensorField::R0 => 0x20,
            SensorField::Value => 0x24,
            SensorField::Raw => 0x28,
        }
    }

    fn name(self) -> &'static str {
        match self {
            SensorField::TypeName => "type",
            SensorField::UnitName => "unit",
            SensorField::R0 => "r0_ohms",
            SensorField::Value => "value",
            SensorField::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    SensorCount,
    ModuleId,
    DigipotStatus,
    BusyCounter,
    Heater { channel: usize, field: HeaterField },
    Sensor { index: usize, field: SensorField },
    Unknown,
}

/// Split `addr` into `(block index, offset)` if it falls inside one of the
/// `SENSOR_COUNT` blocks starting at `base`.
fn locate(addr: u16, base: u16, block: u16) -> Option<(usize, u16)> {
    let rel = addr.checked_sub(base)?;
    let index = usize::from(rel / block);
    (index < SENSOR_COUNT).then_some((index, rel % block))
}

impl Register {
    pub fn decode(addr: u16) -> Self {
        match addr {
            SENSOR_COUNT_ADDR => return Register::SensorCount,
            MODULE_ID_ADDR => return Register::ModuleId,
            DIGIPOT_STATUS_ADDR => return Register::DigipotStatus,
            BUSY_COUNTER_ADDR => return Register::BusyCounter,
            _ => {}
        }
        if let Some((channel, offset)) = locate(addr, HEATER_BASE, HEATER_BLOCK)
            && let Some(field) = HeaterField::ALL.into_iter().find(|f| f.offset() == offset)
        {
            return Register::Heater { channel, field };
        }
        if let Some((index, offset)) = locate(addr, SENSOR_BASE, SENSOR_BLOCK)
            && let Some(field) = SensorField::ALL.into_iter().find(|f| f.offset() == offset)
        {
            return Register::Sensor { index, field };
        }
        Register::Unknown
    }

    /// Address that decodes to this register; `None` for `Unknown`.
    pub fn address(self) -> Option<u16> {
        match self {
            Register::SensorCount => Some(SENSOR_COUNT_ADDR),
            Register::ModuleId => Some(MODULE_ID_ADDR),
            Register::DigipotStatus => Some(DIGIPOT_STATUS_ADDR),
            Register::BusyCounter => Some(BUSY_COUNTER_ADDR),
            Register::Heater { channel, field } => block_address(HEATER_BASE, HEATER_BLOCK, channel)
                .map(|base| base + field.offset()),
            Register::Sensor { index, field } => block_address(SENSOR_BASE, SENSOR_BLOCK, index)
                .map(|base| base + field.offset()),
            Register::Unknown => None,
        }
    }

    /// Length in bytes of the read response.
    pub fn width(self) -> usize {
        match self {
            Register::SensorCount => 1,
            Register::ModuleId => MODULE_ID_LEN,
            Register::Sensor {
                field: SensorField::TypeName | SensorField::UnitName,
                ..
            } => NAME_SLOT_LEN,
            Register::Sensor {
                field: SensorField::Raw,
                ..
            } => 8,
            _ => 4,
        }
    }

    /// Every defined register, in address order.
    pub fn all() -> Vec<Register> {
        let mut out = vec![
            Register::SensorCount,
            Register::ModuleId,
            Register::DigipotStatus,
            Register::BusyCounter,
        ];
        for channel in 0..SENSOR_COUNT {
            out.extend(
                HeaterField::ALL
                    .into_iter()
                    .map(|field| Register::Heater { channel, field }),
            );
        }
        for index in 0..SENSOR_COUNT {
            out.extend(
                SensorField::ALL
                    .into_iter()
                    .map(|field| Register::Sensor { index, field }),
            );
        }
        out
    }
}

fn block_address(base: u16, block: u16, index: usize) -> Option<u16> {
    if index >= SENSOR_COUNT {
        return None;
    }
    let index = u16::try_from(index).ok()?;
    base.checked_add(index.checked_mul(block)?)
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::SensorCount => f.write_str("sensor_count"),
            Register::ModuleId => f.write_str("module_id"),
            Register::DigipotStatus => f.write_str("digipot_status"),
            Register::BusyCounter => f.write_str("busy_counter"),
            Register::Heater { channel, field } => write!(f, "heater[{channel}].{}", field.name()),
            Register::Sensor { index, field } => write!(f, "sensor[{index}].{}", field.name()),
            Register::Unknown => f.write_str("unknown"),
        }
    }
}

/// Fixed-width, NUL-padded name field; longer names are truncated.
pub fn name_slot(name: &str) -> [u8; NAME_SLOT_LEN] {
    let mut slot = [0u8; NAME_SLOT_LEN];
    let bytes = name.as_bytes();
    let n = bytes.len().min(NAME_SLOT_LEN);
    slot[..n].copy_from_slice(&bytes[..n]);
    slot
}

#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core logic of the gas-sensor board (hardware-agnostic).
//!
//! All hardware interactions go through the `egg_traits` traits
//! (`AnalogInput`, `WiperLink`, `DividerSwitch`, `Clock`).
//!
//! ## Architecture
//!
//! - **Board**: context object owning the shared peripherals behind
//!   `Exclusive` guards and the per-channel regulator state (`board`, `builder`)
//! - **Heater regulation**: power sampling and momentum-damped digipot
//!   stepping (`power`, `heater`, `actuator`)
//! - **Sensor readout**: dynamic-range divider sweep and curve lookup
//!   (`dynamic_range`, `interpolation`)
//! - **Register protocol**: address map, dispatcher and the bus thread
//!   (`registers`, `protocol`, `bus`)
//!
//! ## Concurrency
//!
//! The foreground loop blocks on shared resources. Bus handlers poll them for
//! at most `ProtocolCfg::stretch_budget_ms` and answer zeros when they stay
//! busy.

pub mod actuator;
pub mod board;
pub mod builder;
pub mod bus;
pub mod config;
pub mod conversions;
pub mod dynamic_range;
pub mod error;
pub mod heater;
pub mod hw_error;
pub mod interpolation;
pub mod mocks;
pub mod power;
pub mod protocol;
pub mod registers;
pub mod resource;
pub mod runner;

pub use board::Board;
pub use builder::{BoardBuilder, Missing, Set};
pub use bus::{BusMaster, BusSlave};
pub use config::{AdcCfg, ControlCfg, ProtocolCfg, SENSOR_COUNT, SamplerCfg, SensorChannel};
pub use heater::{Direction, HeaterController, HeaterRuntimeState};
pub use protocol::ProtocolDispatcher;
pub use registers::Register;
pub use resource::Access;

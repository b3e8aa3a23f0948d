//! Register protocol: a bus write latches a read target, a bus read
//! resolves it against live board state.
//!
//! Nothing here fails on the wire. Unknown addresses answer four zero bytes;
//! a register whose resource stays busy past the stretch budget answers zeros
//! of its own width and bumps the busy counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{debug, trace, warn};

use crate::board::Board;
use crate::config::SENSOR_COUNT;
use crate::dynamic_range::sample_raw;
use crate::error::{EggError, Result};
use crate::interpolation::computed_value;
use crate::registers::{HeaterField, Register, SensorField, name_slot};
use crate::resource::Access;

pub const CMD_READ: u8 = 0x01;
pub const CMD_WRITE: u8 = 0x02;

/// Read target latched by the last well-formed `READ` write.
///
/// Command kind and address share one atomic word, so a reader never sees
/// half of an update.
#[derive(Debug, Default)]
pub struct PendingRead(AtomicU32);

impl PendingRead {
    pub fn latch(&self, addr: u16) {
        let word = (u32::from(CMD_READ) << 16) | u32::from(addr);
        self.0.store(word, Ordering::Release);
    }

    /// Latched address, or `None` before the first `READ`.
    pub fn get(&self) -> Option<u16> {
        let word = self.0.load(Ordering::Acquire);
        (word >> 16 == u32::from(CMD_READ)).then_some((word & 0xFFFF) as u16)
    }
}

#[derive(Debug)]
pub struct ProtocolDispatcher {
    board: Arc<Board>,
    pending: PendingRead,
    busy: AtomicU32,
}

impl ProtocolDispatcher {
    pub fn new(board: Arc<Board>) -> Self {
        Self {
            board,
            pending: PendingRead::default(),
            busy: AtomicU32::new(0),
        }
    }

    pub fn board(&self) -> &Arc<Board> {
        &self.board
    }

    pub fn pending(&self) -> Option<u16> {
        self.pending.get()
    }

    /// Reads answered with zeros because a resource stayed busy.
    pub fn busy_count(&self) -> u32 {
        self.busy.load(Ordering::Relaxed)
    }

    /// Handle a master write transaction.
    pub fn on_write(&self, bytes: &[u8]) {
        match bytes {
            [CMD_READ, hi, lo, ..] => {
                let addr = u16::from_be_bytes([*hi, *lo]);
                self.pending.latch(addr);
                trace!(addr, "read target latched");
            }
            [CMD_WRITE, ..] => debug!(len = bytes.len(), "write command ignored"),
            _ => warn!(?bytes, "malformed bus write ignored"),
        }
    }

    /// Handle a master read transaction.
    pub fn on_read(&self) -> Vec<u8> {
        let register = self
            .pending
            .get()
            .map_or(Register::Unknown, Register::decode);
        match self.read_register(register) {
            Ok(bytes) => bytes,
            Err(err) => {
                if matches!(err.downcast_ref::<EggError>(), Some(EggError::Busy(_))) {
                    self.busy.fetch_add(1, Ordering::Relaxed);
                }
                warn!(%register, error = %err, "register read failed, answering zeros");
                vec![0; register.width()]
            }
        }
    }

    /// Encode one register from live state, in bus context.
    pub fn read_register(&self, register: Register) -> Result<Vec<u8>> {
        let board = &*self.board;
        let bytes = match register {
            Register::SensorCount => vec![u8::try_from(SENSOR_COUNT).unwrap_or(u8::MAX)],
            Register::ModuleId => board.module_id().to_vec(),
            Register::DigipotStatus => {
                let status = board.actuator(Access::Bus)?.read_status()?;
                be(u32::from(status))
            }
            Register::BusyCounter => be(self.busy_count()),
            Register::Heater { channel, field } => be(self.heater_field(channel, field)?),
            Register::Sensor { index, field } => self.sensor_field(index, field)?,
            Register::Unknown => vec![0; register.width()],
        };
        Ok(bytes)
    }

    fn heater_field(&self, ch: usize, field: HeaterField) -> Result<u32> {
        let board = &*self.board;
        let st = board.snapshot(ch)?;
        Ok(match field {
            HeaterField::SupplyMv => st.supply_mv,
            HeaterField::FeedbackMv => st.feedback_mv,
            HeaterField::PowerMw => st.power_mw,
            HeaterField::Momentum => st.momentum,
            HeaterField::WiperPosition => {
                let wiper = board.channel(ch)?.wiper;
                u32::from(board.actuator(Access::Bus)?.read_wiper(wiper)?)
            }
        })
    }

    fn sensor_field(&self, index: usize, field: SensorField) -> Result<Vec<u8>> {
        let board = &*self.board;
        let channel = board.channel(index)?;
        Ok(match field {
            SensorField::TypeName => name_slot(&channel.type_name).to_vec(),
            SensorField::UnitName => name_slot(&channel.unit_name).to_vec(),
            SensorField::R0 => be(channel.r0_ohms),
            SensorField::Value => {
                let sample = sample_raw(board, index, Access::Bus)?;
                be(computed_value(channel, sample, board.adc_cfg().full_scale))
            }
            SensorField::Raw => {
                let sample = sample_raw(board, index, Access::Bus)?;
                let mut out = be(u32::from(sample.code));
                out.extend_from_slice(&sample.low_ohms.to_be_bytes());
                out
            }
        })
    }
}

fn be(value: u32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

//! Closed-loop heater power regulation with momentum.
//!
//! Each tick compares measured power with the channel target and nudges the
//! digipot one way or the other. While the correction keeps pointing the same
//! way, the step size grows by `momentum_step`; any change or neutral tick
//! drops it back to a single tap.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use eyre::WrapErr;
use tracing::debug;

use crate::board::Board;
use crate::config::{ControlCfg, SENSOR_COUNT};
use crate::error::Result;
use crate::power::{self, PowerReading};
use crate::resource::Access;

/// Which way the heater supply should move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    /// Too much power: step the wiper down.
    Lower,
    #[default]
    Hold,
    /// Too little power: step the wiper up.
    Raise,
}

impl Direction {
    pub fn sign(self) -> i8 {
        match self {
            Direction::Lower => -1,
            Direction::Hold => 0,
            Direction::Raise => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Hold => f.write_str("0"),
            other => write!(f, "{:+}", other.sign()),
        }
    }
}

/// Pick a direction for one reading.
///
/// No voltage across the heater means no current information, so the tick is
/// neutral whatever the target.
pub fn decide(reading: &PowerReading, target_mw: u32) -> Direction {
    if reading.supply_mv <= reading.feedback_mv {
        return Direction::Hold;
    }
    match reading.power_mw.cmp(&target_mw) {
        Ordering::Greater => Direction::Lower,
        Ordering::Less => Direction::Raise,
        Ordering::Equal => Direction::Hold,
    }
}

/// Momentum for this tick given the previous one.
pub fn next_momentum(momentum: u32, last: Direction, now: Direction, cfg: &ControlCfg) -> u32 {
    if now != Direction::Hold && now == last {
        let grown = momentum.saturating_add(cfg.momentum_step);
        cfg.momentum_cap.map_or(grown, |cap| grown.min(cap))
    } else {
        1
    }
}

/// Per-channel regulator memory. Only the controller writes it; the
/// dispatcher reads copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaterRuntimeState {
    pub momentum: u32,
    /// Last non-neutral direction.
    pub last_direction: Direction,
    pub supply_mv: u32,
    pub feedback_mv: u32,
    pub power_mw: u32,
    pub ticks: u64,
}

impl Default for HeaterRuntimeState {
    fn default() -> Self {
        Self {
            momentum: 1,
            last_direction: Direction::Hold,
            supply_mv: 0,
            feedback_mv: 0,
            power_mw: 0,
            ticks: 0,
        }
    }
}

impl HeaterRuntimeState {
    /// Fold one tick into the state and return the step count to apply.
    pub fn record(
        &mut self,
        reading: &PowerReading,
        direction: Direction,
        cfg: &ControlCfg,
    ) -> u32 {
        self.momentum = next_momentum(self.momentum, self.last_direction, direction, cfg);
        if direction != Direction::Hold {
            self.last_direction = direction;
        }
        self.supply_mv = reading.supply_mv;
        self.feedback_mv = reading.feedback_mv;
        self.power_mw = reading.power_mw;
        self.ticks += 1;
        self.momentum
    }
}

/// Drives every heater channel of a board.
#[derive(Debug, Clone)]
pub struct HeaterController {
    board: Arc<Board>,
}

impl HeaterController {
    pub fn new(board: Arc<Board>) -> Self {
        Self { board }
    }

    pub fn board(&self) -> &Arc<Board> {
        &self.board
    }

    /// One regulation tick for channel `ch`.
    pub fn regulate(&self, ch: usize) -> Result<Direction> {
        let channel = self.board.channel(ch)?;
        let reading = power::sample(&self.board, channel, Access::Foreground)
            .wrap_err_with(|| format!("heater {ch}"))?;
        let direction = decide(&reading, channel.target_power_mw);
        let control = *self.board.control();
        let momentum = self
            .board
            .update_runtime(ch, |st| st.record(&reading, direction, &control))?;

        match direction {
            Direction::Raise => self
                .board
                .actuator(Access::Foreground)?
                .increment(channel.wiper, momentum)?,
            Direction::Lower => self
                .board
                .actuator(Access::Foreground)?
                .decrement(channel.wiper, momentum)?,
            Direction::Hold => {}
        }

        debug!(
            channel = ch,
            supply_mv = reading.supply_mv,
            feedback_mv = reading.feedback_mv,
            power_mw = reading.power_mw,
            target_mw = channel.target_power_mw,
            direction = %direction,
            momentum,
            "heater tick"
        );
        Ok(direction)
    }

    /// Regulate all channels in order, one after the other.
    pub fn pass(&self) -> Result<[Direction; SENSOR_COUNT]> {
        let mut out = [Direction::Hold; SENSOR_COUNT];
        for (ch, slot) in out.iter_mut().enumerate() {
            *slot = self.regulate(ch)?;
        }
        Ok(out)
    }
}

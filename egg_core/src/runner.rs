use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use tracing::info;

use crate::board::Board;
use crate::error::Result;
use crate::heater::{Direction, HeaterController};

/// Longest single sleep between shutdown checks.
const SHUTDOWN_SLICE: Duration = Duration::from_millis(100);

/// Per-channel state after a run, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReport {
    pub channel: usize,
    pub type_name: String,
    pub supply_mv: u32,
    pub feedback_mv: u32,
    pub power_mw: u32,
    pub target_mw: u32,
    pub momentum: u32,
    pub last_direction: Direction,
    pub ticks: u64,
}

/// Run regulation passes every `control.period_ms` until `ticks` passes are
/// done (if given) or `shutdown` is raised. Returns the number of passes.
pub fn run(
    controller: &HeaterController,
    ticks: Option<u64>,
    shutdown: &AtomicBool,
) -> Result<u64> {
    let board = controller.board();
    let period = board.control().period();
    info!(period_ms = board.control().period_ms, ?ticks, "control loop started");

    let mut passes = 0u64;
    while !shutdown.load(Ordering::Relaxed) && ticks.is_none_or(|n| passes < n) {
        controller
            .pass()
            .wrap_err_with(|| format!("regulation pass {passes}"))?;
        passes += 1;
        if ticks.is_some_and(|n| passes >= n) {
            break;
        }
        sleep_unless_shutdown(board, period, shutdown);
    }

    info!(passes, "control loop stopped");
    Ok(passes)
}

fn sleep_unless_shutdown(board: &Board, period: Duration, shutdown: &AtomicBool) {
    let clock = board.clock();
    let start = clock.now();
    loop {
        let left = clock.remaining(start, period);
        if left.is_zero() || shutdown.load(Ordering::Relaxed) {
            return;
        }
        clock.sleep(left.min(SHUTDOWN_SLICE));
    }
}

/// Snapshot every channel for a final summary.
pub fn summarize(board: &Board) -> Result<Vec<ChannelReport>> {
    board
        .channels()
        .iter()
        .enumerate()
        .map(|(channel, cfg)| {
            let st = board.snapshot(channel)?;
            Ok(ChannelReport {
                channel,
                type_name: cfg.type_name.clone(),
                supply_mv: st.supply_mv,
                feedback_mv: st.feedback_mv,
                power_mw: st.power_mw,
                target_mw: cfg.target_power_mw,
                momentum: st.momentum,
                last_direction: st.last_direction,
                ticks: st.ticks,
            })
        })
        .collect()
}

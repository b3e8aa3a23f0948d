//! Test and helper mocks for egg_core.
//!
//! Each mock is a cheap handle over shared state, so a test can keep a clone
//! to script inputs or inspect what the board did after moving the original
//! into the builder.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use egg_traits::{AnalogInput, DividerSwitch, HwResult, WiperLink};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct AdcScript {
    queued: BTreeMap<u8, VecDeque<u16>>,
    fixed: BTreeMap<u8, u16>,
    reads: u64,
}

/// ADC that answers from per-channel scripts, then from fixed values.
/// Unscripted channels fail.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAdc {
    state: Arc<Mutex<AdcScript>>,
}

impl ScriptedAdc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `code` on `channel` until changed.
    pub fn set(&self, channel: u8, code: u16) -> &Self {
        lock(&self.state).fixed.insert(channel, code);
        self
    }

    /// Answer `codes` in order on `channel`, before any fixed value.
    pub fn queue(&self, channel: u8, codes: impl IntoIterator<Item = u16>) -> &Self {
        lock(&self.state)
            .queued
            .entry(channel)
            .or_default()
            .extend(codes);
        self
    }

    pub fn reads(&self) -> u64 {
        lock(&self.state).reads
    }
}

impl AnalogInput for ScriptedAdc {
    fn read(&mut self, channel: u8) -> HwResult<u16> {
        let mut st = lock(&self.state);
        st.reads += 1;
        if let Some(code) = st.queued.get_mut(&channel).and_then(VecDeque::pop_front) {
            return Ok(code);
        }
        st.fixed
            .get(&channel)
            .copied()
            .ok_or_else(|| format!("adc channel {channel} not scripted").into())
    }
}

#[derive(Debug, Default)]
struct LinkLog {
    selected: bool,
    selects: usize,
    /// Bytes sent, one entry per chip-select window.
    windows: Vec<Vec<u8>>,
    registers: BTreeMap<u8, u16>,
    fail_transfers: bool,
}

/// Wiper link that records every command and answers reads from a register table.
#[derive(Debug, Clone, Default)]
pub struct RecordingLink {
    log: Arc<Mutex<LinkLog>>,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value returned by a read command for device `address`.
    pub fn set_register(&self, address: u8, value: u16) -> &Self {
        lock(&self.log).registers.insert(address, value);
        self
    }

    pub fn fail_transfers(&self, fail: bool) {
        lock(&self.log).fail_transfers = fail;
    }

    /// Bytes sent in each chip-select window, oldest first.
    pub fn windows(&self) -> Vec<Vec<u8>> {
        lock(&self.log).windows.clone()
    }

    pub fn is_selected(&self) -> bool {
        lock(&self.log).selected
    }

    pub fn selects(&self) -> usize {
        lock(&self.log).selects
    }
}

impl WiperLink for RecordingLink {
    fn select(&mut self) -> HwResult<()> {
        let mut log = lock(&self.log);
        if log.selected {
            return Err("select while already selected".into());
        }
        log.selected = true;
        log.selects += 1;
        log.windows.push(Vec::new());
        Ok(())
    }

    fn deselect(&mut self) {
        lock(&self.log).selected = false;
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> HwResult<()> {
        let mut log = lock(&self.log);
        if !log.selected {
            return Err("transfer without select".into());
        }
        if log.fail_transfers {
            return Err(Box::new(std::io::Error::other("link fault")));
        }
        if let Some(window) = log.windows.last_mut() {
            window.extend_from_slice(tx);
        }
        if let [cmd, ..] = tx
            && cmd & 0x0C == 0x0C
        {
            let value = log.registers.get(&(cmd >> 4)).copied().unwrap_or(0);
            if let [hi, lo, ..] = rx {
                *hi = ((value >> 8) & 0x01) as u8;
                *lo = (value & 0xFF) as u8;
            }
        }
        Ok(())
    }
}

/// Divider switch that records each configuration it is given.
#[derive(Debug, Clone, Default)]
pub struct RecordingDivider {
    log: Arc<Mutex<Vec<(usize, bool, bool)>>>,
}

impl RecordingDivider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configurations(&self) -> Vec<(usize, bool, bool)> {
        lock(&self.log).clone()
    }
}

impl DividerSwitch for RecordingDivider {
    fn configure(&mut self, sensor: usize, r2_enabled: bool, r3_enabled: bool) -> HwResult<()> {
        lock(&self.log).push((sensor, r2_enabled, r3_enabled));
        Ok(())
    }
}

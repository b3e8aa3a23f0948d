//! In-process model of the slave bus.
//!
//! A `BusSlave` owns a thread that feeds master transactions to the
//! `ProtocolDispatcher` one at a time, the way the bus peripheral raises one
//! event per transaction. `BusMaster` handles submit those transactions over
//! a bounded channel.
//!
//! Safety: each `BusSlave` spawns exactly one thread that is shut down and
//! joined when the `BusSlave` is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;

use crate::error::{EggError, Result};
use crate::protocol::{CMD_READ, ProtocolDispatcher};

const QUEUE_DEPTH: usize = 8;
const SHUTDOWN_POLL: Duration = Duration::from_millis(20);

/// One master transaction.
#[derive(Debug)]
pub enum BusEvent {
    Write(Vec<u8>),
    /// Read request; the response goes back on the enclosed channel.
    Read(xch::Sender<Vec<u8>>),
}

pub struct BusSlave {
    tx: Option<xch::Sender<BusEvent>>,
    dispatcher: Arc<ProtocolDispatcher>,
    /// Shutdown flag for immediate response (atomic for lock-free check)
    shutdown: Arc<AtomicBool>,
    /// Join handle for graceful thread cleanup
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl BusSlave {
    pub fn spawn(dispatcher: Arc<ProtocolDispatcher>) -> Self {
        let (tx, rx) = xch::bounded::<BusEvent>(QUEUE_DEPTH);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let handler = dispatcher.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("bus thread received shutdown signal");
                    break;
                }

                match rx.recv_timeout(SHUTDOWN_POLL) {
                    Ok(BusEvent::Write(bytes)) => handler.on_write(&bytes),
                    Ok(BusEvent::Read(reply)) => {
                        // Master gave up waiting; nothing to deliver
                        let _ = reply.send(handler.on_read());
                    }
                    Err(xch::RecvTimeoutError::Timeout) => {}
                    Err(xch::RecvTimeoutError::Disconnected) => {
                        tracing::debug!("all bus masters disconnected, exiting thread");
                        break;
                    }
                }
            }
            tracing::trace!("bus thread exiting cleanly");
        });

        Self {
            tx: Some(tx),
            dispatcher,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// A new handle for issuing transactions.
    pub fn master(&self) -> Result<BusMaster> {
        let tx = self.tx.clone().ok_or_else(stopped)?;
        Ok(BusMaster { tx })
    }

    pub fn dispatcher(&self) -> &Arc<ProtocolDispatcher> {
        &self.dispatcher
    }
}

impl Drop for BusSlave {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.tx.take();

        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("bus thread joined successfully");
                }
                Err(e) => {
                    // Thread panicked; log but don't propagate (we're in Drop)
                    tracing::warn!(?e, "bus thread panicked during shutdown");
                }
            }
        }
    }
}

fn stopped() -> eyre::Report {
    eyre::Report::new(EggError::Hardware("bus slave stopped".into()))
}

/// Master side of the bus. The bus has a single master: a `transact` from one
/// handle is not atomic against writes from a clone.
#[derive(Debug, Clone)]
pub struct BusMaster {
    tx: xch::Sender<BusEvent>,
}

impl BusMaster {
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        self.tx
            .send(BusEvent::Write(bytes.to_vec()))
            .map_err(|_| stopped())
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        let (reply_tx, reply_rx) = xch::bounded(1);
        self.tx
            .send(BusEvent::Read(reply_tx))
            .map_err(|_| stopped())?;
        reply_rx.recv().map_err(|_| stopped())
    }

    /// `READ` write for `addr` followed by a read.
    pub fn transact(&self, addr: u16) -> Result<Vec<u8>> {
        let [hi, lo] = addr.to_be_bytes();
        self.write(&[CMD_READ, hi, lo])?;
        self.read()
    }
}

//! Bus thread lifecycle: transactions are served in order and the thread
//! is joined when the slave is dropped.

mod common;

use std::sync::Arc;

use common::rig;
use egg_core::bus::BusSlave;
use egg_core::protocol::{CMD_READ, CMD_WRITE, ProtocolDispatcher};

#[test]
fn transact_reads_a_register() {
    let rig = rig();
    let slave = BusSlave::spawn(Arc::new(ProtocolDispatcher::new(rig.board.clone())));
    let master = slave.master().unwrap();

    assert_eq!(master.transact(0x0000).unwrap(), vec![2]);
    assert_eq!(master.transact(0x0001).unwrap().len(), 6);
}

#[test]
fn write_then_read_keeps_the_latched_target() {
    let rig = rig();
    let slave = BusSlave::spawn(Arc::new(ProtocolDispatcher::new(rig.board.clone())));
    let master = slave.master().unwrap();

    master.write(&[CMD_READ, 0x01, 0x20]).unwrap();
    let first = master.read().unwrap();
    master.write(&[CMD_WRITE, 0x00, 0x00]).unwrap();
    assert_eq!(master.read().unwrap(), first);
    assert_eq!(slave.dispatcher().pending(), Some(0x0120));
}

#[test]
fn master_errors_after_slave_is_dropped() {
    let rig = rig();
    let slave = BusSlave::spawn(Arc::new(ProtocolDispatcher::new(rig.board.clone())));
    let master = slave.master().unwrap();

    drop(slave);

    assert!(master.write(&[CMD_READ, 0, 0]).is_err());
    assert!(master.read().is_err());
}

#[test]
fn multiple_slaves_dont_leak_threads() {
    let rig = rig();
    let dispatcher = Arc::new(ProtocolDispatcher::new(rig.board.clone()));
    for _ in 0..10 {
        let slave = BusSlave::spawn(dispatcher.clone());
        let master = slave.master().unwrap();
        assert_eq!(master.transact(0x0000).unwrap(), vec![2]);
        drop(master);
        drop(slave);
    }
    // every thread released its handle on the dispatcher
    assert_eq!(Arc::strong_count(&dispatcher), 1);
}

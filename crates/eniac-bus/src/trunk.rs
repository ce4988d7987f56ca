//! Data-trunk tables: the patchable interconnect between computing units
//!
//! Two trunk families exist: tray-wide trunks (one per tray) and per-line
//! trunks (eleven per tray). A trunk comes into being on its first plug and
//! is served by its own task, which fans every transmitted pulse out to all
//! subscribed receivers with the full ack discipline.

use std::thread;

use crossbeam_channel::{unbounded, Receiver, Select, Sender};
use eniac_core::prelude::*;

use crate::fanout;

/// Number of trays on the machine.
pub const TRAYS: usize = 40;

/// Digit lines per tray.
pub const LINES_PER_TRAY: usize = 11;

/// Trunk families: whole trays and single lines within a tray.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrunkClass {
    Tray,
    Line,
}

impl TrunkClass {
    fn table_len(self) -> usize {
        match self {
            TrunkClass::Tray => TRAYS,
            TrunkClass::Line => TRAYS * LINES_PER_TRAY,
        }
    }
}

enum TrunkCtl {
    /// Register a transmitter: the trunk pulls pulses from this receiver.
    Transmit(Receiver<Pulse>),
    /// Register a receiver: the trunk pushes pulses into this sender.
    Receive(Sender<Pulse>),
}

struct TrunkPort {
    ctl: Sender<TrunkCtl>,
}

/// The two global trunk tables, one endpoint per trunk index.
pub struct TrunkTable {
    trays: Vec<Option<TrunkPort>>,
    lines: Vec<Option<TrunkPort>>,
}

impl TrunkTable {
    pub fn new() -> Self {
        Self {
            trays: (0..TRAYS).map(|_| None).collect(),
            lines: (0..TRAYS * LINES_PER_TRAY).map(|_| None).collect(),
        }
    }

    /// Register the wire's receiving half as a pulse source for the trunk.
    pub fn transmit(&mut self, class: TrunkClass, index: usize, rx: Receiver<Pulse>) {
        let port = self.port(class, index);
        let _ = port.ctl.send(TrunkCtl::Transmit(rx));
    }

    /// Register the wire's sending half as a subscriber of the trunk.
    pub fn receive(&mut self, class: TrunkClass, index: usize, tx: Sender<Pulse>) {
        let port = self.port(class, index);
        let _ = port.ctl.send(TrunkCtl::Receive(tx));
    }

    /// Disconnect every trunk. Dropping the ports ends the serving tasks.
    pub fn reset(&mut self) {
        for port in self.trays.iter_mut().chain(self.lines.iter_mut()) {
            *port = None;
        }
        tracing::debug!("trunk tables cleared");
    }

    fn port(&mut self, class: TrunkClass, index: usize) -> &TrunkPort {
        assert!(
            index < class.table_len(),
            "trunk index out of range: {class:?} {index}"
        );
        let table = match class {
            TrunkClass::Tray => &mut self.trays,
            TrunkClass::Line => &mut self.lines,
        };
        table[index].get_or_insert_with(|| {
            let (ctl_tx, ctl_rx) = unbounded();
            thread::spawn(move || serve(ctl_rx));
            TrunkPort { ctl: ctl_tx }
        })
    }
}

impl Default for TrunkTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Serve one trunk: pull from any registered transmitter, deliver to every
/// registered receiver, then ack the transmitter. Ends when the table drops
/// the port.
fn serve(ctl: Receiver<TrunkCtl>) {
    let mut ins: Vec<Receiver<Pulse>> = Vec::new();
    let mut outs: Vec<Sender<Pulse>> = Vec::new();
    loop {
        enum Ev {
            Ctl(Option<TrunkCtl>),
            In(usize, Option<Pulse>),
        }
        let ev = {
            let mut sel = Select::new();
            sel.recv(&ctl);
            for rx in &ins {
                sel.recv(rx);
            }
            let oper = sel.select();
            match oper.index() {
                0 => Ev::Ctl(oper.recv(&ctl).ok()),
                k => Ev::In(k - 1, oper.recv(&ins[k - 1]).ok()),
            }
        };
        match ev {
            Ev::Ctl(Some(TrunkCtl::Transmit(rx))) => ins.push(rx),
            Ev::Ctl(Some(TrunkCtl::Receive(tx))) => outs.push(tx),
            Ev::Ctl(None) => return,
            Ev::In(_, Some(p)) => {
                fanout::deliver(&outs, p.code);
                p.ack();
            }
            Ev::In(i, None) => {
                ins.swap_remove(i);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn sink(rx: Receiver<Pulse>) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        thread::spawn(move || {
            for p in rx.iter() {
                counter.fetch_add(1, Ordering::SeqCst);
                p.ack();
            }
        });
        hits
    }

    #[test]
    fn test_line_trunk_delivery() {
        let mut table = TrunkTable::new();
        let feed = wire();
        let out = wire();
        // tray 1 line 1 in the logical indexing
        table.transmit(TrunkClass::Line, 0, feed.rx.clone());
        let hits = sink(out.rx.clone());
        table.receive(TrunkClass::Line, 0, out.tx.clone());

        assert!(send_pulse(&feed.tx, PulseCode::ONEP));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tray_trunk_multi_reader() {
        let mut table = TrunkTable::new();
        let feed = wire();
        table.transmit(TrunkClass::Tray, 7, feed.rx.clone());
        let out1 = wire();
        let out2 = wire();
        let hits1 = sink(out1.rx.clone());
        let hits2 = sink(out2.rx.clone());
        table.receive(TrunkClass::Tray, 7, out1.tx.clone());
        table.receive(TrunkClass::Tray, 7, out2.tx.clone());

        assert!(send_pulse(&feed.tx, PulseCode::NINEP));
        assert_eq!(hits1.load(Ordering::SeqCst), 1);
        assert_eq!(hits2.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_multi_writer() {
        let mut table = TrunkTable::new();
        let feed1 = wire();
        let feed2 = wire();
        table.transmit(TrunkClass::Line, 12, feed1.rx.clone());
        table.transmit(TrunkClass::Line, 12, feed2.rx.clone());
        let out = wire();
        let hits = sink(out.rx.clone());
        table.receive(TrunkClass::Line, 12, out.tx.clone());

        assert!(send_pulse(&feed1.tx, PulseCode::ONEP));
        assert!(send_pulse(&feed2.tx, PulseCode::TWOP));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_families_are_independent() {
        let mut table = TrunkTable::new();
        let feed = wire();
        table.transmit(TrunkClass::Tray, 0, feed.rx.clone());
        let out = wire();
        let hits = sink(out.rx.clone());
        // Same numeric index, other family: must not be connected.
        table.receive(TrunkClass::Line, 0, out.tx.clone());

        // Nothing subscribes to tray 0, so the trunk acks and drops it.
        assert!(send_pulse(&feed.tx, PulseCode::ONEP));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reset_disconnects() {
        let mut table = TrunkTable::new();
        let feed = wire();
        let feed_tx = feed.tx.clone();
        let out = wire();
        // The trunk must end up the only holder of the feeding half, so
        // that reset actually disconnects the wire.
        table.transmit(TrunkClass::Line, 3, feed.rx.clone());
        drop(feed);
        let hits = sink(out.rx.clone());
        table.receive(TrunkClass::Line, 3, out.tx.clone());
        assert!(send_pulse(&feed_tx, PulseCode::ONEP));

        table.reset();
        // The serving task exits once the port drops; from then on a send
        // finds no trunk behind the wire. The task may race one last pulse
        // through while it notices, so only the terminal state is asserted.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while send_pulse(&feed_tx, PulseCode::ONEP) {
            assert!(std::time::Instant::now() < deadline, "trunk survived reset");
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!send_pulse(&feed_tx, PulseCode::ONEP));
        assert!(hits.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    #[should_panic(expected = "trunk index out of range")]
    fn test_index_out_of_range_is_fatal() {
        let mut table = TrunkTable::new();
        let w = wire();
        table.transmit(TrunkClass::Tray, TRAYS, w.rx);
    }
}

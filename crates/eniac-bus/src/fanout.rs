//! Pulse fanout: duplicate one bus onto N subscribers with full ack collection
//!
//! The fanout is the reliable-broadcast primitive of the fabric. For each
//! input pulse it delivers to every subscriber and collects every ack
//! before acking the input, so the producer's happens-before extends across
//! all downstreams.

use std::thread;

use crossbeam_channel::{Receiver, Select, Sender};
use eniac_core::prelude::*;
use smallvec::SmallVec;

/// Deliver `code` to every subscriber and collect every ack.
///
/// While some subscribers still owe acks, delivery is a selection between
/// "offer to the next subscriber" and "take an ack from one already
/// offered": a subscriber may legally re-drive shared wiring before acking,
/// and that traffic must be able to drain while offers are still pending.
/// Empty codes deliver nothing. A disconnected subscriber cannot owe an ack.
pub fn deliver(outs: &[Sender<Pulse>], code: PulseCode) {
    if code.is_empty() || outs.is_empty() {
        return;
    }
    let (ack, ack_rx) = ack_pair();
    let mut owed = 0usize;
    let mut gone = 0usize;
    for out in outs {
        loop {
            let mut sel = Select::new();
            let send_op = sel.send(out);
            sel.recv(&ack_rx);
            let oper = sel.select();
            if oper.index() == send_op {
                match oper.send(out, Pulse::new(code, ack.clone())) {
                    Ok(()) => owed += 1,
                    Err(_) => gone += 1,
                }
                break;
            }
            // An ack from an output already offered.
            let _ = oper.recv(&ack_rx);
            owed -= 1;
        }
    }
    // Only in-flight clones keep the ack channel open from here, so a
    // subscriber torn down mid-delivery unwinds instead of hanging us.
    drop(ack);
    while owed > 0 {
        match ack_rx.recv() {
            Ok(()) => owed -= 1,
            Err(_) => break,
        }
    }
    if gone > 0 {
        tracing::debug!(gone, "fanout skipped disconnected subscribers");
    }
}

/// A fanout node: one input bus, a fixed set of subscriber buses.
pub struct Fanout {
    outs: SmallVec<[Sender<Pulse>; 8]>,
}

impl Fanout {
    pub fn new(outs: impl IntoIterator<Item = Sender<Pulse>>) -> Self {
        Self {
            outs: outs.into_iter().collect(),
        }
    }

    pub fn subscribers(&self) -> usize {
        self.outs.len()
    }

    /// Serve `input` until it disconnects. Each pulse is fully delivered
    /// and acked downstream before the input pulse itself is acked.
    pub fn run(self, input: Receiver<Pulse>) {
        for p in input.iter() {
            deliver(&self.outs, p.code);
            p.ack();
        }
    }

    /// Serve `input` on its own thread.
    pub fn spawn(self, input: Receiver<Pulse>) -> thread::JoinHandle<()> {
        thread::spawn(move || self.run(input))
    }
}

//! Adapters: inline transformers patched between two cords
//!
//! An adapter occupies two patches: one cord feeds it, the other is driven
//! by it. Once both sides are plugged a forwarding task carries pulses
//! across, acking the feeding cord only after the driven cord has acked.

use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use eniac_core::prelude::*;
use smallvec::SmallVec;

/// Recognized adapter kinds: digit-pulse, shifter, deleter, special-digit.
pub const KINDS: [&str; 4] = ["dp", "s", "d", "sd"];

/// Which side of the adapter a patch lands on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterSide {
    /// The cord feeds the adapter (the adapter is the sink jack).
    Feed,
    /// The adapter drives the cord (the adapter is the source jack).
    Drive,
}

#[derive(Default)]
struct Entry {
    feed: Option<Receiver<Pulse>>,
    drive: Option<Sender<Pulse>>,
    param: i64,
}

/// The adapter registry, keyed by kind and unit number.
pub struct Adapters {
    entries: Mutex<HashMap<(String, usize), Entry>>,
    cancels: Mutex<SmallVec<[Sender<()>; 4]>>,
}

impl Adapters {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            cancels: Mutex::new(SmallVec::new()),
        }
    }

    pub fn is_kind(kind: &str) -> bool {
        KINDS.contains(&kind)
    }

    /// Attach one side of adapter `unit` of `kind`. When both sides are
    /// present the forwarding task starts.
    pub fn plug(&self, kind: &str, side: AdapterSide, unit: usize, param: i64, w: &Wire) -> bool {
        if !Self::is_kind(kind) {
            return false;
        }
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry((kind.to_string(), unit)).or_default();
        match side {
            AdapterSide::Feed => entry.feed = Some(w.rx.clone()),
            AdapterSide::Drive => entry.drive = Some(w.tx.clone()),
        }
        entry.param = param;
        if let (Some(feed), Some(drive)) = (entry.feed.take(), entry.drive.take()) {
            let (cancel_tx, cancel_rx) = bounded(0);
            self.cancels.lock().unwrap().push(cancel_tx);
            thread::spawn(move || forward(feed, drive, cancel_rx));
            tracing::debug!(kind, unit, param = entry.param, "adapter in circuit");
        }
        true
    }

    /// Drop every adapter and stop every forwarding task.
    pub fn reset(&self) {
        self.entries.lock().unwrap().clear();
        let cancels = std::mem::take(&mut *self.cancels.lock().unwrap());
        for cancel in cancels {
            let _ = cancel.send(());
        }
    }
}

impl Default for Adapters {
    fn default() -> Self {
        Self::new()
    }
}

fn forward(feed: Receiver<Pulse>, drive: Sender<Pulse>, cancel: Receiver<()>) {
    loop {
        select! {
            recv(cancel) -> _ => return,
            recv(feed) -> p => match p {
                Ok(p) => {
                    // The driven cord's ack completes before the feeding
                    // cord is released.
                    send_pulse(&drive, p.code);
                    p.ack();
                }
                Err(_) => return,
            }
        }
    }
}

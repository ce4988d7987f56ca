//! Debug breakpoints: pulse-channel taps that request an end-of-cycle stop
//!
//! Ten slots. A plugged slot runs a watcher that latches the shared stop
//! flag on any non-zero pulse and always acks, so the bus never stalls on
//! an armed breakpoint. Re-plugging a slot cancels the previous watcher
//! before the new one is installed.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use eniac_core::prelude::*;

/// Number of breakpoint slots.
pub const SLOTS: usize = 10;

struct Slot {
    what: String,
    cancel: Sender<()>,
}

/// The breakpoint panel.
pub struct Breakpoints {
    shared: Arc<CycleShared>,
    slots: Mutex<[Option<Slot>; SLOTS]>,
}

impl Breakpoints {
    pub fn new(shared: Arc<CycleShared>) -> Self {
        Self {
            shared,
            slots: Mutex::new(std::array::from_fn(|_| None)),
        }
    }

    /// Watch `rx` from slot `n`, replacing any previous watcher. `what`
    /// names the watched jack for the trigger message and the status line.
    pub fn plug(&self, n: usize, rx: Receiver<Pulse>, what: &str) {
        assert!(n < SLOTS, "breakpoint slot out of range: {n}");
        let (cancel_tx, cancel_rx) = bounded(0);
        {
            let mut slots = self.slots.lock().unwrap();
            if let Some(old) = slots[n].take() {
                // Blocks until the old watcher has taken the cancel, so it
                // acks no further pulses once we return.
                let _ = old.cancel.send(());
            }
            slots[n] = Some(Slot {
                what: what.to_string(),
                cancel: cancel_tx,
            });
        }
        let shared = Arc::clone(&self.shared);
        let what = what.to_string();
        thread::spawn(move || watch(n, rx, cancel_rx, shared, what));
        tracing::debug!(slot = n, "breakpoint plugged");
    }

    /// Cancel every watcher and free all slots.
    pub fn reset(&self) {
        let mut slots = self.slots.lock().unwrap();
        for slot in slots.iter_mut() {
            if let Some(old) = slot.take() {
                let _ = old.cancel.send(());
            }
        }
    }

    pub fn status(&self) -> String {
        let slots = self.slots.lock().unwrap();
        let mut s = String::new();
        for (n, slot) in slots.iter().enumerate() {
            match slot {
                Some(b) => writeln!(s, "bp{n}: {}", b.what).unwrap(),
                None => writeln!(s, "bp{n}: -").unwrap(),
            }
        }
        s
    }
}

fn watch(n: usize, rx: Receiver<Pulse>, cancel: Receiver<()>, shared: Arc<CycleShared>, what: String) {
    loop {
        select! {
            recv(cancel) -> _ => return,
            recv(rx) -> p => match p {
                Ok(p) => {
                    if !p.code.is_empty() {
                        println!("triggered bp{n} {what}");
                        shared.set_stop(true);
                    }
                    p.ack();
                }
                Err(_) => return,
            }
        }
    }
}

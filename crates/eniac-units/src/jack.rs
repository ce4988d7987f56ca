//! Jack-panel bookkeeping shared by the unit shells
//!
//! Every unit owns a panel of named jacks. An output jack keeps the sending
//! half of its cord so the unit can assert pulses onto the patch; an input
//! jack gets a drain task that consumes and acks whatever the patch carries,
//! which keeps the bus handshake moving whether or not the unit reacts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use eniac_core::prelude::*;
use smallvec::SmallVec;

pub struct JackPanel {
    unit: String,
    outputs: Mutex<HashMap<String, Sender<Pulse>>>,
    drains: Mutex<SmallVec<[Sender<()>; 4]>>,
    pulses: Arc<AtomicU64>,
}

impl JackPanel {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            outputs: Mutex::new(HashMap::new()),
            drains: Mutex::new(SmallVec::new()),
            pulses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Keep the sending half of a cord for `jack`. Re-plugging replaces
    /// the previous cord.
    pub fn plug_output(&self, jack: &str, w: &Wire) {
        self.outputs
            .lock()
            .unwrap()
            .insert(jack.to_string(), w.tx.clone());
        tracing::debug!(unit = %self.unit, jack, "output jack plugged");
    }

    /// Drain the receiving half of a cord plugged into `jack`.
    pub fn plug_input(&self, jack: &str, w: &Wire) {
        let (cancel_tx, cancel_rx) = bounded(0);
        self.drains.lock().unwrap().push(cancel_tx);
        let rx = w.rx.clone();
        let pulses = Arc::clone(&self.pulses);
        thread::spawn(move || drain(rx, cancel_rx, pulses));
        tracing::debug!(unit = %self.unit, jack, "input jack plugged");
    }

    /// Assert a pulse on a plugged output jack and wait out the ack.
    /// Returns false if the jack is unplugged or its patch has gone away.
    pub fn emit(&self, jack: &str, code: PulseCode) -> bool {
        let tx = self.outputs.lock().unwrap().get(jack).cloned();
        match tx {
            Some(tx) => send_pulse(&tx, code),
            None => false,
        }
    }

    /// Total pulses consumed across all input jacks since the last reset.
    pub fn pulses_seen(&self) -> u64 {
        self.pulses.load(Ordering::SeqCst)
    }

    /// Drop every cord and stop every drain task.
    pub fn unplug_all(&self) {
        self.outputs.lock().unwrap().clear();
        let drains = std::mem::take(&mut *self.drains.lock().unwrap());
        for cancel in drains {
            let _ = cancel.send(());
        }
        self.pulses.store(0, Ordering::SeqCst);
    }
}

fn drain(rx: Receiver<Pulse>, cancel: Receiver<()>, pulses: Arc<AtomicU64>) {
    loop {
        select! {
            recv(cancel) -> _ => return,
            recv(rx) -> p => match p {
                Ok(p) => {
                    if !p.code.is_empty() {
                        pulses.fetch_add(1, Ordering::SeqCst);
                    }
                    p.ack();
                }
                Err(_) => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_jack_consumes_and_acks() {
        let panel = JackPanel::new("a1");
        let w = wire();
        panel.plug_input("a", &w);
        drop(w.rx);

        assert!(send_pulse(&w.tx, PulseCode::ONEP));
        assert!(send_pulse(&w.tx, PulseCode::TWOP));
        assert_eq!(panel.pulses_seen(), 2);
    }

    #[test]
    fn test_output_jack_emits() {
        let panel = JackPanel::new("i");
        let w = wire();
        panel.plug_output("io", &w);
        let rx = w.rx.clone();
        let handle = thread::spawn(move || {
            let p = rx.recv().unwrap();
            assert_eq!(p.code, PulseCode::CPP);
            p.ack();
        });
        assert!(panel.emit("io", PulseCode::CPP));
        handle.join().unwrap();
    }

    #[test]
    fn test_emit_unplugged_jack() {
        let panel = JackPanel::new("i");
        assert!(!panel.emit("io", PulseCode::CPP));
    }

    #[test]
    fn test_unplug_all_stops_drains() {
        let panel = JackPanel::new("a1");
        let w = wire();
        panel.plug_input("b", &w);
        drop(w.rx);
        assert!(send_pulse(&w.tx, PulseCode::ONEP));
        panel.unplug_all();
        assert_eq!(panel.pulses_seen(), 0);
        assert!(!send_pulse(&w.tx, PulseCode::ONEP));
    }
}

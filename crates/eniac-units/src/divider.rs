//! Divider and square-rooter shell

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, Sender};
use eniac_bus::cycle::PhaseTap;
use eniac_core::prelude::*;

use crate::accumulator::program_jack;
use crate::jack::JackPanel;

/// The divider observes the clock through a phase tap rather than a bus
/// subscription; its sequencing walks on the 9P trains.
pub struct Divider {
    switches: Mutex<BTreeMap<String, String>>,
    trains: AtomicU64,
    panel: JackPanel,
}

impl Divider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            switches: Mutex::new(BTreeMap::new()),
            trains: AtomicU64::new(0),
            panel: JackPanel::new("d"),
        })
    }

    pub fn spawn_control(self: Arc<Self>) -> Sender<(String, String)> {
        let (tx, rx) = bounded::<(String, String)>(0);
        thread::spawn(move || {
            for (name, value) in rx.iter() {
                self.switches.lock().unwrap().insert(name, value);
            }
        });
        tx
    }

    pub fn tap(self: Arc<Self>) -> PhaseTap {
        Box::new(move |code| {
            if code.contains(PulseCode::NINEP) {
                self.trains.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    /// Numerator/denominator inputs `n`/`d`, answer output `ans`,
    /// program jacks `1i..8i` and `1o..8o`.
    pub fn plug(&self, jack: &str, w: &Wire) -> bool {
        match jack {
            "n" | "d" => {
                self.panel.plug_input(jack, w);
                true
            }
            "ans" => {
                self.panel.plug_output(jack, w);
                true
            }
            _ => match program_jack(jack) {
                Some((k, 'i')) if (1..=8).contains(&k) => {
                    self.panel.plug_input(jack, w);
                    true
                }
                Some((k, 'o')) if (1..=8).contains(&k) => {
                    self.panel.plug_output(jack, w);
                    true
                }
                _ => false,
            },
        }
    }

    pub fn reset(&self) {
        self.switches.lock().unwrap().clear();
        self.trains.store(0, Ordering::SeqCst);
        self.panel.unplug_all();
    }

    pub fn status(&self) -> String {
        format!("d  9p={}", self.trains.load(Ordering::SeqCst))
    }
}

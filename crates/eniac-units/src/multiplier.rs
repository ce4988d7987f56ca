//! High-speed multiplier shell

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use eniac_core::prelude::*;

use crate::accumulator::program_jack;
use crate::jack::JackPanel;

pub struct Multiplier {
    switches: Mutex<BTreeMap<String, String>>,
    panel: JackPanel,
}

impl Multiplier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            switches: Mutex::new(BTreeMap::new()),
            panel: JackPanel::new("m"),
        })
    }

    /// Consume the cycle feed, acking every pulse.
    pub fn spawn_cycle(&self, cyc: Receiver<Pulse>) {
        thread::spawn(move || {
            for p in cyc.iter() {
                p.ack();
            }
        });
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

    /// Argument inputs `ier`/`icand`, product output `p`, program jacks
    /// `1i..24i` and `1o..24o`.
    pub fn plug(&self, jack: &str, w: &Wire) -> bool {
        match jack {
            "ier" | "icand" => {
                self.panel.plug_input(jack, w);
                true
            }
            "p" => {
                self.panel.plug_output(jack, w);
                true
            }
            _ => match program_jack(jack) {
                Some((n, 'i')) if (1..=24).contains(&n) => {
                    self.panel.plug_input(jack, w);
                    true
                }
                Some((n, 'o')) if (1..=24).contains(&n) => {
                    self.panel.plug_output(jack, w);
                    true
                }
                _ => false,
            },
        }
    }

    pub fn reset(&self) {
        self.switches.lock().unwrap().clear();
        self.panel.unplug_all();
    }

    pub fn status(&self) -> String {
        format!("m  pulses={}", self.panel.pulses_seen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jacks() {
        let mult = Multiplier::new();
        assert!(mult.plug("ier", &wire()));
        assert!(mult.plug("p", &wire()));
        assert!(mult.plug("24o", &wire()));
        assert!(!mult.plug("25i", &wire()));
        assert!(!mult.plug("q", &wire()));
    }

    #[test]
    fn test_cycle_feed_is_acked() {
        let mult = Multiplier::new();
        let (tx, rx) = bounded::<Pulse>(0);
        mult.spawn_cycle(rx);
        assert!(send_pulse(&tx, PulseCode::NINEP));
    }
}

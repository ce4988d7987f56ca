//! Function table shells
//!
//! Three function tables; each has its own cycle input on the fanout and
//! a panel with an argument input and two digit outputs.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use eniac_core::prelude::*;

use crate::accumulator::program_jack;
use crate::jack::JackPanel;

/// Function tables on the machine.
pub const FUNCTION_TABLES: usize = 3;

pub struct FunctionTable {
    index: usize,
    switches: Mutex<BTreeMap<String, String>>,
    panel: JackPanel,
}

impl FunctionTable {
    pub fn new(index: usize) -> Arc<Self> {
        Arc::new(Self {
            index,
            switches: Mutex::new(BTreeMap::new()),
            panel: JackPanel::new(format!("f{}", index + 1)),
        })
    }

    /// Consume this table's cycle feed, acking every pulse.
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

    /// Argument input `arg`, digit outputs `A`/`B`, program jacks
    /// `1i..11i` and `1o..11o`.
    pub fn plug(&self, jack: &str, w: &Wire) -> bool {
        match jack {
            "arg" => {
                self.panel.plug_input(jack, w);
                true
            }
            "A" | "B" => {
                self.panel.plug_output(jack, w);
                true
            }
            _ => match program_jack(jack) {
                Some((n, 'i')) if (1..=11).contains(&n) => {
                    self.panel.plug_input(jack, w);
                    true
                }
                Some((n, 'o')) if (1..=11).contains(&n) => {
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
        format!("f{} pulses={}", self.index + 1, self.panel.pulses_seen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jacks() {
        let ft = FunctionTable::new(1);
        assert!(ft.plug("arg", &wire()));
        assert!(ft.plug("A", &wire()));
        assert!(ft.plug("11o", &wire()));
        assert!(!ft.plug("12i", &wire()));
    }

    #[test]
    fn test_cycle_feed_is_acked() {
        let ft = FunctionTable::new(0);
        let (tx, rx) = bounded::<Pulse>(0);
        ft.spawn_cycle(rx);
        assert!(send_pulse(&tx, PulseCode::TENP));
    }

    #[test]
    fn test_status_names_the_table() {
        assert!(FunctionTable::new(2).status().starts_with("f3"));
    }
}

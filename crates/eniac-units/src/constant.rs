//! Constant transmitter shell

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use eniac_core::prelude::*;

use crate::jack::JackPanel;

/// The constant transmitter sits on the cycle fanout and answers program
/// pulses with digit constants; here it keeps its switch bank and jack
/// panel and consumes its clock feed.
pub struct Constant {
    switches: Mutex<BTreeMap<String, String>>,
    panel: JackPanel,
}

impl Constant {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            switches: Mutex::new(BTreeMap::new()),
            panel: JackPanel::new("c"),
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

    /// Program inputs `1i..30i`, program outputs `1o..30o`, digit output `o`.
    pub fn plug(&self, jack: &str, w: &Wire) -> bool {
        if jack == "o" {
            self.panel.plug_output(jack, w);
            return true;
        }
        match crate::accumulator::program_jack(jack) {
            Some((n, 'i')) if (1..=30).contains(&n) => {
                self.panel.plug_input(jack, w);
                true
            }
            Some((n, 'o')) if (1..=30).contains(&n) => {
                self.panel.plug_output(jack, w);
                true
            }
            _ => false,
        }
    }

    pub fn reset(&self) {
        self.switches.lock().unwrap().clear();
        self.panel.unplug_all();
    }

    pub fn status(&self) -> String {
        let switches = self.switches.lock().unwrap();
        if switches.is_empty() {
            return "c  -".to_string();
        }
        let set: Vec<String> = switches.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("c  {}", set.join(" "))
    }
}
